use clap::Parser;
use core::time::Duration;
use fleetcmd_core::telemetry::init_telemetry;
use fleetcmd_loadgen::{
    WorkerPool,
    config::{CliArgs, LoadgenConfig},
};
use fleetcmd_responder::ResponderOptions;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance with many concurrent workers,
// especially in musl environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = LoadgenConfig::try_from(args)?;

    let providers = init_telemetry("fleetcmd-loadgen", &config.log_level)?;
    log_startup_info(&config);

    let shutdown = CancellationToken::new();

    let responder = match config.embedded_responder {
        Some(addr) => Some(spawn_responder(addr, &config, shutdown.clone()).await?),
        None => None,
    };

    tokio::spawn(shutdown_signal(shutdown.clone(), config.run_for));

    let pool = WorkerPool::new(config, shutdown.clone());
    let res = pool.run().await;
    match &res {
        Ok(report) => report.log_summary(),
        Err(err) => tracing::error!(error = %err, "Worker pool could not start"),
    }

    // Every worker has stopped; release the signal task and the responder.
    shutdown.cancel();
    if let Some(handle) = responder {
        match handle.await {
            Ok(Ok(())) => tracing::info!("Embedded responder shut down successfully"),
            Ok(Err(err)) => {
                tracing::error!(error = %err, "Embedded responder stopped with an error");
            }
            Err(err) => tracing::error!(error = %err, "Embedded responder task failed"),
        }
    }

    providers.shutdown();
    res?;
    Ok(())
}

fn log_startup_info(config: &LoadgenConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting load generator with full config: {:#?}", config);
    } else {
        tracing::info!(
            target_url = %config.target,
            workers = config.num_clients,
            rate = config.rate,
            "Starting load generator"
        );
    }
}

async fn spawn_responder(
    addr: SocketAddr,
    config: &LoadgenConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<JoinHandle<std::io::Result<()>>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Starting embedded responder");

    let options = ResponderOptions {
        timestamp_mode: config.timestamp_mode,
        ..ResponderOptions::default()
    };
    Ok(tokio::spawn(fleetcmd_responder::serve(listener, options, shutdown)))
}

async fn shutdown_signal(shutdown: CancellationToken, run_for: Option<Duration>) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!(error = %err, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    let deadline = async {
        match run_for {
            Some(run_for) => tokio::time::sleep(run_for).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
        () = deadline => tracing::info!("Run duration elapsed"),
        // All workers stopped on their own.
        () = shutdown.cancelled() => return,
    }

    tracing::info!("Shutdown signal received, stopping workers...");
    shutdown.cancel();
}
