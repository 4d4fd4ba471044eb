use clap::Parser;
use fleetcmd_core::telemetry::init_telemetry;
use fleetcmd_responder::config::{CliArgs, ResponderConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under many concurrent connections,
// especially in musl environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ResponderConfig::try_from(args)?;

    let providers = init_telemetry("fleetcmd-responder", &config.log_level)?;

    let listener = TcpListener::bind(config.listen_addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        strict_path = config.options.strict_path,
        timestamp_mode = %config.options.timestamp_mode,
        "Starting responder"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let res = fleetcmd_responder::serve(listener, config.options, shutdown).await;
    match &res {
        Ok(()) => tracing::info!("Responder shut down successfully"),
        Err(err) => tracing::error!(error = %err, "Responder stopped with an error"),
    }

    providers.shutdown();
    Ok(res?)
}

async fn shutdown_signal(shutdown: CancellationToken) {
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

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
    shutdown.cancel();
}
