use crate::pacer::period_for_rate;
use anyhow::Context;
use clap::Parser;
use core::time::Duration;
use fleetcmd_core::{ConfigError, DEFAULT_PROTOCOL_VERSION, OPEN_DOOR, TimestampMode};
use std::net::SocketAddr;

/// Runtime configuration for the `fleetcmd-loadgen` binary.
///
/// These settings control how many simulated vehicles run, how fast each one
/// issues commands, and where the commands go. All values are parsed from CLI
/// arguments or environment variables (a `.env` file is loaded first when
/// present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fleetcmd-loadgen",
    version,
    about = "Rate-paced command traffic from a simulated vehicle fleet"
)]
pub struct CliArgs {
    /// Base address of the command endpoint. Requests go to
    /// `{server}/{protocol-version}/{VIN}/{command}`.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("http://localhost:8081"))]
    pub server: String,

    /// Number of workers, one simulated vehicle each.
    ///
    /// Worker `n` (1-based) always receives the same VIN.
    ///
    /// Environment variable: `NUM_CLIENTS`
    #[arg(long, env = "NUM_CLIENTS", default_value_t = 1)]
    pub clients: usize,

    /// Requests per second issued by each worker. Fractional rates such as
    /// `0.5` are allowed; there is no fleet-wide cap.
    ///
    /// Environment variable: `RATE`
    #[arg(long, env = "RATE", default_value_t = 1.0)]
    pub rate: f64,

    /// Protocol revision placed in the path and in the `version` field.
    ///
    /// Environment variable: `PROTOCOL_VERSION`
    #[arg(long, env = "PROTOCOL_VERSION", default_value_t = String::from(DEFAULT_PROTOCOL_VERSION))]
    pub protocol_version: String,

    /// Command name placed in the path and in the `command` field.
    ///
    /// Environment variable: `COMMAND`
    #[arg(long, env = "COMMAND", default_value_t = String::from(OPEN_DOOR))]
    pub command: String,

    /// Deadline for each request, in milliseconds. No deadline when unset.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_MS`
    #[arg(long, env = "REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Stop every worker after this many seconds. Runs until interrupted when
    /// unset.
    ///
    /// Environment variable: `DURATION_SECS`
    #[arg(long, env = "DURATION_SECS")]
    pub duration_secs: Option<u64>,

    /// Encoding of the capture timestamp: `epoch` or `second-of-minute`.
    ///
    /// Environment variable: `TIMESTAMP_MODE`
    #[arg(long, env = "TIMESTAMP_MODE", default_value_t = TimestampMode::Epoch)]
    pub timestamp_mode: TimestampMode,

    /// Also serve the responder from this process on the given address.
    ///
    /// Example: "0.0.0.0:8081"
    ///
    /// Environment variable: `EMBEDDED_RESPONDER`
    #[arg(long, env = "EMBEDDED_RESPONDER")]
    pub embedded_responder: Option<String>,

    /// Log filter used when `RUST_LOG` is not set.
    ///
    /// Environment variable: `LOG_LEVEL`
    #[arg(long, env = "LOG_LEVEL", default_value_t = String::from("info"))]
    pub log_level: String,
}

/// Validated, immutable load generator configuration.
///
/// Built once at startup and shared read-only by the pool and every worker.
#[derive(Debug, Clone)]
pub struct LoadgenConfig {
    /// Base address without a trailing `/`.
    pub target: String,
    pub num_clients: usize,
    pub rate: f64,
    /// Interval between two requests of one worker (`1 / rate`).
    pub period: Duration,
    pub protocol_version: String,
    pub command: String,
    pub request_timeout: Option<Duration>,
    pub run_for: Option<Duration>,
    pub timestamp_mode: TimestampMode,
    pub embedded_responder: Option<SocketAddr>,
    pub log_level: String,
}

/// Checks that `target` can serve as the base of request URLs and returns it
/// without a trailing `/`.
pub fn normalize_target(target: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidTarget {
        url: target.to_owned(),
        reason,
    };

    let url = reqwest::Url::parse(target).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid(format!(
            "scheme `{}` is not supported, use http://",
            url.scheme()
        )));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query strings and fragments are not allowed".into()));
    }

    Ok(target.trim_end_matches('/').to_owned())
}

impl TryFrom<CliArgs> for LoadgenConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.clients == 0 {
            return Err(ConfigError::NoWorkers.into());
        }

        let period = period_for_rate(args.rate)?;
        let target = normalize_target(&args.server)?;

        let embedded_responder = args
            .embedded_responder
            .as_deref()
            .map(|addr| {
                addr.parse::<SocketAddr>()
                    .with_context(|| format!("EMBEDDED_RESPONDER `{addr}` is not a socket address"))
            })
            .transpose()?;

        Ok(Self {
            target,
            num_clients: args.clients,
            rate: args.rate,
            period,
            protocol_version: args.protocol_version,
            command: args.command,
            request_timeout: args.request_timeout_ms.map(Duration::from_millis),
            run_for: args.duration_secs.map(Duration::from_secs),
            timestamp_mode: args.timestamp_mode,
            embedded_responder,
            log_level: args.log_level,
        })
    }
}

impl LoadgenConfig {
    /// Parses and validates a command line; used by tests and embedders.
    pub fn from_args<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_from(CliArgs::try_parse_from(args)?)
    }
}
