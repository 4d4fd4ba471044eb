use crate::service::handler::ResponderOptions;
use anyhow::Context;
use clap::Parser;
use fleetcmd_core::TimestampMode;
use std::net::SocketAddr;

/// Runtime configuration for the `fleetcmd-responder` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first when present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fleetcmd-responder",
    version,
    about = "Acknowledges fleet commands with a receipt timestamp"
)]
pub struct CliArgs {
    /// Address the HTTP listener binds to.
    ///
    /// Environment variable: `LISTEN_ADDR`
    #[arg(long, env = "LISTEN_ADDR", default_value_t = String::from("0.0.0.0:8081"))]
    pub listen_addr: String,

    /// Reject commands whose body disagrees with the version, VIN or command
    /// in the request path. Off by default: mismatches are accepted.
    ///
    /// Environment variable: `STRICT_PATH`
    #[arg(long, env = "STRICT_PATH", default_value_t = false)]
    pub strict_path: bool,

    /// Encoding of the receipt timestamp: `epoch` or `second-of-minute`.
    ///
    /// Environment variable: `TIMESTAMP_MODE`
    #[arg(long, env = "TIMESTAMP_MODE", default_value_t = TimestampMode::Epoch)]
    pub timestamp_mode: TimestampMode,

    /// Log filter used when `RUST_LOG` is not set.
    ///
    /// Environment variable: `LOG_LEVEL`
    #[arg(long, env = "LOG_LEVEL", default_value_t = String::from("info"))]
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub listen_addr: SocketAddr,
    pub options: ResponderOptions,
    pub log_level: String,
}

impl TryFrom<CliArgs> for ResponderConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let listen_addr = args
            .listen_addr
            .parse()
            .with_context(|| format!("LISTEN_ADDR `{}` is not a socket address", args.listen_addr))?;

        Ok(Self {
            listen_addr,
            options: ResponderOptions {
                strict_path: args.strict_path,
                timestamp_mode: args.timestamp_mode,
            },
            log_level: args.log_level,
        })
    }
}
