//! Signaling relay binary
//!
//! Run with: signal-relay [--host 0.0.0.0] [--port 8080]
//!
//! Every option can also be set through the environment (`PORT`, `HOST`,
//! `LOG_LEVEL`, ...). `RUST_LOG` overrides `--log-level` when set.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use signal_relay::server::config::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT};
use signal_relay::{Error, Result, ServerConfig, SignalServer};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "signal-relay", version, about = "WebRTC signaling relay")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 0)]
    max_connections: usize,

    /// Largest accepted message in bytes
    #[arg(long, env = "MAX_MESSAGE_SIZE", default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Seconds between stats log lines (0 disables)
    #[arg(long, env = "STATS_INTERVAL_SECS", default_value_t = 60)]
    stats_interval_secs: u64,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig::with_addr(SocketAddr::new(self.host, self.port))
            .max_connections(self.max_connections)
            .max_message_size(self.max_message_size)
            .stats_interval(Duration::from_secs(self.stats_interval_secs))
    }
}

fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::Config(format!("invalid log level '{level}': {e}")))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).init(),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    let server = SignalServer::new(cli.server_config());
    tracing::info!(addr = %server.bind_addr(), "Starting signaling relay");

    server.run_until(shutdown_signal()).await
}
