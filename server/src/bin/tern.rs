//! Tern HTTP Server
//!
//! Serves the demo controllers over the tern-core pipeline.

use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tern_server::{demo_routes, Tern, TernConfig, TernError, TernResult, UserStore};

#[derive(Parser, Debug)]
#[command(name = "Tern")]
#[command(version)]
#[command(about = "Bounded-buffer HTTP server with pattern routing", long_about = None)]
struct Args {
    /// Path to JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override HTTP server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override HTTP server hostname
    #[arg(long)]
    hostname: Option<String>,

    /// Override read buffer capacity in bytes
    #[arg(long)]
    buffer_capacity: Option<usize>,

    /// Override maximum concurrent connections
    #[arg(long)]
    max_connections: Option<usize>,

    /// Number of users the demo store starts with
    #[arg(long, default_value_t = 100)]
    seed_users: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Fold CLI flags over the loaded configuration
    fn apply_overrides(&self, config: &mut TernConfig) {
        if let Some(port) = self.port {
            info!(port, "⚙️  CLI override");
            config.port = port;
        }
        if let Some(hostname) = &self.hostname {
            info!(%hostname, "⚙️  CLI override");
            config.hostname = hostname.clone();
        }
        if let Some(buffer_capacity) = self.buffer_capacity {
            info!(buffer_capacity, "⚙️  CLI override");
            config.buffer_capacity = buffer_capacity;
        }
        if let Some(max_connections) = self.max_connections {
            info!(max_connections, "⚙️  CLI override");
            config.max_connections = max_connections;
        }
    }
}

#[tokio::main]
async fn main() -> TernResult<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("🚀 Starting Tern HTTP server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => {
            let config = TernConfig::from_file(path)?;
            info!("📋 Configuration loaded from {}", path.display());
            config
        }
        None => {
            info!("📋 No configuration file, using defaults");
            TernConfig::default()
        }
    };

    args.apply_overrides(&mut config);

    info!("📡 Server will listen on http://{}", config.socket_addr());

    let routes = demo_routes(UserStore::seeded(args.seed_users))?;
    let app = Tern::new(config, routes)?;

    info!("✅ Tern server initialized successfully");

    let outcome = tokio::select! {
        served = app.listen() => served,
        _ = shutdown_signal() => {
            info!("📛 Shutting down");
            Ok(())
        }
    };
    if let Err(e) = &outcome {
        error!("Server stopped: {}", e);
    }
    outcome?;

    info!("👋 Tern server shut down successfully");
    Ok(())
}

/// Install the fmt subscriber filtered by `level`
fn init_logging(level: &str) -> TernResult<()> {
    let env_filter = level
        .parse::<EnvFilter>()
        .map_err(|e| TernError::Config(format!("Invalid log level '{}': {}", level, e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Resolve when SIGINT or SIGTERM arrives
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("SIGTERM handler unavailable, waiting for SIGINT only: {}", e);
                if signal::ctrl_c().await.is_ok() {
                    info!(signal = "SIGINT", "signal received");
                }
                return;
            }
        };

        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = signal::ctrl_c() => "SIGINT",
        };
        info!(signal = name, "signal received");
    }

    #[cfg(not(unix))]
    {
        if signal::ctrl_c().await.is_ok() {
            info!(signal = "ctrl-c", "signal received");
        }
    }
}
