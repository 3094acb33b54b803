#![forbid(unsafe_code)]

use clap::Parser;
use courier_proxy_lib::config::{load_from_path, validate, Config};
use courier_proxy_lib::telemetry::init_tracing;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Courier forwarding HTTP proxy")]
struct Cli {
    /// Path to configuration TOML file (defaults are used when omitted)
    #[arg(short, long, value_name = "FILE", env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Address and port to listen on
    #[arg(short, long, env = "COURIER_LISTEN")]
    listen: Option<SocketAddr>,

    /// Upstream connect timeout in milliseconds
    #[arg(long, env = "COURIER_CONNECT_TIMEOUT_MS")]
    connect_timeout_ms: Option<u64>,

    /// Idle relay timeout in milliseconds
    #[arg(long, env = "COURIER_IDLE_TIMEOUT_MS")]
    idle_timeout_ms: Option<u64>,

    /// Receive buffer size in bytes
    #[arg(long, env = "COURIER_BUFFER_SIZE")]
    buffer_size: Option<usize>,

    /// Maximum concurrent client connections
    #[arg(long, env = "COURIER_MAX_CONNECTIONS")]
    max_connections: Option<usize>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "COURIER_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, mut cfg: Config) -> Config {
        if let Some(listen) = self.listen {
            cfg.listen = listen;
        }
        if let Some(ms) = self.connect_timeout_ms {
            cfg.timeout.connect_ms = ms;
        }
        if let Some(ms) = self.idle_timeout_ms {
            cfg.timeout.idle_ms = ms;
        }
        if let Some(size) = self.buffer_size {
            cfg.limits.buffer_size = size;
        }
        if let Some(max) = self.max_connections {
            cfg.limits.max_connections = max;
        }
        if let Some(level) = self.log_level {
            cfg.logging.level = level;
        }
        cfg
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => match load_from_path(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("failed to load configuration: {err}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    let cfg = cli.apply(base);
    if let Err(err) = validate(&cfg) {
        eprintln!("invalid configuration: {err}");
        std::process::exit(1);
    }

    if let Err(err) = init_tracing(&cfg.logging.level, cfg.logging.show_target) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    info!(listen = %cfg.listen, max_connections = cfg.limits.max_connections, "configuration loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    if let Err(err) = courier_proxy_lib::run(Arc::new(cfg), shutdown_rx).await {
        error!(%err, "proxy exited with error");
        std::process::exit(1);
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, falling back to Ctrl-C");
            let _ = tokio::signal::ctrl_c().await;
            info!("Received SIGINT, initiating graceful shutdown");
            return;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, initiating graceful shutdown"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl-C, initiating graceful shutdown");
}
