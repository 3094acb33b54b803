//! Accept loop and per-connection task supervision.

mod connection;
mod handler;
mod metrics;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::access_log::LogRecord;
use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::relay::RelayConfig;

pub use connection::{ConnectionError, ConnectionGuard, ConnectionManager};
pub use handler::handle_connection;
pub use metrics::{ConnectionCount, ConnectionSnapshot};

/// Bind `config.listen` and serve until `shutdown` flips to `true`.
pub async fn run(config: Arc<Config>, shutdown: watch::Receiver<bool>) -> Result<()> {
    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|source| ProxyError::Bind { addr: config.listen, source })?;
    serve(listener, config, shutdown).await
}

/// Run the accept loop on an already bound listener.
///
/// Each connection gets its own task. Dropping the shutdown sender counts as a
/// shutdown request.
pub async fn serve(
    listener: TcpListener,
    config: Arc<Config>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let addr = listener.local_addr()?;
    let relay_config = Arc::new(RelayConfig::from(config.as_ref()));
    let counts = Arc::new(ConnectionCount::default());
    let (closed_tx, mut closed_rx) = watch::channel(());
    let manager = ConnectionManager::new(config.limits.max_connections, counts.clone(), closed_tx);

    info!(
        %addr,
        connect_ms = config.timeout.connect_ms,
        idle_ms = config.timeout.idle_ms,
        buffer_size = config.limits.buffer_size,
        "forward proxy listening"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }
        let (stream, peer) = tokio::select! {
            res = listener.accept() => match res {
                Ok(pair) => pair,
                Err(e) => {
                    let snapshot = counts.snapshot();
                    warn!(error = %e, current = snapshot.current, total = snapshot.total, "failed to accept connection");
                    continue;
                }
            },
            res = shutdown.changed() => {
                if res.is_err() {
                    debug!("shutdown sender dropped");
                    break;
                }
                continue;
            }
        };

        let guard = match manager.try_accept(peer) {
            Ok(guard) => guard,
            Err(e) => {
                let snapshot = counts.snapshot();
                warn!(%peer, error = %e, rejected = snapshot.rejected, "dropping connection");
                drop(stream);
                continue;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, error = %e, "failed to set TCP_NODELAY on client socket");
        }
        let snapshot = counts.snapshot();
        debug!(%peer, current = snapshot.current, total = snapshot.total, "accepted connection");

        let relay_config = relay_config.clone();
        let counts = counts.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let task = tokio::spawn(async move {
                handle_connection(stream, peer, relay_config.as_ref()).await
            });
            let record = match task.await {
                Ok(record) => record,
                Err(e) => {
                    error!(%peer, error = %e, "connection task failed");
                    Some(LogRecord::failed(peer.ip()))
                }
            };
            if let Some(record) = record {
                if record.status.is_error() {
                    counts.increment_errors();
                    debug!(%peer, errors = counts.snapshot().errors, "connection ended with error");
                }
                record.emit();
            }
        });
    }

    let snapshot = counts.snapshot();
    info!(
        active = snapshot.current,
        total = snapshot.total,
        errors = snapshot.errors,
        rejected = snapshot.rejected,
        "stopping accept loop"
    );
    drop(listener);
    drain(&counts, &mut closed_rx, Duration::from_secs(config.timeout.shutdown_secs)).await;
    info!("proxy server stopped");
    Ok(())
}

async fn drain(counts: &ConnectionCount, closed_rx: &mut watch::Receiver<()>, limit: Duration) {
    let active = counts.current();
    if active == 0 {
        return;
    }
    info!(active_connections = active, timeout_secs = limit.as_secs(), "waiting for active connections to finish");

    let wait = async {
        while counts.current() > 0 {
            if closed_rx.changed().await.is_err() {
                break;
            }
        }
    };
    if timeout(limit, wait).await.is_err() {
        warn!(active_connections = counts.current(), "shutdown timeout reached, abandoning remaining connections");
    } else {
        info!("all connections closed");
    }
}
