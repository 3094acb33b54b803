use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

use super::metrics::ConnectionCount;

/// Errors that can occur when trying to accept a connection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Connection limit exceeded (current: {current}, limit: {limit})")]
    LimitExceeded { current: usize, limit: usize },
}

/// Decrements the active connection count when the relay task ends and
/// notifies the drain loop when the last connection closes.
pub struct ConnectionGuard {
    counts: Arc<ConnectionCount>,
    notifier: watch::Sender<()>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.counts.decrement() == 0 {
            let _ = self.notifier.send(());
        }
    }
}

/// Enforces the concurrent connection limit
pub struct ConnectionManager {
    counts: Arc<ConnectionCount>,
    max_connections: usize,
    connections_closed_tx: watch::Sender<()>,
}

impl ConnectionManager {
    pub fn new(
        max_connections: usize,
        counts: Arc<ConnectionCount>,
        connections_closed_tx: watch::Sender<()>,
    ) -> Self {
        Self { counts, max_connections, connections_closed_tx }
    }

    pub fn try_accept(&self, peer: SocketAddr) -> Result<ConnectionGuard, ConnectionError> {
        let current = self.counts.current();
        if current >= self.max_connections {
            self.counts.increment_rejected();
            warn!(current, limit = self.max_connections, %peer, "Connection limit exceeded, rejecting connection");
            return Err(ConnectionError::LimitExceeded { current, limit: self.max_connections });
        }

        self.counts.increment();
        Ok(ConnectionGuard {
            counts: self.counts.clone(),
            notifier: self.connections_closed_tx.clone(),
        })
    }
}
