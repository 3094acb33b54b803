use std::net::SocketAddr;

use http::StatusCode;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::access_log::LogRecord;
use crate::relay::{self, shutdown_quietly, RelayConfig};
use crate::request::parse;
use crate::response::write_synthetic;

/// Serve one client connection end to end.
///
/// The request line and headers must arrive in the first read; anything that
/// does not parse is answered with `400 Bad Request`. Returns `None` only when
/// the client closed without sending anything.
pub async fn handle_connection<C>(
    mut client: C,
    peer: SocketAddr,
    config: &RelayConfig,
) -> Option<LogRecord>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; config.buffer_size.max(1)];
    let n = match timeout(config.idle_timeout, client.read(&mut buf)).await {
        Ok(Ok(0)) => {
            debug!(%peer, "client closed before sending a request");
            return None;
        }
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            debug!(%peer, error = %e, "failed to read request");
            return Some(LogRecord::failed(peer.ip()));
        }
        Err(_) => {
            debug!(%peer, "timed out waiting for request");
            shutdown_quietly(&mut client).await;
            return Some(LogRecord::failed(peer.ip()));
        }
    };

    let request = match parse(&buf[..n]) {
        Ok(request) => request,
        Err(e) => {
            info!(%peer, reason = e.error_type(), error = %e, "rejecting request");
            if let Err(write_err) = write_synthetic(&mut client, StatusCode::from(e)).await {
                debug!(%peer, error = %write_err, "could not deliver 400 to client");
            }
            shutdown_quietly(&mut client).await;
            return Some(LogRecord::failed(peer.ip()));
        }
    };

    debug!(%peer, method = request.method(), url = request.url(), upstream = %request.upstream_addr(), "forwarding request");
    Some(relay::run(&mut client, &request, peer.ip(), config).await)
}
