use std::net::IpAddr;
use std::time::{Duration, Instant};

use http::StatusCode;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::session::{RelaySession, SessionState, Termination};
use crate::access_log::LogRecord;
use crate::config::Config;
use crate::error::UpstreamError;
use crate::request::ParsedRequest;
use crate::response::write_synthetic;

/// Parameters injected into every relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Upper bound for establishing the upstream connection
    pub connect_timeout: Duration,
    /// Maximum time without traffic in either direction
    pub idle_timeout: Duration,
    /// Size of each read, per direction
    pub buffer_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(300),
            buffer_size: 4096,
        }
    }
}

impl From<&Config> for RelayConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            connect_timeout: Duration::from_millis(cfg.timeout.connect_ms),
            idle_timeout: Duration::from_millis(cfg.timeout.idle_ms),
            buffer_size: cfg.limits.buffer_size,
        }
    }
}

enum Ready {
    Upstream(std::io::Result<usize>),
    Client(std::io::Result<usize>),
}

/// Open the upstream socket. Failures are never retried.
pub async fn connect_upstream(
    request: &ParsedRequest,
    connect_timeout: Duration,
) -> Result<TcpStream, UpstreamError> {
    let started = Instant::now();
    match timeout(connect_timeout, TcpStream::connect((request.host(), request.port()))).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(UpstreamError::Connect { target: request.upstream_addr(), source }),
        Err(_) => Err(UpstreamError::Timeout {
            target: request.upstream_addr(),
            elapsed_ms: started.elapsed().as_millis(),
        }),
    }
}

/// Relay a parsed request: connect, send the rebuilt request, then copy bytes
/// in both directions until either side finishes.
///
/// Always returns the access log record for the connection. Both streams are
/// shut down before returning, whatever ended the session.
pub async fn run<C>(
    client: &mut C,
    request: &ParsedRequest,
    client_ip: IpAddr,
    config: &RelayConfig,
) -> LogRecord
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = RelaySession::new();

    let mut upstream = match connect_upstream(request, config.connect_timeout).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(%client_ip, upstream = %request.upstream_addr(), error = %e, "upstream connect failed");
            if let Err(write_err) = write_synthetic(client, StatusCode::from(&e)).await {
                debug!(%client_ip, error = %write_err, "could not deliver 502 to client");
            }
            session.close(Termination::ConnectFailed);
            shutdown_quietly(client).await;
            return session.to_log_record(request.url(), client_ip);
        }
    };
    if let Err(e) = upstream.set_nodelay(true) {
        debug!(error = %e, "failed to set TCP_NODELAY on upstream socket");
    }

    session.advance(SessionState::SendingRequest);
    if let Err(e) = send_request(&mut upstream, request).await {
        warn!(%client_ip, upstream = %request.upstream_addr(), error = %e, "failed to send request upstream");
        session.close(Termination::SendFailed);
    } else {
        session.observe_request(request.outbound().len());
        session.advance(SessionState::Relaying);
        pump(client, &mut upstream, &mut session, config).await;
    }

    shutdown_quietly(&mut upstream).await;
    shutdown_quietly(client).await;

    debug!(
        %client_ip,
        upstream = %request.upstream_addr(),
        termination = session.termination().map(Termination::as_str).unwrap_or("none"),
        sent = session.bytes_to_upstream(),
        received = session.bytes_to_client(),
        "relay finished"
    );
    session.to_log_record(request.url(), client_ip)
}

async fn send_request(upstream: &mut TcpStream, request: &ParsedRequest) -> Result<(), UpstreamError> {
    upstream
        .write_all(request.outbound())
        .await
        .map_err(UpstreamError::Send)?;
    upstream.flush().await.map_err(UpstreamError::Send)
}

/// Full-duplex copy between `client` and `upstream`.
///
/// Waits for whichever side becomes readable first, bounded by the idle
/// timeout, and forwards the chunk unmodified. Each forwarding write is bounded
/// by the same timeout, so a peer that stops reading cannot hold the session
/// open. EOF or an error on either side ends the whole session. The session is
/// closed on return.
pub async fn pump<C, U>(
    client: &mut C,
    upstream: &mut U,
    session: &mut RelaySession,
    config: &RelayConfig,
) -> Termination
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let buffer_size = config.buffer_size.max(1);
    let mut from_upstream = vec![0u8; buffer_size];
    let mut from_client = vec![0u8; buffer_size];

    let reason = loop {
        let ready = timeout(config.idle_timeout, async {
            tokio::select! {
                r = upstream.read(&mut from_upstream) => Ready::Upstream(r),
                r = client.read(&mut from_client) => Ready::Client(r),
            }
        })
        .await;

        match ready {
            Err(_) => break Termination::IdleTimeout,
            Ok(Ready::Upstream(Ok(0))) => break Termination::UpstreamClosed,
            Ok(Ready::Upstream(Ok(n))) => {
                let chunk = &from_upstream[..n];
                session.observe_response(chunk);
                match timeout(config.idle_timeout, client.write_all(chunk)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(error = %e, "client went away while relaying response");
                        break Termination::ClientError;
                    }
                    Err(_) => {
                        debug!("client stopped reading, write timed out");
                        break Termination::IdleTimeout;
                    }
                }
            }
            Ok(Ready::Upstream(Err(e))) => {
                debug!(error = %e, "upstream read failed");
                break Termination::UpstreamError;
            }
            Ok(Ready::Client(Ok(0))) => break Termination::ClientClosed,
            Ok(Ready::Client(Ok(n))) => {
                match timeout(config.idle_timeout, upstream.write_all(&from_client[..n])).await {
                    Ok(Ok(())) => session.observe_request(n),
                    Ok(Err(e)) => {
                        debug!(error = %e, "upstream went away while relaying request bytes");
                        break Termination::UpstreamError;
                    }
                    Err(_) => {
                        debug!("upstream stopped reading, write timed out");
                        break Termination::IdleTimeout;
                    }
                }
            }
            Ok(Ready::Client(Err(e))) => {
                debug!(error = %e, "client read failed");
                break Termination::ClientError;
            }
        }
    };

    session.close(reason);
    reason
}

/// Shut down the write half, ignoring errors from sockets that are already
/// closed or reset.
pub(crate) async fn shutdown_quietly<S>(stream: &mut S)
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "shutdown on closed stream");
    }
}
