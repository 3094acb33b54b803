use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use courier_proxy_lib::access_log::Status;
use courier_proxy_lib::relay::{pump, run, RelayConfig, RelaySession, SessionState, Termination};
use courier_proxy_lib::request::parse;
use tokio::io::{duplex, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const CLIENT_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn test_config() -> RelayConfig {
    RelayConfig {
        connect_timeout: Duration::from_secs(2),
        idle_timeout: Duration::from_secs(5),
        buffer_size: 32,
    }
}

fn closed_port() -> TestResult<SocketAddr> {
    let listener = StdTcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Stream that yields `chunks` in order, then fails every read with
/// `ConnectionReset`. Writes are accepted and discarded.
struct ResettingStream {
    chunks: VecDeque<&'static [u8]>,
}

impl AsyncRead for ResettingStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.chunks.pop_front() {
            Some(chunk) => {
                buf.put_slice(chunk);
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(io::Error::from(io::ErrorKind::ConnectionReset))),
        }
    }
}

impl AsyncWrite for ResettingStream {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Client whose socket is gone: reads never complete, writes fail with
/// `BrokenPipe`.
struct BrokenPipeClient;

impl AsyncRead for BrokenPipeClient {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

impl AsyncWrite for BrokenPipeClient {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
    }
}

/// Upstream stub that reads one request, hands it back through `seen`, then
/// writes `reply` and closes.
async fn spawn_upstream(
    reply: &'static [u8],
) -> TestResult<(SocketAddr, oneshot::Receiver<Vec<u8>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let Ok((mut s, _)) = listener.accept().await else {
            return;
        };
        let mut buf = vec![0u8; 4096];
        let n = s.read(&mut buf).await.unwrap_or(0);
        let _ = tx.send(buf[..n].to_vec());
        let _ = s.write_all(reply).await;
        let _ = s.shutdown().await;
    });
    Ok((addr, rx))
}

#[tokio::test]
async fn upstream_bytes_arrive_in_order_across_chunks() -> TestResult<()> {
    let (mut client, mut client_peer) = duplex(64);
    let (mut upstream, mut upstream_peer) = duplex(64);

    let payload: Vec<u8> = (0..5_000u32).map(|i| (i % 251) as u8).collect();
    let expected = payload.clone();
    let writer = tokio::spawn(async move {
        for chunk in payload.chunks(97) {
            upstream_peer.write_all(chunk).await?;
        }
        Ok::<_, std::io::Error>(())
    });
    let reader = tokio::spawn(async move {
        let mut received = Vec::new();
        client_peer.read_to_end(&mut received).await?;
        Ok::<_, std::io::Error>(received)
    });

    let mut session = RelaySession::new();
    session.advance(SessionState::Relaying);
    let reason = pump(&mut client, &mut upstream, &mut session, &test_config()).await;
    drop(client);

    writer.await??;
    let received = reader.await??;
    assert_eq!(reason, Termination::UpstreamClosed);
    assert_eq!(received.len(), expected.len());
    assert_eq!(received, expected);
    assert_eq!(session.bytes_to_client(), 5_000);
    Ok(())
}

#[tokio::test]
async fn client_bytes_are_forwarded_upstream_unmodified() -> TestResult<()> {
    let (mut client, mut client_peer) = duplex(64);
    let (mut upstream, mut upstream_peer) = duplex(64);

    let sender = tokio::spawn(async move {
        client_peer.write_all(b"first-").await?;
        client_peer.write_all(b"second-").await?;
        client_peer.write_all(b"third").await?;
        Ok::<_, std::io::Error>(())
    });
    let collector = tokio::spawn(async move {
        let mut received = Vec::new();
        upstream_peer.read_to_end(&mut received).await?;
        Ok::<_, std::io::Error>(received)
    });

    let mut session = RelaySession::new();
    let reason = pump(&mut client, &mut upstream, &mut session, &test_config()).await;
    drop(upstream);

    sender.await??;
    assert_eq!(reason, Termination::ClientClosed);
    assert_eq!(collector.await??, b"first-second-third".to_vec());
    assert_eq!(session.bytes_to_upstream(), 18);
    Ok(())
}

#[tokio::test]
async fn relays_response_and_sniffs_status() -> TestResult<()> {
    let reply = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK";
    let (upstream_addr, seen) = spawn_upstream(reply).await?;
    let raw = format!(
        "GET http://{upstream_addr}/ HTTP/1.1\r\nHost: example.test\r\nProxy-Connection: keep-alive\r\n\r\n"
    );
    let request = parse(raw.as_bytes())?;

    let (mut client, mut client_peer) = duplex(1024);
    let record = run(&mut client, &request, CLIENT_IP, &test_config()).await;
    drop(client);

    let mut received = Vec::new();
    client_peer.read_to_end(&mut received).await?;
    assert_eq!(received, reply.to_vec());
    assert_eq!(record.status, Status::Code("200".into()));
    assert_eq!(record.url, format!("http://{upstream_addr}/"));
    assert_eq!(record.client_ip, CLIENT_IP);

    let forwarded = String::from_utf8(seen.await?)?;
    assert!(forwarded.starts_with("GET / HTTP/1.1\r\n"));
    assert!(!forwarded.to_ascii_lowercase().contains("proxy-connection"));
    Ok(())
}

#[tokio::test]
async fn connect_refused_yields_502_and_error_sentinel() -> TestResult<()> {
    let addr = closed_port()?;
    let raw = format!("GET /x HTTP/1.1\r\nHost: {addr}\r\n\r\n");
    let request = parse(raw.as_bytes())?;

    let (mut client, mut client_peer) = duplex(1024);
    let record = run(&mut client, &request, CLIENT_IP, &test_config()).await;
    drop(client);

    let mut received = Vec::new();
    client_peer.read_to_end(&mut received).await?;
    assert_eq!(received, b"HTTP/1.1 502 Bad Gateway\r\n\r\n".to_vec());
    assert_eq!(record.status, Status::Error);
    Ok(())
}

#[tokio::test]
async fn non_http_response_keeps_unknown_status() -> TestResult<()> {
    let (upstream_addr, _seen) = spawn_upstream(b"\x16\x03\x01garbage").await?;
    let raw = format!("GET / HTTP/1.1\r\nHost: {upstream_addr}\r\n\r\n");
    let request = parse(raw.as_bytes())?;

    let (mut client, mut client_peer) = duplex(1024);
    let record = run(&mut client, &request, CLIENT_IP, &test_config()).await;
    drop(client);

    let mut received = Vec::new();
    client_peer.read_to_end(&mut received).await?;
    assert_eq!(received, b"\x16\x03\x01garbage".to_vec());
    assert_eq!(record.status, Status::Unknown);
    Ok(())
}

#[tokio::test]
async fn upstream_closing_without_data_is_unknown() -> TestResult<()> {
    let (upstream_addr, _seen) = spawn_upstream(b"").await?;
    let raw = format!("GET / HTTP/1.1\r\nHost: {upstream_addr}\r\n\r\n");
    let request = parse(raw.as_bytes())?;

    let (mut client, _client_peer) = duplex(1024);
    let record = run(&mut client, &request, CLIENT_IP, &test_config()).await;
    assert_eq!(record.status.to_string(), "unknown");
    Ok(())
}

#[tokio::test]
async fn shutdown_after_close_does_not_panic() -> TestResult<()> {
    let (mut client, client_peer) = duplex(64);
    drop(client_peer);
    client.shutdown().await.ok();
    client.shutdown().await.ok();
    Ok(())
}

#[tokio::test]
async fn stalled_client_ends_relay_after_idle_timeout() -> TestResult<()> {
    // The client peer is kept open but never read, so the duplex buffer fills.
    let (mut client, _client_peer) = duplex(64);
    let (mut upstream, mut upstream_peer) = duplex(64);
    tokio::spawn(async move {
        let _ = upstream_peer.write_all(&[b'x'; 4096]).await;
        std::future::pending::<()>().await;
    });

    let config = RelayConfig {
        connect_timeout: Duration::from_secs(1),
        idle_timeout: Duration::from_millis(200),
        buffer_size: 16,
    };
    let mut session = RelaySession::new();
    session.advance(SessionState::Relaying);
    let reason = tokio::time::timeout(
        Duration::from_secs(3),
        pump(&mut client, &mut upstream, &mut session, &config),
    )
    .await?;

    assert_eq!(reason, Termination::IdleTimeout);
    assert_eq!(session.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test]
async fn upstream_reset_mid_stream_keeps_last_status() -> TestResult<()> {
    let (mut client, mut client_peer) = duplex(1024);
    let mut upstream = ResettingStream {
        chunks: VecDeque::from([&b"HTTP/1.1 200 OK\r\n"[..], &b"partial-body"[..]]),
    };

    let mut session = RelaySession::new();
    session.advance(SessionState::Relaying);
    let reason = pump(&mut client, &mut upstream, &mut session, &test_config()).await;
    drop(client);

    let mut received = Vec::new();
    client_peer.read_to_end(&mut received).await?;
    assert_eq!(reason, Termination::UpstreamError);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.status(), &Status::Code("200".into()));
    assert_eq!(received, b"HTTP/1.1 200 OK\r\npartial-body".to_vec());
    Ok(())
}

#[tokio::test]
async fn client_gone_while_upstream_sends_is_client_error() -> TestResult<()> {
    let mut client = BrokenPipeClient;
    let (mut upstream, mut upstream_peer) = duplex(64);
    upstream_peer.write_all(b"HTTP/1.1 200 OK\r\n\r\nstill sending").await?;

    let mut session = RelaySession::new();
    session.advance(SessionState::Relaying);
    let reason = pump(&mut client, &mut upstream, &mut session, &test_config()).await;

    assert_eq!(reason, Termination::ClientError);
    assert_eq!(session.termination(), Some(Termination::ClientError));
    assert_eq!(session.status(), &Status::Code("200".into()));
    Ok(())
}
