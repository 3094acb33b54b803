use http::StatusCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Status-line-only response generated by the proxy itself
pub fn synthetic_response(status: StatusCode) -> Vec<u8> {
    format!(
        "HTTP/1.1 {} {}\r\n\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
    .into_bytes()
}

/// Best-effort write of a synthetic response. The client may already be gone,
/// so failures are returned for logging only.
pub async fn write_synthetic<W>(client: &mut W, status: StatusCode) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    client.write_all(&synthetic_response(status)).await?;
    client.flush().await
}
