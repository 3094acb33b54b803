/// Extract the status token from the first line of a response chunk.
///
/// Returns `None` unless the line looks like `HTTP/x.y CODE [reason]` with a
/// three digit code. The chunk does not need to contain the whole header block.
pub fn sniff_status(chunk: &[u8]) -> Option<String> {
    let line_end = chunk
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(chunk.len());
    let line = String::from_utf8_lossy(&chunk[..line_end]);
    let mut parts = line.split_whitespace();
    let version = parts.next()?;
    let code = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(code.to_string())
}
