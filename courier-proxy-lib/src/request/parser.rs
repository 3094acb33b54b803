use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use http::Uri;

use super::headers::HeaderList;
use crate::error::ParseError;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const OUTBOUND_VERSION: &str = "HTTP/1.1";
const HOP_BY_HOP: [&str; 2] = ["proxy-connection", "connection"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    fn from_target(target: &str) -> Option<Self> {
        let has_prefix = |prefix: &str| {
            target
                .get(..prefix.len())
                .is_some_and(|p| p.eq_ignore_ascii_case(prefix))
        };
        if has_prefix("http://") {
            Some(Scheme::Http)
        } else if has_prefix("https://") {
            Some(Scheme::Https)
        } else {
            None
        }
    }
}

/// The normalised form of a client request.
///
/// Built once from the first chunk of a connection and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    method: String,
    path: String,
    host: String,
    port: u16,
    scheme: Scheme,
    headers: HeaderList,
    url: String,
    outbound: Bytes,
}

impl ParsedRequest {
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Origin-form target sent upstream (path plus query)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Upstream host, without IPv6 brackets
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Headers as forwarded upstream
    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    /// URL reported in the access log
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Rebuilt request line, headers and any body bytes from the first read
    pub fn outbound(&self) -> &Bytes {
        &self.outbound
    }

    /// `host:port`, bracketing IPv6 literals
    pub fn upstream_addr(&self) -> String {
        format!("{}:{}", bracket(&self.host), self.port)
    }
}

impl fmt::Display for ParsedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Parse the first chunk read from a client.
///
/// The request line and the full header block must be contained in `raw`;
/// bytes after the blank line are treated as the start of the body and are
/// appended to the outbound request untouched.
pub fn parse(raw: &[u8]) -> Result<ParsedRequest, ParseError> {
    let head_end = find_header_end(raw).ok_or(ParseError::IncompleteHeaders)?;
    let head = &raw[..head_end];
    let body = &raw[head_end.saturating_add(HEADER_TERMINATOR.len())..];

    let mut lines = head
        .split(|b| *b == b'\n')
        .map(|l| l.strip_suffix(b"\r").unwrap_or(l));
    let request_line = lines.next().ok_or(ParseError::MalformedRequestLine)?;
    let (method, target) = parse_request_line(request_line)?;

    let mut headers = HeaderList::from_lines(lines);

    let (scheme, host, port, path, url) = match Scheme::from_target(target) {
        Some(scheme) => {
            let (host, port, path) = split_absolute(target, scheme)?;
            (scheme, host, port, path, target.to_string())
        }
        None => {
            let host_value = headers.get("host").ok_or(ParseError::MissingHost)?;
            let host_value = std::str::from_utf8(host_value)
                .map_err(|_| ParseError::InvalidHost(String::from_utf8_lossy(host_value).into()))?;
            let (host, port) = split_authority(host_value)?;
            let port = port.unwrap_or(Scheme::Http.default_port());
            let url = format!("http://{}{}", authority(&host, port, Scheme::Http), target);
            (Scheme::Http, host, port, target.to_string(), url)
        }
    };

    for name in HOP_BY_HOP {
        headers.remove_all(name);
    }
    headers.set_single("Host", authority(&host, port, scheme));

    let mut out = BytesMut::with_capacity(raw.len().saturating_add(32));
    out.put_slice(method.as_bytes());
    out.put_u8(b' ');
    out.put_slice(path.as_bytes());
    out.put_u8(b' ');
    out.put_slice(OUTBOUND_VERSION.as_bytes());
    out.put_slice(b"\r\n");
    headers.write_to(&mut out);
    out.put_slice(b"\r\n");
    out.put_slice(body);

    Ok(ParsedRequest {
        method: method.to_string(),
        path,
        host,
        port,
        scheme,
        headers,
        url,
        outbound: out.freeze(),
    })
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

/// `METHOD SP target SP HTTP/1.0|HTTP/1.1`
fn parse_request_line(line: &[u8]) -> Result<(&str, &str), ParseError> {
    let line = std::str::from_utf8(line)
        .map_err(|_| ParseError::MalformedRequestLine)?
        .trim();
    if line.starts_with("CONNECT ") {
        return Err(ParseError::UnsupportedMethod("CONNECT".into()));
    }

    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::MalformedRequestLine);
    };

    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(ParseError::MalformedRequestLine);
    }
    if method == "CONNECT" {
        return Err(ParseError::UnsupportedMethod(method.into()));
    }
    if target.is_empty() || target.bytes().any(|b| b.is_ascii_whitespace()) {
        return Err(ParseError::MalformedRequestLine);
    }
    match version {
        "HTTP/1.0" | "HTTP/1.1" => Ok((method, target)),
        v if v.starts_with("HTTP/") => Err(ParseError::UnsupportedVersion(v.into())),
        _ => Err(ParseError::MalformedRequestLine),
    }
}

fn split_absolute(target: &str, scheme: Scheme) -> Result<(String, u16, String), ParseError> {
    let uri: Uri = target
        .parse()
        .map_err(|_| ParseError::InvalidUri(target.into()))?;
    let host = uri
        .host()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ParseError::InvalidUri(target.into()))?;
    let port = match uri.port_u16() {
        Some(0) => return Err(ParseError::InvalidUri(target.into())),
        Some(p) => p,
        None => scheme.default_port(),
    };

    let mut path = match uri.path() {
        "" => "/".to_string(),
        p => p.to_string(),
    };
    if let Some(query) = uri.query() {
        path.push('?');
        path.push_str(query);
    }
    Ok((host.to_string(), port, path))
}

/// Split a `Host` header value into host and optional port.
///
/// An empty port (`host:`) is treated as absent.
fn split_authority(value: &str) -> Result<(String, Option<u16>), ParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ParseError::MissingHost);
    }
    let invalid = || ParseError::InvalidHost(value.to_string());

    let (host, port) = if let Some(rest) = value.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(invalid)?;
        match after {
            "" => (host, None),
            p => (host, Some(p.strip_prefix(':').ok_or_else(invalid)?)),
        }
    } else {
        match value.rsplit_once(':') {
            Some((h, _)) if h.contains(':') => return Err(invalid()),
            Some((h, p)) => (h, Some(p)),
            None => (value, None),
        }
    };

    if host.is_empty()
        || host
            .bytes()
            .any(|b| b.is_ascii_whitespace() || matches!(b, b'/' | b'@' | b'?' | b'#'))
    {
        return Err(invalid());
    }
    let port = match port {
        Some("") | None => None,
        Some(p) => match p.parse::<u16>() {
            Ok(0) | Err(_) => return Err(invalid()),
            Ok(p) => Some(p),
        },
    };
    Ok((host.to_string(), port))
}

fn bracket(host: &str) -> String {
    if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

/// Host header value: the port is omitted when it is the scheme default
fn authority(host: &str, port: u16, scheme: Scheme) -> String {
    if port == scheme.default_port() {
        bracket(host)
    } else {
        format!("{}:{port}", bracket(host))
    }
}
