use http::StatusCode;
use thiserror::Error;

/// Errors that can occur in the proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ProxyError>;

/// Reasons the first chunk of a client connection could not be turned into an
/// upstream request. Every variant is answered with the same `400`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("request headers are not terminated within the first read")]
    IncompleteHeaders,

    #[error("method {0} is not supported")]
    UnsupportedMethod(String),

    #[error("malformed request line")]
    MalformedRequestLine,

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid absolute URI: {0}")]
    InvalidUri(String),

    #[error("no Host header in origin-form request")]
    MissingHost,

    #[error("invalid host: {0}")]
    InvalidHost(String),
}

impl ParseError {
    /// Short label used in log fields
    pub fn error_type(&self) -> &'static str {
        match self {
            ParseError::IncompleteHeaders => "incomplete_headers",
            ParseError::UnsupportedMethod(_) => "unsupported_method",
            ParseError::MalformedRequestLine => "malformed_request_line",
            ParseError::UnsupportedVersion(_) => "unsupported_version",
            ParseError::InvalidUri(_) => "invalid_uri",
            ParseError::MissingHost => "missing_host",
            ParseError::InvalidHost(_) => "invalid_host",
        }
    }
}

impl From<ParseError> for StatusCode {
    fn from(_: ParseError) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/// Failures while opening or priming the upstream connection
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connect to {target} timed out after {elapsed_ms}ms")]
    Timeout { target: String, elapsed_ms: u128 },

    #[error("failed to send request upstream: {0}")]
    Send(#[source] std::io::Error),
}

impl From<&UpstreamError> for StatusCode {
    fn from(_: &UpstreamError) -> StatusCode {
        StatusCode::BAD_GATEWAY
    }
}
