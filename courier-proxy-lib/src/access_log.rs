use std::fmt;
use std::net::IpAddr;

use tracing::info;

/// Status reported for a proxied request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    /// Upstream closed before a readable status line arrived
    #[default]
    Unknown,
    /// Status token sniffed from the first response chunk
    Code(String),
    /// The proxy failed before or while reaching the upstream
    Error,
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Unknown => "unknown",
            Status::Code(code) => code,
            Status::Error => "ERR",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record per connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub url: String,
    pub status: Status,
    pub client_ip: IpAddr,
}

impl LogRecord {
    /// Placeholder url for connections that never produced a request
    pub const NO_URL: &'static str = "-";

    pub fn new(url: impl Into<String>, status: Status, client_ip: IpAddr) -> Self {
        Self { url: url.into(), status, client_ip }
    }

    /// Record for a connection that failed before a request could be attributed
    pub fn failed(client_ip: IpAddr) -> Self {
        Self::new(Self::NO_URL, Status::Error, client_ip)
    }

    pub fn emit(&self) {
        info!(
            target: "access",
            client_ip = %self.client_ip,
            url = %self.url,
            status = %self.status,
            "{}",
            self
        );
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.client_ip, self.url, self.status)
    }
}
