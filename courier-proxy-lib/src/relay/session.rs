use std::net::IpAddr;

use tracing::trace;

use super::status::sniff_status;
use crate::access_log::{LogRecord, Status};

/// Lifecycle of a relay. Transitions only move forward and `Closed` can be
/// reached from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Connecting,
    SendingRequest,
    Relaying,
    Closed,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ConnectFailed,
    SendFailed,
    ClientClosed,
    UpstreamClosed,
    ClientError,
    UpstreamError,
    IdleTimeout,
}

impl Termination {
    pub fn as_str(self) -> &'static str {
        match self {
            Termination::ConnectFailed => "connect_failed",
            Termination::SendFailed => "send_failed",
            Termination::ClientClosed => "client_closed",
            Termination::UpstreamClosed => "upstream_closed",
            Termination::ClientError => "client_error",
            Termination::UpstreamError => "upstream_error",
            Termination::IdleTimeout => "idle_timeout",
        }
    }
}

/// Per-connection relay state, owned by a single task
#[derive(Debug)]
pub struct RelaySession {
    state: SessionState,
    status: Status,
    headers_sniffed: bool,
    bytes_to_upstream: u64,
    bytes_to_client: u64,
    termination: Option<Termination>,
}

impl Default for RelaySession {
    fn default() -> Self {
        Self::new()
    }
}

impl RelaySession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Connecting,
            status: Status::Unknown,
            headers_sniffed: false,
            bytes_to_upstream: 0,
            bytes_to_client: 0,
            termination: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn bytes_to_upstream(&self) -> u64 {
        self.bytes_to_upstream
    }

    pub fn bytes_to_client(&self) -> u64 {
        self.bytes_to_client
    }

    /// Move to `next`. Returns false, leaving the state untouched, if that
    /// would go backwards or stay in place.
    pub fn advance(&mut self, next: SessionState) -> bool {
        if next <= self.state {
            return false;
        }
        trace!(from = ?self.state, to = ?next, "relay state transition");
        self.state = next;
        true
    }

    /// Close the session. The first reason wins; later calls are no-ops that
    /// return false.
    pub fn close(&mut self, reason: Termination) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        self.state = SessionState::Closed;
        self.termination = Some(reason);
        if matches!(reason, Termination::ConnectFailed | Termination::SendFailed) {
            self.status = Status::Error;
        }
        true
    }

    /// Account for a chunk read from the upstream. Only the first chunk is
    /// inspected for a status line.
    pub fn observe_response(&mut self, chunk: &[u8]) {
        self.bytes_to_client = self.bytes_to_client.saturating_add(chunk.len() as u64);
        if self.headers_sniffed {
            return;
        }
        self.headers_sniffed = true;
        if let Some(code) = sniff_status(chunk) {
            self.status = Status::Code(code);
        }
    }

    pub fn observe_request(&mut self, len: usize) {
        self.bytes_to_upstream = self.bytes_to_upstream.saturating_add(len as u64);
    }

    pub fn to_log_record(&self, url: &str, client_ip: IpAddr) -> LogRecord {
        LogRecord::new(url, self.status.clone(), client_ip)
    }
}
