#![forbid(unsafe_code)]

pub mod access_log;
pub mod config;
pub mod error;
pub mod relay;
pub mod request;
pub mod response;
pub mod server;
pub mod telemetry;

pub use access_log::{LogRecord, Status};
pub use config::{load_from_path, Config, LimitsConfig, LoggingConfig, TimeoutConfig};
pub use error::{ParseError, ProxyError, Result, UpstreamError};
pub use relay::{RelayConfig, RelaySession, SessionState, Termination};
pub use request::{parse, HeaderList, ParsedRequest};
pub use server::{run, serve};
