use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};

use super::limits::LimitsConfig;
use super::telemetry::LoggingConfig;
use super::timeout::TimeoutConfig;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address and port to listen on
    /// Example: "0.0.0.0:8888" or "127.0.0.1:3128"
    /// Default: "0.0.0.0:8888"
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Timeout configuration
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Buffer and connection limits
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            timeout: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8888))
}
