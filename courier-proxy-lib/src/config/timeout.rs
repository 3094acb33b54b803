use serde::Deserialize;

/// Timeout configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Upstream connect timeout in milliseconds
    /// Default: 10000 (10 seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
    /// Idle relay timeout in milliseconds
    /// The relay is closed when neither side sends anything for this long.
    /// Keep it generous: long downloads stream through the same window.
    /// Default: 300000 (5 minutes)
    #[serde(default = "default_idle_timeout")]
    pub idle_ms: u64,
    /// Graceful shutdown timeout in seconds
    /// Default: 30
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            idle_ms: default_idle_timeout(),
            shutdown_secs: default_shutdown_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_idle_timeout() -> u64 {
    300_000
}

fn default_shutdown_timeout() -> u64 {
    30
}
