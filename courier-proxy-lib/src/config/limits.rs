use serde::Deserialize;

/// Buffer and connection limits
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Receive buffer size in bytes, per direction
    /// The request line and all headers must fit in the first read of this size.
    /// Default: 4096
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Maximum concurrent client connections
    /// Connections above the limit are closed immediately.
    /// Default: 1024
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { buffer_size: default_buffer_size(), max_connections: default_max_connections() }
    }
}

fn default_buffer_size() -> usize {
    4096
}

fn default_max_connections() -> usize {
    1024
}
