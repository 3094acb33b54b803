use super::root::Config;
use crate::error::{ProxyError, Result};

const MIN_BUFFER_SIZE: usize = 256;
const MAX_BUFFER_SIZE: usize = 1 << 20;

pub fn validate(config: &Config) -> Result<()> {
    if config.timeout.connect_ms == 0 {
        return Err(ProxyError::Config("timeout.connect_ms must be > 0".into()));
    }
    if config.timeout.idle_ms == 0 {
        return Err(ProxyError::Config("timeout.idle_ms must be > 0".into()));
    }
    if config.limits.max_connections == 0 {
        return Err(ProxyError::Config("limits.max_connections must be > 0".into()));
    }
    let size = config.limits.buffer_size;
    if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&size) {
        return Err(ProxyError::Config(format!(
            "limits.buffer_size must be between {MIN_BUFFER_SIZE} and {MAX_BUFFER_SIZE}, got {size}"
        )));
    }
    Ok(())
}
