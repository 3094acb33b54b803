mod limits;
mod loader;
mod root;
mod telemetry;
mod timeout;
mod validator;

pub use limits::LimitsConfig;
pub use loader::{load_from_path, load_from_str};
pub use root::Config;
pub use telemetry::LoggingConfig;
pub use timeout::TimeoutConfig;
pub use validator::validate;
