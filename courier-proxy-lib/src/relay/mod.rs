//! Upstream connection and the full-duplex copy loop.

mod engine;
mod session;
mod status;

pub use engine::{connect_upstream, pump, run, RelayConfig};
pub(crate) use engine::shutdown_quietly;
pub use session::{RelaySession, SessionState, Termination};
pub use status::sniff_status;
