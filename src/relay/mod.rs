//! Coordinator relay between the orchestrator and page agents
//!
//! The relay runs inside a host that may be suspended or restarted whenever it is
//! idle. Request handlers therefore answer from the request itself plus the shared
//! store; the only thing the host keeps between calls is its table of open ports,
//! and that table vanishes on suspension.

mod channel;
mod error;
mod host;
pub mod keepalive;

pub use channel::{Origin, RelayMessage, SupervisorChannel, Visibility};
pub use error::RelayError;
pub use host::{HostStats, RelayHost};
pub use keepalive::{KeepAlive, KeepAliveStats, KEEP_ALIVE_CHANNEL};
