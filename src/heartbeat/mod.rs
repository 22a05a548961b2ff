//! Scheduled background work.

pub mod daemon;
pub mod tasks;

pub use daemon::HeartbeatDaemon;
