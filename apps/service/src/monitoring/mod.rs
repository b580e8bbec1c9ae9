pub mod checker;
/// Monitoring engine module - turns probe results into stable status
///
/// This module is responsible for:
/// - Executing heartbeat/TCP/HTTP/relay probes
/// - Recording passive heartbeats
/// - Accumulating per-target uptime
/// - Driving the poll tick and change notification
pub mod executor;
pub mod heartbeat;
pub mod scheduler;
pub mod types;
pub mod uptime;
pub mod validation;

pub use executor::ProbeExecutor;
pub use scheduler::Scheduler;
