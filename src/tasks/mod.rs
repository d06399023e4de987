//! The three cooperating tasks. Each exposes a single `tick`/`step` for tests and a
//! never-returning `run` loop for the firmware executors.

pub mod control;
pub mod drone_comm;
pub mod rc_comm;

pub use control::{ControlTask, TickOutcome};
pub use drone_comm::DroneCommTask;
pub use rc_comm::RcCommTask;

/// Counters kept by the communication tasks
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommStats {
    pub received: u32,
    pub forwarded: u32,
    pub dropped: u32,
    pub errors: u32,
}
