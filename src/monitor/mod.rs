// src/monitor/mod.rs — Monitoring pipeline and its driver

pub mod cycle;
pub mod retry;
pub mod scheduler;

pub use cycle::{CycleReport, ListingOutcome, MonitorCycle, Pacing, SessionSource, SlotSource};
pub use retry::RetryPolicy;
pub use scheduler::{run_forever, Schedule};
