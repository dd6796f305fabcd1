// src/lib.rs — Library root for slotwatch

pub mod cli;
pub mod detect;
pub mod infra;
pub mod monitor;
pub mod notify;
pub mod session;
pub mod slots;
pub mod util;
