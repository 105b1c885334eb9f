//! Sampling scheduler and cycle runner for the contest monitor.
//!
//! This crate provides:
//! - Wall-clock policy functions: the 5-minute cycle boundary and the
//!   daily starting-balance reset window
//! - The per-account cycle runner: connect, sample, compute, disconnect
//! - The scheduler: a single-flight infinite loop aligned to wall-clock
//!   boundaries, self-healing against cycle failures

pub mod clock;
pub mod cycle;
pub mod scheduler;

pub use clock::{in_reset_window, next_cycle_delay};
pub use cycle::CycleRunner;
pub use scheduler::CycleScheduler;
