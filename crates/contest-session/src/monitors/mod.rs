//! # Monitors
//!
//! - `deadline`: polls the clock and emits a single `TimedOut`
//! - `integrity`: decides what a fullscreen loss or back-press means

pub mod deadline;
pub mod integrity;

pub use deadline::{DeadlineHandle, DeadlineMonitor};
pub use integrity::{IntegrityAction, IntegrityMonitor};
