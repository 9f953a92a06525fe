//! Session events
//!
//! Incoming: platform events and editor commands consumed by the session
//! owner. Outgoing: snapshots published to read-only observers.

pub mod incoming;
pub mod outgoing;

pub use incoming::{EditorCommand, SessionEvent};
pub use outgoing::{LockReason, SessionSnapshot};
