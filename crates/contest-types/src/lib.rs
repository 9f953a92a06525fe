//! # Contest Types Crate
//!
//! Data shared between the attempt session and the contest gateway.
//!
//! ## Design Principles
//!
//! - **Server is the source of truth**: metadata types mirror what the
//!   contest endpoints return; nothing here is persisted client-side.
//! - **Opaque identifiers**: contest and question ids are newtypes over the
//!   server's string ids so they cannot be swapped by accident.

pub mod entities;
pub mod submission;

pub use entities::*;
pub use submission::*;
