//! # Domain Module
//!
//! Core types for the attempt session: the session record, its phase
//! machine, the finalize guard and coordinator, and the source validator.

pub mod finalize;
pub mod phase;
pub mod session;
pub mod validator;

pub use finalize::{FinalizeCoordinator, FinalizeGuard, FinalizeOutcome, FinalizeReason};
pub use phase::{PhaseTrigger, SessionPhase};
pub use session::{ContestAttemptSession, LockState, MAX_VIOLATIONS};
pub use validator::{check_brackets, check_source, BracketError, SourceSyntax};
