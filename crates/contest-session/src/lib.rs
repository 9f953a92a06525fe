//! # Contest Attempt Session
//!
//! Client-side controller for a timed, single-attempt, proctored coding
//! session.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Keep the student in fullscreen and count involuntary exits as strikes
//! - Intercept back-navigation behind a confirmation prompt
//! - Lock the editor when the contest window closes
//! - Finalize the attempt with the server at most once on the guarded path,
//!   then always navigate away
//! - Gate run/submit on the lock predicate and a bracket-balance check
//!
//! ## Integrity Rules
//!
//! | Rule | Description |
//! |------|-------------|
//! | Strike cap | The 3rd fullscreen loss forces finalization |
//! | Pre-committed guard | The finalize guard is set before a leave prompt is shown |
//! | Monotonic lock | A locked session never becomes active again |
//! | Local rejection | Locked or unbalanced run/submit never reaches the network |
//!
//! ## Module Structure
//!
//! ```text
//! contest-session/
//! ├── domain/          # Session record, phase machine, finalize guard, validator
//! ├── monitors/        # Deadline and integrity monitors
//! ├── events/          # Platform events in, snapshots out
//! ├── ports/           # Editor API (inbound) + gateway/platform/clock (outbound)
//! ├── application/     # Controller, run/submit pipeline, single-owner runtime
//! ├── config.rs        # SessionConfig
//! └── error.rs         # SessionError
//! ```

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod monitors;
pub mod ports;

// Re-exports
pub use application::{
    spawn_session, CallOutcome, CallResult, Completion, PendingCall, RunOutcome, RunSubmitPipeline,
    SessionController, SessionHandle, SessionRuntime,
};
pub use config::SessionConfig;
pub use domain::{
    check_brackets, check_source, BracketError, ContestAttemptSession, FinalizeCoordinator,
    FinalizeGuard, FinalizeOutcome, FinalizeReason, LockState, PhaseTrigger, SessionPhase,
    SourceSyntax, MAX_VIOLATIONS,
};
pub use error::{SessionError, SessionResult};
pub use events::{EditorCommand, LockReason, SessionEvent, SessionSnapshot};
pub use monitors::{DeadlineHandle, DeadlineMonitor, IntegrityAction, IntegrityMonitor};
pub use ports::{
    mock_window_start, Clock, ContestGateway, EditorSurfaceApi, ExamPlatform, GatewayCall,
    GatewayError, ManualClock, MockGateway, PlatformCall, PlatformError, RecordingPlatform,
    SystemClock,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
