//! Session phase machine
//!
//! ```text
//! [LOADING] ──loaded──→ [AWAITING_FULLSCREEN] ──fullscreen acquired──→ [ACTIVE]
//!     │                        ↑        ↑                                 │
//!     │ already closed         │        └──── leave declined              │ violation < cap
//!     │                        │                                          ↓
//!     │                        └──────── re-request fullscreen ──── [WARNING(n)]
//!     │
//!     │      any ──force finalize / finish / leave confirmed──→ [FINALIZING]
//!     │                                                              │
//!     │                                              navigation signalled
//!     ↓                                                              ↓
//! [LOCKED] ←─────────────────────────────────────────────────────────┘
//!     ↑
//!     └── timed out (from LOADING, AWAITING_FULLSCREEN, ACTIVE, WARNING)
//! ```
//!
//! `Locked` is absorbing.

use serde::{Deserialize, Serialize};

/// Controller phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Contest and question metadata being fetched.
    #[default]
    Loading,
    /// Waiting for the student to (re-)enter fullscreen.
    AwaitingFullscreen,
    /// In fullscreen, editing allowed.
    Active,
    /// Fullscreen lost; `n` strikes recorded so far.
    Warning(u8),
    /// Finalize decided; waiting for the coordinator to navigate away.
    Finalizing,
    /// Terminal.
    Locked,
}

/// Inputs that move the phase machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseTrigger {
    /// Initial fetch resolved. `closed` if already finalized or past the deadline.
    Loaded { closed: bool },
    FullscreenAcquired,
    /// Student asked to re-enter fullscreen from a warning.
    FullscreenRequested,
    /// A fullscreen loss below the cap, carrying the new strike count.
    Violation(u8),
    LeaveDeclined,
    FinalizeStarted,
    FinalizeCompleted,
    TimedOut,
    /// The server reported the attempt closed mid-session.
    ServerClosed,
}

impl SessionPhase {
    /// Pure transition function. Unknown pairs leave the phase unchanged.
    pub fn next(self, trigger: PhaseTrigger) -> SessionPhase {
        use SessionPhase as P;
        use PhaseTrigger as T;

        match (self, trigger) {
            (P::Locked, _) => P::Locked,

            (P::Loading, T::Loaded { closed: true }) => P::Locked,
            (P::Loading, T::Loaded { closed: false }) => P::AwaitingFullscreen,

            (P::AwaitingFullscreen | P::Warning(_), T::FullscreenAcquired) => P::Active,
            (P::Warning(_), T::FullscreenRequested) => P::AwaitingFullscreen,

            (P::AwaitingFullscreen | P::Active | P::Warning(_), T::Violation(n)) => P::Warning(n),
            (P::AwaitingFullscreen | P::Active | P::Warning(_), T::LeaveDeclined) => {
                P::AwaitingFullscreen
            }

            (P::Loading | P::AwaitingFullscreen | P::Active | P::Warning(_), T::FinalizeStarted) => {
                P::Finalizing
            }
            (P::Finalizing, T::FinalizeCompleted) => P::Locked,

            (P::Loading | P::AwaitingFullscreen | P::Active | P::Warning(_), T::TimedOut) => {
                P::Locked
            }

            (_, T::ServerClosed) => P::Locked,

            (phase, _) => phase,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, SessionPhase::Locked)
    }

    /// Run/submit must be refused in these phases regardless of flags.
    pub fn blocks_submissions(&self) -> bool {
        matches!(self, SessionPhase::Finalizing | SessionPhase::Locked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Loading => "loading",
            SessionPhase::AwaitingFullscreen => "awaiting_fullscreen",
            SessionPhase::Active => "active",
            SessionPhase::Warning(_) => "warning",
            SessionPhase::Finalizing => "finalizing",
            SessionPhase::Locked => "locked",
        }
    }
}
