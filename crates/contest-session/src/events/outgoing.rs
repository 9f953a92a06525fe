//! Snapshots published to observers.

use serde::{Deserialize, Serialize};

use crate::domain::{LockState, SessionPhase};

/// Why the editor was told the session is locked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockReason {
    /// The attempt is closed server-side.
    Finalized,
    /// The contest window closed.
    TimedOut,
}

/// Read-only view of the session for the editor and the violations badge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub lock_state: LockState,
    pub violations: u8,
    pub max_violations: u8,
    pub finalized: bool,
    pub timed_out: bool,
}

impl SessionSnapshot {
    /// Snapshot for a session still fetching its metadata.
    pub fn loading(max_violations: u8) -> Self {
        Self {
            phase: SessionPhase::Loading,
            lock_state: LockState::Locked,
            violations: 0,
            max_violations,
            finalized: false,
            timed_out: false,
        }
    }

    /// Strikes left before a forced finalize.
    pub fn remaining_warnings(&self) -> u8 {
        self.max_violations.saturating_sub(self.violations)
    }
}
