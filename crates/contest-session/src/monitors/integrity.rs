//! Integrity monitor
//!
//! Turns fullscreen losses and back-presses into actions for the controller.
//! It counts strikes on the session record but never talks to the platform;
//! the controller performs whatever the returned action asks for.

use contest_telemetry::metrics::{LEAVE_CONFIRMATIONS, VIOLATIONS_RECORDED};
use tracing::{debug, info, warn};

use crate::domain::{ContestAttemptSession, FinalizeGuard, FinalizeReason};

/// What the controller should do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegrityAction {
    /// Nothing to do.
    Ignored,
    /// Strike recorded below the cap: prompt to re-enter fullscreen.
    Warn { violations: u8, remaining: u8 },
    /// Finalize now.
    ForceFinalize(FinalizeReason),
    /// Arm the guard and ask the student to confirm leaving.
    ConfirmLeave,
    /// Attempt already closed: let the navigation through.
    AllowLeave,
    /// Student stayed: release the guard, re-push history, prompt fullscreen.
    LeaveDeclined { violations: u8, remaining: u8 },
}

/// Strike counting and back-navigation policy.
#[derive(Clone, Copy, Debug)]
pub struct IntegrityMonitor {
    max_violations: u8,
}

impl IntegrityMonitor {
    pub fn new(max_violations: u8) -> Self {
        Self { max_violations }
    }

    pub fn max_violations(&self) -> u8 {
        self.max_violations
    }

    fn remaining(&self, violations: u8) -> u8 {
        self.max_violations.saturating_sub(violations)
    }

    /// The document entered fullscreen.
    pub fn on_fullscreen_entered(&self, session: &mut ContestAttemptSession) {
        session.clear_dialog_exit();
    }

    /// The document left fullscreen.
    ///
    /// Not counted once the session is locked or while a finalize is armed or
    /// under way, so a pending leave prompt or our own exit never costs a
    /// strike. The exit a declined leave dialog causes may arrive after the
    /// answer; it is absorbed once, or until fullscreen is entered again.
    pub fn on_fullscreen_lost(&self, session: &mut ContestAttemptSession) -> IntegrityAction {
        if session.lock_state().is_locked() || session.guard() != FinalizeGuard::Idle {
            debug!(
                contest_id = %session.contest_id(),
                guard = ?session.guard(),
                "Fullscreen exit not counted"
            );
            return IntegrityAction::Ignored;
        }
        if session.clear_dialog_exit() {
            debug!(
                contest_id = %session.contest_id(),
                "Fullscreen exit from declined leave dialog not counted"
            );
            return IntegrityAction::Ignored;
        }

        let violations = session.record_violation();
        VIOLATIONS_RECORDED.inc();

        if violations >= self.max_violations {
            warn!(
                contest_id = %session.contest_id(),
                violations,
                "Violation cap reached, forcing finalize"
            );
            IntegrityAction::ForceFinalize(FinalizeReason::StrikesExhausted)
        } else {
            info!(
                contest_id = %session.contest_id(),
                violations,
                max = self.max_violations,
                "Fullscreen exit recorded"
            );
            IntegrityAction::Warn {
                violations,
                remaining: self.remaining(violations),
            }
        }
    }

    /// The history guard caught a back-navigation.
    pub fn on_back_pressed(&self, session: &ContestAttemptSession) -> IntegrityAction {
        if session.is_finalized() {
            return IntegrityAction::AllowLeave;
        }
        if session.guard() != FinalizeGuard::Idle {
            debug!(contest_id = %session.contest_id(), "Leave prompt already pending");
            return IntegrityAction::Ignored;
        }
        IntegrityAction::ConfirmLeave
    }

    /// The student answered the leave confirmation.
    pub fn on_leave_answer(
        &self,
        session: &mut ContestAttemptSession,
        confirmed: bool,
    ) -> IntegrityAction {
        if session.guard() != FinalizeGuard::Armed {
            debug!(contest_id = %session.contest_id(), "Stale leave answer ignored");
            return IntegrityAction::Ignored;
        }

        if confirmed {
            LEAVE_CONFIRMATIONS.with_label_values(&["confirmed"]).inc();
            info!(contest_id = %session.contest_id(), "Student confirmed leaving");
            IntegrityAction::ForceFinalize(FinalizeReason::LeaveConfirmed)
        } else {
            LEAVE_CONFIRMATIONS.with_label_values(&["declined"]).inc();
            session.expect_dialog_exit();
            let violations = session.violation_count();
            IntegrityAction::LeaveDeclined {
                violations,
                remaining: self.remaining(violations),
            }
        }
    }
}

impl Default for IntegrityMonitor {
    fn default() -> Self {
        Self::new(crate::domain::MAX_VIOLATIONS)
    }
}
