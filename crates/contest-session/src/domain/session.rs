//! # Attempt Session Record
//!
//! One record per contest + question + student, held in memory only. The
//! server stays the source of truth for `finalized`; a reload re-fetches it.

use chrono::{DateTime, Utc};
use contest_types::{ContestId, ContestMetadata, QuestionId};
use serde::{Deserialize, Serialize};

use super::finalize::FinalizeGuard;

/// Fullscreen losses tolerated before the attempt is force-finalized.
pub const MAX_VIOLATIONS: u8 = 3;

/// Lock predicate consumed by the run/submit pipeline and the editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    Active,
    Locked,
}

impl LockState {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockState::Locked)
    }
}

/// In-memory attempt state.
///
/// The attempt facts are monotonic: `finalized` and `timed_out` only go
/// false→true and `violation_count` only grows.
#[derive(Clone, Debug)]
pub struct ContestAttemptSession {
    contest_id: ContestId,
    question_id: QuestionId,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    allowed_languages: Vec<String>,
    finalized: bool,
    timed_out: bool,
    violation_count: u8,
    guard: FinalizeGuard,
    /// A declined leave dialog's fullscreen exit has not been seen yet.
    dialog_exit_expected: bool,
}

impl ContestAttemptSession {
    /// Build the record from freshly fetched contest metadata.
    pub fn new(contest_id: ContestId, question_id: QuestionId, contest: &ContestMetadata) -> Self {
        Self {
            contest_id,
            question_id,
            start_time: contest.start_time,
            end_time: contest.end_time,
            allowed_languages: contest.allowed_languages.clone(),
            finalized: contest.finalized,
            timed_out: false,
            violation_count: 0,
            guard: FinalizeGuard::Idle,
            dialog_exit_expected: false,
        }
    }

    pub fn contest_id(&self) -> &ContestId {
        &self.contest_id
    }

    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn violation_count(&self) -> u8 {
        self.violation_count
    }

    pub fn guard(&self) -> FinalizeGuard {
        self.guard
    }

    /// Set between a declined leave dialog and the next fullscreen entry.
    pub fn dialog_exit_expected(&self) -> bool {
        self.dialog_exit_expected
    }

    /// True from the moment a finalize decision is made until it completes.
    pub fn finalization_in_flight(&self) -> bool {
        self.guard.in_flight()
    }

    /// Whether `language` is offered. An empty list allows everything.
    pub fn allows_language(&self, language: &str) -> bool {
        self.allowed_languages.is_empty()
            || self
                .allowed_languages
                .iter()
                .any(|l| l.eq_ignore_ascii_case(language))
    }

    /// `Locked` iff finalized or timed out.
    pub fn lock_state(&self) -> LockState {
        if self.finalized || self.timed_out {
            LockState::Locked
        } else {
            LockState::Active
        }
    }

    /// Time left in the scoring window, zero once it has closed.
    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.end_time - now).max(chrono::Duration::zero())
    }

    pub(crate) fn mark_finalized(&mut self) {
        self.finalized = true;
    }

    /// Returns `true` only on the first call.
    pub(crate) fn mark_timed_out(&mut self) -> bool {
        let first = !self.timed_out;
        self.timed_out = true;
        first
    }

    /// Count one fullscreen loss and return the new total.
    pub(crate) fn record_violation(&mut self) -> u8 {
        self.violation_count = self.violation_count.saturating_add(1);
        self.violation_count
    }

    pub(crate) fn set_guard(&mut self, guard: FinalizeGuard) {
        self.guard = guard;
    }

    pub(crate) fn expect_dialog_exit(&mut self) {
        self.dialog_exit_expected = true;
    }

    /// Returns whether an exit was expected.
    pub(crate) fn clear_dialog_exit(&mut self) -> bool {
        std::mem::take(&mut self.dialog_exit_expected)
    }

    /// Mirror a later metadata fetch. `finalized` never goes back to false.
    pub(crate) fn refresh(&mut self, contest: &ContestMetadata) {
        self.start_time = contest.start_time;
        self.end_time = contest.end_time;
        self.allowed_languages = contest.allowed_languages.clone();
        if contest.finalized {
            self.finalized = true;
        }
    }
}
