//! Finalize coordination
//!
//! The coordinator is the only code that moves a session to finalized. The
//! guard it keeps on the session record makes the guarded path at-most-once:
//!
//! ```text
//! [IDLE] ──arm (leave prompt)──→ [ARMED] ──declined──→ [IDLE]
//!    │                              │
//!    └────────── request ───────────┴──→ [DISPATCHED] ──response──→ [COMPLETED]
//! ```
//!
//! Once `DISPATCHED`, further requests are no-ops. Teardown uses a separate
//! fire-and-forget path that never touches the guard.

use contest_telemetry::metrics::{
    HistogramTimer, FINALIZE_BEACONS, FINALIZE_DISPATCHES, GATEWAY_LATENCY,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::session::ContestAttemptSession;
use crate::ports::outbound::{ContestGateway, ExamPlatform, GatewayError};

/// Finalize guard stored on the session record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizeGuard {
    #[default]
    Idle,
    /// Pre-committed while a leave confirmation is pending.
    Armed,
    /// Finalize request sent, response outstanding.
    Dispatched,
    /// Finalize request answered (successfully or not).
    Completed,
}

impl FinalizeGuard {
    /// `finalizationInFlight`: set from decision until completion.
    pub fn in_flight(&self) -> bool {
        matches!(self, FinalizeGuard::Armed | FinalizeGuard::Dispatched)
    }

    /// Whether the guarded finalize request has already gone out.
    pub fn has_dispatched(&self) -> bool {
        matches!(self, FinalizeGuard::Dispatched | FinalizeGuard::Completed)
    }
}

/// Why the attempt is being finalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizeReason {
    /// Fullscreen strike cap reached.
    StrikesExhausted,
    /// Student confirmed leaving via back-navigation.
    LeaveConfirmed,
    /// Student pressed finish.
    ExplicitFinish,
}

impl FinalizeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalizeReason::StrikesExhausted => "strikes_exhausted",
            FinalizeReason::LeaveConfirmed => "leave_confirmed",
            FinalizeReason::ExplicitFinish => "explicit_finish",
        }
    }
}

/// Result of a guarded finalize request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// A finalize request was already dispatched; nothing sent.
    Skipped,
    /// Server acknowledged.
    Acknowledged,
    /// Server reported the attempt was already closed.
    AlreadyClosed,
    /// Request failed. Navigation happened anyway; no retry.
    Failed(String),
}

impl FinalizeOutcome {
    /// Whether this call actually sent a request.
    pub fn was_dispatched(&self) -> bool {
        !matches!(self, FinalizeOutcome::Skipped)
    }

    fn label(&self) -> &'static str {
        match self {
            FinalizeOutcome::Skipped => "skipped",
            FinalizeOutcome::Acknowledged => "ok",
            FinalizeOutcome::AlreadyClosed => "already_finalized",
            FinalizeOutcome::Failed(_) => "failed",
        }
    }
}

/// Coordinates finalize notification and the post-finalize exit.
pub struct FinalizeCoordinator<G, P>
where
    G: ContestGateway,
    P: ExamPlatform,
{
    gateway: Arc<G>,
    platform: Arc<P>,
}

impl<G, P> FinalizeCoordinator<G, P>
where
    G: ContestGateway,
    P: ExamPlatform,
{
    pub fn new(gateway: Arc<G>, platform: Arc<P>) -> Self {
        Self { gateway, platform }
    }

    /// Pre-commit the guard before a confirmation prompt is shown.
    ///
    /// Returns `false` if a finalize is already armed or under way.
    pub fn arm(&self, session: &mut ContestAttemptSession) -> bool {
        if session.guard() != FinalizeGuard::Idle {
            return false;
        }
        session.set_guard(FinalizeGuard::Armed);
        true
    }

    /// Release a pre-committed guard after the student declined.
    pub fn disarm(&self, session: &mut ContestAttemptSession) {
        if session.guard() == FinalizeGuard::Armed {
            session.set_guard(FinalizeGuard::Idle);
        }
    }

    /// Claim the guard and leave fullscreen (errors ignored).
    ///
    /// Returns `false` without side effects if a finalize already went out.
    /// Otherwise the caller must send the gateway request and hand its
    /// answer to [`complete`](Self::complete).
    pub fn begin(&self, session: &mut ContestAttemptSession, reason: FinalizeReason) -> bool {
        if session.guard().has_dispatched() {
            debug!(
                contest_id = %session.contest_id(),
                reason = reason.as_str(),
                "Finalize already dispatched, ignoring request"
            );
            return false;
        }
        session.set_guard(FinalizeGuard::Dispatched);

        info!(
            contest_id = %session.contest_id(),
            reason = reason.as_str(),
            violations = session.violation_count(),
            "Finalizing contest attempt"
        );

        if let Err(e) = self.platform.exit_fullscreen() {
            debug!(error = %e, "Fullscreen exit failed during finalize");
        }
        true
    }

    /// Record the gateway's answer, then signal navigation whatever it was.
    pub fn complete(
        &self,
        session: &mut ContestAttemptSession,
        reason: FinalizeReason,
        result: Result<(), GatewayError>,
    ) -> FinalizeOutcome {
        let outcome = match result {
            Ok(()) => {
                session.mark_finalized();
                FinalizeOutcome::Acknowledged
            }
            Err(GatewayError::AlreadyFinalized) => {
                session.mark_finalized();
                FinalizeOutcome::AlreadyClosed
            }
            Err(e) => {
                warn!(
                    contest_id = %session.contest_id(),
                    reason = reason.as_str(),
                    error = %e,
                    "Finalize request failed; leaving session anyway"
                );
                FinalizeOutcome::Failed(e.to_string())
            }
        };
        session.set_guard(FinalizeGuard::Completed);
        FINALIZE_DISPATCHES.with_label_values(&[outcome.label()]).inc();

        self.platform.navigate_away();
        outcome
    }

    /// Finalize the attempt and leave the session view, awaiting the
    /// gateway in place.
    pub async fn request_finalize(
        &self,
        session: &mut ContestAttemptSession,
        reason: FinalizeReason,
    ) -> FinalizeOutcome {
        if !self.begin(session, reason) {
            return FinalizeOutcome::Skipped;
        }
        let result = {
            let _timer = HistogramTimer::new(&GATEWAY_LATENCY);
            self.gateway.finalize(session.contest_id()).await
        };
        self.complete(session, reason, result)
    }

    /// Fire-and-forget finalize on page teardown.
    ///
    /// Does not wait, does not touch the guard, and may duplicate a finalize
    /// already sent on another path; the server absorbs duplicates. Skipped
    /// only when the server has already confirmed the attempt closed.
    pub fn finalize_on_teardown(&self, session: &ContestAttemptSession) -> bool {
        if session.is_finalized() {
            return false;
        }
        debug!(contest_id = %session.contest_id(), "Sending teardown finalize beacon");
        self.gateway.finalize_best_effort(session.contest_id());
        FINALIZE_BEACONS.inc();
        true
    }
}
