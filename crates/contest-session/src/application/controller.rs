//! # Session Controller
//!
//! Owns the session record and drives the phase machine. Every platform event
//! and editor command goes through exactly one `&mut self` method here, so
//! handlers never overlap as long as a single task owns the controller (see
//! [`SessionRuntime`](super::SessionRuntime)).
//!
//! ## Lock predicate
//!
//! `Locked` iff the session is finalized, timed out, or the phase is
//! `Finalizing`/`Locked`. Before metadata is loaded the controller reports
//! `Locked` as well.
//!
//! ## Gateway calls
//!
//! The `begin_*`/`apply_event` methods check and commit synchronously and
//! return the request to send; `complete` applies the answer. The async
//! methods (`run`, `submit`, `finish`, `handle_event`) do both in place for
//! callers that can afford to wait.

use chrono::{DateTime, Utc};
use contest_telemetry::metrics::SESSIONS_TIMED_OUT;
use contest_types::{
    ContestId, ContestMetadata, QuestionId, QuestionMetadata, RunRequest, RunVerdict,
    SubmitRequest, SubmitVerdict,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::calls::{fetch_metadata, timed, CallOutcome, CallResult, Completion, PendingCall};
use super::pipeline::{RunOutcome, RunSubmitPipeline};
use crate::config::SessionConfig;
use crate::domain::{
    ContestAttemptSession, FinalizeCoordinator, FinalizeOutcome, FinalizeReason, LockState,
    PhaseTrigger, SessionPhase,
};
use crate::error::{SessionError, SessionResult};
use crate::events::{LockReason, SessionEvent, SessionSnapshot};
use crate::monitors::{IntegrityAction, IntegrityMonitor};
use crate::ports::outbound::{Clock, ContestGateway, ExamPlatform, GatewayError};

/// Contest attempt session controller.
pub struct SessionController<G, P, C>
where
    G: ContestGateway,
    P: ExamPlatform,
    C: Clock,
{
    attempt_id: Uuid,
    contest_id: ContestId,
    question_id: QuestionId,
    config: SessionConfig,
    gateway: Arc<G>,
    platform: Arc<P>,
    clock: Arc<C>,
    coordinator: FinalizeCoordinator<G, P>,
    integrity: IntegrityMonitor,
    pipeline: RunSubmitPipeline<G>,
    session: Option<ContestAttemptSession>,
    question: Option<QuestionMetadata>,
    phase: SessionPhase,
}

impl<G, P, C> SessionController<G, P, C>
where
    G: ContestGateway,
    P: ExamPlatform,
    C: Clock,
{
    pub fn new(
        contest_id: ContestId,
        question_id: QuestionId,
        gateway: Arc<G>,
        platform: Arc<P>,
        clock: Arc<C>,
        config: SessionConfig,
    ) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            contest_id,
            question_id,
            coordinator: FinalizeCoordinator::new(gateway.clone(), platform.clone()),
            integrity: IntegrityMonitor::new(config.max_violations),
            pipeline: RunSubmitPipeline::new(gateway.clone()),
            config,
            gateway,
            platform,
            clock,
            session: None,
            question: None,
            phase: SessionPhase::Loading,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Correlation id for this controller instance's log lines.
    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&ContestAttemptSession> {
        self.session.as_ref()
    }

    pub fn question(&self) -> Option<&QuestionMetadata> {
        self.question.as_ref()
    }

    pub fn pipeline(&self) -> &RunSubmitPipeline<G> {
        &self.pipeline
    }

    pub fn clock(&self) -> Arc<C> {
        self.clock.clone()
    }

    pub fn gateway(&self) -> Arc<G> {
        self.gateway.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn violations(&self) -> u8 {
        self.session.as_ref().map_or(0, |s| s.violation_count())
    }

    pub fn max_violations(&self) -> u8 {
        self.integrity.max_violations()
    }

    pub fn lock_state(&self) -> LockState {
        match &self.session {
            Some(s) if !s.lock_state().is_locked() && !self.phase.blocks_submissions() => {
                LockState::Active
            }
            _ => LockState::Locked,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut snapshot = SessionSnapshot::loading(self.max_violations());
        snapshot.phase = self.phase;
        snapshot.lock_state = self.lock_state();
        if let Some(s) = &self.session {
            snapshot.violations = s.violation_count();
            snapshot.finalized = s.is_finalized();
            snapshot.timed_out = s.is_timed_out();
        }
        snapshot
    }

    /// End time the deadline monitor should watch, if one is still needed.
    pub fn deadline_target(&self) -> Option<DateTime<Utc>> {
        match &self.session {
            Some(s) if !s.is_timed_out() && !self.phase.is_locked() => Some(s.end_time()),
            _ => None,
        }
    }

    fn transition(&mut self, trigger: PhaseTrigger) {
        let next = self.phase.next(trigger);
        if next != self.phase {
            debug!(
                attempt_id = %self.attempt_id,
                from = self.phase.as_str(),
                to = next.as_str(),
                ?trigger,
                "Phase transition"
            );
            self.phase = next;
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Fetch contest and question metadata and leave `Loading`.
    ///
    /// A closed contest goes straight to `Locked`: a server-finalized one
    /// navigates away, an expired one stays viewable.
    pub async fn open(&mut self) -> SessionResult<SessionPhase> {
        if self.phase != SessionPhase::Loading {
            return Ok(self.phase);
        }

        let contest = self.gateway.fetch_contest(&self.contest_id).await?;
        let now = self.clock.now();
        if contest.is_upcoming(now) {
            info!(
                contest_id = %self.contest_id,
                starts_at = %contest.start_time,
                "Contest has not started"
            );
            return Err(SessionError::ContestNotStarted {
                starts_at: contest.start_time,
            });
        }

        let question = self
            .gateway
            .fetch_question(&self.contest_id, &self.question_id)
            .await?;

        let mut session =
            ContestAttemptSession::new(self.contest_id.clone(), self.question_id.clone(), &contest);
        let expired = contest.has_ended(now);
        if expired {
            session.mark_timed_out();
        }
        let finalized = session.is_finalized();

        self.pipeline.seed_from(&question);
        self.session = Some(session);
        self.question = Some(question);
        self.transition(PhaseTrigger::Loaded {
            closed: finalized || expired,
        });

        info!(
            attempt_id = %self.attempt_id,
            contest_id = %self.contest_id,
            question_id = %self.question_id,
            phase = self.phase.as_str(),
            "Contest session opened"
        );

        if finalized {
            self.platform.notify_locked(LockReason::Finalized);
            self.platform.navigate_away();
        } else if expired {
            self.platform.notify_locked(LockReason::TimedOut);
        } else {
            self.platform.push_history_guard();
            self.platform
                .show_fullscreen_prompt(0, self.integrity.max_violations());
        }

        Ok(self.phase)
    }

    /// Re-fetch metadata after a persisted run. The `finalized` flag only
    /// ever moves to `true`.
    pub async fn refresh_metadata(&mut self) -> SessionResult<()> {
        if self.session.is_none() {
            return Err(SessionError::NotLoaded);
        }
        let fetched =
            fetch_metadata(self.gateway.as_ref(), &self.contest_id, &self.question_id).await;
        self.complete_refresh(fetched)
    }

    fn refresh_call(&self) -> PendingCall {
        PendingCall::Refresh {
            contest_id: self.contest_id.clone(),
            question_id: self.question_id.clone(),
        }
    }

    /// Apply re-fetched metadata.
    pub fn complete_refresh(
        &mut self,
        fetched: Result<(ContestMetadata, QuestionMetadata), GatewayError>,
    ) -> SessionResult<()> {
        let (contest, question) = fetched?;
        let closed = match self.session.as_mut() {
            Some(session) => {
                session.refresh(&contest);
                session.is_finalized()
            }
            None => return Err(SessionError::NotLoaded),
        };
        self.pipeline.seed_from(&question);
        self.question = Some(question);

        if closed {
            self.on_server_closed();
        }
        Ok(())
    }

    // =========================================================================
    // Platform events
    // =========================================================================

    /// Handle one platform or timer event, sending any finalize it forces
    /// before returning.
    pub async fn handle_event(&mut self, event: SessionEvent) {
        if let Some(call) = self.apply_event(event) {
            self.drive(call).await;
        }
    }

    /// Handle one platform or timer event without waiting on the network.
    ///
    /// Returns the finalize request the event forced, if any; its answer
    /// goes to [`complete`](Self::complete).
    pub fn apply_event(&mut self, event: SessionEvent) -> Option<PendingCall> {
        if self.session.is_none() {
            debug!(event = event.as_str(), "Event before load ignored");
            return None;
        }

        match event {
            SessionEvent::FullscreenEntered => {
                self.on_fullscreen_entered();
                None
            }
            SessionEvent::FullscreenExited => self.on_fullscreen_exited(),
            SessionEvent::BackPressed => {
                self.on_back_pressed();
                None
            }
            SessionEvent::LeaveAnswered { confirmed } => self.on_leave_answered(confirmed),
            SessionEvent::TimedOut => {
                self.on_timed_out();
                None
            }
            SessionEvent::Teardown => {
                self.teardown();
                None
            }
        }
    }

    fn on_fullscreen_entered(&mut self) {
        if let Some(session) = self.session.as_mut() {
            self.integrity.on_fullscreen_entered(session);
        }
        if matches!(
            self.phase,
            SessionPhase::AwaitingFullscreen | SessionPhase::Warning(_)
        ) {
            self.transition(PhaseTrigger::FullscreenAcquired);
        }
    }

    fn on_fullscreen_exited(&mut self) -> Option<PendingCall> {
        if matches!(self.phase, SessionPhase::Loading) || self.phase.blocks_submissions() {
            return None;
        }
        let action = self.integrity.on_fullscreen_lost(self.session.as_mut()?);
        match action {
            IntegrityAction::Warn {
                violations,
                remaining,
            } => {
                self.transition(PhaseTrigger::Violation(violations));
                self.platform.show_fullscreen_prompt(violations, remaining);
                None
            }
            IntegrityAction::ForceFinalize(reason) => self.begin_finalize(reason),
            _ => None,
        }
    }

    fn on_back_pressed(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match self.integrity.on_back_pressed(session) {
            IntegrityAction::ConfirmLeave => {
                // The guard must be armed before the prompt can cost a
                // fullscreen exit.
                if self.coordinator.arm(session) {
                    self.platform.request_leave_confirmation();
                }
            }
            IntegrityAction::AllowLeave => self.platform.navigate_away(),
            _ => {}
        }
    }

    fn on_leave_answered(&mut self, confirmed: bool) -> Option<PendingCall> {
        let action = self.integrity.on_leave_answer(self.session.as_mut()?, confirmed);
        match action {
            IntegrityAction::ForceFinalize(reason) => self.begin_finalize(reason),
            IntegrityAction::LeaveDeclined {
                violations,
                remaining,
            } => {
                if let Some(session) = self.session.as_mut() {
                    self.coordinator.disarm(session);
                }
                self.platform.push_history_guard();
                self.transition(PhaseTrigger::LeaveDeclined);
                self.platform.show_fullscreen_prompt(violations, remaining);
                None
            }
            _ => None,
        }
    }

    fn on_timed_out(&mut self) {
        let first = match self.session.as_mut() {
            Some(session) => session.mark_timed_out(),
            None => return,
        };
        if !first {
            return;
        }
        SESSIONS_TIMED_OUT.inc();

        let was_locked = self.phase.is_locked();
        self.transition(PhaseTrigger::TimedOut);
        info!(
            attempt_id = %self.attempt_id,
            contest_id = %self.contest_id,
            "Contest time over, session locked"
        );

        if !was_locked {
            if let Err(e) = self.platform.exit_fullscreen() {
                debug!(error = %e, "Fullscreen exit failed on timeout");
            }
            self.platform.notify_locked(LockReason::TimedOut);
        }
    }

    fn on_server_closed(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.mark_finalized();
        }
        if self.phase.is_locked() {
            return;
        }
        self.transition(PhaseTrigger::ServerClosed);
        info!(
            attempt_id = %self.attempt_id,
            contest_id = %self.contest_id,
            "Server reports attempt closed, session locked"
        );
        self.platform.notify_locked(LockReason::Finalized);
    }

    // =========================================================================
    // Finalize
    // =========================================================================

    /// Claim the finalize guard and enter `Finalizing`.
    ///
    /// `None` if a finalize already went out (or nothing is loaded).
    pub fn begin_finalize(&mut self, reason: FinalizeReason) -> Option<PendingCall> {
        if self.session.as_ref()?.guard().has_dispatched() {
            return None;
        }

        self.transition(PhaseTrigger::FinalizeStarted);
        let session = self.session.as_mut()?;
        if !self.coordinator.begin(session, reason) {
            return None;
        }
        Some(PendingCall::Finalize {
            contest_id: session.contest_id().clone(),
            reason,
        })
    }

    /// Apply the finalize answer. Locks and navigates away whatever it was.
    pub fn complete_finalize(
        &mut self,
        reason: FinalizeReason,
        result: Result<(), GatewayError>,
    ) -> FinalizeOutcome {
        let Some(session) = self.session.as_mut() else {
            return FinalizeOutcome::Skipped;
        };
        let outcome = self.coordinator.complete(session, reason, result);
        self.transition(PhaseTrigger::FinalizeCompleted);
        outcome
    }

    async fn finalize(&mut self, reason: FinalizeReason) -> FinalizeOutcome {
        if self.begin_finalize(reason).is_none() {
            return FinalizeOutcome::Skipped;
        }
        let result = timed(self.gateway.finalize(&self.contest_id)).await;
        self.complete_finalize(reason, result)
    }

    /// Teardown path: fire-and-forget finalize unless the server already
    /// confirmed. Returns whether a beacon was sent.
    pub fn teardown(&mut self) -> bool {
        match &self.session {
            Some(session) => self.coordinator.finalize_on_teardown(session),
            None => false,
        }
    }

    // =========================================================================
    // Editor commands
    // =========================================================================

    /// Student asked to (re-)enter fullscreen.
    pub fn request_fullscreen(&mut self) -> SessionResult<()> {
        if self.session.is_none() {
            return Err(SessionError::NotLoaded);
        }
        if self.lock_state().is_locked() {
            return Err(SessionError::SessionLocked);
        }

        self.transition(PhaseTrigger::FullscreenRequested);
        self.platform
            .request_fullscreen()
            .map_err(|e| SessionError::FullscreenUnavailable(e.to_string()))
    }

    /// Local checks for a run. Nothing is sent.
    pub fn begin_run(&self, source: String, language: String) -> SessionResult<RunRequest> {
        let session = self.session.as_ref().ok_or(SessionError::NotLoaded)?;
        self.pipeline
            .prepare_run(session, self.lock_state(), source, language)
    }

    /// Apply a run answer. A stored best run asks for a metadata refresh,
    /// unless the session locked while the run was out.
    pub fn complete_run(
        &mut self,
        request: RunRequest,
        result: Result<RunVerdict, GatewayError>,
    ) -> (SessionResult<RunOutcome>, Option<PendingCall>) {
        let Some(session) = self.session.as_mut() else {
            return (Err(SessionError::NotLoaded), None);
        };
        match self.pipeline.complete_run(session, request, result) {
            Ok(outcome) => {
                let refresh = (outcome.persisted && !self.lock_state().is_locked())
                    .then(|| self.refresh_call());
                (Ok(outcome), refresh)
            }
            Err(e) => (Err(self.after_failure(e)), None),
        }
    }

    /// Local checks for a submission. Nothing is sent.
    pub fn begin_submit(&self, source: String, language: String) -> SessionResult<SubmitRequest> {
        let session = self.session.as_ref().ok_or(SessionError::NotLoaded)?;
        self.pipeline
            .prepare_submit(session, self.lock_state(), source, language)
    }

    /// Apply a submit answer.
    pub fn complete_submit(
        &mut self,
        request: SubmitRequest,
        result: Result<SubmitVerdict, GatewayError>,
    ) -> SessionResult<SubmitVerdict> {
        let Some(session) = self.session.as_mut() else {
            return Err(SessionError::NotLoaded);
        };
        self.pipeline
            .complete_submit(session, request, result)
            .map_err(|e| self.after_failure(e))
    }

    pub async fn run(&mut self, source: String, language: String) -> SessionResult<RunOutcome> {
        let request = self.begin_run(source, language)?;
        let result = timed(self.gateway.run(request.clone())).await;
        let (outcome, refresh) = self.complete_run(request, result);
        if let Some(call) = refresh {
            self.drive(call).await;
        }
        outcome
    }

    pub async fn submit(&mut self, source: String, language: String) -> SessionResult<SubmitVerdict> {
        let request = self.begin_submit(source, language)?;
        let result = timed(self.gateway.submit(request.clone())).await;
        self.complete_submit(request, result)
    }

    fn after_failure(&mut self, err: SessionError) -> SessionError {
        if err == SessionError::AlreadyFinalized {
            self.on_server_closed();
        }
        err
    }

    /// Explicit "finish test". Returns `Skipped` if a finalize already went out.
    pub async fn finish(&mut self) -> SessionResult<FinalizeOutcome> {
        if self.session.is_none() {
            return Err(SessionError::NotLoaded);
        }
        Ok(self.finalize(FinalizeReason::ExplicitFinish).await)
    }

    /// Start an explicit finish. `Ok(None)` means a finalize already went
    /// out and the answer is `Skipped`.
    pub fn begin_finish(&mut self) -> SessionResult<Option<PendingCall>> {
        if self.session.is_none() {
            return Err(SessionError::NotLoaded);
        }
        Ok(self.begin_finalize(FinalizeReason::ExplicitFinish))
    }

    // =========================================================================
    // Completions
    // =========================================================================

    /// Feed back the answer to a call handed out earlier.
    pub fn complete(&mut self, result: CallResult) -> Completion {
        match result {
            CallResult::Run { request, result } => {
                let (outcome, follow_up) = self.complete_run(request, result);
                Completion {
                    outcome: CallOutcome::Run(outcome),
                    follow_up,
                }
            }
            CallResult::Submit { request, result } => Completion {
                outcome: CallOutcome::Submit(self.complete_submit(request, result)),
                follow_up: None,
            },
            CallResult::Finalize { reason, result } => Completion {
                outcome: CallOutcome::Finalized(self.complete_finalize(reason, result)),
                follow_up: None,
            },
            CallResult::Refresh { result } => {
                let refreshed = self.complete_refresh(result);
                if let Err(ref e) = refreshed {
                    warn!(error = %e, "Metadata refresh after saved run failed");
                }
                Completion {
                    outcome: CallOutcome::Refreshed(refreshed),
                    follow_up: None,
                }
            }
        }
    }

    /// Send a call and its follow-ups in place. Returns the first call's
    /// outcome.
    pub async fn drive(&mut self, call: PendingCall) -> CallOutcome {
        let result = call.execute(self.gateway.clone()).await;
        let Completion {
            outcome,
            mut follow_up,
        } = self.complete(result);
        while let Some(next) = follow_up.take() {
            let result = next.execute(self.gateway.clone()).await;
            follow_up = self.complete(result).follow_up;
        }
        outcome
    }
}
