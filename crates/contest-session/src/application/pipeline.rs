//! Run/submit pipeline
//!
//! Local checks run in a fixed order and reject without touching the
//! network:
//!
//! 1. lock state (`SessionLocked`)
//! 2. language offered by the contest (`UnsupportedLanguage`)
//! 3. non-blank source (`EmptySource`)
//! 4. bracket balance (`UnbalancedSource`), skipping the language's comments
//!
//! Each call is split into `prepare_*` (checks, request) and `complete_*`
//! (apply the answer) so the owner can keep serving events while the
//! request is on the wire.

use contest_telemetry::metrics::{HistogramTimer, GATEWAY_LATENCY, LOCAL_REJECTIONS, SUBMISSIONS};
use contest_types::{
    QuestionMetadata, RunRequest, RunVerdict, SubmissionAttempt, SubmissionKind, SubmitRequest,
    SubmitVerdict, Verdict,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{check_source, ContestAttemptSession, LockState, SourceSyntax};
use crate::error::{SessionError, SessionResult};
use crate::ports::outbound::{ContestGateway, GatewayError};

/// Result of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOutcome {
    pub verdict: RunVerdict,
    /// This run became the stored best run. The caller should refresh
    /// question metadata.
    pub persisted: bool,
}

/// Sends run/submit requests for one question.
pub struct RunSubmitPipeline<G: ContestGateway> {
    gateway: Arc<G>,
    /// Once set, runs go out with `save_run = false`.
    best_run_saved: bool,
    last_attempt: Option<SubmissionAttempt>,
}

impl<G: ContestGateway> RunSubmitPipeline<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            best_run_saved: false,
            last_attempt: None,
        }
    }

    /// Take the saved-run flag from question metadata. Never clears it.
    pub fn seed_from(&mut self, question: &QuestionMetadata) {
        self.best_run_saved |= question.prior_submission.is_some();
    }

    pub fn best_run_saved(&self) -> bool {
        self.best_run_saved
    }

    /// The most recent call that reached the server.
    pub fn last_attempt(&self) -> Option<&SubmissionAttempt> {
        self.last_attempt.as_ref()
    }

    /// Local preconditions shared by run and submit.
    pub fn preflight(
        &self,
        session: &ContestAttemptSession,
        lock: LockState,
        source: &str,
        language: &str,
    ) -> SessionResult<()> {
        let result = Self::check(session, lock, source, language);
        if let Err(ref e) = result {
            LOCAL_REJECTIONS.with_label_values(&[e.label()]).inc();
            debug!(contest_id = %session.contest_id(), reason = e.label(), "Rejected locally");
        }
        result
    }

    fn check(
        session: &ContestAttemptSession,
        lock: LockState,
        source: &str,
        language: &str,
    ) -> SessionResult<()> {
        if lock.is_locked() {
            return Err(SessionError::SessionLocked);
        }
        if !session.allows_language(language) {
            return Err(SessionError::UnsupportedLanguage {
                language: language.to_string(),
            });
        }
        if source.trim().is_empty() {
            return Err(SessionError::EmptySource);
        }
        check_source(source, SourceSyntax::for_language(language))?;
        Ok(())
    }

    /// Build a run request once the local checks pass. The request asks
    /// the server to keep the run only until a best run has been stored.
    pub fn prepare_run(
        &self,
        session: &ContestAttemptSession,
        lock: LockState,
        source: String,
        language: String,
    ) -> SessionResult<RunRequest> {
        self.preflight(session, lock, &source, &language)?;
        Ok(RunRequest {
            contest_id: session.contest_id().clone(),
            question_id: session.question_id().clone(),
            save_run: !self.best_run_saved,
            source,
            language,
        })
    }

    /// Apply the gateway's answer to a run prepared earlier.
    pub fn complete_run(
        &mut self,
        session: &mut ContestAttemptSession,
        request: RunRequest,
        result: Result<RunVerdict, GatewayError>,
    ) -> SessionResult<RunOutcome> {
        let verdict = settle(SubmissionKind::Run, session, result)?;

        let persisted = request.save_run && verdict.saved;
        if persisted {
            self.best_run_saved = true;
            info!(
                contest_id = %session.contest_id(),
                question_id = %session.question_id(),
                "Run stored as best run"
            );
        }

        self.last_attempt = Some(SubmissionAttempt {
            kind: SubmissionKind::Run,
            source: request.source,
            language: request.language,
            verdict: Verdict::Run(verdict.clone()),
        });
        Ok(RunOutcome { verdict, persisted })
    }

    /// Non-scoring run, start to finish.
    pub async fn run(
        &mut self,
        session: &mut ContestAttemptSession,
        lock: LockState,
        source: String,
        language: String,
    ) -> SessionResult<RunOutcome> {
        let request = self.prepare_run(session, lock, source, language)?;
        let result = {
            let _timer = HistogramTimer::new(&GATEWAY_LATENCY);
            self.gateway.run(request.clone()).await
        };
        self.complete_run(session, request, result)
    }

    /// Build a submit request once the local checks pass.
    pub fn prepare_submit(
        &self,
        session: &ContestAttemptSession,
        lock: LockState,
        source: String,
        language: String,
    ) -> SessionResult<SubmitRequest> {
        self.preflight(session, lock, &source, &language)?;
        Ok(SubmitRequest {
            contest_id: session.contest_id().clone(),
            question_id: session.question_id().clone(),
            source,
            language,
        })
    }

    /// Apply the gateway's answer to a submission prepared earlier.
    pub fn complete_submit(
        &mut self,
        session: &mut ContestAttemptSession,
        request: SubmitRequest,
        result: Result<SubmitVerdict, GatewayError>,
    ) -> SessionResult<SubmitVerdict> {
        let verdict = settle(SubmissionKind::Submit, session, result)?;

        info!(
            contest_id = %session.contest_id(),
            question_id = %session.question_id(),
            marks = verdict.marks_awarded,
            max = verdict.max_marks,
            "Submission scored"
        );

        self.last_attempt = Some(SubmissionAttempt {
            kind: SubmissionKind::Submit,
            source: request.source,
            language: request.language,
            verdict: Verdict::Submit(verdict.clone()),
        });
        Ok(verdict)
    }

    /// Scored submission, start to finish.
    pub async fn submit(
        &mut self,
        session: &mut ContestAttemptSession,
        lock: LockState,
        source: String,
        language: String,
    ) -> SessionResult<SubmitVerdict> {
        let request = self.prepare_submit(session, lock, source, language)?;
        let result = {
            let _timer = HistogramTimer::new(&GATEWAY_LATENCY);
            self.gateway.submit(request.clone()).await
        };
        self.complete_submit(session, request, result)
    }
}

/// Map a gateway answer. `AlreadyFinalized` marks the session closed; any
/// other failure leaves lock state alone.
fn settle<T>(
    kind: SubmissionKind,
    session: &mut ContestAttemptSession,
    result: Result<T, GatewayError>,
) -> SessionResult<T> {
    match result {
        Ok(value) => {
            SUBMISSIONS.with_label_values(&[kind.as_str(), "ok"]).inc();
            Ok(value)
        }
        Err(GatewayError::AlreadyFinalized) => {
            SUBMISSIONS
                .with_label_values(&[kind.as_str(), "already_finalized"])
                .inc();
            info!(contest_id = %session.contest_id(), kind = kind.as_str(), "Server reports attempt closed");
            session.mark_finalized();
            Err(SessionError::AlreadyFinalized)
        }
        Err(e) => {
            SUBMISSIONS.with_label_values(&[kind.as_str(), "failed"]).inc();
            warn!(contest_id = %session.contest_id(), kind = kind.as_str(), error = %e, "Gateway call failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BracketError;
    use crate::ports::outbound::{mock_window_start, GatewayCall, MockGateway};
    use chrono::Duration;
    use contest_types::{ContestId, ContestMetadata, QuestionId};

    fn session() -> ContestAttemptSession {
        let start = mock_window_start();
        let meta = ContestMetadata {
            start_time: start,
            end_time: start + Duration::minutes(60),
            finalized: false,
            allowed_languages: vec!["python".into(), "cpp".into()],
        };
        ContestAttemptSession::new(ContestId::new("c1"), QuestionId::new("q1"), &meta)
    }

    fn pipeline(gateway: MockGateway) -> (RunSubmitPipeline<MockGateway>, Arc<MockGateway>) {
        let gateway = Arc::new(gateway);
        (RunSubmitPipeline::new(gateway.clone()), gateway)
    }

    #[tokio::test]
    async fn test_locked_run_makes_no_call() {
        let (mut p, gateway) = pipeline(MockGateway::default());
        let mut s = session();

        let err = p
            .run(&mut s, LockState::Locked, "print(1)".into(), "python".into())
            .await
            .unwrap_err();

        assert_eq!(err, SessionError::SessionLocked);
        assert_eq!(gateway.submission_calls(), 0);
    }

    #[tokio::test]
    async fn test_unbalanced_submit_makes_no_call() {
        let (mut p, gateway) = pipeline(MockGateway::default());
        let mut s = session();

        let err = p
            .submit(&mut s, LockState::Active, "def f(:\n  pass".into(), "python".into())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::UnbalancedSource(BracketError::Unclosed { open: '(', .. })
        ));
        assert_eq!(gateway.submission_calls(), 0);
    }

    #[tokio::test]
    async fn test_precondition_order() {
        let (p, _gateway) = pipeline(MockGateway::default());
        let s = session();

        // Locked wins over everything else.
        assert_eq!(
            p.preflight(&s, LockState::Locked, "", "rust"),
            Err(SessionError::SessionLocked)
        );
        // Language before emptiness.
        assert!(matches!(
            p.preflight(&s, LockState::Active, "", "rust"),
            Err(SessionError::UnsupportedLanguage { .. })
        ));
        // Emptiness before brackets.
        assert_eq!(
            p.preflight(&s, LockState::Active, "   \n", "python"),
            Err(SessionError::EmptySource)
        );
    }

    #[test]
    fn test_cpp_comment_with_stray_paren_is_accepted() {
        let (p, _gateway) = pipeline(MockGateway::default());
        let s = session();
        let src = "int main() {\n    // close ) later\n    return 0;\n}\n";

        assert!(p.preflight(&s, LockState::Active, src, "cpp").is_ok());
    }

    #[tokio::test]
    async fn test_prepared_run_completes_later() {
        let (mut p, gateway) = pipeline(MockGateway::default());
        let mut s = session();

        let request = p
            .prepare_run(&s, LockState::Active, "print(3)".into(), "python".into())
            .unwrap();
        assert!(request.save_run);
        assert_eq!(gateway.submission_calls(), 0);

        let result = gateway.run(request.clone()).await;
        let outcome = p.complete_run(&mut s, request, result).unwrap();

        assert!(outcome.persisted);
        assert_eq!(p.last_attempt().unwrap().kind, SubmissionKind::Run);
    }

    #[tokio::test]
    async fn test_first_run_saves_then_stops_asking() {
        let (mut p, gateway) = pipeline(MockGateway::default());
        let mut s = session();

        let first = p
            .run(&mut s, LockState::Active, "print(3)".into(), "python".into())
            .await
            .unwrap();
        let second = p
            .run(&mut s, LockState::Active, "print(3)".into(), "python".into())
            .await
            .unwrap();

        assert!(first.persisted);
        assert!(!second.persisted);
        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::Run { save_run: true },
                GatewayCall::Run { save_run: false },
            ]
        );
        assert!(p.best_run_saved());
    }

    #[tokio::test]
    async fn test_prior_submission_disables_save() {
        let (mut p, gateway) = pipeline(MockGateway::default());
        let mut s = session();
        let question = QuestionMetadata {
            prior_submission: Some(contest_types::PriorSubmission {
                source: "print(3)".into(),
                language: "python".into(),
                marks: 10.0,
                submitted_at: mock_window_start(),
            }),
            ..Default::default()
        };
        p.seed_from(&question);

        p.run(&mut s, LockState::Active, "print(3)".into(), "python".into())
            .await
            .unwrap();

        assert_eq!(gateway.calls(), vec![GatewayCall::Run { save_run: false }]);
    }

    #[tokio::test]
    async fn test_network_failure_keeps_session_open() {
        let (mut p, _gateway) = pipeline(MockGateway::default().failing_submissions());
        let mut s = session();

        let err = p
            .submit(&mut s, LockState::Active, "print(3)".into(), "python".into())
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(s.lock_state(), LockState::Active);
        assert!(p.last_attempt().is_none());
    }

    #[tokio::test]
    async fn test_already_finalized_marks_session() {
        let (mut p, _gateway) = pipeline(MockGateway::default().closed_submissions());
        let mut s = session();

        let err = p
            .run(&mut s, LockState::Active, "print(3)".into(), "python".into())
            .await
            .unwrap_err();

        assert!(err.is_quiet());
        assert!(s.is_finalized());
    }

    #[tokio::test]
    async fn test_compile_error_is_not_persisted() {
        let (mut p, _gateway) = pipeline(MockGateway::default().compile_error("expected ':'"));
        let mut s = session();

        let outcome = p
            .run(&mut s, LockState::Active, "print(3)".into(), "python".into())
            .await
            .unwrap();

        assert!(outcome.verdict.outcome.is_compile_error());
        assert!(!outcome.persisted);
        assert!(!p.best_run_saved());
    }

    #[tokio::test]
    async fn test_submit_records_last_attempt() {
        let (mut p, _gateway) = pipeline(MockGateway::default());
        let mut s = session();

        let verdict = p
            .submit(&mut s, LockState::Active, "print(3)".into(), "cpp".into())
            .await
            .unwrap();

        assert_eq!(verdict.marks_awarded, 10.0);
        let last = p.last_attempt().unwrap();
        assert_eq!(last.kind, SubmissionKind::Submit);
        assert_eq!(last.language, "cpp");
    }
}
