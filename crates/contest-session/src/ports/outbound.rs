//! # Outbound Ports
//!
//! Traits for what the session depends on: the contest gateway (server of
//! record), the exam platform (fullscreen, history, dialogs, navigation)
//! and a clock.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use contest_types::{
    ContestId, ContestMetadata, ExecutionOutcome, PriorSubmission, QuestionId, QuestionMetadata,
    RunRequest, RunVerdict, SubmitRequest, SubmitVerdict, TestCaseResult, TestSample,
};
use parking_lot::Mutex;
use thiserror::Error;

use crate::events::LockReason;

/// Gateway failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Transport-level failure (connect, timeout, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The server reports the attempt as already closed.
    #[error("Contest attempt already finalized")]
    AlreadyFinalized,

    /// The server refused the request.
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Contest/question data gateway - outbound port.
#[async_trait]
pub trait ContestGateway: Send + Sync {
    /// Contest window, finalize status and allowed languages.
    async fn fetch_contest(&self, contest_id: &ContestId) -> Result<ContestMetadata, GatewayError>;

    /// Test samples, prior submission and limits.
    async fn fetch_question(
        &self,
        contest_id: &ContestId,
        question_id: &QuestionId,
    ) -> Result<QuestionMetadata, GatewayError>;

    /// Close the attempt. Idempotent server-side.
    async fn finalize(&self, contest_id: &ContestId) -> Result<(), GatewayError>;

    /// Non-scoring execution.
    async fn run(&self, request: RunRequest) -> Result<RunVerdict, GatewayError>;

    /// Scoring execution.
    async fn submit(&self, request: SubmitRequest) -> Result<SubmitVerdict, GatewayError>;

    /// Best-effort, non-awaited finalize used on page teardown.
    ///
    /// Must return immediately. Delivery is not guaranteed and the result is
    /// never observed.
    fn finalize_best_effort(&self, contest_id: &ContestId);
}

/// Platform failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("Fullscreen request denied: {0}")]
    FullscreenDenied(String),

    #[error("Not in fullscreen")]
    NotFullscreen,
}

/// Exam platform - outbound port.
///
/// Calls are synchronous requests; their effects come back later as
/// [`SessionEvent`](crate::events::SessionEvent)s (fullscreen change, leave
/// confirmation answer).
pub trait ExamPlatform: Send + Sync {
    /// Ask the platform to enter fullscreen. Success arrives as `FullscreenEntered`.
    fn request_fullscreen(&self) -> Result<(), PlatformError>;

    /// Leave fullscreen.
    fn exit_fullscreen(&self) -> Result<(), PlatformError>;

    /// Push a history entry so the next back-press is intercepted.
    fn push_history_guard(&self);

    /// Show the leave confirmation. The answer arrives as `LeaveAnswered`.
    fn request_leave_confirmation(&self);

    /// Show the "enter fullscreen to continue" prompt.
    fn show_fullscreen_prompt(&self, violations: u8, remaining: u8);

    /// Tell the editor the session is locked.
    fn notify_locked(&self, reason: LockReason);

    /// Leave the session view.
    fn navigate_away(&self);
}

/// Wall clock - outbound port.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Start of the contest window served by `MockGateway::default()`.
pub fn mock_window_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Default for ManualClock {
    /// Half way through the mock contest window.
    fn default() -> Self {
        Self::at(mock_window_start() + Duration::minutes(30))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// A call recorded by [`MockGateway`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayCall {
    FetchContest,
    FetchQuestion,
    Finalize,
    FinalizeBeacon,
    Run { save_run: bool },
    Submit,
}

struct MockGatewayState {
    contest: ContestMetadata,
    question: QuestionMetadata,
    calls: Vec<GatewayCall>,
    fetch_error: Option<GatewayError>,
    finalize_error: Option<GatewayError>,
    submission_error: Option<GatewayError>,
    compile_error: Option<String>,
    latency: Option<std::time::Duration>,
}

/// In-memory gateway for testing.
///
/// Runs pass every sample test. A run sent with `save_run` is stored as the
/// question's prior submission, as the real server does.
pub struct MockGateway {
    state: Mutex<MockGatewayState>,
}

impl Default for MockGateway {
    fn default() -> Self {
        let start = mock_window_start();
        Self {
            state: Mutex::new(MockGatewayState {
                contest: ContestMetadata {
                    start_time: start,
                    end_time: start + Duration::minutes(60),
                    finalized: false,
                    allowed_languages: vec!["python".into(), "cpp".into()],
                },
                question: QuestionMetadata {
                    test_samples: vec![TestSample {
                        input: "1 2".into(),
                        expected_output: "3".into(),
                    }],
                    ..Default::default()
                },
                calls: Vec::new(),
                fetch_error: None,
                finalize_error: None,
                submission_error: None,
                compile_error: None,
                latency: None,
            }),
        }
    }
}

impl MockGateway {
    pub fn with_contest(self, contest: ContestMetadata) -> Self {
        self.state.lock().contest = contest;
        self
    }

    pub fn with_question(self, question: QuestionMetadata) -> Self {
        self.state.lock().question = question;
        self
    }

    /// Contest window `[start, end]`.
    pub fn with_window(self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        {
            let mut state = self.state.lock();
            state.contest.start_time = start;
            state.contest.end_time = end;
        }
        self
    }

    /// Contest already closed server-side.
    pub fn finalized(self) -> Self {
        self.state.lock().contest.finalized = true;
        self
    }

    pub fn failing_fetch(self) -> Self {
        self.state.lock().fetch_error = Some(GatewayError::Network("mock fetch failure".into()));
        self
    }

    pub fn failing_finalize(self) -> Self {
        self.state.lock().finalize_error = Some(GatewayError::Network("mock finalize failure".into()));
        self
    }

    /// Finalize answers `AlreadyFinalized`.
    pub fn already_finalized(self) -> Self {
        self.state.lock().finalize_error = Some(GatewayError::AlreadyFinalized);
        self
    }

    pub fn failing_submissions(self) -> Self {
        self.state.lock().submission_error = Some(GatewayError::Network("mock submission failure".into()));
        self
    }

    /// Run/submit answer `AlreadyFinalized`.
    pub fn closed_submissions(self) -> Self {
        self.state.lock().submission_error = Some(GatewayError::AlreadyFinalized);
        self
    }

    pub fn compile_error(self, message: &str) -> Self {
        self.state.lock().compile_error = Some(message.to_string());
        self
    }

    /// Run, submit and finalize answer only after `latency` of tokio time.
    pub fn with_latency(self, latency: std::time::Duration) -> Self {
        self.state.lock().latency = Some(latency);
        self
    }

    /// Clear a submission failure set earlier.
    pub fn recover_submissions(&self) {
        self.state.lock().submission_error = None;
    }

    /// Flip the server-side finalized flag mid-test.
    pub fn close_contest(&self) {
        self.state.lock().contest.finalized = true;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().calls.clone()
    }

    fn count(&self, pred: impl Fn(&GatewayCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Guarded (awaited) finalize calls.
    pub fn finalize_calls(&self) -> usize {
        self.count(|c| *c == GatewayCall::Finalize)
    }

    /// Fire-and-forget finalize calls.
    pub fn beacon_calls(&self) -> usize {
        self.count(|c| *c == GatewayCall::FinalizeBeacon)
    }

    /// Run and submit calls.
    pub fn submission_calls(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::Run { .. } | GatewayCall::Submit))
    }

    pub fn fetch_calls(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::FetchContest | GatewayCall::FetchQuestion))
    }

    /// Record a call, then hold the answer back for the configured latency.
    async fn record(&self, call: GatewayCall) {
        let latency = {
            let mut state = self.state.lock();
            state.calls.push(call);
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn outcome(state: &MockGatewayState) -> ExecutionOutcome {
        match &state.compile_error {
            Some(message) => ExecutionOutcome::CompileError {
                message: message.clone(),
            },
            None => ExecutionOutcome::Executed {
                results: (0..state.question.test_samples.len().max(1))
                    .map(|i| TestCaseResult {
                        index: i as u32,
                        passed: true,
                        actual_output: None,
                        runtime_ms: Some(1),
                    })
                    .collect(),
            },
        }
    }
}

#[async_trait]
impl ContestGateway for MockGateway {
    async fn fetch_contest(&self, _contest_id: &ContestId) -> Result<ContestMetadata, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall::FetchContest);
        if let Some(err) = state.fetch_error.clone() {
            return Err(err);
        }
        Ok(state.contest.clone())
    }

    async fn fetch_question(
        &self,
        _contest_id: &ContestId,
        _question_id: &QuestionId,
    ) -> Result<QuestionMetadata, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall::FetchQuestion);
        if let Some(err) = state.fetch_error.clone() {
            return Err(err);
        }
        Ok(state.question.clone())
    }

    async fn finalize(&self, _contest_id: &ContestId) -> Result<(), GatewayError> {
        self.record(GatewayCall::Finalize).await;
        let mut state = self.state.lock();
        match state.finalize_error.clone() {
            Some(err) => Err(err),
            None => {
                state.contest.finalized = true;
                Ok(())
            }
        }
    }

    async fn run(&self, request: RunRequest) -> Result<RunVerdict, GatewayError> {
        self.record(GatewayCall::Run {
            save_run: request.save_run,
        })
        .await;
        let mut state = self.state.lock();
        if let Some(err) = state.submission_error.clone() {
            return Err(err);
        }
        let outcome = Self::outcome(&state);
        let saved = request.save_run && !outcome.is_compile_error();
        if saved {
            state.question.prior_submission = Some(PriorSubmission {
                source: request.source,
                language: request.language,
                marks: 0.0,
                submitted_at: state.contest.start_time,
            });
        }
        Ok(RunVerdict { outcome, saved })
    }

    async fn submit(&self, _request: SubmitRequest) -> Result<SubmitVerdict, GatewayError> {
        self.record(GatewayCall::Submit).await;
        let state = self.state.lock();
        if let Some(err) = state.submission_error.clone() {
            return Err(err);
        }
        let outcome = Self::outcome(&state);
        let marks = if outcome.is_compile_error() { 0.0 } else { 10.0 };
        Ok(SubmitVerdict {
            outcome,
            marks_awarded: marks,
            max_marks: 10.0,
        })
    }

    fn finalize_best_effort(&self, _contest_id: &ContestId) {
        self.state.lock().calls.push(GatewayCall::FinalizeBeacon);
    }
}

/// A call recorded by [`RecordingPlatform`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformCall {
    RequestFullscreen,
    ExitFullscreen,
    PushHistoryGuard,
    RequestLeaveConfirmation,
    FullscreenPrompt { violations: u8, remaining: u8 },
    Locked(LockReason),
    NavigateAway,
}

/// Platform double that records every call.
#[derive(Default)]
pub struct RecordingPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    fail_exit: bool,
    deny_fullscreen: bool,
}

impl RecordingPlatform {
    pub fn failing_exit(mut self) -> Self {
        self.fail_exit = true;
        self
    }

    pub fn denying_fullscreen(mut self) -> Self {
        self.deny_fullscreen = true;
        self
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().clone()
    }

    fn count(&self, pred: impl Fn(&PlatformCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn navigations(&self) -> usize {
        self.count(|c| *c == PlatformCall::NavigateAway)
    }

    pub fn fullscreen_prompts(&self) -> usize {
        self.count(|c| matches!(c, PlatformCall::FullscreenPrompt { .. }))
    }

    pub fn leave_prompts(&self) -> usize {
        self.count(|c| *c == PlatformCall::RequestLeaveConfirmation)
    }

    pub fn history_guards(&self) -> usize {
        self.count(|c| *c == PlatformCall::PushHistoryGuard)
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().push(call);
    }
}

impl ExamPlatform for RecordingPlatform {
    fn request_fullscreen(&self) -> Result<(), PlatformError> {
        self.record(PlatformCall::RequestFullscreen);
        if self.deny_fullscreen {
            return Err(PlatformError::FullscreenDenied("mock denial".into()));
        }
        Ok(())
    }

    fn exit_fullscreen(&self) -> Result<(), PlatformError> {
        self.record(PlatformCall::ExitFullscreen);
        if self.fail_exit {
            return Err(PlatformError::NotFullscreen);
        }
        Ok(())
    }

    fn push_history_guard(&self) {
        self.record(PlatformCall::PushHistoryGuard);
    }

    fn request_leave_confirmation(&self) {
        self.record(PlatformCall::RequestLeaveConfirmation);
    }

    fn show_fullscreen_prompt(&self, violations: u8, remaining: u8) {
        self.record(PlatformCall::FullscreenPrompt {
            violations,
            remaining,
        });
    }

    fn notify_locked(&self, reason: LockReason) {
        self.record(PlatformCall::Locked(reason));
    }

    fn navigate_away(&self) {
        self.record(PlatformCall::NavigateAway);
    }
}
