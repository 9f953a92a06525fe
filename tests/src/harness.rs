//! Test harness: a browser double that feeds events back into the session.
//!
//! Unlike `RecordingPlatform`, [`SimulatedBrowser`] behaves like the real
//! host: entering fullscreen fires `FullscreenEntered`, any exit (including
//! our own) fires `FullscreenExited`, and a leave confirmation knocks the
//! page out of fullscreen before the student's answer arrives (or after it,
//! with [`SimulatedBrowser::exiting_after_answer`]).

use contest_session::{
    ContestGateway, ExamPlatform, LockReason, ManualClock, MockGateway, PlatformError,
    SessionConfig, SessionController, SessionEvent, SessionHandle, SessionResult, SessionRuntime,
    SessionSnapshot,
};
use contest_types::{ContestId, QuestionId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Browser double.
#[derive(Default)]
pub struct SimulatedBrowser {
    handle: Mutex<Option<SessionHandle>>,
    /// What the student answers to "leave the test?".
    confirm_leave: bool,
    /// The dialog's fullscreen exit is reported after the answer.
    exit_after_answer: bool,
    history_guards: Mutex<usize>,
    prompts: Mutex<Vec<(u8, u8)>>,
    locked: Mutex<Vec<LockReason>>,
    navigations: Mutex<usize>,
}

impl SimulatedBrowser {
    pub fn answering_leave(confirm: bool) -> Self {
        Self {
            confirm_leave: confirm,
            ..Default::default()
        }
    }

    pub fn exiting_after_answer(mut self) -> Self {
        self.exit_after_answer = true;
        self
    }

    pub fn attach(&self, handle: SessionHandle) {
        *self.handle.lock() = Some(handle);
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(handle) = self.handle.lock().as_ref() {
            let _ = handle.try_dispatch(event);
        }
    }

    pub fn history_guards(&self) -> usize {
        *self.history_guards.lock()
    }

    pub fn prompts(&self) -> Vec<(u8, u8)> {
        self.prompts.lock().clone()
    }

    pub fn locked(&self) -> Vec<LockReason> {
        self.locked.lock().clone()
    }

    pub fn navigations(&self) -> usize {
        *self.navigations.lock()
    }
}

impl ExamPlatform for SimulatedBrowser {
    fn request_fullscreen(&self) -> Result<(), PlatformError> {
        self.emit(SessionEvent::FullscreenEntered);
        Ok(())
    }

    fn exit_fullscreen(&self) -> Result<(), PlatformError> {
        self.emit(SessionEvent::FullscreenExited);
        Ok(())
    }

    fn push_history_guard(&self) {
        *self.history_guards.lock() += 1;
    }

    fn request_leave_confirmation(&self) {
        let answer = SessionEvent::LeaveAnswered {
            confirmed: self.confirm_leave,
        };
        if self.exit_after_answer {
            self.emit(answer);
            self.emit(SessionEvent::FullscreenExited);
        } else {
            self.emit(SessionEvent::FullscreenExited);
            self.emit(answer);
        }
    }

    fn show_fullscreen_prompt(&self, violations: u8, remaining: u8) {
        self.prompts.lock().push((violations, remaining));
    }

    fn notify_locked(&self, reason: LockReason) {
        self.locked.lock().push(reason);
    }

    fn navigate_away(&self) {
        *self.navigations.lock() += 1;
    }
}

/// A running session wired to a simulated browser.
pub struct Harness<G: ContestGateway + 'static = MockGateway> {
    pub handle: SessionHandle,
    pub task: JoinHandle<SessionResult<()>>,
    pub gateway: Arc<G>,
    pub browser: Arc<SimulatedBrowser>,
    pub clock: Arc<ManualClock>,
}

/// Spawn a session for contest `c1`, question `q1`.
pub fn launch<G: ContestGateway + 'static>(gateway: G, browser: SimulatedBrowser) -> Harness<G> {
    let gateway = Arc::new(gateway);
    let browser = Arc::new(browser);
    let clock = Arc::new(ManualClock::default());

    let controller = SessionController::new(
        ContestId::new("c1"),
        QuestionId::new("q1"),
        gateway.clone(),
        browser.clone(),
        clock.clone(),
        SessionConfig::for_testing(),
    );
    let (runtime, handle) = SessionRuntime::new(controller);
    browser.attach(handle.clone());
    let task = tokio::spawn(runtime.run());

    Harness {
        handle,
        task,
        gateway,
        browser,
        clock,
    }
}

/// Wait until a published snapshot satisfies `pred`.
pub async fn wait_until(
    handle: &SessionHandle,
    pred: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut rx = handle.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(30), rx.wait_for(pred))
        .await
        .expect("timed out waiting for session state")
        .expect("session runtime stopped");
    *snapshot
}
