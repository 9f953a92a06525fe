//! Driving Ports (API - Inbound)

use async_trait::async_trait;
use contest_types::SubmitVerdict;

use crate::application::RunOutcome;
use crate::domain::{FinalizeOutcome, LockState};
use crate::error::SessionResult;

/// Editor surface API
///
/// The code editor consumes this to enable or disable run/submit and to
/// render the "violations n/3" badge. Every call is serialized through the
/// session owner, so none of them can overlap a platform event handler.
#[async_trait]
pub trait EditorSurfaceApi: Send + Sync {
    /// Current lock predicate.
    fn lock_state(&self) -> LockState;

    /// Fullscreen strikes recorded so far.
    fn violations(&self) -> u8;

    /// Strike cap.
    fn max_violations(&self) -> u8;

    /// Student clicked "enter fullscreen".
    async fn on_request_fullscreen(&self) -> SessionResult<()>;

    /// Non-scoring run against the sample tests.
    async fn on_run(&self, source: String, language: String) -> SessionResult<RunOutcome>;

    /// Scored submission.
    async fn on_submit(&self, source: String, language: String) -> SessionResult<SubmitVerdict>;

    /// Back-navigation intercepted by the history guard.
    async fn on_back_pressed(&self) -> SessionResult<()>;

    /// Student pressed "finish test".
    async fn on_finish(&self) -> SessionResult<FinalizeOutcome>;
}
