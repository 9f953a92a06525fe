//! Events consumed by the session owner.

use contest_types::SubmitVerdict;
use tokio::sync::oneshot;

use crate::application::RunOutcome;
use crate::domain::FinalizeOutcome;
use crate::error::SessionResult;

/// Platform and timer events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The document entered fullscreen.
    FullscreenEntered,
    /// The document left fullscreen (Esc, alt-tab, dialog, or programmatic).
    FullscreenExited,
    /// The history guard intercepted a back-navigation.
    BackPressed,
    /// The student answered the leave confirmation.
    LeaveAnswered { confirmed: bool },
    /// The deadline monitor saw the contest window close.
    TimedOut,
    /// The page is being torn down.
    Teardown,
}

impl SessionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEvent::FullscreenEntered => "fullscreen_entered",
            SessionEvent::FullscreenExited => "fullscreen_exited",
            SessionEvent::BackPressed => "back_pressed",
            SessionEvent::LeaveAnswered { .. } => "leave_answered",
            SessionEvent::TimedOut => "timed_out",
            SessionEvent::Teardown => "teardown",
        }
    }
}

/// Editor commands, each carrying its reply channel.
#[derive(Debug)]
pub enum EditorCommand {
    RequestFullscreen {
        reply: oneshot::Sender<SessionResult<()>>,
    },
    Run {
        source: String,
        language: String,
        reply: oneshot::Sender<SessionResult<RunOutcome>>,
    },
    Submit {
        source: String,
        language: String,
        reply: oneshot::Sender<SessionResult<SubmitVerdict>>,
    },
    Finish {
        reply: oneshot::Sender<SessionResult<FinalizeOutcome>>,
    },
}
