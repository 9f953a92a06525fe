//! Error types for the attempt session

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::BracketError;
use crate::ports::outbound::GatewayError;

/// Attempt session errors.
///
/// None of these is fatal: every variant leaves the session either locked or
/// retryable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Run/submit attempted while the session is locked. No network call made.
    #[error("Session is locked; run and submit are disabled")]
    SessionLocked,

    /// Source failed the bracket check. No network call made.
    #[error("Unbalanced source: {0}")]
    UnbalancedSource(#[from] BracketError),

    /// Language not offered by this contest. No network call made.
    #[error("Language {language} is not allowed in this contest")]
    UnsupportedLanguage { language: String },

    /// Blank source. No network call made.
    #[error("Source is empty")]
    EmptySource,

    /// Gateway call failed. Retry by invoking again.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The server reports the attempt as closed.
    #[error("Contest attempt already finalized")]
    AlreadyFinalized,

    /// The contest window has not opened yet.
    #[error("Contest has not started; starts at {starts_at}")]
    ContestNotStarted { starts_at: DateTime<Utc> },

    /// Metadata has not been loaded yet.
    #[error("Session metadata not loaded")]
    NotLoaded,

    /// The platform refused a fullscreen request.
    #[error("Fullscreen unavailable: {0}")]
    FullscreenUnavailable(String),

    /// The session runtime has stopped.
    #[error("Session runtime closed")]
    SessionClosed,

    /// The event queue was full and the event was not delivered.
    #[error("Session event queue full; {event} dropped")]
    EventQueueFull { event: &'static str },
}

impl SessionError {
    /// Errors the editor should absorb without a loud message.
    pub fn is_quiet(&self) -> bool {
        matches!(self, SessionError::AlreadyFinalized)
    }

    /// Errors the student may retry by re-invoking the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::NetworkFailure(_))
    }

    /// Whether the failure was decided locally, before any network call.
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self,
            SessionError::SessionLocked
                | SessionError::UnbalancedSource(_)
                | SessionError::UnsupportedLanguage { .. }
                | SessionError::EmptySource
                | SessionError::NotLoaded
        )
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SessionError::SessionLocked => "session_locked",
            SessionError::UnbalancedSource(_) => "unbalanced_source",
            SessionError::UnsupportedLanguage { .. } => "unsupported_language",
            SessionError::EmptySource => "empty_source",
            SessionError::NetworkFailure(_) => "network_failure",
            SessionError::AlreadyFinalized => "already_finalized",
            SessionError::ContestNotStarted { .. } => "contest_not_started",
            SessionError::NotLoaded => "not_loaded",
            SessionError::FullscreenUnavailable(_) => "fullscreen_unavailable",
            SessionError::SessionClosed => "session_closed",
            SessionError::EventQueueFull { .. } => "event_queue_full",
        }
    }
}

impl From<GatewayError> for SessionError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::AlreadyFinalized => SessionError::AlreadyFinalized,
            other => SessionError::NetworkFailure(other.to_string()),
        }
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
