//! # Session Configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::domain::MAX_VIOLATIONS;

/// Attempt session configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Fullscreen losses tolerated before the attempt is force-finalized.
    pub max_violations: u8,

    /// Deadline monitor cadence in milliseconds.
    pub deadline_poll_interval_ms: u64,

    /// Capacity of the platform event and editor command channels.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_violations: MAX_VIOLATIONS,
            deadline_poll_interval_ms: 1_000,
            event_buffer: 64,
        }
    }
}

impl SessionConfig {
    /// Create a config for testing (smaller values).
    pub fn for_testing() -> Self {
        Self {
            max_violations: MAX_VIOLATIONS,
            deadline_poll_interval_ms: 100,
            event_buffer: 16,
        }
    }

    /// Read overrides from the environment, falling back to defaults.
    ///
    /// - `CONTEST_MAX_VIOLATIONS` (at least 1)
    /// - `CONTEST_DEADLINE_POLL_MS` (at least 10)
    /// - `CONTEST_EVENT_BUFFER` (at least 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_violations: env::var("CONTEST_MAX_VIOLATIONS")
                .ok()
                .and_then(|v| v.parse::<u8>().ok())
                .map(|v| v.max(1))
                .unwrap_or(defaults.max_violations),
            deadline_poll_interval_ms: env::var("CONTEST_DEADLINE_POLL_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(|v| v.max(10))
                .unwrap_or(defaults.deadline_poll_interval_ms),
            event_buffer: env::var("CONTEST_EVENT_BUFFER")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .map(|v| v.max(1))
                .unwrap_or(defaults.event_buffer),
        }
    }

    /// Deadline monitor cadence.
    pub fn deadline_poll_interval(&self) -> Duration {
        Duration::from_millis(self.deadline_poll_interval_ms)
    }
}
