//! # Entities
//!
//! Contest and question metadata as served by the contest endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque contest identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContestId(pub String);

impl ContestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque question identifier, scoped to a contest.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contest-level metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestMetadata {
    /// Start of the scoring window.
    pub start_time: DateTime<Utc>,
    /// End of the scoring window.
    pub end_time: DateTime<Utc>,
    /// Whether the student's attempt was already closed server-side.
    #[serde(default)]
    pub finalized: bool,
    /// Languages the editor may submit in (e.g. `python`, `cpp`).
    #[serde(default)]
    pub allowed_languages: Vec<String>,
}

impl ContestMetadata {
    /// Whether `language` may be used. An empty list allows everything.
    pub fn allows_language(&self, language: &str) -> bool {
        self.allowed_languages.is_empty()
            || self
                .allowed_languages
                .iter()
                .any(|l| l.eq_ignore_ascii_case(language))
    }

    /// Whether the scoring window has closed at `now`.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    /// Whether the scoring window has not opened yet at `now`.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        now < self.start_time
    }
}

/// A visible sample test case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSample {
    pub input: String,
    pub expected_output: String,
}

/// The student's stored attempt for a question, if any.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorSubmission {
    pub source: String,
    pub language: String,
    /// Marks recorded for this attempt (zero for a saved run).
    #[serde(default)]
    pub marks: f64,
    pub submitted_at: DateTime<Utc>,
}

/// Execution limits for a question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub time_limit_ms: u64,
    pub memory_limit_kb: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            time_limit_ms: 2_000,
            memory_limit_kb: 262_144,
        }
    }
}

/// Question-level metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionMetadata {
    #[serde(default)]
    pub test_samples: Vec<TestSample>,
    #[serde(default)]
    pub prior_submission: Option<PriorSubmission>,
    #[serde(default)]
    pub limits: Limits,
}
