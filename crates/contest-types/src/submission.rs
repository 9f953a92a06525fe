//! # Submission Payloads
//!
//! Requests and verdicts for the run/submit endpoints.

use serde::{Deserialize, Serialize};

use crate::entities::{ContestId, QuestionId};

/// Whether an attempt is scored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionKind {
    /// Non-scoring execution against the sample tests.
    Run,
    /// Scoring execution against the full test set.
    Submit,
}

impl SubmissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionKind::Run => "run",
            SubmissionKind::Submit => "submit",
        }
    }
}

/// Body of a run request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub contest_id: ContestId,
    pub question_id: QuestionId,
    pub source: String,
    pub language: String,
    /// Persist this run as the student's visible baseline.
    pub save_run: bool,
}

/// Body of a submit request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub contest_id: ContestId,
    pub question_id: QuestionId,
    pub source: String,
    pub language: String,
}

/// Result of one test case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub index: u32,
    pub passed: bool,
    #[serde(default)]
    pub actual_output: Option<String>,
    #[serde(default)]
    pub runtime_ms: Option<u64>,
}

/// Execution outcome shared by run and submit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The source compiled and ran against the test cases.
    Executed { results: Vec<TestCaseResult> },
    /// The source did not compile.
    CompileError { message: String },
}

impl ExecutionOutcome {
    pub fn passed_count(&self) -> usize {
        match self {
            ExecutionOutcome::Executed { results } => results.iter().filter(|r| r.passed).count(),
            ExecutionOutcome::CompileError { .. } => 0,
        }
    }

    pub fn is_compile_error(&self) -> bool {
        matches!(self, ExecutionOutcome::CompileError { .. })
    }
}

/// Verdict of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunVerdict {
    pub outcome: ExecutionOutcome,
    /// Whether the server stored this run as the best run so far.
    #[serde(default)]
    pub saved: bool,
}

/// Verdict of a scored submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVerdict {
    pub outcome: ExecutionOutcome,
    #[serde(default)]
    pub marks_awarded: f64,
    #[serde(default)]
    pub max_marks: f64,
}

/// Verdict of either kind of attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Run(RunVerdict),
    Submit(SubmitVerdict),
}

impl Verdict {
    pub fn outcome(&self) -> &ExecutionOutcome {
        match self {
            Verdict::Run(v) => &v.outcome,
            Verdict::Submit(v) => &v.outcome,
        }
    }
}

/// One run/submit call and the verdict it produced.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmissionAttempt {
    pub kind: SubmissionKind,
    pub source: String,
    pub language: String,
    pub verdict: Verdict,
}
