use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed outcome set for a single test case, group, or (via aggregation) a
/// whole submission. Replaces the loose result strings the original draft
/// used with a type the compiler can exhaustively match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Verdict {
    Correct,
    PartiallyCorrect,
    Incorrect,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    JudgeError,
    Skipped,
}

impl Verdict {
    /// A group only counts a dependency as satisfied if it scored above zero
    /// AND the test itself passed (fully or partially).
    pub fn is_passing(self) -> bool {
        matches!(self, Verdict::Correct | Verdict::PartiallyCorrect)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Correct => "Correct",
            Verdict::PartiallyCorrect => "Partially Correct",
            Verdict::Incorrect => "Incorrect",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::MemoryLimitExceeded => "Memory Limit Exceeded",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::JudgeError => "Judge Error",
            Verdict::Skipped => "Skipped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerTestResult {
    pub verdict: Verdict,
    pub score: String,
    pub time_ms: i64,
    pub memory_kb: i64,
    pub message: String,
}

impl PerTestResult {
    pub fn skipped() -> Self {
        PerTestResult {
            verdict: Verdict::Skipped,
            score: "0".to_string(),
            time_ms: 0,
            memory_kb: 0,
            message: String::new(),
        }
    }

    pub fn judge_error(message: &str) -> Self {
        PerTestResult {
            verdict: Verdict::JudgeError,
            score: "0".to_string(),
            time_ms: 0,
            memory_kb: 0,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerGroupResult {
    pub score: f64,
    pub full_score: f64,
    pub test_results: Vec<PerTestResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub compile_successful: bool,
    pub grouped_successful: bool,
    pub score: f64,
    pub groups: Vec<PerGroupResult>,
}

impl SubmissionResult {
    pub fn compile_failed() -> Self {
        SubmissionResult {
            compile_successful: false,
            grouped_successful: false,
            score: 0.0,
            groups: Vec::new(),
        }
    }
}

/// An intake submission, decoded from the `POST /submit` body.
#[derive(Debug, Clone)]
pub struct Submission {
    pub submission_id: String,
    pub task_id: String,
    pub language_id: String,
    pub source: Vec<String>,
}
