use crate::selector::SelectorCandidate;
use serde::{Deserialize, Serialize};

/// Outcome of attempting one recorded step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_index: usize,
    pub action: String,
    pub succeeded: bool,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_used: Option<SelectorCandidate>,
    pub attempts_made: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StepResult {
    pub fn success(step_index: usize, action: &str, attempts_made: u32) -> Self {
        Self {
            step_index,
            action: action.to_string(),
            succeeded: true,
            skipped: false,
            selector_used: None,
            attempts_made,
            error_message: None,
        }
    }

    pub fn skipped(step_index: usize, action: &str) -> Self {
        Self {
            skipped: true,
            ..Self::success(step_index, action, 0)
        }
    }

    pub fn failure(
        step_index: usize,
        action: &str,
        attempts_made: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            step_index,
            action: action.to_string(),
            succeeded: false,
            skipped: false,
            selector_used: None,
            attempts_made,
            error_message: Some(message.into()),
        }
    }

    pub fn with_selector(mut self, candidate: SelectorCandidate) -> Self {
        self.selector_used = Some(candidate);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Aggregate state of one replay session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRun {
    pub status: RunStatus,
    pub current_step_index: usize,
    pub results: Vec<StepResult>,
    /// The run verdict. True on the first unrecoverable step or on cancellation.
    pub failed: bool,
}

impl Default for ReplayRun {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayRun {
    pub fn new() -> Self {
        Self {
            status: RunStatus::Idle,
            current_step_index: 0,
            results: Vec::new(),
            failed: false,
        }
    }

    pub fn failed_step(&self) -> Option<&StepResult> {
        self.results.iter().find(|r| !r.succeeded)
    }

    pub fn succeeded_count(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.results.iter().filter(|r| r.skipped).count()
    }
}
