// Agent types

use crate::executor::ExecutionResult;
use serde::Serialize;
use uuid::Uuid;

/// Input to one code-generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRequest {
    /// Plan produced once per run, never modified
    pub plan: String,
    pub task: String,
    /// Most recent failures joined by newlines, absent on the first iteration
    pub prior_errors: Option<String>,
}

/// Where a development run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Planning,
    Generating,
    Executing,
    Repairing,
    RetryExecuting,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Planning => "PLANNING",
            Phase::Generating => "GENERATING",
            Phase::Executing => "EXECUTING",
            Phase::Repairing => "REPAIRING",
            Phase::RetryExecuting => "RETRY_EXECUTING",
            Phase::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    PlanningFailed(String),
    GenerationFailed(String),
    Exhausted,
}

/// Final report of a development run
#[derive(Debug, Clone, Serialize)]
pub struct AutonomousResult {
    pub run_id: Uuid,
    pub task: String,
    pub success: bool,
    pub outcome: RunOutcome,
    pub plan: String,
    /// Last generated code; empty when generation never succeeded
    pub final_code: String,
    /// Every code execution in order, repair retries included
    pub execution_results: Vec<ExecutionResult>,
    /// Generation iterations started
    pub iterations: u32,
    /// Stdout of the successful execution, or a failure message
    pub final_output: String,
    pub errors_encountered: Vec<String>,
    pub packages_installed: Vec<String>,
}

impl AutonomousResult {
    pub(crate) fn new(run_id: Uuid, task: &str) -> Self {
        Self {
            run_id,
            task: task.to_string(),
            success: false,
            outcome: RunOutcome::Exhausted,
            plan: String::new(),
            final_code: String::new(),
            execution_results: Vec::new(),
            iterations: 0,
            final_output: String::new(),
            errors_encountered: Vec::new(),
            packages_installed: Vec::new(),
        }
    }

    pub(crate) fn succeed(mut self, stdout: String) -> Self {
        self.success = true;
        self.outcome = RunOutcome::Succeeded;
        self.final_output = stdout;
        self
    }

    pub(crate) fn fail(mut self, outcome: RunOutcome, message: impl Into<String>) -> Self {
        self.success = false;
        self.outcome = outcome;
        self.final_output = message.into();
        self
    }

    /// Human-readable multi-line report
    pub fn summary(&self) -> String {
        let status = match &self.outcome {
            RunOutcome::Succeeded => "SUCCESS".to_string(),
            RunOutcome::PlanningFailed(reason) => format!("FAILED (planning: {})", reason),
            RunOutcome::GenerationFailed(reason) => format!("FAILED (generation: {})", reason),
            RunOutcome::Exhausted => "FAILED (iterations exhausted)".to_string(),
        };

        let mut lines = vec![
            format!("Run {}: {}", self.run_id, status),
            format!("Task: {}", self.task),
            format!(
                "Iterations: {}, executions: {}, errors: {}",
                self.iterations,
                self.execution_results.len(),
                self.errors_encountered.len()
            ),
        ];
        if !self.packages_installed.is_empty() {
            lines.push(format!("Packages installed: {}", self.packages_installed.join(", ")));
        }
        if !self.success
            && let Some(category) = self
                .execution_results
                .last()
                .and_then(|last| last.error_category)
        {
            let origin = if category.is_engine_level() {
                "stopped by the engine"
            } else {
                "raised by the code"
            };
            lines.push(format!("Last failure: {} ({})", category, origin));
        }
        if !self.final_output.is_empty() {
            lines.push(format!("Output:\n{}", self.final_output.trim_end()));
        }
        lines.join("\n")
    }
}
