// Data types for Executor module

use crate::diagnose::ErrorCategory;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine-level exit codes. Always negative so they never collide with a
/// subprocess's own status.
pub mod exit_code {
    pub const SAFETY_BLOCKED: i32 = -1;
    pub const USER_DENIED: i32 = -2;
    pub const TIMEOUT: i32 = -3;
    pub const ENGINE_FAULT: i32 = -4;
    pub const WRITE_FAILED: i32 = -5;
}

/// Resources sampled when an execution finishes. Every field is best effort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    #[serde(default)]
    pub cpu_percent: Option<f64>,
    #[serde(default)]
    pub memory_mb: Option<f64>,
    #[serde(default)]
    pub num_threads: Option<u32>,
}

impl ResourceUsage {
    pub fn is_empty(&self) -> bool {
        self.cpu_percent.is_none() && self.memory_mb.is_none() && self.num_threads.is_none()
    }
}

/// Outcome of one execution attempt. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The literal invocation string
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub execution_time_secs: f64,
    /// `exit_code == 0`
    pub success: bool,
    /// Set only on failure
    #[serde(default)]
    pub error_category: Option<ErrorCategory>,
    #[serde(default)]
    pub suggested_fixes: Vec<String>,
    #[serde(default)]
    pub resource_usage: Option<ResourceUsage>,
    pub timestamp: DateTime<Local>,
}

impl ExecutionResult {
    /// Result of a process that ran to completion
    pub fn completed(
        command: impl Into<String>,
        stdout: String,
        stderr: String,
        exit_code: i32,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            stdout,
            stderr,
            exit_code,
            execution_time_secs: elapsed.as_secs_f64(),
            success: exit_code == 0,
            error_category: None,
            suggested_fixes: Vec::new(),
            resource_usage: None,
            timestamp: Local::now(),
        }
    }

    /// Result the engine produced without a normal process exit
    pub fn engine_failure(
        command: impl Into<String>,
        exit_code: i32,
        category: ErrorCategory,
        stderr: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
            execution_time_secs: elapsed.as_secs_f64(),
            success: false,
            error_category: Some(category),
            suggested_fixes: Vec::new(),
            resource_usage: None,
            timestamp: Local::now(),
        }
    }

    pub fn with_diagnosis(mut self, category: ErrorCategory, fixes: Vec<String>) -> Self {
        if !self.success {
            self.error_category = Some(category);
            self.suggested_fixes = fixes;
        }
        self
    }

    pub fn with_resource_usage(mut self, usage: Option<ResourceUsage>) -> Self {
        self.resource_usage = usage.filter(|u| !u.is_empty());
        self
    }
}
