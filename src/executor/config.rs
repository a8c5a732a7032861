// Executor configuration

use crate::env::{parse_env_var, parse_optional_env_var, string_env_var};
use crate::executor::error::ExecutorError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How approval-gated commands are decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalMode {
    /// Ask on the console
    #[default]
    Prompt,
    /// Approve everything that is not outright blocked
    Approve,
    /// Deny everything that needs approval
    Deny,
}

impl FromStr for ApprovalMode {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prompt" | "ask" => Ok(ApprovalMode::Prompt),
            "approve" | "yes" | "auto" => Ok(ApprovalMode::Approve),
            "deny" | "no" => Ok(ApprovalMode::Deny),
            other => Err(ExecutorError::InvalidApprovalMode(other.to_string())),
        }
    }
}

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Directory every command runs in and every code file is written to
    pub workspace_dir: PathBuf,
    /// Directory for the JSONL execution log
    pub logs_dir: PathBuf,
    /// Identifier recorded in log entries and approval prompts
    pub agent_name: String,
    /// Default wall-clock timeout
    pub timeout_secs: u64,
    /// Timeout for dependency installation
    pub install_timeout_secs: u64,
    /// Wait between SIGTERM and SIGKILL when cancelling a process group
    pub kill_grace_ms: u64,
    /// Maximum captured bytes per stream
    pub max_output_bytes: usize,
    /// Maximum retained history entries
    pub max_history: usize,
    /// Interpreter used for generated code
    pub interpreter: String,
    /// Extension forced onto generated code files
    pub code_extension: String,
    /// Package manager used by `install_package`
    pub package_manager: String,
    /// Shell path for command execution
    pub shell: String,
    pub approval_mode: ApprovalMode,
    /// `None` waits forever; otherwise expiry denies
    pub approval_timeout_secs: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("ai_workspace"),
            logs_dir: PathBuf::from("logs"),
            agent_name: String::from("ai_agent"),
            timeout_secs: 30,
            install_timeout_secs: 120,
            kill_grace_ms: 2000,
            max_output_bytes: 1048576, // 1MB
            max_history: 1000,
            interpreter: String::from("python3"),
            code_extension: String::from("py"),
            package_manager: String::from("pip"),
            shell: String::from("/bin/sh"),
            approval_mode: ApprovalMode::Prompt,
            approval_timeout_secs: None,
        }
    }
}

impl ExecutorConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let approval_mode = match std::env::var("EXECUTOR_APPROVAL") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Invalid EXECUTOR_APPROVAL, using prompt");
                ApprovalMode::Prompt
            }),
            Err(_) => defaults.approval_mode,
        };

        Self {
            workspace_dir: PathBuf::from(string_env_var("EXECUTOR_WORKSPACE_DIR", "ai_workspace")),
            logs_dir: PathBuf::from(string_env_var("EXECUTOR_LOG_DIR", "logs")),
            agent_name: string_env_var("EXECUTOR_AGENT_NAME", &defaults.agent_name),
            timeout_secs: parse_env_var("EXECUTOR_TIMEOUT_SECS", defaults.timeout_secs),
            install_timeout_secs: parse_env_var(
                "EXECUTOR_INSTALL_TIMEOUT_SECS",
                defaults.install_timeout_secs,
            ),
            kill_grace_ms: parse_env_var("EXECUTOR_KILL_GRACE_MS", defaults.kill_grace_ms),
            max_output_bytes: parse_env_var("EXECUTOR_MAX_OUTPUT_BYTES", defaults.max_output_bytes),
            max_history: parse_env_var("EXECUTOR_MAX_HISTORY", defaults.max_history),
            interpreter: string_env_var("EXECUTOR_INTERPRETER", &defaults.interpreter),
            code_extension: string_env_var("EXECUTOR_CODE_EXTENSION", &defaults.code_extension),
            package_manager: string_env_var("EXECUTOR_PACKAGE_MANAGER", &defaults.package_manager),
            shell: string_env_var("EXECUTOR_SHELL", &defaults.shell),
            approval_mode,
            approval_timeout_secs: parse_optional_env_var("EXECUTOR_APPROVAL_TIMEOUT_SECS"),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    /// Path of the JSONL execution log for this agent
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir
            .join(format!("{}_execution.log", self.agent_name))
    }
}
