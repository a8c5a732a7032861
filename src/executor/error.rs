// Error types for Executor module

use thiserror::Error;

/// Internal executor failures. Never surfaced from `execute*`; the engine
/// folds them into an `ExecutionResult` with a sentinel exit code.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Failed to create workspace '{0}': {1}")]
    WorkspaceCreate(String, std::io::Error),

    #[error("Failed to spawn '{0}': {1}")]
    SpawnFailed(String, std::io::Error),

    #[error("Failed to capture output of '{0}': {1}")]
    OutputCaptureFailed(String, String),

    #[error("Invalid code filename '{0}': {1}")]
    InvalidFilename(String, &'static str),

    #[error("Invalid approval mode: {0}")]
    InvalidApprovalMode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
