// Error taxonomy shared by the diagnoser and the execution engine

use serde::{Deserialize, Serialize};

/// Coarse classification of a failed execution.
///
/// The first five variants are produced by the engine itself and never by
/// inspecting stderr; the rest come from [`super::ErrorDiagnoser::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Blocked by the safety gate, no process spawned
    SafetyViolation,
    /// Human approval was refused
    UserDenied,
    /// Wall-clock timeout, process group terminated
    Timeout,
    /// Unexpected engine fault (spawn failure, I/O)
    ExecutionError,
    /// Generated code could not be written to the workspace
    PythonExecutionError,
    MissingModule,
    SyntaxError,
    IndentationError,
    NameError,
    TypeError,
    ValueError,
    FileNotFound,
    PermissionError,
    UnknownError,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::SafetyViolation => "SAFETY_VIOLATION",
            ErrorCategory::UserDenied => "USER_DENIED",
            ErrorCategory::Timeout => "TIMEOUT",
            ErrorCategory::ExecutionError => "EXECUTION_ERROR",
            ErrorCategory::PythonExecutionError => "PYTHON_EXECUTION_ERROR",
            ErrorCategory::MissingModule => "MISSING_MODULE",
            ErrorCategory::SyntaxError => "SYNTAX_ERROR",
            ErrorCategory::IndentationError => "INDENTATION_ERROR",
            ErrorCategory::NameError => "NAME_ERROR",
            ErrorCategory::TypeError => "TYPE_ERROR",
            ErrorCategory::ValueError => "VALUE_ERROR",
            ErrorCategory::FileNotFound => "FILE_NOT_FOUND",
            ErrorCategory::PermissionError => "PERMISSION_ERROR",
            ErrorCategory::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Whether the category was assigned by the engine rather than derived from stderr.
    pub fn is_engine_level(&self) -> bool {
        matches!(
            self,
            ErrorCategory::SafetyViolation
                | ErrorCategory::UserDenied
                | ErrorCategory::Timeout
                | ErrorCategory::ExecutionError
                | ErrorCategory::PythonExecutionError
        )
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
