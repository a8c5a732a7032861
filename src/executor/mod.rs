// Executor module - gated command and generated-code execution

pub mod approval;
pub mod config;
pub mod engine;
pub mod error;
pub mod journal;
pub mod process;
pub mod resources;
pub mod types;

pub use approval::{ApprovalChannel, ApprovalRequest, ConsoleApproval, PromptApproval, StaticApproval};
pub use config::{ApprovalMode, ExecutorConfig};
pub use engine::ExecutionEngine;
pub use error::{ExecutorError, Result};
pub use journal::{ExecutionJournal, FileJournal, JournalEntry, MemoryJournal};
pub use process::{LaunchSpec, ProcessHandle, ProcessLauncher, ProcessOutput, SystemLauncher};
pub use types::{ExecutionResult, ResourceUsage, exit_code};
