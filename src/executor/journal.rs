// Execution journal - append-only JSON lines, one per attempt and result

use crate::executor::types::ExecutionResult;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// One journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalEntry {
    ExecutionAttempt {
        timestamp: DateTime<Local>,
        agent: String,
        command: String,
        context: String,
    },
    ExecutionResult {
        timestamp: DateTime<Local>,
        agent: String,
        command: String,
        success: bool,
        exit_code: i32,
        execution_time: f64,
        error_type: Option<String>,
    },
}

impl JournalEntry {
    pub fn attempt(agent: &str, command: &str, context: &str) -> Self {
        JournalEntry::ExecutionAttempt {
            timestamp: Local::now(),
            agent: agent.to_string(),
            command: command.to_string(),
            context: context.to_string(),
        }
    }

    pub fn result(agent: &str, result: &ExecutionResult) -> Self {
        JournalEntry::ExecutionResult {
            timestamp: result.timestamp,
            agent: agent.to_string(),
            command: result.command.clone(),
            success: result.success,
            exit_code: result.exit_code,
            execution_time: result.execution_time_secs,
            error_type: result.error_category.map(|c| c.as_str().to_string()),
        }
    }
}

/// Sink for journal entries. Recording never fails the execution.
pub trait ExecutionJournal: Send + Sync {
    fn record(&self, entry: &JournalEntry);
}

/// Appends JSON lines to a file
#[derive(Debug, Clone)]
pub struct FileJournal {
    path: PathBuf,
}

impl FileJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &JournalEntry) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

impl ExecutionJournal for FileJournal {
    fn record(&self, entry: &JournalEntry) {
        if let Err(e) = self.append(entry) {
            warn!(path = %self.path.display(), error = %e, "failed to write journal entry");
        }
    }
}

/// Keeps entries in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    entries: Arc<RwLock<Vec<JournalEntry>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl ExecutionJournal for MemoryJournal {
    fn record(&self, entry: &JournalEntry) {
        if let Ok(mut entries) = self.entries.write() {
            entries.push(entry.clone());
        }
    }
}
