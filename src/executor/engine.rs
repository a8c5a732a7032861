// ExecutionEngine - gated, sandboxed-by-workspace command execution

use crate::diagnose::{ErrorCategory, ErrorDiagnoser};
use crate::executor::approval::{
    ApprovalChannel, ApprovalRequest, ConsoleApproval, StaticApproval,
};
use crate::executor::config::{ApprovalMode, ExecutorConfig};
use crate::executor::error::{ExecutorError, Result};
use crate::executor::journal::{ExecutionJournal, FileJournal, JournalEntry};
use crate::executor::process::{LaunchSpec, ProcessLauncher, SystemLauncher};
use crate::executor::resources;
use crate::executor::types::{ExecutionResult, exit_code};
use crate::safety::{SafetyGate, SafetyVerdict};
use chrono::Local;
use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Runs commands and generated code inside one workspace directory.
///
/// Mutating operations take `&mut self`; share an engine behind a
/// `tokio::sync::Mutex` if more than one task needs it.
pub struct ExecutionEngine {
    config: ExecutorConfig,
    workspace: PathBuf,
    gate: SafetyGate,
    diagnoser: ErrorDiagnoser,
    launcher: Box<dyn ProcessLauncher>,
    approval: Box<dyn ApprovalChannel>,
    journal: Box<dyn ExecutionJournal>,
    history: VecDeque<ExecutionResult>,
}

impl ExecutionEngine {
    /// Create the workspace if needed and wire the default collaborators
    /// named by `config`.
    pub fn new(config: ExecutorConfig, gate: SafetyGate) -> Result<Self> {
        std::fs::create_dir_all(&config.workspace_dir).map_err(|e| {
            ExecutorError::WorkspaceCreate(config.workspace_dir.display().to_string(), e)
        })?;
        let workspace = config
            .workspace_dir
            .canonicalize()
            .unwrap_or_else(|_| config.workspace_dir.clone());

        let approval: Box<dyn ApprovalChannel> = match config.approval_mode {
            ApprovalMode::Prompt => Box::new(ConsoleApproval::console(
                config.approval_timeout_secs.map(Duration::from_secs),
            )),
            ApprovalMode::Approve => Box::new(StaticApproval::approve()),
            ApprovalMode::Deny => Box::new(StaticApproval::deny()),
        };
        let journal = FileJournal::new(config.log_file());

        info!(
            agent = %config.agent_name,
            workspace = %workspace.display(),
            log_file = %journal.path().display(),
            approval = ?config.approval_mode,
            "execution engine initialized"
        );

        Ok(Self {
            diagnoser: ErrorDiagnoser::new(config.package_manager.clone()),
            workspace,
            gate,
            launcher: Box::new(SystemLauncher),
            approval,
            journal: Box::new(journal),
            history: VecDeque::new(),
            config,
        })
    }

    pub fn with_launcher(mut self, launcher: impl ProcessLauncher + 'static) -> Self {
        self.launcher = Box::new(launcher);
        self
    }

    pub fn with_approval(mut self, approval: impl ApprovalChannel + 'static) -> Self {
        self.approval = Box::new(approval);
        self
    }

    pub fn with_journal(mut self, journal: impl ExecutionJournal + 'static) -> Self {
        self.journal = Box::new(journal);
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn gate(&self) -> &SafetyGate {
        &self.gate
    }

    pub fn diagnoser(&self) -> &ErrorDiagnoser {
        &self.diagnoser
    }

    /// Oldest first
    pub fn history(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn last_result(&self) -> Option<&ExecutionResult> {
        self.history.back()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Classify, gate, run and diagnose one shell command. Every outcome,
    /// including blocks, denials and timeouts, comes back as a result.
    pub async fn execute(
        &mut self,
        command: &str,
        context: &str,
        timeout: Option<Duration>,
    ) -> ExecutionResult {
        let timeout = timeout.unwrap_or_else(|| self.config.default_timeout());
        let started = Instant::now();

        self.journal
            .record(&JournalEntry::attempt(&self.config.agent_name, command, context));

        let verdict = self.gate.classify(command, context);
        debug!(
            command = %command,
            risk = %verdict.risk_level,
            allowed = verdict.allowed,
            requires_approval = verdict.requires_approval,
            "safety verdict"
        );

        let result = if verdict.is_blocked() {
            warn!(command = %command, reason = %verdict.reason, "command blocked by safety gate");
            self.blocked_result(command, &verdict, started.elapsed())
        } else if verdict.requires_approval && !self.request_approval(command, &verdict).await {
            let category = ErrorCategory::UserDenied;
            ExecutionResult::engine_failure(
                command,
                exit_code::USER_DENIED,
                category,
                "Command execution denied by user",
                started.elapsed(),
            )
            .with_diagnosis(category, self.diagnoser.fixes_for(category))
        } else {
            self.run_process(command, timeout, started).await
        };

        self.finish(result)
    }

    /// Write `code` into the workspace and run it with the configured
    /// interpreter. A write failure yields `-5` without running anything.
    pub async fn execute_python_code(
        &mut self,
        code: &str,
        filename: Option<&str>,
        timeout: Option<Duration>,
    ) -> ExecutionResult {
        let filename = match filename {
            Some(name) => self.code_filename(name),
            None => Ok(format!(
                "auto_generated_{}.{}",
                Local::now().format("%Y%m%d_%H%M%S_%3f"),
                self.config.code_extension
            )),
        };

        let written = match filename {
            Ok(name) => write_code_file(&self.workspace.join(&name), code)
                .await
                .map(|()| name),
            Err(e) => Err(e),
        };

        match written {
            Ok(name) => {
                let command = format!("{} {}", self.config.interpreter, shell_quote(&name));
                let context = format!("Executing generated code: {}", name);
                self.execute(&command, &context, timeout).await
            }
            Err(e) => {
                error!(error = %e, "failed to write code file");
                let category = ErrorCategory::PythonExecutionError;
                let result = ExecutionResult::engine_failure(
                    format!("{} <unwritten>", self.config.interpreter),
                    exit_code::WRITE_FAILED,
                    category,
                    format!("Failed to write code file: {}", e),
                    Duration::ZERO,
                )
                .with_diagnosis(category, self.diagnoser.fixes_for(category));
                self.finish(result)
            }
        }
    }

    /// Install a dependency through the ordinary gated command path
    pub async fn install_package(&mut self, name: &str, version: Option<&str>) -> ExecutionResult {
        let spec = match version {
            Some(v) => format!("{}=={}", name, v),
            None => name.to_string(),
        };
        let command = format!("{} install {}", self.config.package_manager, spec);
        let context = match version {
            Some(v) => format!("Installing package: {} (version {})", name, v),
            None => format!("Installing package: {}", name),
        };
        info!(package = %name, version = ?version, "installing package");

        let timeout = self.config.install_timeout();
        self.execute(&command, &context, Some(timeout)).await
    }

    fn blocked_result(
        &self,
        command: &str,
        verdict: &SafetyVerdict,
        elapsed: Duration,
    ) -> ExecutionResult {
        let category = ErrorCategory::SafetyViolation;
        let mut fixes: Vec<String> = verdict.suggested_alternative.iter().cloned().collect();
        fixes.extend(self.diagnoser.fixes_for(category));

        ExecutionResult::engine_failure(
            command,
            exit_code::SAFETY_BLOCKED,
            category,
            format!("Command blocked by safety controls: {}", verdict.reason),
            elapsed,
        )
        .with_diagnosis(category, fixes)
    }

    async fn request_approval(&mut self, command: &str, verdict: &SafetyVerdict) -> bool {
        let request = ApprovalRequest {
            command: command.to_string(),
            reason: verdict.reason.clone(),
            risk_level: verdict.risk_level,
            agent: self.config.agent_name.clone(),
            workspace: self.workspace.clone(),
        };
        let approved = self.approval.request(&request).await;
        info!(command = %command, approved, "approval decision");
        approved
    }

    async fn run_process(
        &mut self,
        command: &str,
        timeout: Duration,
        started: Instant,
    ) -> ExecutionResult {
        let spec = LaunchSpec {
            shell: self.config.shell.clone(),
            command: command.to_string(),
            working_dir: self.workspace.clone(),
            max_output_bytes: self.config.max_output_bytes,
            kill_grace: self.config.kill_grace(),
        };

        let before = resources::snapshot();
        let mut handle = match self.launcher.launch(&spec) {
            Ok(handle) => handle,
            Err(e) => {
                let err = ExecutorError::SpawnFailed(command.to_string(), e);
                error!(error = %err, "spawn failed");
                return self.fault_result(command, &err, started.elapsed());
            }
        };
        debug!(pid = ?handle.id(), command = %command, "command spawned");

        match tokio::time::timeout(timeout, handle.wait()).await {
            Ok(Ok(output)) => {
                let elapsed = started.elapsed();
                let mut result = ExecutionResult::completed(
                    command,
                    output.stdout,
                    output.stderr,
                    output.exit_code,
                    elapsed,
                );
                if !result.success {
                    let category = self.diagnoser.classify(&result.stderr);
                    let fixes = self.diagnoser.suggest_fixes(&result.stderr, command);
                    result = result.with_diagnosis(category, fixes);
                }
                result.with_resource_usage(resources::usage_since(before, elapsed))
            }
            Ok(Err(e)) => {
                if let Err(kill_err) = handle.terminate().await {
                    warn!(error = %kill_err, "failed to terminate after capture error");
                }
                let err = ExecutorError::OutputCaptureFailed(command.to_string(), e.to_string());
                error!(error = %err, "output capture failed");
                self.fault_result(command, &err, started.elapsed())
            }
            Err(_) => {
                warn!(
                    command = %command,
                    timeout_secs = timeout.as_secs_f64(),
                    "command timed out, terminating process group"
                );
                if let Err(e) = handle.terminate().await {
                    error!(error = %e, "failed to terminate timed out process group");
                }
                let category = ErrorCategory::Timeout;
                ExecutionResult::engine_failure(
                    command,
                    exit_code::TIMEOUT,
                    category,
                    format!("Command timed out after {} seconds", timeout.as_secs_f64()),
                    started.elapsed(),
                )
                .with_diagnosis(category, self.diagnoser.fixes_for(category))
            }
        }
    }

    fn fault_result(&self, command: &str, err: &ExecutorError, elapsed: Duration) -> ExecutionResult {
        let category = ErrorCategory::ExecutionError;
        ExecutionResult::engine_failure(
            command,
            exit_code::ENGINE_FAULT,
            category,
            format!("Execution error: {}", err),
            elapsed,
        )
        .with_diagnosis(category, self.diagnoser.fixes_for(category))
    }

    /// Journal, retain and return a finished result
    fn finish(&mut self, result: ExecutionResult) -> ExecutionResult {
        self.journal
            .record(&JournalEntry::result(&self.config.agent_name, &result));

        info!(
            command = %result.command.chars().take(100).collect::<String>(),
            exit_code = result.exit_code,
            success = result.success,
            duration_ms = (result.execution_time_secs * 1000.0) as u64,
            error_type = ?result.error_category,
            "execution finished"
        );

        if self.config.max_history > 0 {
            while self.history.len() >= self.config.max_history {
                self.history.pop_front();
            }
            self.history.push_back(result.clone());
        }
        result
    }

    /// Validate a caller-supplied name and force the code extension
    fn code_filename(&self, name: &str) -> Result<String> {
        let path = Path::new(name);
        if name.trim().is_empty() {
            return Err(ExecutorError::InvalidFilename(name.to_string(), "empty name"));
        }
        if path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ExecutorError::InvalidFilename(
                name.to_string(),
                "must be a relative path inside the workspace",
            ));
        }
        let extension = &self.config.code_extension;
        if path.extension().is_some_and(|ext| ext == extension.as_str()) {
            Ok(name.to_string())
        } else {
            Ok(format!("{}.{}", name, extension))
        }
    }

}

async fn write_code_file(path: &Path, code: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, code).await?;
    debug!(path = %path.display(), bytes = code.len(), "code file written");
    Ok(())
}

/// Quote a word for `sh -c` only when it needs it
fn shell_quote(word: &str) -> String {
    let plain = word
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'));
    if plain && !word.is_empty() {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::approval::StaticApproval;
    use crate::executor::journal::MemoryJournal;
    use crate::executor::process::{ProcessHandle, ProcessOutput};
    use async_trait::async_trait;
    use std::io;
    use std::sync::{Arc, RwLock};

    /// Scripted launcher: records every spec, hands out canned handles
    #[derive(Clone, Default)]
    struct FakeLauncher {
        launched: Arc<RwLock<Vec<LaunchSpec>>>,
        terminated: Arc<RwLock<u32>>,
        output: ProcessOutput,
        hang: bool,
    }

    impl FakeLauncher {
        fn exiting(exit_code: i32, stdout: &str, stderr: &str) -> Self {
            Self {
                output: ProcessOutput {
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                    exit_code,
                },
                ..Default::default()
            }
        }

        fn hanging() -> Self {
            Self {
                hang: true,
                ..Default::default()
            }
        }

        fn launch_count(&self) -> usize {
            self.launched.read().unwrap().len()
        }
    }

    struct FakeHandle {
        output: ProcessOutput,
        hang: bool,
        terminated: Arc<RwLock<u32>>,
    }

    #[async_trait]
    impl ProcessHandle for FakeHandle {
        fn id(&self) -> Option<u32> {
            Some(4242)
        }

        async fn wait(&mut self) -> io::Result<ProcessOutput> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            Ok(self.output.clone())
        }

        async fn terminate(&mut self) -> io::Result<()> {
            *self.terminated.write().unwrap() += 1;
            Ok(())
        }
    }

    impl ProcessLauncher for FakeLauncher {
        fn launch(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ProcessHandle>> {
            self.launched.write().unwrap().push(spec.clone());
            Ok(Box::new(FakeHandle {
                output: self.output.clone(),
                hang: self.hang,
                terminated: self.terminated.clone(),
            }))
        }
    }

    fn engine(dir: &Path, launcher: FakeLauncher) -> (ExecutionEngine, MemoryJournal) {
        let config = ExecutorConfig {
            workspace_dir: dir.join("ws"),
            logs_dir: dir.join("logs"),
            agent_name: "tester".to_string(),
            max_history: 3,
            ..Default::default()
        };
        let journal = MemoryJournal::new();
        let engine = ExecutionEngine::new(config, SafetyGate::default())
            .unwrap()
            .with_launcher(launcher)
            .with_approval(StaticApproval::deny())
            .with_journal(journal.clone());
        (engine, journal)
    }

    #[tokio::test]
    async fn test_blocked_command_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher::exiting(0, "", "");
        let (mut engine, journal) = engine(dir.path(), launcher.clone());

        let result = engine.execute("rm -rf /", "cleanup", None).await;

        assert_eq!(result.exit_code, exit_code::SAFETY_BLOCKED);
        assert_eq!(result.error_category, Some(ErrorCategory::SafetyViolation));
        assert!(result.stderr.contains("blocked by safety controls"));
        assert_eq!(
            result.suggested_fixes.first().map(String::as_str),
            Some("Use specific file deletion: rm filename.txt")
        );
        assert_eq!(launcher.launch_count(), 0);
        assert_eq!(journal.entries().len(), 2);
    }

    #[tokio::test]
    async fn test_denied_command_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher::exiting(0, "", "");
        let (mut engine, _) = engine(dir.path(), launcher.clone());

        let result = engine.execute("sudo ls", "", None).await;

        assert_eq!(result.exit_code, exit_code::USER_DENIED);
        assert_eq!(result.error_category, Some(ErrorCategory::UserDenied));
        assert_eq!(launcher.launch_count(), 0);
    }

    #[tokio::test]
    async fn test_runs_in_workspace_and_diagnoses_failure() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher::exiting(
            1,
            "",
            "ModuleNotFoundError: No module named 'requests'",
        );
        let (mut engine, _) = engine(dir.path(), launcher.clone());

        let result = engine.execute("python3 app.py", "", None).await;

        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.error_category, Some(ErrorCategory::MissingModule));
        assert_eq!(result.suggested_fixes[0], "Install missing module: pip install requests");

        let launched = launcher.launched.read().unwrap();
        assert_eq!(launched[0].working_dir, engine.workspace());
        assert_eq!(launched[0].command, "python3 app.py");
    }

    #[tokio::test]
    async fn test_timeout_terminates_group() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher::hanging();
        let (mut engine, _) = engine(dir.path(), launcher.clone());

        let result = engine
            .execute("python3 loop.py", "", Some(Duration::from_millis(50)))
            .await;

        assert_eq!(result.exit_code, exit_code::TIMEOUT);
        assert_eq!(result.error_category, Some(ErrorCategory::Timeout));
        assert!(!result.success);
        assert_eq!(*launcher.terminated.read().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_filename_is_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher::exiting(0, "", "");
        let (mut engine, _) = engine(dir.path(), launcher.clone());

        let result = engine
            .execute_python_code("print(1)", Some("../escape"), None)
            .await;

        assert_eq!(result.exit_code, exit_code::WRITE_FAILED);
        assert_eq!(result.error_category, Some(ErrorCategory::PythonExecutionError));
        assert_eq!(launcher.launch_count(), 0);
        assert!(!dir.path().join("escape.py").exists());
    }

    #[tokio::test]
    async fn test_code_file_written_with_forced_extension() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher::exiting(0, "1\n", "");
        let (mut engine, _) = engine(dir.path(), launcher.clone());

        let code = "print(1)\n";
        let result = engine
            .execute_python_code(code, Some("nested/run"), None)
            .await;

        assert!(result.success);
        assert_eq!(result.command, "python3 nested/run.py");
        let written = std::fs::read_to_string(engine.workspace().join("nested/run.py")).unwrap();
        assert_eq!(written, code);
    }

    #[tokio::test]
    async fn test_dotted_filenames_keep_their_stem() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher::exiting(0, "", "");
        let (mut engine, _) = engine(dir.path(), launcher.clone());

        // history keeps the last three
        for name in ["run.v2_1", "run.v2_1_retry", "already.py"] {
            engine.execute_python_code("pass\n", Some(name), None).await;
        }

        let commands: Vec<&str> = engine.history().map(|r| r.command.as_str()).collect();
        assert_eq!(
            commands,
            vec![
                "python3 run.v2_1.py",
                "python3 run.v2_1_retry.py",
                "python3 already.py",
            ]
        );
        assert!(engine.workspace().join("run.v2_1_retry.py").exists());
    }

    #[tokio::test]
    async fn test_generated_filename_is_timestamped() {
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, _) = engine(dir.path(), FakeLauncher::exiting(0, "", ""));

        let result = engine.execute_python_code("pass", None, None).await;

        assert!(result.command.starts_with("python3 auto_generated_"));
        assert!(result.command.ends_with(".py"));
    }

    #[tokio::test]
    async fn test_install_package_context_and_command() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher::exiting(0, "", "");
        let (mut engine, journal) = engine(dir.path(), launcher.clone());

        let result = engine.install_package("requests", Some("2.31.0")).await;

        assert!(result.success);
        assert_eq!(result.command, "pip install requests==2.31.0");
        match &journal.entries()[0] {
            JournalEntry::ExecutionAttempt { context, .. } => {
                assert_eq!(context, "Installing package: requests (version 2.31.0)");
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_history_bounded_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, _) = engine(dir.path(), FakeLauncher::exiting(0, "", ""));

        for cmd in ["echo 1", "echo 2", "echo 3", "echo 4"] {
            engine.execute(cmd, "", None).await;
        }

        assert_eq!(engine.history_len(), 3);
        let commands: Vec<&str> = engine.history().map(|r| r.command.as_str()).collect();
        assert_eq!(commands, vec!["echo 2", "echo 3", "echo 4"]);
        assert_eq!(engine.last_result().unwrap().command, "echo 4");

        engine.clear_history();
        assert_eq!(engine.history_len(), 0);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("run_1.py"), "run_1.py");
        assert_eq!(shell_quote("my file.py"), "'my file.py'");
        assert_eq!(shell_quote("it's.py"), r"'it'\''s.py'");
    }
}
