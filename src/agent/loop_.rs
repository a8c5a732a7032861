// Development loop - plan once, then generate, execute and repair until
// the code runs or the iteration budget is spent

use super::collaborators::{CodeRunner, Coder, Planner};
use super::config::AgentConfig;
use super::types::{AutonomousResult, CodeRequest, Phase, RunOutcome};
use crate::diagnose::{ErrorCategory, ErrorDiagnoser};
use crate::executor::ExecutionResult;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

const EXHAUSTED_MESSAGE: &str = "Max iterations reached without success";

/// Drives planner, coder and runner through one task at a time
pub struct DevelopmentLoop<P, C, R> {
    planner: P,
    coder: C,
    runner: R,
    diagnoser: ErrorDiagnoser,
    config: AgentConfig,
}

impl<P, C, R> DevelopmentLoop<P, C, R>
where
    P: Planner,
    C: Coder,
    R: CodeRunner,
{
    pub fn new(planner: P, coder: C, runner: R, config: AgentConfig) -> Self {
        Self {
            planner,
            coder,
            runner,
            diagnoser: ErrorDiagnoser::default(),
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut R {
        &mut self.runner
    }

    /// Run one task to completion. Never fails; every outcome is reported
    /// in the returned result.
    pub async fn run(&mut self, task: &str, max_iterations: u32) -> AutonomousResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("development_run", run_id = %run_id);
        self.run_inner(run_id, task, max_iterations)
            .instrument(span)
            .await
    }

    async fn run_inner(&mut self, run_id: Uuid, task: &str, max_iterations: u32) -> AutonomousResult {
        info!(task = %task, max_iterations, "starting development run");
        let mut report = AutonomousResult::new(run_id, task);

        enter(Phase::Planning);
        let plan = match self.planner.plan(task).await {
            Ok(plan) => plan,
            Err(e) => {
                error!(error = %e, "planning failed");
                enter(Phase::Done);
                let message = format!("Planning failed: {}", e);
                return report.fail(RunOutcome::PlanningFailed(e.to_string()), message);
            }
        };
        info!(plan_chars = plan.len(), "plan created");
        report.plan = plan.clone();

        for iteration in 0..max_iterations {
            let number = iteration + 1;
            report.iterations = number;
            info!(iteration = number, max_iterations, "iteration started");

            enter(Phase::Generating);
            let request = CodeRequest {
                plan: plan.clone(),
                task: task.to_string(),
                prior_errors: self.error_context(iteration, &report.errors_encountered),
            };
            let code = match self.coder.generate(&request).await {
                Ok(code) => code,
                Err(e) => {
                    error!(iteration = number, error = %e, "code generation failed");
                    enter(Phase::Done);
                    report.final_code.clear();
                    let message = format!("Code generation failed: {}", e);
                    return report.fail(RunOutcome::GenerationFailed(e.to_string()), message);
                }
            };
            report.final_code = code.clone();

            enter(Phase::Executing);
            let filename = format!("{}_{}", self.config.file_prefix, number);
            let result = self.runner.run_code(&code, &filename).await;
            report.execution_results.push(result.clone());

            if result.success {
                info!(iteration = number, "code executed successfully");
                enter(Phase::Done);
                return report.succeed(result.stdout);
            }

            warn!(
                iteration = number,
                exit_code = result.exit_code,
                error_type = ?result.error_category,
                "execution failed"
            );
            report.errors_encountered.push(result.stderr.clone());

            if result.error_category == Some(ErrorCategory::MissingModule)
                && let Some(stdout) = self.repair(&code, &filename, &result, &mut report).await
            {
                info!(iteration = number, "code executed successfully after dependency repair");
                enter(Phase::Done);
                return report.succeed(stdout);
            }
        }

        warn!(iterations = max_iterations, "iterations exhausted");
        enter(Phase::Done);
        report.iterations = max_iterations;
        report.fail(RunOutcome::Exhausted, EXHAUSTED_MESSAGE)
    }

    /// The most recent failures, for every iteration after the first
    fn error_context(&self, iteration: u32, errors: &[String]) -> Option<String> {
        if iteration == 0 || errors.is_empty() {
            return None;
        }
        let start = errors.len().saturating_sub(self.config.error_context);
        Some(errors[start..].join("\n"))
    }

    /// Install what the failure says is missing, then re-run the same code
    /// once. Returns the retry's stdout when it succeeds.
    async fn repair(
        &mut self,
        code: &str,
        filename: &str,
        failed: &ExecutionResult,
        report: &mut AutonomousResult,
    ) -> Option<String> {
        enter(Phase::Repairing);
        let packages = self.diagnoser.extract_missing_packages(&failed.stderr);
        if packages.is_empty() {
            debug!("no package name found in missing-module error");
            return None;
        }

        let mut installed_any = false;
        for package in packages {
            if report.packages_installed.contains(&package) {
                debug!(package = %package, "already installed this run, skipping");
                continue;
            }
            info!(package = %package, "auto-installing missing package");
            let install = self.runner.install_package(&package).await;
            if install.success {
                info!(package = %package, "package installed");
                report.packages_installed.push(package);
                installed_any = true;
            } else {
                warn!(
                    package = %package,
                    exit_code = install.exit_code,
                    "package installation failed"
                );
            }
        }

        if !installed_any {
            return None;
        }

        enter(Phase::RetryExecuting);
        let retry = self
            .runner
            .run_code(code, &format!("{}_retry", filename))
            .await;
        report.execution_results.push(retry.clone());

        if retry.success {
            Some(retry.stdout)
        } else {
            warn!(exit_code = retry.exit_code, "retry after installation failed");
            report.errors_encountered.push(retry.stderr);
            None
        }
    }
}

fn enter(phase: Phase) {
    debug!(phase = %phase, "phase transition");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::error::CollaboratorError;
    use async_trait::async_trait;
    use std::sync::{Arc, RwLock};
    use std::time::Duration;

    struct MockPlanner {
        fail: bool,
        calls: Arc<RwLock<u32>>,
    }

    #[async_trait]
    impl Planner for MockPlanner {
        async fn plan(&self, task: &str) -> Result<String, CollaboratorError> {
            *self.calls.write().unwrap() += 1;
            if self.fail {
                Err(CollaboratorError::Upstream("planner offline".to_string()))
            } else {
                Ok(format!("plan for {}", task))
            }
        }
    }

    /// Returns scripted replies in order, repeating the last one
    struct MockCoder {
        replies: Vec<Result<String, String>>,
        requests: Arc<RwLock<Vec<CodeRequest>>>,
    }

    #[async_trait]
    impl Coder for MockCoder {
        async fn generate(&self, request: &CodeRequest) -> Result<String, CollaboratorError> {
            let mut requests = self.requests.write().unwrap();
            requests.push(request.clone());
            let index = (requests.len() - 1).min(self.replies.len() - 1);
            self.replies[index]
                .clone()
                .map_err(CollaboratorError::Upstream)
        }
    }

    /// Fails `import foo` until foo is installed; a `fail:` line always fails
    #[derive(Default)]
    struct MockRunner {
        installed: Vec<String>,
        runs: Vec<String>,
        installs: Vec<String>,
        install_fails: bool,
    }

    fn failed(stderr: &str, category: ErrorCategory) -> ExecutionResult {
        ExecutionResult::completed("python3 x.py", String::new(), stderr.to_string(), 1, Duration::ZERO)
            .with_diagnosis(category, Vec::new())
    }

    #[async_trait]
    impl CodeRunner for MockRunner {
        async fn run_code(&mut self, code: &str, filename: &str) -> ExecutionResult {
            self.runs.push(filename.to_string());
            if code.contains("import foo") && !self.installed.iter().any(|p| p == "foo") {
                return failed("ModuleNotFoundError: No module named 'foo'", ErrorCategory::MissingModule);
            }
            if let Some(err) = code.lines().find_map(|l| l.strip_prefix("fail:")) {
                return failed(err, ErrorCategory::NameError);
            }
            ExecutionResult::completed(filename, "ok\n".to_string(), String::new(), 0, Duration::ZERO)
        }

        async fn install_package(&mut self, name: &str) -> ExecutionResult {
            self.installs.push(name.to_string());
            if self.install_fails {
                return failed("no such package", ErrorCategory::UnknownError);
            }
            self.installed.push(name.to_string());
            ExecutionResult::completed(format!("pip install {}", name), String::new(), String::new(), 0, Duration::ZERO)
        }
    }

    struct Harness {
        dev: DevelopmentLoop<MockPlanner, MockCoder, MockRunner>,
        planner_calls: Arc<RwLock<u32>>,
        coder_requests: Arc<RwLock<Vec<CodeRequest>>>,
    }

    fn harness(planner_fails: bool, replies: Vec<Result<&str, &str>>) -> Harness {
        let planner_calls = Arc::new(RwLock::new(0));
        let coder_requests = Arc::new(RwLock::new(Vec::new()));
        let replies = replies
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        let dev = DevelopmentLoop::new(
            MockPlanner {
                fail: planner_fails,
                calls: planner_calls.clone(),
            },
            MockCoder {
                replies,
                requests: coder_requests.clone(),
            },
            MockRunner::default(),
            AgentConfig::default(),
        );
        Harness {
            dev,
            planner_calls,
            coder_requests,
        }
    }

    #[tokio::test]
    async fn test_first_iteration_success() {
        let mut h = harness(false, vec![Ok("print('ok')")]);
        let result = h.dev.run("say ok", 5).await;

        assert!(result.success);
        assert_eq!(result.outcome, RunOutcome::Succeeded);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.final_output, "ok\n");
        assert_eq!(result.final_code, "print('ok')");
        assert_eq!(result.plan, "plan for say ok");
        assert_eq!(h.dev.runner().runs, vec!["autonomous_iteration_1"]);
        assert!(h.coder_requests.read().unwrap()[0].prior_errors.is_none());
    }

    #[tokio::test]
    async fn test_planner_failure_is_fatal() {
        let mut h = harness(true, vec![Ok("print('ok')")]);
        let result = h.dev.run("anything", 5).await;

        assert!(!result.success);
        assert!(matches!(result.outcome, RunOutcome::PlanningFailed(_)));
        assert_eq!(result.iterations, 0);
        assert_eq!(*h.planner_calls.read().unwrap(), 1);
        assert!(h.coder_requests.read().unwrap().is_empty());
        assert!(h.dev.runner().runs.is_empty());
    }

    #[tokio::test]
    async fn test_coder_failure_on_first_iteration_is_fatal() {
        let mut h = harness(false, vec![Err("rate limited")]);
        let result = h.dev.run("anything", 5).await;

        assert!(!result.success);
        assert!(matches!(result.outcome, RunOutcome::GenerationFailed(_)));
        assert_eq!(result.iterations, 1);
        assert!(result.final_code.is_empty());
        assert_eq!(h.coder_requests.read().unwrap().len(), 1);
        assert!(h.dev.runner().runs.is_empty());
    }

    #[tokio::test]
    async fn test_exhaustion_bounds_generation_calls() {
        let mut h = harness(false, vec![Ok("fail:NameError: name 'x' is not defined")]);
        let result = h.dev.run("never works", 4).await;

        assert!(!result.success);
        assert_eq!(result.outcome, RunOutcome::Exhausted);
        assert_eq!(result.iterations, 4);
        assert_eq!(result.final_output, EXHAUSTED_MESSAGE);
        assert_eq!(h.coder_requests.read().unwrap().len(), 4);
        assert_eq!(result.errors_encountered.len(), 4);
        assert_eq!(result.execution_results.len(), 4);
    }

    #[tokio::test]
    async fn test_zero_iterations_reports_exhausted() {
        let mut h = harness(false, vec![Ok("print('ok')")]);
        let result = h.dev.run("nothing", 0).await;

        assert!(!result.success);
        assert_eq!(result.iterations, 0);
        assert!(h.coder_requests.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_last_three_errors_fed_back() {
        let mut h = harness(
            false,
            vec![Ok("fail:e1"), Ok("fail:e2"), Ok("fail:e3"), Ok("fail:e4"), Ok("print(1)")],
        );
        let result = h.dev.run("eventually", 5).await;

        assert!(result.success);
        assert_eq!(result.iterations, 5);
        let requests = h.coder_requests.read().unwrap();
        assert_eq!(requests[1].prior_errors.as_deref(), Some("e1"));
        assert_eq!(requests[4].prior_errors.as_deref(), Some("e2\ne3\ne4"));
        assert!(requests.iter().all(|r| r.plan == "plan for eventually"));
    }

    #[tokio::test]
    async fn test_missing_module_repaired_with_one_retry() {
        let mut h = harness(false, vec![Ok("import foo\nprint('ok')")]);
        let result = h.dev.run("use foo", 5).await;

        assert!(result.success);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.packages_installed, vec!["foo"]);
        assert_eq!(result.final_output, "ok\n");
        assert_eq!(h.coder_requests.read().unwrap().len(), 1);
        assert_eq!(
            h.dev.runner().runs,
            vec!["autonomous_iteration_1", "autonomous_iteration_1_retry"]
        );
        assert_eq!(result.execution_results.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_install_moves_to_next_iteration() {
        let mut h = harness(false, vec![Ok("import foo"), Ok("print('ok')")]);
        h.dev.runner_mut().install_fails = true;
        let result = h.dev.run("use foo", 5).await;

        assert!(result.success);
        assert_eq!(result.iterations, 2);
        assert!(result.packages_installed.is_empty());
        assert_eq!(h.dev.runner().installs, vec!["foo"]);
        // no retry without a successful install
        assert_eq!(
            h.dev.runner().runs,
            vec!["autonomous_iteration_1", "autonomous_iteration_2"]
        );
    }

    #[tokio::test]
    async fn test_failed_retry_records_error_and_regenerates() {
        let mut h = harness(
            false,
            vec![Ok("import foo\nfail:ValueError: bad"), Ok("print('ok')")],
        );
        let result = h.dev.run("use foo badly", 5).await;

        assert!(result.success);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.packages_installed, vec!["foo"]);
        assert_eq!(result.errors_encountered.len(), 2);
        assert!(result.errors_encountered[1].contains("ValueError"));
        let requests = h.coder_requests.read().unwrap();
        assert!(requests[1].prior_errors.as_deref().unwrap().contains("ValueError"));
    }
}
