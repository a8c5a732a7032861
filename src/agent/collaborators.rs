// Planner and coder contracts, their LLM-backed implementations, and the
// code runner seam the development loop drives

use super::error::CollaboratorError;
use super::types::CodeRequest;
use crate::brain::Brain;
use crate::executor::{ExecutionEngine, ExecutionResult};
use async_trait::async_trait;
use tracing::debug;

/// Turns a task into a plan
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, task: &str) -> Result<String, CollaboratorError>;
}

/// Turns a plan into executable code, with fences and prose already stripped
#[async_trait]
pub trait Coder: Send + Sync {
    async fn generate(&self, request: &CodeRequest) -> Result<String, CollaboratorError>;
}

/// Executes generated code and installs dependencies
#[async_trait]
pub trait CodeRunner: Send {
    async fn run_code(&mut self, code: &str, filename: &str) -> ExecutionResult;
    async fn install_package(&mut self, name: &str) -> ExecutionResult;
}

#[async_trait]
impl CodeRunner for ExecutionEngine {
    async fn run_code(&mut self, code: &str, filename: &str) -> ExecutionResult {
        self.execute_python_code(code, Some(filename), None).await
    }

    async fn install_package(&mut self, name: &str) -> ExecutionResult {
        ExecutionEngine::install_package(self, name, None).await
    }
}

const PLANNER_SYSTEM: &str = "You are a software development planning agent.";

const CODER_SYSTEM: &str = "You are a Python code generator. Output only executable Python code \
with no explanations or natural language. Start immediately with Python code.";

fn planning_prompt(task: &str) -> String {
    format!(
        "Create a detailed, step-by-step plan for the following task:\n\n\
         Task: {}\n\n\
         Please provide:\n\
         1. A clear breakdown of what needs to be built\n\
         2. Step-by-step implementation approach\n\
         3. Key considerations and potential challenges\n\
         4. Suggested file structure or components\n\n\
         Keep your response focused and actionable.",
        task
    )
}

fn coding_prompt(request: &CodeRequest) -> String {
    let plan = match &request.prior_errors {
        Some(errors) => format!("{}\n\nPREVIOUS ERRORS TO FIX:\n{}", request.plan, errors),
        None => request.plan.clone(),
    };
    format!(
        "Generate ONLY executable Python code for the following task. Do not include any \
         explanations, comments about what you'll do, or natural language descriptions.\n\n\
         TASK: {}\n\n\
         PLAN: {}\n\n\
         Requirements:\n\
         - Generate ONLY Python code that can be executed directly\n\
         - Include proper error handling\n\
         - Add necessary imports\n\
         - Include a main section that demonstrates the functionality\n\
         - Start immediately with Python code (imports, functions, etc.)\n\n\
         Generate the complete, runnable Python code now:",
        request.task, plan
    )
}

/// Planner over a completion model
pub struct BrainPlanner {
    brain: Brain,
}

impl BrainPlanner {
    pub fn new(brain: Brain) -> Self {
        Self { brain }
    }
}

#[async_trait]
impl Planner for BrainPlanner {
    async fn plan(&self, task: &str) -> Result<String, CollaboratorError> {
        let text = self
            .brain
            .complete(Some(PLANNER_SYSTEM), &planning_prompt(task))
            .await?;
        let plan = text.trim();
        if plan.is_empty() {
            return Err(CollaboratorError::EmptyResponse("planner"));
        }
        debug!(plan_chars = plan.len(), "plan received");
        Ok(plan.to_string())
    }
}

/// Coder over a completion model
pub struct BrainCoder {
    brain: Brain,
}

impl BrainCoder {
    pub fn new(brain: Brain) -> Self {
        Self { brain }
    }
}

#[async_trait]
impl Coder for BrainCoder {
    async fn generate(&self, request: &CodeRequest) -> Result<String, CollaboratorError> {
        let text = self
            .brain
            .complete(Some(CODER_SYSTEM), &coding_prompt(request))
            .await?;
        let code = extract_code_block(&text);
        if code.is_empty() {
            return Err(CollaboratorError::EmptyResponse("coder"));
        }
        debug!(code_chars = code.len(), "code received");
        Ok(code)
    }
}

/// Body of the first fenced block, language tag dropped; otherwise the
/// trimmed text. An unterminated fence runs to the end of the text.
pub fn extract_code_block(text: &str) -> String {
    let Some(open) = text.find("```") else {
        return text.trim().to_string();
    };
    let after_fence = &text[open + 3..];
    // the rest of the opening line is the language tag
    let body = match after_fence.find('\n') {
        Some(newline) => &after_fence[newline + 1..],
        None => "",
    };
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim().to_string()
}
