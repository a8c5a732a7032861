// Agent configuration

use super::error::AgentError;
use crate::env::{parse_env_var, string_env_var};

/// Development loop configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Upper bound on code-generation calls per run
    pub max_iterations: u32,
    /// How many of the most recent failures are fed back to the coder
    pub error_context: usize,
    /// Stem for per-iteration code files in the workspace
    pub file_prefix: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            error_context: 3,
            file_prefix: "autonomous_iteration".to_string(),
        }
    }
}

impl AgentConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, AgentError> {
        dotenvy::dotenv().ok();

        let defaults = AgentConfig::default();
        let config = AgentConfig {
            max_iterations: parse_env_var("AGENT_MAX_ITERATIONS", defaults.max_iterations),
            error_context: parse_env_var("AGENT_ERROR_CONTEXT", defaults.error_context),
            file_prefix: string_env_var("AGENT_FILE_PREFIX", &defaults.file_prefix),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.file_prefix.contains(['/', '\\']) || self.file_prefix.starts_with('.') {
            return Err(AgentError::InvalidConfig(format!(
                "file prefix '{}' must be a plain file stem",
                self.file_prefix
            )));
        }
        if self.error_context == 0 {
            return Err(AgentError::InvalidConfig(
                "error context must keep at least one error".to_string(),
            ));
        }
        Ok(())
    }
}
