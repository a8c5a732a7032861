// Agent errors

use crate::brain::{BrainError, BrainInitError};
use thiserror::Error;

/// Agent setup errors. A running loop never returns these; it reports
/// failures inside its result instead.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid agent configuration: {0}")]
    InvalidConfig(String),

    #[error("Brain initialization failed: {0}")]
    BrainInit(#[from] BrainInitError),
}

/// Failure of a planner or coder to produce usable text
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Upstream model call failed: {0}")]
    Upstream(String),

    #[error("{0} returned an empty response")]
    EmptyResponse(&'static str),

    #[error("Collaborator misconfigured: {0}")]
    Configuration(String),
}

impl From<BrainError> for CollaboratorError {
    fn from(e: BrainError) -> Self {
        match e {
            BrainError::AuthenticationFailed(msg) | BrainError::InsufficientBalance(msg) => {
                CollaboratorError::Configuration(msg)
            }
            other => CollaboratorError::Upstream(other.to_string()),
        }
    }
}
