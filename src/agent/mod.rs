// Agent module - development loop and its planner/coder collaborators

pub mod collaborators;
pub mod config;
pub mod error;
pub mod loop_;
pub mod types;

pub use collaborators::{BrainCoder, BrainPlanner, CodeRunner, Coder, Planner, extract_code_block};
pub use config::AgentConfig;
pub use error::{AgentError, CollaboratorError};
pub use loop_::DevelopmentLoop;
pub use types::{AutonomousResult, CodeRequest, Phase, RunOutcome};
