// autocoder - plan, generate, execute and repair code under a safety gate

pub mod agent;
pub mod brain;
pub mod diagnose;
pub mod env;
pub mod executor;
pub mod safety;
