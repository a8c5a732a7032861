// Safety module - command risk tiers and approval gating

pub mod config;
pub mod error;
pub mod gate;
pub mod rules;
pub mod types;

pub use config::SafetyConfig;
pub use error::SafetyConfigError;
pub use gate::{SafetyGate, is_command_safe};
pub use types::{RiskLevel, SafetyVerdict};
