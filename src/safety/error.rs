// Error types for Safety module

use thiserror::Error;

/// Failures loading a safety policy file
#[derive(Debug, Error)]
pub enum SafetyConfigError {
    #[error("Failed to read safety policy '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse safety policy: {0}")]
    Parse(#[from] toml::de::Error),
}
