// Brain module - LLM completion client backing the planner and coder

pub mod builder;
pub mod client;
pub mod error;
pub mod types;

pub use builder::RequestBuilder;
pub use client::Brain;
pub use error::{BrainError, BrainInitError};
pub use types::{ContentBlock, Message, MessageRequest, MessageResponse, Role};

/// Brain configuration
#[derive(Debug, Clone)]
pub struct BrainConfig {
    /// Inference backend URL
    pub endpoint: String,
    /// API key for authentication
    pub api_key: String,
    /// Default model identifier
    pub default_model: String,
    /// Maximum retry attempts
    pub max_retries: u32,
    /// Base retry delay in milliseconds
    pub base_retry_delay_ms: u64,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum output tokens
    pub max_output_tokens: u32,
    /// Temperature (0.0-2.0, None = use model default)
    pub temperature: Option<f32>,
    /// Top-P nucleus sampling (0.0-1.0, None = use model default)
    pub top_p: Option<f32>,
    /// Top-K sampling (None = use model default)
    pub top_k: Option<u32>,
}

fn parse_value<T: std::str::FromStr>(
    prefix: &str,
    key: &str,
    raw: Option<String>,
) -> Result<Option<T>, BrainInitError> {
    raw.map(|v| {
        v.trim()
            .parse()
            .map_err(|_| BrainInitError::ConfigInvalid(format!("{}_{}={}", prefix, key, v)))
    })
    .transpose()
}

impl BrainConfig {
    /// Load `{prefix}_*` variables, falling back to `INFERENCE_*` per key,
    /// so the planner and coder can point at different models.
    pub fn from_env(prefix: &str) -> Result<Self, BrainInitError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(prefix, |name| std::env::var(name).ok())
    }

    /// Same as `from_env` over an arbitrary variable source
    pub fn from_lookup(
        prefix: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, BrainInitError> {
        let get = |key: &str| {
            lookup(&format!("{}_{}", prefix, key))
                .or_else(|| lookup(&format!("INFERENCE_{}", key)))
                .filter(|v| !v.trim().is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| BrainInitError::ConfigMissing(format!("{}_{}", prefix, key)))
        };
        Ok(Self {
            endpoint: require("ENDPOINT")?,
            api_key: require("API_KEY")?,
            default_model: require("MODEL")?,
            max_retries: parse_value(prefix, "MAX_RETRIES", get("MAX_RETRIES"))?.unwrap_or(3),
            base_retry_delay_ms: parse_value(prefix, "RETRY_DELAY_MS", get("RETRY_DELAY_MS"))?.unwrap_or(1000),
            request_timeout_secs: parse_value(prefix, "TIMEOUT_SECS", get("TIMEOUT_SECS"))?.unwrap_or(120),
            max_output_tokens: parse_value(prefix, "MAX_TOKENS", get("MAX_TOKENS"))?.unwrap_or(4096),
            temperature: parse_value(prefix, "TEMPERATURE", get("TEMPERATURE"))?,
            top_p: parse_value(prefix, "TOP_P", get("TOP_P"))?,
            top_k: parse_value(prefix, "TOP_K", get("TOP_K"))?,
        })
    }
}
