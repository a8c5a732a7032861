// Brain client - HTTP communication with inference backend

use super::{BrainConfig, BrainError, BrainInitError, MessageRequest, MessageResponse, RequestBuilder};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Brain client for LLM inference
#[derive(Clone)]
pub struct Brain {
    config: BrainConfig,
    client: Client,
}

impl Brain {
    pub fn new(config: BrainConfig) -> Result<Self, BrainInitError> {
        info!(
            endpoint = %config.endpoint,
            model = %config.default_model,
            timeout_secs = config.request_timeout_secs,
            max_retries = config.max_retries,
            "initializing brain"
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &BrainConfig {
        &self.config
    }

    /// Single-turn completion: one system prompt, one user prompt, text back
    pub async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String, BrainError> {
        let mut builder = RequestBuilder::from_config(&self.config).user_text(prompt);
        if let Some(system) = system {
            builder = builder.system(system);
        }
        let request = builder.build()?;
        let response = self.infer(request).await?;
        Ok(response.text())
    }

    /// Perform inference, retrying transient failures with exponential backoff
    pub async fn infer(&self, request: MessageRequest) -> Result<MessageResponse, BrainError> {
        info!(
            model = %request.model,
            messages_count = request.messages.len(),
            has_system = request.system.is_some(),
            max_tokens = request.max_tokens,
            "starting inference"
        );

        let start = Instant::now();
        let mut retries = 0;
        let max_retries = self.config.max_retries;

        loop {
            debug!(retry = retries, "sending request to inference backend");
            match self.send_request(&request).await {
                Ok(response) => {
                    let (input_tokens, output_tokens) = response
                        .usage
                        .as_ref()
                        .map(|u| (u.input_tokens, u.output_tokens))
                        .unwrap_or((0, 0));

                    info!(
                        model = %response.model,
                        input_tokens = input_tokens,
                        output_tokens = output_tokens,
                        latency_ms = start.elapsed().as_millis() as u64,
                        retries = retries,
                        stop_reason = ?response.stop_reason,
                        "inference completed"
                    );
                    return Ok(response);
                }
                Err(e) if !e.is_transient() => {
                    error!(error = %e, "inference failed: not retryable");
                    return Err(e);
                }
                Err(e) => {
                    retries += 1;
                    if retries > max_retries {
                        error!(
                            retries = retries,
                            total_latency_ms = start.elapsed().as_millis() as u64,
                            error = %e,
                            "inference failed: exhausted retries"
                        );
                        return Err(BrainError::Exhausted {
                            retries,
                            last_error: e.to_string(),
                        });
                    }

                    let delay = retry_delay(self.config.base_retry_delay_ms, retries);
                    warn!(
                        retry = retries,
                        max_retries = max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "inference failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn send_request(&self, request: &MessageRequest) -> Result<MessageResponse, BrainError> {
        let url = format!("{}/v1/messages", self.config.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", &self.config.api_key))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        debug!(status = status.as_u16(), "received HTTP response");

        if status.is_success() {
            let body = response.text().await?;
            debug!(response_preview = %preview(&body, 200), "response body received");
            return Ok(serde_json::from_str(&body)?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 | 403 => BrainError::AuthenticationFailed(body),
            400 => BrainError::InvalidRequest(body),
            402 => BrainError::InsufficientBalance(body),
            429 => BrainError::RateLimited(body),
            code if status.is_server_error() => {
                BrainError::ModelError(format!("HTTP {}: {}", code, body))
            }
            code => BrainError::InvalidRequest(format!("HTTP {}: {}", code, body)),
        })
    }
}

/// Exponential backoff, capped
fn retry_delay(base_ms: u64, retry: u32) -> Duration {
    let multiplier = 2u64.saturating_pow(retry.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(multiplier).min(MAX_RETRY_DELAY_MS))
}

/// First `max` bytes of `s`, cut on a char boundary
fn preview(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
