// RequestBuilder - chainable builder for MessageRequest

use super::{BrainConfig, BrainError, Message, MessageRequest};

pub struct RequestBuilder {
    model: String,
    system: Option<String>,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: Option<f32>,
    top_p: Option<f32>,
    top_k: Option<u32>,
}

impl RequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages: Vec::new(),
            max_tokens: 4096,
            temperature: None,
            top_p: None,
            top_k: None,
        }
    }

    /// Start from a config's model and sampling parameters
    pub fn from_config(config: &BrainConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            system: None,
            messages: Vec::new(),
            max_tokens: config.max_output_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn user_text(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user_text(content));
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Only user turns can be added, so a non-empty request is always well formed
    pub fn build(self) -> Result<MessageRequest, BrainError> {
        if self.messages.is_empty() {
            return Err(BrainError::InvalidRequest("no prompt given".to_string()));
        }
        Ok(MessageRequest {
            model: self.model,
            system: self.system,
            messages: self.messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
        })
    }
}
