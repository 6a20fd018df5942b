//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is
//! concrete types. Ports exist for:
//! - LLM calls (could swap the OpenAI-compatible client for another provider)
//! - Clock/Random (for testing)

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Errors an LLM call can surface. Upper layers decide what is retryable
/// and what falls back to the sync path or an apology message.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited: {0}")]
    RateLimit(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Invalid request: {0}")]
    Invalid(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Context too long: {0}")]
    ContextTooLong(String),
    #[error("Failed to parse response: {0}")]
    ParseFailure(String),
}

impl LlmError {
    /// Whether a retry could plausibly succeed without changing the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimit(_) | LlmError::Unavailable(_) | LlmError::ParseFailure(_) => true,
            LlmError::Auth(_) | LlmError::Invalid(_) | LlmError::ContextTooLong(_) => false,
        }
    }
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Provider-neutral chat message.
#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: String,
    /// For `Tool` role messages: the tool call being answered.
    pub tool_call_id: Option<String>,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_call_id: None,
        }
    }
}

/// Provider-neutral request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<LlmMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// When set, ask the provider for a JSON object response.
    pub json_mode: bool,
}

impl LlmRequest {
    pub fn new(messages: Vec<LlmMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
            json_mode: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// A tool the model may call.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool call the model made.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Why the model stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

/// Token accounting, when the provider reports it.
#[derive(Debug, Clone, Copy)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Provider-neutral response.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;
    async fn generate_with_tools(
        &self,
        request: LlmRequest,
        tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse, LlmError>;
}

// =============================================================================
// Testability Ports
// =============================================================================

pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Source of randomness for dice and weather. Behind a trait so tests can
/// force exact rolls.
pub trait RandomPort: Send + Sync {
    /// Uniform sample in `min..=max`.
    fn gen_range(&self, min: i32, max: i32) -> i32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::RateLimit("429".into()).is_retryable());
        assert!(LlmError::Unavailable("503".into()).is_retryable());
        assert!(LlmError::ParseFailure("bad json".into()).is_retryable());
        assert!(!LlmError::Auth("401".into()).is_retryable());
        assert!(!LlmError::Invalid("400".into()).is_retryable());
        assert!(!LlmError::ContextTooLong("too big".into()).is_retryable());
    }
}
