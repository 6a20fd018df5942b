//! Infrastructure: LLM clients, gateway, clock, random.

pub mod clock;
pub mod gateway;
pub mod json_repair;
pub mod openai;
pub mod ports;
pub mod random;
pub mod resilient;

pub use gateway::{LlmGateway, RoleSettings, ToolHandler, DEFAULT_MAX_TOOL_ROUNDS};
pub use openai::OpenAiClient;
pub use ports::{
    ClockPort, FinishReason, LlmError, LlmMessage, LlmPort, LlmRequest, LlmResponse, MessageRole,
    RandomPort, TokenUsage, ToolCall, ToolDefinition,
};
pub use resilient::{ResilientLlmClient, RetryConfig};
