//! LLM gateway: role-separated endpoints with structured output.
//!
//! Two logical endpoints are configured: *reasoning* (prediction, GM
//! decisions, branch generation; low temperature) and *narrator* (prose;
//! higher temperature). They may point at the same model. Structured calls
//! declare a target schema, run the response through lenient JSON parsing,
//! and lightly validate required fields before returning.

use std::sync::Arc;

use serde_json::Value;

use crate::infrastructure::json_repair;
use crate::infrastructure::ports::{
    LlmError, LlmMessage, LlmPort, LlmRequest, LlmResponse, ToolCall, ToolDefinition,
};

/// Default cap on tool loop rounds.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

/// Handles tool calls made during a tool loop.
pub trait ToolHandler: Send + Sync {
    /// Execute one tool call, returning the JSON result fed back to the
    /// model.
    fn handle(&self, call: &ToolCall) -> Result<Value, LlmError>;
}

/// Temperature and token limits for one endpoint role.
#[derive(Debug, Clone, Copy)]
pub struct RoleSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Provider-agnostic gateway over the two logical endpoints.
pub struct LlmGateway {
    reasoning: Arc<dyn LlmPort>,
    narrator: Arc<dyn LlmPort>,
    reasoning_settings: RoleSettings,
    narrator_settings: RoleSettings,
}

impl LlmGateway {
    pub fn new(
        reasoning: Arc<dyn LlmPort>,
        narrator: Arc<dyn LlmPort>,
        reasoning_settings: RoleSettings,
        narrator_settings: RoleSettings,
    ) -> Self {
        Self {
            reasoning,
            narrator,
            reasoning_settings,
            narrator_settings,
        }
    }

    /// Both roles served by a single endpoint.
    pub fn single(
        port: Arc<dyn LlmPort>,
        reasoning_settings: RoleSettings,
        narrator_settings: RoleSettings,
    ) -> Self {
        Self {
            reasoning: Arc::clone(&port),
            narrator: port,
            reasoning_settings,
            narrator_settings,
        }
    }

    /// Plain completion against the reasoning endpoint.
    pub async fn complete(&self, messages: Vec<LlmMessage>) -> Result<LlmResponse, LlmError> {
        let request = LlmRequest::new(messages)
            .with_temperature(self.reasoning_settings.temperature)
            .with_max_tokens(self.reasoning_settings.max_tokens);
        self.reasoning.generate(request).await
    }

    /// Prose completion against the narrator endpoint.
    pub async fn complete_narrator(
        &self,
        messages: Vec<LlmMessage>,
    ) -> Result<LlmResponse, LlmError> {
        let request = LlmRequest::new(messages)
            .with_temperature(self.narrator_settings.temperature)
            .with_max_tokens(self.narrator_settings.max_tokens);
        self.narrator.generate(request).await
    }

    /// Structured completion: the response must parse (after repair of
    /// trivial JSON mistakes) into an object carrying every property named
    /// in `required`.
    pub async fn complete_structured(
        &self,
        mut messages: Vec<LlmMessage>,
        schema: &Value,
        required: &[&str],
    ) -> Result<Value, LlmError> {
        if let Some(first) = messages.first_mut() {
            first.content.push_str(&format!(
                "\n\nRespond with a single JSON object matching this schema, no prose:\n{}",
                schema
            ));
        }
        let request = LlmRequest::new(messages)
            .with_temperature(self.reasoning_settings.temperature)
            .with_max_tokens(self.reasoning_settings.max_tokens)
            .json();

        let response = self.reasoning.generate(request).await?;
        let value = json_repair::parse_lenient(&response.content)
            .map_err(|e| LlmError::ParseFailure(format!("structured response: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| LlmError::ParseFailure("expected a JSON object".to_string()))?;
        for field in required {
            if !object.contains_key(*field) {
                return Err(LlmError::ParseFailure(format!(
                    "structured response missing required field '{}'",
                    field
                )));
            }
        }
        Ok(value)
    }

    /// Tool loop against the reasoning endpoint.
    ///
    /// Terminates when the model stops calling tools or after `max_rounds`.
    /// Returns the final response plus every tool call made along the way.
    pub async fn complete_with_tools(
        &self,
        mut messages: Vec<LlmMessage>,
        tools: Vec<ToolDefinition>,
        handler: &dyn ToolHandler,
        max_rounds: usize,
    ) -> Result<(LlmResponse, Vec<ToolCall>), LlmError> {
        let mut all_calls = Vec::new();

        for round in 0..max_rounds {
            let request = LlmRequest::new(messages.clone())
                .with_temperature(self.reasoning_settings.temperature)
                .with_max_tokens(self.reasoning_settings.max_tokens);
            let response = self
                .reasoning
                .generate_with_tools(request, tools.clone())
                .await?;

            if response.tool_calls.is_empty() {
                return Ok((response, all_calls));
            }

            tracing::debug!(
                round,
                calls = response.tool_calls.len(),
                "tool loop round produced calls"
            );

            messages.push(LlmMessage::assistant(response.content.clone()));
            for call in &response.tool_calls {
                let result = handler.handle(call)?;
                messages.push(LlmMessage {
                    role: crate::infrastructure::ports::MessageRole::Tool,
                    content: result.to_string(),
                    tool_call_id: Some(call.id.clone()),
                });
                all_calls.push(call.clone());
            }
        }

        tracing::warn!(max_rounds, "tool loop hit round cap");
        let request = LlmRequest::new(messages)
            .with_temperature(self.reasoning_settings.temperature)
            .with_max_tokens(self.reasoning_settings.max_tokens);
        let response = self.reasoning.generate(request).await?;
        Ok((response, all_calls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::FinishReason;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedLlm {
        responses: Vec<LlmResponse>,
        cursor: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<LlmResponse>) -> Self {
            Self {
                responses,
                cursor: AtomicUsize::new(0),
            }
        }

        fn text(content: &str) -> LlmResponse {
            LlmResponse {
                content: content.to_string(),
                tool_calls: vec![],
                finish_reason: FinishReason::Stop,
                usage: None,
            }
        }
    }

    #[async_trait]
    impl LlmPort for ScriptedLlm {
        async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            Ok(self.responses[index.min(self.responses.len() - 1)].clone())
        }

        async fn generate_with_tools(
            &self,
            request: LlmRequest,
            _tools: Vec<ToolDefinition>,
        ) -> Result<LlmResponse, LlmError> {
            self.generate(request).await
        }
    }

    struct EchoHandler;

    impl ToolHandler for EchoHandler {
        fn handle(&self, call: &ToolCall) -> Result<Value, LlmError> {
            Ok(serde_json::json!({ "echoed": call.name }))
        }
    }

    fn settings() -> RoleSettings {
        RoleSettings {
            temperature: 0.2,
            max_tokens: 1024,
        }
    }

    fn gateway(port: Arc<dyn LlmPort>) -> LlmGateway {
        LlmGateway::single(port, settings(), settings())
    }

    #[tokio::test]
    async fn test_structured_parses_fenced_json() {
        let port = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::text(
            "```json\n{\"variants\": {}}\n```",
        )]));
        let gw = gateway(port);
        let schema = serde_json::json!({"type": "object"});
        let value = gw
            .complete_structured(vec![LlmMessage::system("sys")], &schema, &["variants"])
            .await
            .unwrap();
        assert!(value["variants"].is_object());
    }

    #[tokio::test]
    async fn test_structured_rejects_missing_field() {
        let port = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::text("{\"other\": 1}")]));
        let gw = gateway(port);
        let schema = serde_json::json!({"type": "object"});
        let result = gw
            .complete_structured(vec![LlmMessage::system("sys")], &schema, &["variants"])
            .await;
        assert!(matches!(result, Err(LlmError::ParseFailure(_))));
    }

    #[tokio::test]
    async fn test_tool_loop_terminates_on_empty_calls() {
        let with_call = LlmResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "1".to_string(),
                name: "record_fact".to_string(),
                arguments: serde_json::json!({}),
            }],
            finish_reason: FinishReason::ToolCalls,
            usage: None,
        };
        let port = Arc::new(ScriptedLlm::new(vec![
            with_call,
            ScriptedLlm::text("done"),
        ]));
        let gw = gateway(port);

        let (response, calls) = gw
            .complete_with_tools(
                vec![LlmMessage::system("sys")],
                vec![],
                &EchoHandler,
                DEFAULT_MAX_TOOL_ROUNDS,
            )
            .await
            .unwrap();
        assert_eq!(response.content, "done");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "record_fact");
    }

    #[tokio::test]
    async fn test_tool_loop_round_cap() {
        let with_call = LlmResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "1".to_string(),
                name: "advance_time".to_string(),
                arguments: serde_json::json!({}),
            }],
            finish_reason: FinishReason::ToolCalls,
            usage: None,
        };
        // Always returns a tool call; the loop must stop at the cap.
        let port = Arc::new(ScriptedLlm::new(vec![with_call]));
        let gw = gateway(port);

        let (_, calls) = gw
            .complete_with_tools(vec![LlmMessage::system("sys")], vec![], &EchoHandler, 3)
            .await
            .unwrap();
        assert_eq!(calls.len(), 3);
    }
}
