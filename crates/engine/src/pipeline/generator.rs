//! Branch generator: one structured LLM call per (action, decision) pair.
//!
//! The call requests a `{variant_name -> variant}` map. Results run through
//! the branch validator; repairable issues are fed back as feedback for up
//! to `max_retries` regeneration attempts. The sync path passes the raw
//! player input so topic-sensitive interactions stay faithful.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use sqlx::SqliteConnection;
use thiserror::Error;

use chrono::Utc;
use fateweaver_domain::{
    ActionPrediction, BranchKey, GmDecision, LocationKey, OutcomeVariant, QuantumBranch,
    TurnRecord, VariantName,
};

use crate::infrastructure::gateway::LlmGateway;
use crate::infrastructure::ports::{LlmError, LlmMessage};
use crate::managers::{ManagerError, Managers};
use crate::pipeline::validators::{self, BranchValidator, ValidationIssue};
use crate::scene::NarratorManifest;

/// Default regeneration attempts after a failed validation.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("branch failed validation after retries: {0}")]
    Validation(String),

    #[error("manager error during validation: {0}")]
    Manager(#[from] ManagerError),
}

pub struct BranchGenerator {
    gateway: Arc<LlmGateway>,
    max_retries: u32,
}

impl BranchGenerator {
    pub fn new(gateway: Arc<LlmGateway>, max_retries: u32) -> Self {
        Self {
            gateway,
            max_retries,
        }
    }

    /// Generate a validated branch for one (action, decision) pair.
    pub async fn generate(
        &self,
        conn: &mut SqliteConnection,
        managers: &Managers,
        manifest: &NarratorManifest,
        setting: &str,
        action: &ActionPrediction,
        decision: &GmDecision,
        recent_turns: &[TurnRecord],
        player_input: Option<&str>,
        state_version: u64,
    ) -> Result<QuantumBranch, GeneratorError> {
        let started = Instant::now();
        let mut feedback: Option<String> = None;

        for attempt in 0..=self.max_retries {
            let messages = self.build_messages(
                manifest,
                setting,
                action,
                decision,
                recent_turns,
                player_input,
                feedback.as_deref(),
            );
            let value = self
                .gateway
                .complete_structured(messages, &branch_schema(), &["variants"])
                .await;

            let value = match value {
                Ok(value) => value,
                Err(LlmError::ContextTooLong(msg)) if attempt == 0 => {
                    // Shrink context once: drop turn history and retry.
                    tracing::warn!(error = %msg, "context too long, retrying with shrunk context");
                    let messages = self.build_messages(
                        manifest,
                        setting,
                        action,
                        decision,
                        &[],
                        player_input,
                        None,
                    );
                    self.gateway
                        .complete_structured(messages, &branch_schema(), &["variants"])
                        .await?
                }
                Err(other) => return Err(other.into()),
            };

            let variants: BTreeMap<VariantName, OutcomeVariant> =
                match serde_json::from_value(value["variants"].clone()) {
                    Ok(variants) => variants,
                    Err(err) => {
                        feedback = Some(format!("- [bad_schema] {}", err));
                        tracing::warn!(attempt, error = %err, "branch payload failed to deserialize");
                        continue;
                    }
                };

            let location =
                LocationKey::new(manifest.location.key.clone()).map_err(ManagerError::from)?;
            let branch = QuantumBranch {
                key: BranchKey::new(
                    location,
                    action.action_type.clone(),
                    action.target_key.clone(),
                    decision.key.clone(),
                ),
                action: action.clone(),
                decision: decision.clone(),
                variants,
                generated_at: Utc::now(),
                state_version,
                generation_ms: started.elapsed().as_millis() as u64,
            };

            let issues = BranchValidator::validate(conn, managers, &branch, manifest).await?;
            if !validators::has_errors(&issues) {
                log_warnings(&issues, &branch.key);
                tracing::debug!(
                    branch = %branch.key,
                    attempt,
                    generation_ms = branch.generation_ms,
                    "branch generated"
                );
                return Ok(branch);
            }

            tracing::warn!(
                branch = %branch.key,
                attempt,
                issues = issues.len(),
                "branch failed validation, regenerating with feedback"
            );
            feedback = Some(validators::feedback(&issues));
        }

        Err(GeneratorError::Validation(
            feedback.unwrap_or_else(|| "unknown validation failure".to_string()),
        ))
    }

    /// Fallback path: let the model narrate freely and call tools for
    /// world changes; tool calls map onto deltas before apply. Produces a
    /// success-only branch validated like any other.
    pub async fn generate_via_tools(
        &self,
        conn: &mut SqliteConnection,
        managers: &Managers,
        manifest: &NarratorManifest,
        setting: &str,
        action: &ActionPrediction,
        recent_turns: &[TurnRecord],
        player_input: &str,
        state_version: u64,
    ) -> Result<QuantumBranch, GeneratorError> {
        let started = Instant::now();
        let decision = GmDecision::no_twist();
        let mut messages = self.build_messages(
            manifest,
            setting,
            action,
            &decision,
            recent_turns,
            Some(player_input),
            None,
        );
        if let Some(first) = messages.first_mut() {
            first.content.push_str(
                "\n\nCall the provided tools for every world change, then reply with the \
                 narrative prose only (with [entity_key:display] tags).",
            );
        }

        let collector = crate::pipeline::tools::DeltaCollector::new();
        let (response, _calls) = self
            .gateway
            .complete_with_tools(
                messages,
                crate::pipeline::tools::narrator_tool_definitions(),
                &collector,
                crate::infrastructure::gateway::DEFAULT_MAX_TOOL_ROUNDS,
            )
            .await?;

        let variant = OutcomeVariant {
            narrative: response.content,
            state_deltas: collector.into_deltas(),
            requires_dice: false,
            dc: None,
            skill: None,
            time_passed_minutes: 1,
        };
        let location =
            LocationKey::new(manifest.location.key.clone()).map_err(ManagerError::from)?;
        let branch = QuantumBranch {
            key: BranchKey::new(
                location,
                action.action_type.clone(),
                action.target_key.clone(),
                decision.key.clone(),
            ),
            action: action.clone(),
            decision,
            variants: [(VariantName::Success, variant)].into_iter().collect(),
            generated_at: Utc::now(),
            state_version,
            generation_ms: started.elapsed().as_millis() as u64,
        };

        let issues = BranchValidator::validate(conn, managers, &branch, manifest).await?;
        if validators::has_errors(&issues) {
            return Err(GeneratorError::Validation(validators::feedback(&issues)));
        }
        log_warnings(&issues, &branch.key);
        Ok(branch)
    }

    fn build_messages(
        &self,
        manifest: &NarratorManifest,
        setting: &str,
        action: &ActionPrediction,
        decision: &GmDecision,
        recent_turns: &[TurnRecord],
        player_input: Option<&str>,
        feedback: Option<&str>,
    ) -> Vec<LlmMessage> {
        let system = format!(
            "You are the game master of a text RPG set in: {setting}\n\
             Generate outcome variants for the player action below.\n\
             RULES:\n\
             - Reference entities ONLY with [entity_key:display text] tags.\n\
             - Every entity_key MUST come from the scene manifest. Never invent keys.\n\
             - Never mention a listed entity's name without its tag.\n\
             - Write 2-4 sentences of second-person narrative per variant.\n\
             - Include a 'success' variant. If the action warrants a dice check, set\n\
               requires_dice=true with a dc (8-25) and skill, and include a 'failure' variant.\n\
             - state_deltas record every world change the narrative implies.\n\
             - Do not ask the player questions."
        );

        let mut user = String::new();
        user.push_str("SCENE MANIFEST:\n");
        user.push_str(&manifest.prompt_block());
        user.push('\n');

        if !recent_turns.is_empty() {
            user.push_str("RECENT TURNS:\n");
            for turn in recent_turns.iter().filter(|t| !t.is_ooc) {
                user.push_str(&format!(
                    "> {}\n{}\n",
                    turn.player_input, turn.gm_response
                ));
            }
            user.push('\n');
        }

        user.push_str(&format!(
            "ANTICIPATED ACTION: {} (target: {})\n",
            action.action_type,
            action.target_key.as_deref().unwrap_or("none")
        ));
        if let Some(input) = player_input {
            user.push_str(&format!("ACTUAL PLAYER INPUT: {}\n", input));
        }
        user.push_str(&format!(
            "GM DECISION: {} - {}\n",
            decision.key, decision.description
        ));
        if !decision.grounding_facts.is_empty() {
            user.push_str(&format!(
                "GROUNDING FACTS: {}\n",
                decision.grounding_facts.join(", ")
            ));
        }
        if let Some(feedback) = feedback {
            user.push_str(&format!(
                "\nYOUR PREVIOUS ATTEMPT HAD THESE PROBLEMS, FIX THEM:\n{}\n",
                feedback
            ));
        }

        vec![LlmMessage::system(system), LlmMessage::user(user)]
    }
}

fn log_warnings(issues: &[ValidationIssue], branch_key: &BranchKey) {
    for issue in issues {
        tracing::debug!(branch = %branch_key, code = issue.code, message = %issue.message, "validation warning");
    }
}

/// JSON schema sent with every structured branch request.
fn branch_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["variants"],
        "properties": {
            "variants": {
                "type": "object",
                "description": "Map of variant name to outcome. 'success' required; 'failure' required when requires_dice.",
                "properties": {
                    "success": { "$ref": "#/definitions/variant" },
                    "failure": { "$ref": "#/definitions/variant" },
                    "critical_success": { "$ref": "#/definitions/variant" },
                    "critical_failure": { "$ref": "#/definitions/variant" }
                }
            }
        },
        "definitions": {
            "variant": {
                "type": "object",
                "required": ["narrative"],
                "properties": {
                    "narrative": { "type": "string" },
                    "stateDeltas": { "type": "array", "items": { "type": "object" } },
                    "requiresDice": { "type": "boolean" },
                    "dc": { "type": "integer" },
                    "skill": { "type": "string" },
                    "timePassedMinutes": { "type": "integer" }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::gateway::RoleSettings;
    use crate::infrastructure::ports::{
        FinishReason, LlmPort, LlmRequest, LlmResponse, ToolDefinition,
    };
    use crate::scene::ManifestBuilder;
    use crate::store::Store;
    use crate::test_support::seed_session;
    use async_trait::async_trait;
    use fateweaver_domain::ActionType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// LLM that returns scripted payloads in order.
    struct ScriptedLlm {
        payloads: Vec<String>,
        cursor: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(payloads: Vec<String>) -> Self {
            Self {
                payloads,
                cursor: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.cursor.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmPort for ScriptedLlm {
        async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            Ok(LlmResponse {
                content: self.payloads[index.min(self.payloads.len() - 1)].clone(),
                tool_calls: vec![],
                finish_reason: FinishReason::Stop,
                usage: None,
            })
        }

        async fn generate_with_tools(
            &self,
            request: LlmRequest,
            _tools: Vec<ToolDefinition>,
        ) -> Result<LlmResponse, LlmError> {
            self.generate(request).await
        }
    }

    fn gateway(llm: Arc<ScriptedLlm>) -> Arc<LlmGateway> {
        let settings = RoleSettings {
            temperature: 0.2,
            max_tokens: 2048,
        };
        Arc::new(LlmGateway::single(llm, settings, settings))
    }

    fn greet_action() -> ActionPrediction {
        ActionPrediction::new(ActionType::InteractNpc, 0.5)
            .with_target("bartender_001", "Marcus")
    }

    const GOOD_PAYLOAD: &str = r#"{
        "variants": {
            "success": {
                "narrative": "[bartender_001:Marcus] looks up and nods.",
                "stateDeltas": [],
                "requiresDice": false,
                "timePassedMinutes": 1
            }
        }
    }"#;

    const UNGROUNDED_PAYLOAD: &str = r#"{
        "variants": {
            "success": {
                "narrative": "[stranger_99:A hooded stranger] beckons you over.",
                "stateDeltas": [],
                "requiresDice": false,
                "timePassedMinutes": 1
            }
        }
    }"#;

    #[tokio::test]
    async fn test_generates_valid_branch() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();
        let manifest = ManifestBuilder::build(&mut conn, &ctx.managers, "tavern", "player")
            .await
            .unwrap();

        let llm = Arc::new(ScriptedLlm::new(vec![GOOD_PAYLOAD.to_string()]));
        let generator = BranchGenerator::new(gateway(Arc::clone(&llm)), 2);

        let branch = generator
            .generate(
                &mut conn,
                &ctx.managers,
                &manifest,
                "test setting",
                &greet_action(),
                &GmDecision::no_twist(),
                &[],
                None,
                0,
            )
            .await
            .unwrap();

        assert_eq!(
            branch.key.to_string(),
            "tavern::interact_npc::bartender_001::no_twist"
        );
        assert!(branch.variants.contains_key(&VariantName::Success));
        assert_eq!(branch.state_version, 0);
    }

    #[tokio::test]
    async fn test_retries_with_feedback_on_grounding_failure() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();
        let manifest = ManifestBuilder::build(&mut conn, &ctx.managers, "tavern", "player")
            .await
            .unwrap();

        let llm = Arc::new(ScriptedLlm::new(vec![
            UNGROUNDED_PAYLOAD.to_string(),
            GOOD_PAYLOAD.to_string(),
        ]));
        let generator = BranchGenerator::new(gateway(Arc::clone(&llm)), 2);

        let branch = generator
            .generate(
                &mut conn,
                &ctx.managers,
                &manifest,
                "test setting",
                &greet_action(),
                &GmDecision::no_twist(),
                &[],
                None,
                0,
            )
            .await
            .unwrap();
        assert_eq!(llm.calls(), 2);
        assert!(branch.validate().is_ok());
    }

    #[tokio::test]
    async fn test_persistent_failure_escalates() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();
        let manifest = ManifestBuilder::build(&mut conn, &ctx.managers, "tavern", "player")
            .await
            .unwrap();

        let llm = Arc::new(ScriptedLlm::new(vec![UNGROUNDED_PAYLOAD.to_string()]));
        let generator = BranchGenerator::new(gateway(Arc::clone(&llm)), 2);

        let result = generator
            .generate(
                &mut conn,
                &ctx.managers,
                &manifest,
                "test setting",
                &greet_action(),
                &GmDecision::no_twist(),
                &[],
                None,
                0,
            )
            .await;
        assert!(matches!(result, Err(GeneratorError::Validation(_))));
        // Initial attempt + two retries.
        assert_eq!(llm.calls(), 3);
    }
}
