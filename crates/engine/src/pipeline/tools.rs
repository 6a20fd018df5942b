//! Narrator tool vocabulary for the tool-loop fallback path.
//!
//! When structured branch generation keeps failing validation, the
//! generator falls back to a tool loop: the model narrates freely and calls
//! tools for world changes. Every tool call maps onto a `StateDelta`
//! before apply, so the fallback path reuses the same validators and
//! managers as the structured path.

use std::str::FromStr;
use std::sync::Mutex;

use serde_json::Value;

use fateweaver_domain::{
    AttitudeDimension, DeltaOperation, EntityKey, ItemKey, ItemOperation, LocationKey, NeedKind,
    SatisfyQuality, StateDelta, SubjectType,
};

use crate::infrastructure::gateway::ToolHandler;
use crate::infrastructure::ports::{LlmError, ToolCall, ToolDefinition};

/// The tools offered to the narrator in fallback mode.
pub fn narrator_tool_definitions() -> Vec<ToolDefinition> {
    let tool = |name: &str, description: &str, parameters: Value| ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    };

    vec![
        tool(
            "record_fact",
            "Record a fact about an entity, item, or location",
            serde_json::json!({
                "type": "object",
                "required": ["subject_type", "subject_key", "predicate", "value"],
                "properties": {
                    "subject_type": { "type": "string", "enum": ["entity", "item", "location"] },
                    "subject_key": { "type": "string" },
                    "predicate": { "type": "string" },
                    "value": { "type": "string" }
                }
            }),
        ),
        tool(
            "adjust_relationship",
            "Shift one attitude dimension of an NPC toward another entity",
            serde_json::json!({
                "type": "object",
                "required": ["entity_key", "toward", "dimension", "delta"],
                "properties": {
                    "entity_key": { "type": "string" },
                    "toward": { "type": "string" },
                    "dimension": { "type": "string" },
                    "delta": { "type": "integer" },
                    "reason": { "type": "string" }
                }
            }),
        ),
        tool(
            "transfer_item",
            "Hand an item to an entity",
            serde_json::json!({
                "type": "object",
                "required": ["item_key", "to_entity"],
                "properties": {
                    "item_key": { "type": "string" },
                    "to_entity": { "type": "string" }
                }
            }),
        ),
        tool(
            "move_entity",
            "Move an entity to another location",
            serde_json::json!({
                "type": "object",
                "required": ["entity_key", "to_location"],
                "properties": {
                    "entity_key": { "type": "string" },
                    "to_location": { "type": "string" }
                }
            }),
        ),
        tool(
            "satisfy_need",
            "Satisfy one of an entity's needs through an activity",
            serde_json::json!({
                "type": "object",
                "required": ["entity_key", "need", "activity"],
                "properties": {
                    "entity_key": { "type": "string" },
                    "need": { "type": "string" },
                    "activity": { "type": "string" },
                    "quality": { "type": "string", "enum": ["poor", "adequate", "good", "excellent"] }
                }
            }),
        ),
        tool(
            "damage_entity",
            "Deal hit point damage to an entity",
            serde_json::json!({
                "type": "object",
                "required": ["entity_key", "amount"],
                "properties": {
                    "entity_key": { "type": "string" },
                    "amount": { "type": "integer", "minimum": 1 }
                }
            }),
        ),
        tool(
            "heal_entity",
            "Restore hit points to an entity",
            serde_json::json!({
                "type": "object",
                "required": ["entity_key", "amount"],
                "properties": {
                    "entity_key": { "type": "string" },
                    "amount": { "type": "integer", "minimum": 1 }
                }
            }),
        ),
    ]
}

fn str_arg(arguments: &Value, name: &str) -> Result<String, String> {
    arguments
        .get(name)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| format!("missing string argument '{}'", name))
}

fn int_arg(arguments: &Value, name: &str) -> Result<i64, String> {
    arguments
        .get(name)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| format!("missing integer argument '{}'", name))
}

/// Map one narrator tool call onto a state delta.
pub fn tool_call_to_delta(call: &ToolCall) -> Result<StateDelta, String> {
    let args = &call.arguments;
    let entity = |name: &str| -> Result<EntityKey, String> {
        EntityKey::new(str_arg(args, name)?).map_err(|e| e.to_string())
    };

    match call.name.as_str() {
        "record_fact" => Ok(StateDelta::Fact {
            subject_type: SubjectType::from_str(&str_arg(args, "subject_type")?)
                .map_err(|e| e.to_string())?,
            subject_key: str_arg(args, "subject_key")?,
            predicate: str_arg(args, "predicate")?,
            value: str_arg(args, "value")?,
            operation: DeltaOperation::Add,
            is_secret: false,
        }),
        "adjust_relationship" => Ok(StateDelta::Relationship {
            entity_key: entity("entity_key")?,
            toward: entity("toward")?,
            dimension: AttitudeDimension::from_str(&str_arg(args, "dimension")?)
                .map_err(|e| e.to_string())?,
            delta: int_arg(args, "delta")? as i32,
            reason: str_arg(args, "reason").unwrap_or_default(),
        }),
        "transfer_item" => Ok(StateDelta::Item {
            item_key: ItemKey::new(str_arg(args, "item_key")?).map_err(|e| e.to_string())?,
            operation: ItemOperation::TransferTo {
                entity_key: entity("to_entity")?,
            },
            expected_holder: None,
        }),
        "move_entity" => Ok(StateDelta::Location {
            entity_key: entity("entity_key")?,
            to_location: LocationKey::new(str_arg(args, "to_location")?)
                .map_err(|e| e.to_string())?,
        }),
        "satisfy_need" => Ok(StateDelta::SatisfyNeed {
            entity_key: entity("entity_key")?,
            need: NeedKind::from_str(&str_arg(args, "need")?).map_err(|e| e.to_string())?,
            activity: str_arg(args, "activity")?,
            quality: str_arg(args, "quality")
                .ok()
                .and_then(|q| serde_json::from_value(Value::String(q)).ok())
                .unwrap_or(SatisfyQuality::Adequate),
        }),
        "damage_entity" => Ok(StateDelta::Damage {
            entity_key: entity("entity_key")?,
            amount: int_arg(args, "amount")?.max(0) as u32,
        }),
        "heal_entity" => Ok(StateDelta::Heal {
            entity_key: entity("entity_key")?,
            amount: int_arg(args, "amount")?.max(0) as u32,
        }),
        other => Err(format!("unknown tool '{}'", other)),
    }
}

/// Tool handler that accumulates deltas across a tool loop.
pub struct DeltaCollector {
    deltas: Mutex<Vec<StateDelta>>,
}

impl DeltaCollector {
    pub fn new() -> Self {
        Self {
            deltas: Mutex::new(Vec::new()),
        }
    }

    pub fn into_deltas(self) -> Vec<StateDelta> {
        self.deltas.into_inner().unwrap_or_default()
    }
}

impl Default for DeltaCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolHandler for DeltaCollector {
    fn handle(&self, call: &ToolCall) -> Result<Value, LlmError> {
        match tool_call_to_delta(call) {
            Ok(delta) => {
                if let Ok(mut deltas) = self.deltas.lock() {
                    deltas.push(delta);
                }
                Ok(serde_json::json!({ "ok": true }))
            }
            // Feed the mistake back to the model instead of aborting the
            // loop.
            Err(message) => Ok(serde_json::json!({ "ok": false, "error": message })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_record_fact_maps() {
        let delta = tool_call_to_delta(&call(
            "record_fact",
            serde_json::json!({
                "subject_type": "location",
                "subject_key": "cellar",
                "predicate": "lock_state",
                "value": "open"
            }),
        ))
        .unwrap();
        assert!(matches!(delta, StateDelta::Fact { .. }));
    }

    #[test]
    fn test_adjust_relationship_maps() {
        let delta = tool_call_to_delta(&call(
            "adjust_relationship",
            serde_json::json!({
                "entity_key": "bartender_001",
                "toward": "player",
                "dimension": "liking",
                "delta": 5
            }),
        ))
        .unwrap();
        match delta {
            StateDelta::Relationship {
                dimension, delta, ..
            } => {
                assert_eq!(dimension, AttitudeDimension::Liking);
                assert_eq!(delta, 5);
            }
            other => panic!("unexpected delta: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_tool_rejected() {
        let result = tool_call_to_delta(&call("summon_dragon", serde_json::json!({})));
        assert!(result.is_err());
    }

    #[test]
    fn test_collector_keeps_valid_and_reports_invalid() {
        let collector = DeltaCollector::new();
        collector
            .handle(&call(
                "transfer_item",
                serde_json::json!({ "item_key": "rusty_key", "to_entity": "player" }),
            ))
            .unwrap();
        let response = collector
            .handle(&call("summon_dragon", serde_json::json!({})))
            .unwrap();
        assert_eq!(response["ok"], false);

        let deltas = collector.into_deltas();
        assert_eq!(deltas.len(), 1);
    }
}
