//! Sessions and turn records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::keys::{EntityKey, SessionId};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            _ => Err(DomainError::parse(format!("Unknown session status: {}", s))),
        }
    }
}

/// The top-level game world; every other record is scoped to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    /// Free-text setting description fed into generation prompts.
    pub setting: String,
    pub player_entity: EntityKey,
    pub status: SessionStatus,
    pub total_turns: u32,
    /// Monotonic counter bumped on every applied state delta; the staleness
    /// key for cached branches.
    pub state_version: u64,
    pub created_at: DateTime<Utc>,
}

/// An immutable record of one processed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    /// Strictly increasing per session.
    pub turn_number: u32,
    pub player_input: String,
    /// Raw narrative with `[key:display]` tags preserved.
    pub gm_response: String,
    /// Item keys mentioned this turn.
    pub mentioned_items: Vec<String>,
    /// Out-of-character exchanges are excluded from generation context.
    pub is_ooc: bool,
    pub created_at: DateTime<Utc>,
}
