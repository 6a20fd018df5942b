//! Session-scoped identifiers.
//!
//! Sessions are identified by UUID. Everything inside a session is addressed
//! by a lowercase snake_case key (`[a-z0-9_]+`) so LLM output can reference
//! records stably across turns.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier for a game session. Every other record carries this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Check that a key matches `[a-z0-9_]+`.
///
/// Parsed manually to avoid a regex dependency in the domain layer.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

macro_rules! define_key {
    ($name:ident, $entity_type:literal) => {
        /// Validated snake_case key, unique per session.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a key, rejecting anything outside `[a-z0-9_]+`.
            pub fn new(key: impl Into<String>) -> Result<Self, DomainError> {
                let key = key.into();
                if is_valid_key(&key) {
                    Ok(Self(key))
                } else {
                    Err(DomainError::invalid_input(format!(
                        "{} key '{}' must match [a-z0-9_]+",
                        $entity_type, key
                    )))
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl std::str::FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_key!(EntityKey, "entity");
define_key!(ItemKey, "item");
define_key!(LocationKey, "location");
define_key!(StorageKey, "storage");
define_key!(QuestKey, "quest");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_key_accepted() {
        let key = EntityKey::new("bartender_001").unwrap();
        assert_eq!(key.as_str(), "bartender_001");
    }

    #[test]
    fn test_uppercase_rejected() {
        assert!(EntityKey::new("Bartender").is_err());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(EntityKey::new("").is_err());
    }

    #[test]
    fn test_spaces_rejected() {
        assert!(LocationKey::new("tavern main").is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let key = ItemKey::new("rusty_key").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"rusty_key\"");
        let back: ItemKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let result: Result<EntityKey, _> = serde_json::from_str("\"Not A Key\"");
        assert!(result.is_err());
    }
}
