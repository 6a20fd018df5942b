//! Structured state deltas.
//!
//! Deltas are the only way generated outcomes mutate the world. Each kind
//! maps onto one manager operation; the collapse manager applies a variant's
//! deltas inside a single transaction.

use serde::{Deserialize, Serialize};

use crate::fact::SubjectType;
use crate::keys::{EntityKey, ItemKey, LocationKey, StorageKey};
use crate::needs::{NeedKind, SatisfyQuality};
use crate::relationship::AttitudeDimension;

/// Add/update/remove discriminator for fact deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaOperation {
    #[default]
    Add,
    Update,
    Remove,
}

/// What happens to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ItemOperation {
    /// Hand the item to an entity (changes holder, not owner).
    TransferTo { entity_key: EntityKey },
    /// Drop the item into a location's environment.
    PlaceAt { location_key: LocationKey },
    /// Put the item into a storage location.
    StoreIn { storage_key: StorageKey },
    /// Remove the item from the world.
    Destroy,
}

/// One structured world mutation inside an outcome variant.
///
/// Every key referenced must resolve to a live record at apply time; the
/// delta validator re-checks this immediately before application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StateDelta {
    /// Adjust one attitude dimension of `entity_key` toward `toward`.
    Relationship {
        entity_key: EntityKey,
        toward: EntityKey,
        dimension: AttitudeDimension,
        delta: i32,
        #[serde(default)]
        reason: String,
    },
    /// First meeting between two entities; forces a familiarity bump.
    RelationshipMeeting {
        entity_key: EntityKey,
        toward: EntityKey,
    },
    /// Record, update, or retract a fact.
    Fact {
        subject_type: SubjectType,
        subject_key: String,
        predicate: String,
        value: String,
        #[serde(default)]
        operation: DeltaOperation,
        #[serde(default)]
        is_secret: bool,
    },
    /// Move, transfer, store, or destroy an item.
    Item {
        item_key: ItemKey,
        #[serde(flatten)]
        operation: ItemOperation,
        /// Holder the generator believed the item had; mismatches at apply
        /// time mean the branch is stale.
        #[serde(default)]
        expected_holder: Option<EntityKey>,
    },
    /// Move an entity to another location.
    Location {
        entity_key: EntityKey,
        to_location: LocationKey,
    },
    /// Satisfy a need through an activity of a given quality.
    SatisfyNeed {
        entity_key: EntityKey,
        need: NeedKind,
        activity: String,
        quality: SatisfyQuality,
    },
    /// Damage an entity's hit points.
    Damage { entity_key: EntityKey, amount: u32 },
    /// Heal an entity's hit points.
    Heal { entity_key: EntityKey, amount: u32 },
    /// Equip (or unequip) a held item into a body slot.
    Equip {
        entity_key: EntityKey,
        item_key: ItemKey,
        slot: Option<crate::body::BodySlot>,
        layer: Option<u8>,
        #[serde(default)]
        unequip: bool,
    },
}

impl StateDelta {
    /// Short label for logging and state-change summaries.
    pub fn kind_str(&self) -> &'static str {
        match self {
            StateDelta::Relationship { .. } => "relationship",
            StateDelta::RelationshipMeeting { .. } => "relationship_meeting",
            StateDelta::Fact { .. } => "fact",
            StateDelta::Item { .. } => "item",
            StateDelta::Location { .. } => "location",
            StateDelta::SatisfyNeed { .. } => "satisfy_need",
            StateDelta::Damage { .. } => "damage",
            StateDelta::Heal { .. } => "heal",
            StateDelta::Equip { .. } => "equip",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_json_shape() {
        let delta = StateDelta::Relationship {
            entity_key: EntityKey::new("bartender_001").unwrap(),
            toward: EntityKey::new("player").unwrap(),
            dimension: AttitudeDimension::Liking,
            delta: 5,
            reason: "friendly greeting".to_string(),
        };
        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(json["kind"], "relationship");
        assert_eq!(json["dimension"], "liking");
    }

    #[test]
    fn test_item_delta_round_trip() {
        let json = serde_json::json!({
            "kind": "item",
            "itemKey": "rusty_key",
            "op": "transfer_to",
            "entityKey": "player"
        });
        let delta: StateDelta = serde_json::from_value(json).unwrap();
        match delta {
            StateDelta::Item {
                item_key,
                operation: ItemOperation::TransferTo { entity_key },
                expected_holder,
            } => {
                assert_eq!(item_key.as_str(), "rusty_key");
                assert_eq!(entity_key.as_str(), "player");
                assert!(expected_holder.is_none());
            }
            other => panic!("unexpected delta: {:?}", other),
        }
    }

    #[test]
    fn test_fact_delta_defaults() {
        let json = serde_json::json!({
            "kind": "fact",
            "subjectType": "location",
            "subjectKey": "cellar",
            "predicate": "lock_state",
            "value": "open"
        });
        let delta: StateDelta = serde_json::from_value(json).unwrap();
        match delta {
            StateDelta::Fact {
                operation,
                is_secret,
                ..
            } => {
                assert_eq!(operation, DeltaOperation::Add);
                assert!(!is_secret);
            }
            other => panic!("unexpected delta: {:?}", other),
        }
    }
}
