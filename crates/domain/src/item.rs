//! Items and storage locations.

use serde::{Deserialize, Serialize};

use crate::body::BodySlot;
use crate::error::DomainError;
use crate::keys::{EntityKey, ItemKey, LocationKey, StorageKey};

/// Broad item categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Weapon,
    Apparel,
    Consumable,
    Container,
    Tool,
    Valuable,
    Mundane,
    #[serde(untagged)]
    Other(String),
}

impl ItemKind {
    /// Whether items of this kind can back a container storage.
    pub fn can_contain(&self) -> bool {
        matches!(self, ItemKind::Container)
    }

    /// Mundane items score lower in action prediction.
    pub fn is_mundane(&self) -> bool {
        matches!(self, ItemKind::Mundane)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ItemKind::Weapon => "weapon",
            ItemKind::Apparel => "apparel",
            ItemKind::Consumable => "consumable",
            ItemKind::Container => "container",
            ItemKind::Tool => "tool",
            ItemKind::Valuable => "valuable",
            ItemKind::Mundane => "mundane",
            ItemKind::Other(name) => name,
        }
    }
}

impl std::str::FromStr for ItemKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "weapon" => Self::Weapon,
            "apparel" => Self::Apparel,
            "consumable" => Self::Consumable,
            "container" => Self::Container,
            "tool" => Self::Tool,
            "valuable" => Self::Valuable,
            "mundane" => Self::Mundane,
            _ => Self::Other(s.to_string()),
        })
    }
}

/// Wear state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    Pristine,
    Good,
    Worn,
    Damaged,
    Broken,
}

impl ItemCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCondition::Pristine => "pristine",
            ItemCondition::Good => "good",
            ItemCondition::Worn => "worn",
            ItemCondition::Damaged => "damaged",
            ItemCondition::Broken => "broken",
        }
    }
}

impl std::str::FromStr for ItemCondition {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pristine" => Ok(Self::Pristine),
            "good" => Ok(Self::Good),
            "worn" => Ok(Self::Worn),
            "damaged" => Ok(Self::Damaged),
            "broken" => Ok(Self::Broken),
            _ => Err(DomainError::parse(format!("Unknown condition: {}", s))),
        }
    }
}

/// Where an item physically is. Exactly one of these holds at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemPlacement {
    /// Carried by an entity.
    Held(EntityKey),
    /// Inside a storage location.
    Stored(StorageKey),
    /// Lying in the environment of a location.
    AtLocation(LocationKey),
}

/// An item in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub key: ItemKey,
    pub display_name: String,
    pub kind: ItemKind,
    /// Permanent owner; transfers touch the holder, sales touch this.
    pub owner_entity: Option<EntityKey>,
    pub placement: ItemPlacement,
    /// Set iff equipped by the holding entity.
    pub body_slot: Option<BodySlot>,
    pub body_layer: Option<u8>,
    pub weight: f32,
    pub condition: ItemCondition,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub properties: serde_json::Value,
}

impl Item {
    /// A loose item lying at a location.
    pub fn at_location(
        key: ItemKey,
        display_name: impl Into<String>,
        kind: ItemKind,
        location: LocationKey,
    ) -> Self {
        Self {
            key,
            display_name: display_name.into(),
            kind,
            owner_entity: None,
            placement: ItemPlacement::AtLocation(location),
            body_slot: None,
            body_layer: None,
            weight: 1.0,
            condition: ItemCondition::Good,
            properties: serde_json::Value::Null,
        }
    }

    /// The entity carrying this item, if any.
    pub fn holder(&self) -> Option<&EntityKey> {
        match &self.placement {
            ItemPlacement::Held(entity) => Some(entity),
            _ => None,
        }
    }

    /// Equipping requires the item to be held; `body_slot` never changes the
    /// holder.
    pub fn validate_equipped(&self) -> Result<(), DomainError> {
        if self.body_slot.is_some() && self.holder().is_none() {
            return Err(DomainError::invariant(format!(
                "item '{}' has a body slot but no holder",
                self.key
            )));
        }
        if self.body_slot.is_some() != self.body_layer.is_some() {
            return Err(DomainError::invariant(format!(
                "item '{}' must set body_slot and body_layer together",
                self.key
            )));
        }
        Ok(())
    }
}

/// Storage location kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Worn or carried containers (pockets, backpack in hand).
    OnPerson,
    /// A container item (chest, crate).
    Container,
    /// A fixed place (shelf, altar).
    Place,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::OnPerson => "on_person",
            StorageKind::Container => "container",
            StorageKind::Place => "place",
        }
    }
}

impl std::str::FromStr for StorageKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on_person" => Ok(Self::OnPerson),
            "container" => Ok(Self::Container),
            "place" => Ok(Self::Place),
            _ => Err(DomainError::parse(format!("Unknown storage kind: {}", s))),
        }
    }
}

/// A place items can be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageLocation {
    pub key: StorageKey,
    pub display_name: String,
    pub kind: StorageKind,
    pub owner_entity: Option<EntityKey>,
    /// For `Container` kind: the backing item, whose kind must permit
    /// containment.
    pub container_item: Option<ItemKey>,
    pub location: Option<LocationKey>,
    /// Maximum total weight; None = unbounded.
    pub capacity: Option<f32>,
}

impl StorageLocation {
    /// A container-kind storage must reference its backing item.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.kind == StorageKind::Container && self.container_item.is_none() {
            return Err(DomainError::invariant(format!(
                "container storage '{}' has no backing item",
                self.key
            )));
        }
        Ok(())
    }
}
