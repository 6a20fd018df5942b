//! Body slots and equipment layering.
//!
//! Within a slot, items stack by layer (0 = skin). An item is visible iff it
//! has the maximum layer in its slot and no covering slot holds an item at a
//! higher effective layer.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::keys::ItemKey;

/// Slots an item can be equipped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodySlot {
    Head,
    Neck,
    Torso,
    Hands,
    Waist,
    Legs,
    Feet,
    FullBody,
}

impl BodySlot {
    /// Slots whose contents this slot covers when occupied.
    pub fn covers(&self) -> &'static [BodySlot] {
        match self {
            BodySlot::FullBody => &[BodySlot::Torso, BodySlot::Legs],
            _ => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BodySlot::Head => "head",
            BodySlot::Neck => "neck",
            BodySlot::Torso => "torso",
            BodySlot::Hands => "hands",
            BodySlot::Waist => "waist",
            BodySlot::Legs => "legs",
            BodySlot::Feet => "feet",
            BodySlot::FullBody => "full_body",
        }
    }
}

impl std::str::FromStr for BodySlot {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "head" => Ok(Self::Head),
            "neck" => Ok(Self::Neck),
            "torso" => Ok(Self::Torso),
            "hands" => Ok(Self::Hands),
            "waist" => Ok(Self::Waist),
            "legs" => Ok(Self::Legs),
            "feet" => Ok(Self::Feet),
            "full_body" | "fullbody" => Ok(Self::FullBody),
            _ => Err(DomainError::parse(format!("Unknown body slot: {}", s))),
        }
    }
}

impl std::fmt::Display for BodySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One equipped item as seen by the layering algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquippedItem {
    pub item_key: ItemKey,
    pub slot: BodySlot,
    pub layer: u8,
}

/// Compute the set of visible item keys among equipped items.
///
/// Visibility rule: an item is visible iff it has the maximum layer in its
/// slot AND no covering slot (e.g. `full_body` over `torso`/`legs`) holds an
/// item at a layer >= this item's layer.
pub fn visible_items(equipped: &[EquippedItem]) -> Vec<ItemKey> {
    let top_of = |slot: BodySlot| -> Option<&EquippedItem> {
        equipped
            .iter()
            .filter(|e| e.slot == slot)
            .max_by_key(|e| e.layer)
    };

    let mut visible = Vec::new();
    for item in equipped {
        let Some(top) = top_of(item.slot) else {
            continue;
        };
        if top.item_key != item.item_key {
            continue;
        }

        let covered = [
            BodySlot::Head,
            BodySlot::Neck,
            BodySlot::Torso,
            BodySlot::Hands,
            BodySlot::Waist,
            BodySlot::Legs,
            BodySlot::Feet,
            BodySlot::FullBody,
        ]
        .into_iter()
        .filter(|covering| covering.covers().contains(&item.slot))
        .filter_map(top_of)
        .any(|covering_top| covering_top.layer >= item.layer);

        if !covered {
            visible.push(item.item_key.clone());
        }
    }
    visible
}
