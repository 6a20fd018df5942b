//! Locations and spatial structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::keys::LocationKey;

/// Compass and relative directions for exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "north" | "n" => Ok(Self::North),
            "south" | "s" => Ok(Self::South),
            "east" | "e" => Ok(Self::East),
            "west" | "w" => Ok(Self::West),
            "up" | "u" => Ok(Self::Up),
            "down" | "d" => Ok(Self::Down),
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            _ => Err(DomainError::parse(format!("Unknown direction: {}", s))),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse category of a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationCategory {
    Settlement,
    Building,
    Room,
    Outdoor,
    Dungeon,
    #[serde(untagged)]
    Other(String),
}

impl std::str::FromStr for LocationCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "settlement" => Self::Settlement,
            "building" => Self::Building,
            "room" => Self::Room,
            "outdoor" => Self::Outdoor,
            "dungeon" => Self::Dungeon,
            _ => Self::Other(s.to_string()),
        })
    }
}

impl LocationCategory {
    pub fn as_str(&self) -> &str {
        match self {
            LocationCategory::Settlement => "settlement",
            LocationCategory::Building => "building",
            LocationCategory::Room => "room",
            LocationCategory::Outdoor => "outdoor",
            LocationCategory::Dungeon => "dungeon",
            LocationCategory::Other(name) => name,
        }
    }
}

/// A place in the world. The parent graph is acyclic; exits point at
/// existing locations (both enforced by the location manager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub key: LocationKey,
    pub display_name: String,
    pub description: String,
    pub parent: Option<LocationKey>,
    pub category: LocationCategory,
    pub spatial_exits: BTreeMap<Direction, LocationKey>,
}

impl Location {
    pub fn new(
        key: LocationKey,
        display_name: impl Into<String>,
        category: LocationCategory,
    ) -> Self {
        Self {
            key,
            display_name: display_name.into(),
            description: String::new(),
            parent: None,
            category,
            spatial_exits: BTreeMap::new(),
        }
    }
}
