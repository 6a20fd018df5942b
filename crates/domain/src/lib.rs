//! Core domain types for the quantum-branching turn pipeline.
//!
//! Pure types and invariants only: no I/O, no async, randomness injected by
//! the caller. Everything here is session-agnostic; scoping is enforced by
//! the engine's store and managers.

pub mod attributes;
pub mod body;
pub mod branch;
pub mod checks;
pub mod delta;
pub mod entity;
pub mod error;
pub mod fact;
pub mod game_time;
pub mod item;
pub mod keys;
pub mod location;
pub mod needs;
pub mod quest;
pub mod reference;
pub mod relationship;
pub mod session;
pub mod skills;

pub use attributes::{proficiency_bonus, AttributeKind, Attributes};
pub use body::{visible_items, BodySlot, EquippedItem};
pub use branch::{
    ActionPrediction, ActionType, BranchKey, GmDecision, OutcomeVariant, QuantumBranch,
    VariantName,
};
pub use checks::{skill_check, Advantage, CheckResolution, CheckResult, MarginTier};
pub use delta::{DeltaOperation, ItemOperation, StateDelta};
pub use entity::{Appearance, Entity, EntityKind};
pub use error::DomainError;
pub use fact::{Fact, SubjectType};
pub use game_time::{
    parse_hhmm, ActivityClass, DayOfWeek, GameClock, Weather, MINUTES_PER_DAY,
};
pub use item::{Item, ItemCondition, ItemKind, ItemPlacement, StorageKind, StorageLocation};
pub use keys::{
    is_valid_key, EntityKey, ItemKey, LocationKey, QuestKey, SessionId, StorageKey,
};
pub use location::{Direction, Location, LocationCategory};
pub use needs::{CharacterNeeds, NeedKind, SatisfyQuality};
pub use quest::{Appointment, Quest, QuestStatus, ScheduleEntry};
pub use reference::{contains_refs, parse_refs, strip_refs, TaggedRef};
pub use relationship::{Attitude, AttitudeDimension, Relationship, RelationshipChange};
pub use session::{Session, SessionStatus, TurnRecord};
pub use skills::Skill;
