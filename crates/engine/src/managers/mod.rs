//! Managers: invariant-preserving mutations over the store.
//!
//! One manager per domain. Public operations take keys and value deltas
//! only, never raw records, and run against a `&mut SqliteConnection` so
//! the collapse manager can drive them inside a single transaction.

pub mod combat;
pub mod death;
pub mod delta;
pub mod entity;
pub mod fact;
pub mod grief;
pub mod item;
pub mod location;
pub mod needs;
pub mod quest;
pub mod relationship;
pub mod time;

use std::sync::Arc;

use thiserror::Error;

use fateweaver_domain::{DomainError, SessionId};

use crate::infrastructure::ports::RandomPort;
use crate::store::StoreError;

pub use combat::CombatManager;
pub use death::DeathManager;
pub use delta::{AppliedChange, DeltaApplier};
pub use entity::EntityManager;
pub use fact::FactManager;
pub use grief::GriefManager;
pub use item::ItemManager;
pub use location::LocationManager;
pub use needs::NeedsManager;
pub use quest::QuestManager;
pub use relationship::RelationshipManager;
pub use time::TimeManager;

/// Errors surfaced by manager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Not found: {entity_type} with key {key}")]
    NotFound {
        entity_type: &'static str,
        key: String,
    },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Programmer bug: a query crossed a session boundary.
    #[error("Scope violation: {0}")]
    ScopeViolation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(StoreError),
}

impl ManagerError {
    pub fn not_found(entity_type: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            key: key.into(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<StoreError> for ManagerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ScopeViolation(msg) => ManagerError::ScopeViolation(msg),
            other => ManagerError::Store(other),
        }
    }
}

impl From<DomainError> for ManagerError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity_type, key } => {
                ManagerError::NotFound { entity_type, key }
            }
            DomainError::InvariantViolation(msg) => ManagerError::InvariantViolation(msg),
            DomainError::ScopeViolation(msg) => ManagerError::ScopeViolation(msg),
            DomainError::InvalidInput(msg) | DomainError::Parse(msg) => {
                ManagerError::InvalidInput(msg)
            }
        }
    }
}

/// The full manager set for one session.
pub struct Managers {
    pub entities: EntityManager,
    pub items: ItemManager,
    pub locations: LocationManager,
    pub relationships: RelationshipManager,
    pub facts: FactManager,
    pub needs: NeedsManager,
    pub time: TimeManager,
    pub quests: QuestManager,
    pub combat: CombatManager,
    pub death: DeathManager,
    pub grief: GriefManager,
}

impl Managers {
    pub fn new(session_id: SessionId, random: Arc<dyn RandomPort>) -> Self {
        let sid = session_id.to_string();
        Self {
            entities: EntityManager::new(sid.clone()),
            items: ItemManager::new(sid.clone()),
            locations: LocationManager::new(sid.clone()),
            relationships: RelationshipManager::new(sid.clone(), Arc::clone(&random)),
            facts: FactManager::new(sid.clone()),
            needs: NeedsManager::new(sid.clone()),
            time: TimeManager::new(sid.clone(), random),
            quests: QuestManager::new(sid.clone()),
            combat: CombatManager::new(sid.clone()),
            death: DeathManager::new(sid.clone()),
            grief: GriefManager::new(sid),
        }
    }
}
