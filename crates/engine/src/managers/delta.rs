//! Delta application: the bridge from generated `StateDelta`s to manager
//! operations.
//!
//! The collapse manager runs every delta of the chosen variant through
//! `DeltaApplier` inside one transaction; the first failure aborts the
//! transaction and nothing is observable.

use sqlx::SqliteConnection;

use fateweaver_domain::{Fact, ItemOperation, StateDelta};

use super::{ManagerError, Managers};

/// Summary of one applied delta for turn results and logs.
#[derive(Debug, Clone)]
pub struct AppliedChange {
    pub kind: &'static str,
    pub target: String,
    pub summary: String,
}

pub struct DeltaApplier<'a> {
    managers: &'a Managers,
}

impl<'a> DeltaApplier<'a> {
    pub fn new(managers: &'a Managers) -> Self {
        Self { managers }
    }

    /// Apply one delta through the owning manager.
    pub async fn apply(
        &self,
        conn: &mut SqliteConnection,
        delta: &StateDelta,
        turn_number: u32,
    ) -> Result<AppliedChange, ManagerError> {
        match delta {
            StateDelta::Relationship {
                entity_key,
                toward,
                dimension,
                delta: amount,
                reason,
            } => {
                let applied = self
                    .managers
                    .relationships
                    .update_attitude(
                        conn,
                        entity_key.as_str(),
                        toward.as_str(),
                        *dimension,
                        *amount,
                        reason,
                        turn_number,
                    )
                    .await?;
                Ok(AppliedChange {
                    kind: "relationship",
                    target: entity_key.as_str().to_string(),
                    summary: format!("{} {} {:+}", entity_key, dimension, applied),
                })
            }
            StateDelta::RelationshipMeeting { entity_key, toward } => {
                self.managers
                    .relationships
                    .record_meeting(conn, entity_key.as_str(), toward.as_str(), turn_number)
                    .await?;
                Ok(AppliedChange {
                    kind: "relationship_meeting",
                    target: entity_key.as_str().to_string(),
                    summary: format!("{} met {}", entity_key, toward),
                })
            }
            StateDelta::Fact {
                subject_type,
                subject_key,
                predicate,
                value,
                operation,
                is_secret,
            } => {
                let fact = Fact {
                    subject_type: *subject_type,
                    subject_key: subject_key.clone(),
                    predicate: predicate.clone(),
                    value: value.clone(),
                    is_secret: *is_secret,
                    certainty: 1.0,
                    recorded_turn: turn_number,
                };
                self.managers.facts.apply(conn, &fact, *operation).await?;
                Ok(AppliedChange {
                    kind: "fact",
                    target: subject_key.clone(),
                    summary: format!("{} {} = {}", subject_key, predicate, value),
                })
            }
            StateDelta::Item {
                item_key,
                operation,
                expected_holder,
            } => {
                let summary = match operation {
                    ItemOperation::TransferTo { entity_key } => {
                        self.managers
                            .items
                            .transfer_to_entity(
                                conn,
                                item_key.as_str(),
                                entity_key.as_str(),
                                expected_holder.as_ref().map(|h| h.as_str()),
                            )
                            .await?;
                        format!("{} -> {}", item_key, entity_key)
                    }
                    ItemOperation::PlaceAt { location_key } => {
                        self.managers
                            .items
                            .place_at_location(conn, item_key.as_str(), location_key.as_str())
                            .await?;
                        format!("{} dropped at {}", item_key, location_key)
                    }
                    ItemOperation::StoreIn { storage_key } => {
                        self.managers
                            .items
                            .store_in(conn, item_key.as_str(), storage_key.as_str())
                            .await?;
                        format!("{} stored in {}", item_key, storage_key)
                    }
                    ItemOperation::Destroy => {
                        self.managers.items.destroy(conn, item_key.as_str()).await?;
                        format!("{} destroyed", item_key)
                    }
                };
                Ok(AppliedChange {
                    kind: "item",
                    target: item_key.as_str().to_string(),
                    summary,
                })
            }
            StateDelta::Location {
                entity_key,
                to_location,
            } => {
                self.managers
                    .entities
                    .move_to(conn, entity_key.as_str(), to_location.as_str())
                    .await?;
                Ok(AppliedChange {
                    kind: "location",
                    target: entity_key.as_str().to_string(),
                    summary: format!("{} moved to {}", entity_key, to_location),
                })
            }
            StateDelta::SatisfyNeed {
                entity_key,
                need,
                activity,
                quality,
            } => {
                let amount = self
                    .managers
                    .needs
                    .satisfy(conn, entity_key.as_str(), *need, activity, *quality)
                    .await?;
                Ok(AppliedChange {
                    kind: "satisfy_need",
                    target: entity_key.as_str().to_string(),
                    summary: format!("{} {} +{:.0}", entity_key, need, amount),
                })
            }
            StateDelta::Damage { entity_key, amount } => {
                let result = self
                    .managers
                    .combat
                    .damage(conn, entity_key.as_str(), *amount)
                    .await?;
                if result.died {
                    self.managers.death.kill(conn, entity_key.as_str()).await?;
                    self.managers
                        .grief
                        .on_death(conn, entity_key.as_str(), turn_number)
                        .await?;
                }
                Ok(AppliedChange {
                    kind: "damage",
                    target: entity_key.as_str().to_string(),
                    summary: if result.died {
                        format!("{} took {} damage and died", entity_key, amount)
                    } else {
                        format!("{} took {} damage", entity_key, amount)
                    },
                })
            }
            StateDelta::Heal { entity_key, amount } => {
                let hit_points = self
                    .managers
                    .combat
                    .heal(conn, entity_key.as_str(), *amount)
                    .await?;
                Ok(AppliedChange {
                    kind: "heal",
                    target: entity_key.as_str().to_string(),
                    summary: format!("{} healed to {}", entity_key, hit_points),
                })
            }
            StateDelta::Equip {
                entity_key,
                item_key,
                slot,
                layer,
                unequip,
            } => {
                if *unequip {
                    self.managers
                        .items
                        .unequip(conn, entity_key.as_str(), item_key.as_str())
                        .await?;
                    Ok(AppliedChange {
                        kind: "equip",
                        target: item_key.as_str().to_string(),
                        summary: format!("{} unequipped {}", entity_key, item_key),
                    })
                } else {
                    let slot = slot.ok_or_else(|| {
                        ManagerError::invalid_input("equip delta missing slot")
                    })?;
                    let layer = layer.unwrap_or(0);
                    self.managers
                        .items
                        .equip(conn, entity_key.as_str(), item_key.as_str(), slot, layer)
                        .await?;
                    Ok(AppliedChange {
                        kind: "equip",
                        target: item_key.as_str().to_string(),
                        summary: format!("{} equipped {} ({})", entity_key, item_key, slot),
                    })
                }
            }
        }
    }
}
