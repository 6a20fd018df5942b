//! Fact manager.

use sqlx::SqliteConnection;

use fateweaver_domain::{DeltaOperation, Fact, SubjectType};

use crate::store::{entities, facts, items, locations};

use super::ManagerError;

pub struct FactManager {
    session_id: String,
}

impl FactManager {
    pub fn new(session_id: String) -> Self {
        Self { session_id }
    }

    async fn subject_exists(
        &self,
        conn: &mut SqliteConnection,
        subject_type: SubjectType,
        subject_key: &str,
    ) -> Result<bool, ManagerError> {
        Ok(match subject_type {
            SubjectType::Entity => entities::get(conn, &self.session_id, subject_key)
                .await?
                .is_some(),
            SubjectType::Item => items::get(conn, &self.session_id, subject_key)
                .await?
                .is_some(),
            SubjectType::Location => {
                locations::exists(conn, &self.session_id, subject_key).await?
            }
        })
    }

    /// Record, update, or retract a fact. The subject must exist.
    pub async fn apply(
        &self,
        conn: &mut SqliteConnection,
        fact: &Fact,
        operation: DeltaOperation,
    ) -> Result<(), ManagerError> {
        if !self
            .subject_exists(conn, fact.subject_type, &fact.subject_key)
            .await?
        {
            return Err(ManagerError::not_found(
                match fact.subject_type {
                    SubjectType::Entity => "Entity",
                    SubjectType::Item => "Item",
                    SubjectType::Location => "Location",
                },
                fact.subject_key.clone(),
            ));
        }

        match operation {
            DeltaOperation::Add => facts::insert(conn, &self.session_id, fact).await?,
            DeltaOperation::Update => {
                // Update-or-insert: branch generators do not distinguish
                // whether a predicate was recorded before.
                match facts::update_value(
                    conn,
                    &self.session_id,
                    fact.subject_type,
                    &fact.subject_key,
                    &fact.predicate,
                    &fact.value,
                )
                .await
                {
                    Ok(()) => {}
                    Err(crate::store::StoreError::NotFound) => {
                        facts::insert(conn, &self.session_id, fact).await?
                    }
                    Err(other) => return Err(other.into()),
                }
            }
            DeltaOperation::Remove => {
                facts::remove(
                    conn,
                    &self.session_id,
                    fact.subject_type,
                    &fact.subject_key,
                    &fact.predicate,
                )
                .await?
            }
        }
        Ok(())
    }

    pub async fn find(
        &self,
        conn: &mut SqliteConnection,
        subject_type: SubjectType,
        subject_key: &str,
        predicate: &str,
    ) -> Result<Option<Fact>, ManagerError> {
        Ok(facts::find(conn, &self.session_id, subject_type, subject_key, predicate).await?)
    }

    pub async fn for_subject(
        &self,
        conn: &mut SqliteConnection,
        subject_type: SubjectType,
        subject_key: &str,
    ) -> Result<Vec<Fact>, ManagerError> {
        Ok(facts::list_for_subject(conn, &self.session_id, subject_type, subject_key).await?)
    }

    /// Facts grounding GM twists: everything with the given predicate.
    pub async fn by_predicate(
        &self,
        conn: &mut SqliteConnection,
        predicate: &str,
    ) -> Result<Vec<Fact>, ManagerError> {
        Ok(facts::list_by_predicate(conn, &self.session_id, predicate).await?)
    }
}
