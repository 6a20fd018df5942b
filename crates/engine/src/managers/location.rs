//! Location manager.

use sqlx::SqliteConnection;

use fateweaver_domain::{Direction, Location, LocationKey};

use crate::store::locations;

use super::ManagerError;

pub struct LocationManager {
    session_id: String,
}

impl LocationManager {
    pub fn new(session_id: String) -> Self {
        Self { session_id }
    }

    /// Create a location. The parent (if set) must exist and must not create
    /// a cycle; exits must point at existing locations.
    pub async fn create(
        &self,
        conn: &mut SqliteConnection,
        location: &Location,
    ) -> Result<(), ManagerError> {
        if let Some(parent) = &location.parent {
            if parent == &location.key {
                return Err(ManagerError::invariant(
                    "location cannot be its own parent",
                ));
            }
            if !locations::exists(conn, &self.session_id, parent.as_str()).await? {
                return Err(ManagerError::not_found("Location", parent.as_str()));
            }
            self.check_ancestry_cycle(conn, &location.key, parent).await?;
        }
        for target in location.spatial_exits.values() {
            if target != &location.key
                && !locations::exists(conn, &self.session_id, target.as_str()).await?
            {
                return Err(ManagerError::not_found("Location", target.as_str()));
            }
        }
        locations::insert(conn, &self.session_id, location).await?;
        Ok(())
    }

    pub async fn get(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
    ) -> Result<Location, ManagerError> {
        locations::get(conn, &self.session_id, key)
            .await?
            .ok_or_else(|| ManagerError::not_found("Location", key))
    }

    pub async fn exists(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
    ) -> Result<bool, ManagerError> {
        Ok(locations::exists(conn, &self.session_id, key).await?)
    }

    /// Add an exit; the target must exist.
    pub async fn add_exit(
        &self,
        conn: &mut SqliteConnection,
        from: &str,
        direction: Direction,
        to: &str,
    ) -> Result<(), ManagerError> {
        let mut location = self.get(conn, from).await?;
        if !locations::exists(conn, &self.session_id, to).await? {
            return Err(ManagerError::not_found("Location", to));
        }
        location
            .spatial_exits
            .insert(direction, LocationKey::new(to).map_err(ManagerError::from)?);
        locations::update(conn, &self.session_id, &location).await?;
        Ok(())
    }

    /// Re-parent a location, preserving acyclicity.
    pub async fn set_parent(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
        parent: Option<&str>,
    ) -> Result<(), ManagerError> {
        let mut location = self.get(conn, key).await?;
        location.parent = match parent {
            Some(parent_key) => {
                if parent_key == key {
                    return Err(ManagerError::invariant(
                        "location cannot be its own parent",
                    ));
                }
                let parent_typed =
                    LocationKey::new(parent_key).map_err(ManagerError::from)?;
                if !locations::exists(conn, &self.session_id, parent_key).await? {
                    return Err(ManagerError::not_found("Location", parent_key));
                }
                self.check_ancestry_cycle(conn, &location.key, &parent_typed)
                    .await?;
                Some(parent_typed)
            }
            None => None,
        };
        locations::update(conn, &self.session_id, &location).await?;
        Ok(())
    }

    /// Walk the parent chain from `parent` upward; finding `child` means a
    /// cycle.
    async fn check_ancestry_cycle(
        &self,
        conn: &mut SqliteConnection,
        child: &LocationKey,
        parent: &LocationKey,
    ) -> Result<(), ManagerError> {
        let mut cursor = Some(parent.clone());
        let mut hops = 0;
        while let Some(current) = cursor {
            if &current == child {
                return Err(ManagerError::invariant(format!(
                    "parent chain of '{}' would form a cycle",
                    child
                )));
            }
            hops += 1;
            if hops > 64 {
                return Err(ManagerError::invariant(
                    "parent chain exceeds maximum depth",
                ));
            }
            cursor = locations::get(conn, &self.session_id, current.as_str())
                .await?
                .and_then(|loc| loc.parent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::test_support::seed_session;
    use fateweaver_domain::LocationCategory;

    #[tokio::test]
    async fn test_parent_cycle_rejected() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        // Seed: cellar's parent is tavern. Re-parenting tavern under cellar
        // would close the loop.
        let result = ctx
            .managers
            .locations
            .set_parent(&mut conn, "tavern", Some("cellar"))
            .await;
        assert!(matches!(result, Err(ManagerError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn test_exit_to_unknown_location_rejected() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let result = ctx
            .managers
            .locations
            .add_exit(&mut conn, "tavern", Direction::Up, "attic")
            .await;
        assert!(matches!(result, Err(ManagerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_create_with_unknown_exit_rejected() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let mut location = Location::new(
            LocationKey::new("attic").unwrap(),
            "Attic",
            LocationCategory::Room,
        );
        location.spatial_exits.insert(
            Direction::Down,
            LocationKey::new("missing_place").unwrap(),
        );
        let result = ctx.managers.locations.create(&mut conn, &location).await;
        assert!(matches!(result, Err(ManagerError::NotFound { .. })));
    }
}
