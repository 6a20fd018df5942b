//! Item manager: transfer, storage, equipment layering.

use sqlx::SqliteConnection;

use fateweaver_domain::{
    visible_items, BodySlot, EquippedItem, Item, ItemCondition, ItemKey, ItemPlacement,
    StorageKind,
};

use crate::store::{entities, items, locations, storages};

use super::ManagerError;

pub struct ItemManager {
    session_id: String,
}

impl ItemManager {
    pub fn new(session_id: String) -> Self {
        Self { session_id }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn create(
        &self,
        conn: &mut SqliteConnection,
        item: &Item,
    ) -> Result<(), ManagerError> {
        item.validate_equipped()?;
        self.validate_placement(conn, &item.placement).await?;
        items::insert(conn, &self.session_id, item).await?;
        Ok(())
    }

    pub async fn get(&self, conn: &mut SqliteConnection, key: &str) -> Result<Item, ManagerError> {
        items::get(conn, &self.session_id, key)
            .await?
            .ok_or_else(|| ManagerError::not_found("Item", key))
    }

    pub async fn try_get(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
    ) -> Result<Option<Item>, ManagerError> {
        Ok(items::get(conn, &self.session_id, key).await?)
    }

    async fn validate_placement(
        &self,
        conn: &mut SqliteConnection,
        placement: &ItemPlacement,
    ) -> Result<(), ManagerError> {
        match placement {
            ItemPlacement::Held(entity) => {
                if entities::get(conn, &self.session_id, entity.as_str())
                    .await?
                    .is_none()
                {
                    return Err(ManagerError::not_found("Entity", entity.as_str()));
                }
            }
            ItemPlacement::Stored(storage) => {
                if storages::get(conn, &self.session_id, storage.as_str())
                    .await?
                    .is_none()
                {
                    return Err(ManagerError::not_found("StorageLocation", storage.as_str()));
                }
            }
            ItemPlacement::AtLocation(location) => {
                if !locations::exists(conn, &self.session_id, location.as_str()).await? {
                    return Err(ManagerError::not_found("Location", location.as_str()));
                }
            }
        }
        Ok(())
    }

    /// Hand an item to an entity. Clears any prior placement and equip
    /// state atomically. `expected_holder` guards against stale branches:
    /// if set, the item's current holder must match.
    pub async fn transfer_to_entity(
        &self,
        conn: &mut SqliteConnection,
        item_key: &str,
        entity_key: &str,
        expected_holder: Option<&str>,
    ) -> Result<(), ManagerError> {
        let item = self.get(conn, item_key).await?;
        if let Some(expected) = expected_holder {
            let actual = item.holder().map(|h| h.as_str());
            if actual != Some(expected) {
                return Err(ManagerError::invariant(format!(
                    "item '{}' holder is {:?}, expected '{}'",
                    item_key, actual, expected
                )));
            }
        }
        let entity = entities::get(conn, &self.session_id, entity_key)
            .await?
            .ok_or_else(|| ManagerError::not_found("Entity", entity_key))?;

        items::set_placement(
            conn,
            &self.session_id,
            item_key,
            &ItemPlacement::Held(entity.key),
        )
        .await?;
        tracing::debug!(item = item_key, to = entity_key, "item transferred");
        Ok(())
    }

    /// Drop an item into a location's environment.
    pub async fn place_at_location(
        &self,
        conn: &mut SqliteConnection,
        item_key: &str,
        location_key: &str,
    ) -> Result<(), ManagerError> {
        self.get(conn, item_key).await?;
        if !locations::exists(conn, &self.session_id, location_key).await? {
            return Err(ManagerError::not_found("Location", location_key));
        }
        let placement = ItemPlacement::AtLocation(
            fateweaver_domain::LocationKey::new(location_key).map_err(ManagerError::from)?,
        );
        items::set_placement(conn, &self.session_id, item_key, &placement).await?;
        Ok(())
    }

    /// Put an item into a storage location, enforcing capacity and that
    /// container-kind storages are backed by a containment-capable item.
    pub async fn store_in(
        &self,
        conn: &mut SqliteConnection,
        item_key: &str,
        storage_key: &str,
    ) -> Result<(), ManagerError> {
        let item = self.get(conn, item_key).await?;
        let storage = storages::get(conn, &self.session_id, storage_key)
            .await?
            .ok_or_else(|| ManagerError::not_found("StorageLocation", storage_key))?;

        if storage.kind == StorageKind::Container {
            let backing_key = storage
                .container_item
                .as_ref()
                .ok_or_else(|| {
                    ManagerError::invariant(format!(
                        "container storage '{}' has no backing item",
                        storage_key
                    ))
                })?;
            let backing = self.get(conn, backing_key.as_str()).await?;
            if !backing.kind.can_contain() {
                return Err(ManagerError::invariant(format!(
                    "item '{}' cannot act as a container",
                    backing_key
                )));
            }
            if backing.key == item.key {
                return Err(ManagerError::invariant(format!(
                    "item '{}' cannot be stored inside itself",
                    item_key
                )));
            }
        }

        if let Some(capacity) = storage.capacity {
            let current = items::storage_weight(conn, &self.session_id, storage_key).await?;
            if current + item.weight > capacity {
                return Err(ManagerError::invariant(format!(
                    "storage '{}' over capacity: {:.1} + {:.1} > {:.1}",
                    storage_key, current, item.weight, capacity
                )));
            }
        }

        items::set_placement(
            conn,
            &self.session_id,
            item_key,
            &ItemPlacement::Stored(storage.key),
        )
        .await?;
        Ok(())
    }

    /// Equip a held item into a body slot at a layer. The item must already
    /// be held by `entity_key`; equipping never changes the holder. The
    /// (slot, layer) pair must be free.
    pub async fn equip(
        &self,
        conn: &mut SqliteConnection,
        entity_key: &str,
        item_key: &str,
        slot: BodySlot,
        layer: u8,
    ) -> Result<(), ManagerError> {
        let item = self.get(conn, item_key).await?;
        match item.holder() {
            Some(holder) if holder.as_str() == entity_key => {}
            _ => {
                return Err(ManagerError::invariant(format!(
                    "item '{}' is not held by '{}'",
                    item_key, entity_key
                )))
            }
        }

        let held = items::list_held_by(conn, &self.session_id, entity_key).await?;
        let occupied = held.iter().any(|other| {
            other.key != item.key && other.body_slot == Some(slot) && other.body_layer == Some(layer)
        });
        if occupied {
            return Err(ManagerError::invariant(format!(
                "slot {} layer {} is already occupied",
                slot, layer
            )));
        }

        items::set_equip(conn, &self.session_id, item_key, Some(slot), Some(layer)).await?;
        Ok(())
    }

    pub async fn unequip(
        &self,
        conn: &mut SqliteConnection,
        entity_key: &str,
        item_key: &str,
    ) -> Result<(), ManagerError> {
        let item = self.get(conn, item_key).await?;
        match item.holder() {
            Some(holder) if holder.as_str() == entity_key => {}
            _ => {
                return Err(ManagerError::invariant(format!(
                    "item '{}' is not held by '{}'",
                    item_key, entity_key
                )))
            }
        }
        items::set_equip(conn, &self.session_id, item_key, None, None).await?;
        Ok(())
    }

    /// Visible equipment on an entity after layering rules.
    pub async fn visible_equipment(
        &self,
        conn: &mut SqliteConnection,
        entity_key: &str,
    ) -> Result<Vec<ItemKey>, ManagerError> {
        let held = items::list_held_by(conn, &self.session_id, entity_key).await?;
        let equipped: Vec<EquippedItem> = held
            .into_iter()
            .filter_map(|item| match (item.body_slot, item.body_layer) {
                (Some(slot), Some(layer)) => Some(EquippedItem {
                    item_key: item.key,
                    slot,
                    layer,
                }),
                _ => None,
            })
            .collect();
        Ok(visible_items(&equipped))
    }

    pub async fn set_condition(
        &self,
        conn: &mut SqliteConnection,
        item_key: &str,
        condition: ItemCondition,
    ) -> Result<(), ManagerError> {
        items::set_condition(conn, &self.session_id, item_key, condition).await?;
        Ok(())
    }

    pub async fn destroy(
        &self,
        conn: &mut SqliteConnection,
        item_key: &str,
    ) -> Result<(), ManagerError> {
        self.get(conn, item_key).await?;
        items::delete(conn, &self.session_id, item_key).await?;
        Ok(())
    }

    pub async fn inventory(
        &self,
        conn: &mut SqliteConnection,
        entity_key: &str,
    ) -> Result<Vec<Item>, ManagerError> {
        Ok(items::list_held_by(conn, &self.session_id, entity_key).await?)
    }
}
