//! Item table access.
//!
//! Placement is stored as three mutually exclusive nullable columns
//! (`holder_entity`, `storage_location`, `owner_location`); the domain
//! `ItemPlacement` enum makes the disjointness structural in memory.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use fateweaver_domain::{
    BodySlot, EntityKey, Item, ItemCondition, ItemKey, ItemKind, ItemPlacement, LocationKey,
    StorageKey,
};

use super::StoreError;

fn map_row(row: &SqliteRow) -> Result<Item, StoreError> {
    let key: String = row.try_get("key")?;
    let kind: String = row.try_get("kind")?;
    let condition: String = row.try_get("condition")?;
    let owner_entity: Option<String> = row.try_get("owner_entity")?;
    let holder_entity: Option<String> = row.try_get("holder_entity")?;
    let storage_location: Option<String> = row.try_get("storage_location")?;
    let owner_location: Option<String> = row.try_get("owner_location")?;
    let body_slot: Option<String> = row.try_get("body_slot")?;
    let body_layer: Option<i64> = row.try_get("body_layer")?;
    let properties: Option<String> = row.try_get("properties")?;

    let ser = |e: fateweaver_domain::DomainError| StoreError::Serialization(e.to_string());

    let placement = match (holder_entity, storage_location, owner_location) {
        (Some(holder), None, None) => ItemPlacement::Held(EntityKey::new(holder).map_err(ser)?),
        (None, Some(storage), None) => {
            ItemPlacement::Stored(StorageKey::new(storage).map_err(ser)?)
        }
        (None, None, Some(location)) => {
            ItemPlacement::AtLocation(LocationKey::new(location).map_err(ser)?)
        }
        _ => {
            return Err(StoreError::Serialization(format!(
                "item '{}' violates placement exclusivity",
                key
            )))
        }
    };

    Ok(Item {
        key: ItemKey::new(key).map_err(ser)?,
        display_name: row.try_get("display_name")?,
        kind: kind
            .parse::<ItemKind>()
            .unwrap_or_else(|_| ItemKind::Other(kind.clone())),
        owner_entity: owner_entity.map(EntityKey::new).transpose().map_err(ser)?,
        placement,
        body_slot: body_slot
            .map(|s| s.parse::<BodySlot>())
            .transpose()
            .map_err(ser)?,
        body_layer: body_layer.map(|l| l as u8),
        weight: row.try_get::<f64, _>("weight")? as f32,
        condition: condition
            .parse::<ItemCondition>()
            .map_err(ser)?,
        properties: properties
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?
            .unwrap_or(serde_json::Value::Null),
    })
}

fn placement_columns(
    placement: &ItemPlacement,
) -> (Option<&str>, Option<&str>, Option<&str>) {
    match placement {
        ItemPlacement::Held(entity) => (Some(entity.as_str()), None, None),
        ItemPlacement::Stored(storage) => (None, Some(storage.as_str()), None),
        ItemPlacement::AtLocation(location) => (None, None, Some(location.as_str())),
    }
}

pub async fn insert(
    conn: &mut SqliteConnection,
    session_id: &str,
    item: &Item,
) -> Result<(), StoreError> {
    let (holder, storage, location) = placement_columns(&item.placement);
    sqlx::query(
        "INSERT INTO items (
            session_id, key, display_name, kind, owner_entity,
            holder_entity, storage_location, owner_location,
            body_slot, body_layer, weight, condition, properties
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(item.key.as_str())
    .bind(&item.display_name)
    .bind(item.kind.as_str())
    .bind(item.owner_entity.as_ref().map(|e| e.as_str().to_string()))
    .bind(holder)
    .bind(storage)
    .bind(location)
    .bind(item.body_slot.map(|s| s.as_str()))
    .bind(item.body_layer.map(i64::from))
    .bind(f64::from(item.weight))
    .bind(item.condition.as_str())
    .bind(if item.properties.is_null() {
        None
    } else {
        Some(serde_json::to_string(&item.properties)?)
    })
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
) -> Result<Option<Item>, StoreError> {
    let row = sqlx::query("SELECT * FROM items WHERE session_id = ? AND key = ?")
        .bind(session_id)
        .bind(key)
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(map_row).transpose()
}

/// Atomically set placement: clears all three pointers, sets the new one,
/// and clears equip state (equipping is a separate step).
pub async fn set_placement(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
    placement: &ItemPlacement,
) -> Result<(), StoreError> {
    let (holder, storage, location) = placement_columns(placement);
    let result = sqlx::query(
        "UPDATE items SET holder_entity = ?, storage_location = ?, owner_location = ?,
             body_slot = NULL, body_layer = NULL
         WHERE session_id = ? AND key = ?",
    )
    .bind(holder)
    .bind(storage)
    .bind(location)
    .bind(session_id)
    .bind(key)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub async fn set_equip(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
    slot: Option<BodySlot>,
    layer: Option<u8>,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE items SET body_slot = ?, body_layer = ? WHERE session_id = ? AND key = ?",
    )
    .bind(slot.map(|s| s.as_str()))
    .bind(layer.map(i64::from))
    .bind(session_id)
    .bind(key)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub async fn set_owner(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
    owner: Option<&str>,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE items SET owner_entity = ? WHERE session_id = ? AND key = ?")
        .bind(owner)
        .bind(session_id)
        .bind(key)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub async fn set_condition(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
    condition: ItemCondition,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE items SET condition = ? WHERE session_id = ? AND key = ?")
        .bind(condition.as_str())
        .bind(session_id)
        .bind(key)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub async fn delete(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM items WHERE session_id = ? AND key = ?")
        .bind(session_id)
        .bind(key)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn list_held_by(
    conn: &mut SqliteConnection,
    session_id: &str,
    entity_key: &str,
) -> Result<Vec<Item>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM items WHERE session_id = ? AND holder_entity = ? ORDER BY key",
    )
    .bind(session_id)
    .bind(entity_key)
    .fetch_all(conn)
    .await?;
    rows.iter().map(map_row).collect()
}

pub async fn list_at_location(
    conn: &mut SqliteConnection,
    session_id: &str,
    location_key: &str,
) -> Result<Vec<Item>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM items WHERE session_id = ? AND owner_location = ? ORDER BY key",
    )
    .bind(session_id)
    .bind(location_key)
    .fetch_all(conn)
    .await?;
    rows.iter().map(map_row).collect()
}

pub async fn list_in_storage(
    conn: &mut SqliteConnection,
    session_id: &str,
    storage_key: &str,
) -> Result<Vec<Item>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM items WHERE session_id = ? AND storage_location = ? ORDER BY key",
    )
    .bind(session_id)
    .bind(storage_key)
    .fetch_all(conn)
    .await?;
    rows.iter().map(map_row).collect()
}

/// Total carried weight of items stored in `storage_key`.
pub async fn storage_weight(
    conn: &mut SqliteConnection,
    session_id: &str,
    storage_key: &str,
) -> Result<f32, StoreError> {
    let row = sqlx::query(
        "SELECT COALESCE(SUM(weight), 0.0) AS total
         FROM items WHERE session_id = ? AND storage_location = ?",
    )
    .bind(session_id)
    .bind(storage_key)
    .fetch_one(conn)
    .await?;
    Ok(row.try_get::<f64, _>("total")? as f32)
}
