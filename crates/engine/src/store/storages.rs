//! Storage location table access.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use fateweaver_domain::{EntityKey, ItemKey, LocationKey, StorageKey, StorageKind, StorageLocation};

use super::StoreError;

fn map_row(row: &SqliteRow) -> Result<StorageLocation, StoreError> {
    let key: String = row.try_get("key")?;
    let kind: String = row.try_get("kind")?;
    let owner_entity: Option<String> = row.try_get("owner_entity")?;
    let container_item: Option<String> = row.try_get("container_item")?;
    let location: Option<String> = row.try_get("location_key")?;

    let ser = |e: fateweaver_domain::DomainError| StoreError::Serialization(e.to_string());

    Ok(StorageLocation {
        key: StorageKey::new(key).map_err(ser)?,
        display_name: row.try_get("display_name")?,
        kind: kind.parse::<StorageKind>().map_err(ser)?,
        owner_entity: owner_entity.map(EntityKey::new).transpose().map_err(ser)?,
        container_item: container_item.map(ItemKey::new).transpose().map_err(ser)?,
        location: location.map(LocationKey::new).transpose().map_err(ser)?,
        capacity: row.try_get::<Option<f64>, _>("capacity")?.map(|c| c as f32),
    })
}

pub async fn insert(
    conn: &mut SqliteConnection,
    session_id: &str,
    storage: &StorageLocation,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO storage_locations (session_id, key, display_name, kind, owner_entity, container_item, location_key, capacity)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(storage.key.as_str())
    .bind(&storage.display_name)
    .bind(storage.kind.as_str())
    .bind(storage.owner_entity.as_ref().map(|e| e.as_str().to_string()))
    .bind(storage.container_item.as_ref().map(|i| i.as_str().to_string()))
    .bind(storage.location.as_ref().map(|l| l.as_str().to_string()))
    .bind(storage.capacity.map(f64::from))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
) -> Result<Option<StorageLocation>, StoreError> {
    let row = sqlx::query("SELECT * FROM storage_locations WHERE session_id = ? AND key = ?")
        .bind(session_id)
        .bind(key)
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(map_row).transpose()
}

/// Storages visible in a scene: at the location or owned by an entity
/// present there.
pub async fn list_at_location(
    conn: &mut SqliteConnection,
    session_id: &str,
    location_key: &str,
) -> Result<Vec<StorageLocation>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM storage_locations WHERE session_id = ? AND location_key = ? ORDER BY key",
    )
    .bind(session_id)
    .bind(location_key)
    .fetch_all(conn)
    .await?;
    rows.iter().map(map_row).collect()
}

pub async fn list_owned_by(
    conn: &mut SqliteConnection,
    session_id: &str,
    entity_key: &str,
) -> Result<Vec<StorageLocation>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM storage_locations WHERE session_id = ? AND owner_entity = ? ORDER BY key",
    )
    .bind(session_id)
    .bind(entity_key)
    .fetch_all(conn)
    .await?;
    rows.iter().map(map_row).collect()
}
