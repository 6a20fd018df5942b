//! Location table access.

use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use fateweaver_domain::{Direction, Location, LocationCategory, LocationKey};

use super::StoreError;

fn map_row(row: &SqliteRow) -> Result<Location, StoreError> {
    let key: String = row.try_get("key")?;
    let category: String = row.try_get("category")?;
    let parent: Option<String> = row.try_get("parent_key")?;
    let exits_json: String = row.try_get("spatial_exits")?;
    let exits_raw: BTreeMap<String, String> = serde_json::from_str(&exits_json)?;

    let ser = |e: fateweaver_domain::DomainError| StoreError::Serialization(e.to_string());

    let mut spatial_exits = BTreeMap::new();
    for (direction, target) in exits_raw {
        spatial_exits.insert(
            direction.parse::<Direction>().map_err(ser)?,
            LocationKey::new(target).map_err(ser)?,
        );
    }

    Ok(Location {
        key: LocationKey::new(key).map_err(ser)?,
        display_name: row.try_get("display_name")?,
        description: row.try_get("description")?,
        parent: parent.map(LocationKey::new).transpose().map_err(ser)?,
        category: category
            .parse::<LocationCategory>()
            .unwrap_or_else(|_| LocationCategory::Other(category.clone())),
        spatial_exits,
    })
}

fn exits_to_json(location: &Location) -> Result<String, StoreError> {
    let raw: BTreeMap<&str, &str> = location
        .spatial_exits
        .iter()
        .map(|(direction, target)| (direction.as_str(), target.as_str()))
        .collect();
    Ok(serde_json::to_string(&raw)?)
}

pub async fn insert(
    conn: &mut SqliteConnection,
    session_id: &str,
    location: &Location,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO locations (session_id, key, display_name, description, parent_key, category, spatial_exits)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(location.key.as_str())
    .bind(&location.display_name)
    .bind(&location.description)
    .bind(location.parent.as_ref().map(|p| p.as_str().to_string()))
    .bind(location.category.as_str())
    .bind(exits_to_json(location)?)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update(
    conn: &mut SqliteConnection,
    session_id: &str,
    location: &Location,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE locations SET display_name = ?, description = ?, parent_key = ?, category = ?, spatial_exits = ?
         WHERE session_id = ? AND key = ?",
    )
    .bind(&location.display_name)
    .bind(&location.description)
    .bind(location.parent.as_ref().map(|p| p.as_str().to_string()))
    .bind(location.category.as_str())
    .bind(exits_to_json(location)?)
    .bind(session_id)
    .bind(location.key.as_str())
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub async fn get(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
) -> Result<Option<Location>, StoreError> {
    let row = sqlx::query("SELECT * FROM locations WHERE session_id = ? AND key = ?")
        .bind(session_id)
        .bind(key)
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(map_row).transpose()
}

pub async fn exists(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
) -> Result<bool, StoreError> {
    let row = sqlx::query("SELECT 1 AS present FROM locations WHERE session_id = ? AND key = ?")
        .bind(session_id)
        .bind(key)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

pub async fn list(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<Vec<Location>, StoreError> {
    let rows = sqlx::query("SELECT * FROM locations WHERE session_id = ? ORDER BY key")
        .bind(session_id)
        .fetch_all(conn)
        .await?;
    rows.iter().map(map_row).collect()
}
