//! Entity table access.

use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use fateweaver_domain::{
    Appearance, Attributes, Entity, EntityKey, EntityKind, LocationKey, Skill,
};

use super::StoreError;

fn map_row(row: &SqliteRow) -> Result<Entity, StoreError> {
    let key: String = row.try_get("key")?;
    let kind: String = row.try_get("kind")?;
    let skills_json: String = row.try_get("skills")?;
    let skills: BTreeMap<Skill, u8> = serde_json::from_str(&skills_json)?;
    let location: Option<String> = row.try_get("location_key")?;
    let appearance_extra: Option<String> = row.try_get("appearance_extra")?;

    Ok(Entity {
        key: EntityKey::new(key).map_err(|e| StoreError::Serialization(e.to_string()))?,
        display_name: row.try_get("display_name")?,
        kind: kind
            .parse::<EntityKind>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        is_alive: row.try_get("is_alive")?,
        is_active: row.try_get("is_active")?,
        attributes: Attributes {
            might: row.try_get::<i64, _>("might")? as u8,
            agility: row.try_get::<i64, _>("agility")? as u8,
            endurance: row.try_get::<i64, _>("endurance")? as u8,
            wits: row.try_get::<i64, _>("wits")? as u8,
            presence: row.try_get::<i64, _>("presence")? as u8,
            resolve: row.try_get::<i64, _>("resolve")? as u8,
        },
        skills,
        appearance: Appearance {
            height: row.try_get("appearance_height")?,
            build: row.try_get("appearance_build")?,
            hair: row.try_get("appearance_hair")?,
            eyes: row.try_get("appearance_eyes")?,
            notes: row.try_get("appearance_notes")?,
            extra: appearance_extra
                .map(|raw| serde_json::from_str(&raw))
                .transpose()?
                .unwrap_or(serde_json::Value::Null),
        },
        background: row.try_get("background")?,
        personality: row.try_get("personality")?,
        hit_points: row.try_get::<i64, _>("hit_points")? as i32,
        max_hit_points: row.try_get::<i64, _>("max_hit_points")? as i32,
        location: location
            .map(LocationKey::new)
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
    })
}

pub async fn insert(
    conn: &mut SqliteConnection,
    session_id: &str,
    entity: &Entity,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO entities (
            session_id, key, display_name, kind, is_alive, is_active,
            might, agility, endurance, wits, presence, resolve,
            skills, appearance_height, appearance_build, appearance_hair,
            appearance_eyes, appearance_notes, appearance_extra,
            background, personality, hit_points, max_hit_points, location_key
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(entity.key.as_str())
    .bind(&entity.display_name)
    .bind(entity.kind.as_str())
    .bind(entity.is_alive)
    .bind(entity.is_active)
    .bind(i64::from(entity.attributes.might))
    .bind(i64::from(entity.attributes.agility))
    .bind(i64::from(entity.attributes.endurance))
    .bind(i64::from(entity.attributes.wits))
    .bind(i64::from(entity.attributes.presence))
    .bind(i64::from(entity.attributes.resolve))
    .bind(serde_json::to_string(&entity.skills)?)
    .bind(&entity.appearance.height)
    .bind(&entity.appearance.build)
    .bind(&entity.appearance.hair)
    .bind(&entity.appearance.eyes)
    .bind(&entity.appearance.notes)
    .bind(if entity.appearance.extra.is_null() {
        None
    } else {
        Some(serde_json::to_string(&entity.appearance.extra)?)
    })
    .bind(&entity.background)
    .bind(&entity.personality)
    .bind(i64::from(entity.hit_points))
    .bind(i64::from(entity.max_hit_points))
    .bind(entity.location.as_ref().map(|l| l.as_str().to_string()))
    .execute(conn)
    .await?;
    Ok(())
}

/// Full-row update; the single mutator that keeps appearance columns and
/// their JSON mirror in sync.
pub async fn update(
    conn: &mut SqliteConnection,
    session_id: &str,
    entity: &Entity,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE entities SET
            display_name = ?, kind = ?, is_alive = ?, is_active = ?,
            might = ?, agility = ?, endurance = ?, wits = ?, presence = ?, resolve = ?,
            skills = ?, appearance_height = ?, appearance_build = ?, appearance_hair = ?,
            appearance_eyes = ?, appearance_notes = ?, appearance_extra = ?,
            background = ?, personality = ?, hit_points = ?, max_hit_points = ?, location_key = ?
         WHERE session_id = ? AND key = ?",
    )
    .bind(&entity.display_name)
    .bind(entity.kind.as_str())
    .bind(entity.is_alive)
    .bind(entity.is_active)
    .bind(i64::from(entity.attributes.might))
    .bind(i64::from(entity.attributes.agility))
    .bind(i64::from(entity.attributes.endurance))
    .bind(i64::from(entity.attributes.wits))
    .bind(i64::from(entity.attributes.presence))
    .bind(i64::from(entity.attributes.resolve))
    .bind(serde_json::to_string(&entity.skills)?)
    .bind(&entity.appearance.height)
    .bind(&entity.appearance.build)
    .bind(&entity.appearance.hair)
    .bind(&entity.appearance.eyes)
    .bind(&entity.appearance.notes)
    .bind(if entity.appearance.extra.is_null() {
        None
    } else {
        Some(serde_json::to_string(&entity.appearance.extra)?)
    })
    .bind(&entity.background)
    .bind(&entity.personality)
    .bind(i64::from(entity.hit_points))
    .bind(i64::from(entity.max_hit_points))
    .bind(entity.location.as_ref().map(|l| l.as_str().to_string()))
    .bind(session_id)
    .bind(entity.key.as_str())
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
) -> Result<Option<Entity>, StoreError> {
    let row = sqlx::query("SELECT * FROM entities WHERE session_id = ? AND key = ?")
        .bind(session_id)
        .bind(key)
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(map_row).transpose()
}

pub async fn list(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<Vec<Entity>, StoreError> {
    let rows = sqlx::query("SELECT * FROM entities WHERE session_id = ? ORDER BY key")
        .bind(session_id)
        .fetch_all(conn)
        .await?;
    rows.iter().map(map_row).collect()
}

/// Active NPCs and monsters at a location.
pub async fn list_active_at_location(
    conn: &mut SqliteConnection,
    session_id: &str,
    location_key: &str,
) -> Result<Vec<Entity>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM entities
         WHERE session_id = ? AND location_key = ? AND is_active = 1
           AND kind IN ('npc', 'monster')
         ORDER BY key",
    )
    .bind(session_id)
    .bind(location_key)
    .fetch_all(conn)
    .await?;
    rows.iter().map(map_row).collect()
}

pub async fn set_location(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
    location_key: Option<&str>,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE entities SET location_key = ? WHERE session_id = ? AND key = ?")
        .bind(location_key)
        .bind(session_id)
        .bind(key)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub async fn count_players(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<u32, StoreError> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS player_count FROM entities WHERE session_id = ? AND kind = 'player'",
    )
    .bind(session_id)
    .fetch_one(conn)
    .await?;
    Ok(row.try_get::<i64, _>("player_count")? as u32)
}
