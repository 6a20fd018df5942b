//! Character needs table access.

use sqlx::{Row, SqliteConnection};

use fateweaver_domain::CharacterNeeds;

use super::StoreError;

pub async fn get(
    conn: &mut SqliteConnection,
    session_id: &str,
    entity_key: &str,
) -> Result<Option<CharacterNeeds>, StoreError> {
    let row = sqlx::query(
        "SELECT levels, last_communicated, cravings FROM character_needs
         WHERE session_id = ? AND entity_key = ?",
    )
    .bind(session_id)
    .bind(entity_key)
    .fetch_optional(conn)
    .await?;

    row.map(|row| {
        let levels: String = row.try_get("levels")?;
        let last_communicated: String = row.try_get("last_communicated")?;
        let cravings: String = row.try_get("cravings")?;
        Ok(CharacterNeeds {
            levels: serde_json::from_str(&levels)?,
            last_communicated: serde_json::from_str(&last_communicated)?,
            cravings: serde_json::from_str(&cravings)?,
        })
    })
    .transpose()
}

/// Entity keys that carry a needs row.
pub async fn list_entities(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<Vec<String>, StoreError> {
    let rows = sqlx::query(
        "SELECT entity_key FROM character_needs WHERE session_id = ? ORDER BY entity_key",
    )
    .bind(session_id)
    .fetch_all(conn)
    .await?;
    rows.iter()
        .map(|row| Ok(row.try_get::<String, _>("entity_key")?))
        .collect()
}

pub async fn upsert(
    conn: &mut SqliteConnection,
    session_id: &str,
    entity_key: &str,
    needs: &CharacterNeeds,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO character_needs (session_id, entity_key, levels, last_communicated, cravings)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (session_id, entity_key) DO UPDATE SET
             levels = excluded.levels,
             last_communicated = excluded.last_communicated,
             cravings = excluded.cravings",
    )
    .bind(session_id)
    .bind(entity_key)
    .bind(serde_json::to_string(&needs.levels)?)
    .bind(serde_json::to_string(&needs.last_communicated)?)
    .bind(serde_json::to_string(&needs.cravings)?)
    .execute(conn)
    .await?;
    Ok(())
}
