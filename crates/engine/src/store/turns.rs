//! Turn log access.
//!
//! Turns are insert-only; there is no update path. `turn_number` is part of
//! the primary key, so duplicates fail loudly.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use fateweaver_domain::TurnRecord;

use super::StoreError;

fn map_row(row: &SqliteRow) -> Result<TurnRecord, StoreError> {
    let mentioned_items: String = row.try_get("mentioned_items")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(TurnRecord {
        turn_number: row.try_get::<i64, _>("turn_number")? as u32,
        player_input: row.try_get("player_input")?,
        gm_response: row.try_get("gm_response")?,
        mentioned_items: serde_json::from_str(&mentioned_items)?,
        is_ooc: row.try_get("is_ooc")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
    })
}

pub async fn insert(
    conn: &mut SqliteConnection,
    session_id: &str,
    turn: &TurnRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO turns (session_id, turn_number, player_input, gm_response, mentioned_items, is_ooc, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(i64::from(turn.turn_number))
    .bind(&turn.player_input)
    .bind(&turn.gm_response)
    .bind(serde_json::to_string(&turn.mentioned_items)?)
    .bind(turn.is_ooc)
    .bind(turn.created_at.to_rfc3339())
    .execute(conn)
    .await?;
    Ok(())
}

/// The most recent `limit` turns, oldest first.
pub async fn recent(
    conn: &mut SqliteConnection,
    session_id: &str,
    limit: u32,
) -> Result<Vec<TurnRecord>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM (
             SELECT * FROM turns WHERE session_id = ? ORDER BY turn_number DESC LIMIT ?
         ) ORDER BY turn_number ASC",
    )
    .bind(session_id)
    .bind(i64::from(limit))
    .fetch_all(conn)
    .await?;
    rows.iter().map(map_row).collect()
}

pub async fn get(
    conn: &mut SqliteConnection,
    session_id: &str,
    turn_number: u32,
) -> Result<Option<TurnRecord>, StoreError> {
    let row = sqlx::query("SELECT * FROM turns WHERE session_id = ? AND turn_number = ?")
        .bind(session_id)
        .bind(i64::from(turn_number))
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(map_row).transpose()
}

pub async fn max_turn_number(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<u32, StoreError> {
    let row = sqlx::query(
        "SELECT COALESCE(MAX(turn_number), 0) AS max_turn FROM turns WHERE session_id = ?",
    )
    .bind(session_id)
    .fetch_one(conn)
    .await?;
    Ok(row.try_get::<i64, _>("max_turn")? as u32)
}

/// Turns recorded after `since_turn`. Used to count turns spent at the
/// current location (the location manager records the arrival turn).
pub async fn count_since_turn(
    conn: &mut SqliteConnection,
    session_id: &str,
    since_turn: u32,
) -> Result<u32, StoreError> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS turn_count FROM turns WHERE session_id = ? AND turn_number > ?",
    )
    .bind(session_id)
    .bind(i64::from(since_turn))
    .fetch_one(conn)
    .await?;
    Ok(row.try_get::<i64, _>("turn_count")? as u32)
}
