//! Session table access.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use fateweaver_domain::{EntityKey, Session, SessionId, SessionStatus};

use super::StoreError;

pub async fn insert(conn: &mut SqliteConnection, session: &Session) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO sessions (id, setting, player_entity, status, total_turns, state_version, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(session.id.to_string())
    .bind(&session.setting)
    .bind(session.player_entity.as_str())
    .bind(session.status.as_str())
    .bind(session.total_turns)
    .bind(session.state_version as i64)
    .bind(session.created_at.to_rfc3339())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get(
    conn: &mut SqliteConnection,
    session_id: SessionId,
) -> Result<Option<Session>, StoreError> {
    let row = sqlx::query(
        "SELECT id, setting, player_entity, status, total_turns, state_version, created_at
         FROM sessions WHERE id = ?",
    )
    .bind(session_id.to_string())
    .fetch_optional(conn)
    .await?;

    row.map(|row| {
        let status: String = row.try_get("status")?;
        let player_entity: String = row.try_get("player_entity")?;
        let created_at: String = row.try_get("created_at")?;
        Ok(Session {
            id: session_id,
            setting: row.try_get("setting")?,
            player_entity: EntityKey::new(player_entity)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            status: status
                .parse::<SessionStatus>()
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            total_turns: row.try_get::<i64, _>("total_turns")? as u32,
            state_version: row.try_get::<i64, _>("state_version")? as u64,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
        })
    })
    .transpose()
}

/// Bump the state version and return the new value.
pub async fn bump_state_version(
    conn: &mut SqliteConnection,
    session_id: SessionId,
) -> Result<u64, StoreError> {
    let row = sqlx::query(
        "UPDATE sessions SET state_version = state_version + 1 WHERE id = ?
         RETURNING state_version",
    )
    .bind(session_id.to_string())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(StoreError::NotFound)?;
    Ok(row.try_get::<i64, _>("state_version")? as u64)
}

pub async fn state_version(
    conn: &mut SqliteConnection,
    session_id: SessionId,
) -> Result<u64, StoreError> {
    let row = sqlx::query("SELECT state_version FROM sessions WHERE id = ?")
        .bind(session_id.to_string())
        .fetch_optional(conn)
        .await?
        .ok_or(StoreError::NotFound)?;
    Ok(row.try_get::<i64, _>("state_version")? as u64)
}

/// Increment the turn counter and return the new total.
pub async fn increment_turns(
    conn: &mut SqliteConnection,
    session_id: SessionId,
) -> Result<u32, StoreError> {
    let row = sqlx::query(
        "UPDATE sessions SET total_turns = total_turns + 1 WHERE id = ?
         RETURNING total_turns",
    )
    .bind(session_id.to_string())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(StoreError::NotFound)?;
    Ok(row.try_get::<i64, _>("total_turns")? as u32)
}

pub async fn set_status(
    conn: &mut SqliteConnection,
    session_id: SessionId,
    status: SessionStatus,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE sessions SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(session_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// Delete the session; cascades to every other table.
pub async fn delete(conn: &mut SqliteConnection, session_id: SessionId) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(session_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}
