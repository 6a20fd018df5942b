//! Fact table access.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use fateweaver_domain::{Fact, SubjectType};

use super::StoreError;

fn map_row(row: &SqliteRow) -> Result<Fact, StoreError> {
    let subject_type: String = row.try_get("subject_type")?;
    Ok(Fact {
        subject_type: subject_type
            .parse::<SubjectType>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        subject_key: row.try_get("subject_key")?,
        predicate: row.try_get("predicate")?,
        value: row.try_get("value")?,
        is_secret: row.try_get("is_secret")?,
        certainty: row.try_get::<f64, _>("certainty")? as f32,
        recorded_turn: row.try_get::<i64, _>("recorded_turn")? as u32,
    })
}

pub async fn insert(
    conn: &mut SqliteConnection,
    session_id: &str,
    fact: &Fact,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO facts (session_id, subject_type, subject_key, predicate, value, is_secret, certainty, recorded_turn)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(fact.subject_type.as_str())
    .bind(&fact.subject_key)
    .bind(&fact.predicate)
    .bind(&fact.value)
    .bind(fact.is_secret)
    .bind(f64::from(fact.certainty))
    .bind(fact.recorded_turn)
    .execute(conn)
    .await?;
    Ok(())
}

/// Update the value of an existing (subject, predicate) fact.
pub async fn update_value(
    conn: &mut SqliteConnection,
    session_id: &str,
    subject_type: SubjectType,
    subject_key: &str,
    predicate: &str,
    value: &str,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE facts SET value = ?
         WHERE session_id = ? AND subject_type = ? AND subject_key = ? AND predicate = ?",
    )
    .bind(value)
    .bind(session_id)
    .bind(subject_type.as_str())
    .bind(subject_key)
    .bind(predicate)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub async fn remove(
    conn: &mut SqliteConnection,
    session_id: &str,
    subject_type: SubjectType,
    subject_key: &str,
    predicate: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "DELETE FROM facts
         WHERE session_id = ? AND subject_type = ? AND subject_key = ? AND predicate = ?",
    )
    .bind(session_id)
    .bind(subject_type.as_str())
    .bind(subject_key)
    .bind(predicate)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find(
    conn: &mut SqliteConnection,
    session_id: &str,
    subject_type: SubjectType,
    subject_key: &str,
    predicate: &str,
) -> Result<Option<Fact>, StoreError> {
    let row = sqlx::query(
        "SELECT * FROM facts
         WHERE session_id = ? AND subject_type = ? AND subject_key = ? AND predicate = ?
         ORDER BY id DESC LIMIT 1",
    )
    .bind(session_id)
    .bind(subject_type.as_str())
    .bind(subject_key)
    .bind(predicate)
    .fetch_optional(conn)
    .await?;
    row.as_ref().map(map_row).transpose()
}

pub async fn list_for_subject(
    conn: &mut SqliteConnection,
    session_id: &str,
    subject_type: SubjectType,
    subject_key: &str,
) -> Result<Vec<Fact>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM facts WHERE session_id = ? AND subject_type = ? AND subject_key = ?
         ORDER BY id",
    )
    .bind(session_id)
    .bind(subject_type.as_str())
    .bind(subject_key)
    .fetch_all(conn)
    .await?;
    rows.iter().map(map_row).collect()
}

/// All facts with a given predicate anywhere in the session.
pub async fn list_by_predicate(
    conn: &mut SqliteConnection,
    session_id: &str,
    predicate: &str,
) -> Result<Vec<Fact>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM facts WHERE session_id = ? AND predicate = ? ORDER BY id",
    )
    .bind(session_id)
    .bind(predicate)
    .fetch_all(conn)
    .await?;
    rows.iter().map(map_row).collect()
}
