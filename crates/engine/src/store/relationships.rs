//! Relationship and relationship-history table access.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use fateweaver_domain::{
    Attitude, AttitudeDimension, EntityKey, Relationship, RelationshipChange,
};

use super::StoreError;

fn map_row(row: &SqliteRow) -> Result<Relationship, StoreError> {
    let from_entity: String = row.try_get("from_entity")?;
    let to_entity: String = row.try_get("to_entity")?;

    let ser = |e: fateweaver_domain::DomainError| StoreError::Serialization(e.to_string());

    Ok(Relationship {
        from_entity: EntityKey::new(from_entity).map_err(ser)?,
        to_entity: EntityKey::new(to_entity).map_err(ser)?,
        attitude: Attitude {
            trust: row.try_get::<i64, _>("trust")? as u8,
            liking: row.try_get::<i64, _>("liking")? as u8,
            respect: row.try_get::<i64, _>("respect")? as u8,
            fear: row.try_get::<i64, _>("fear")? as u8,
            familiarity: row.try_get::<i64, _>("familiarity")? as u8,
            romantic_interest: row.try_get::<i64, _>("romantic_interest")? as u8,
        },
        has_met: row.try_get("has_met")?,
    })
}

pub async fn get(
    conn: &mut SqliteConnection,
    session_id: &str,
    from: &str,
    to: &str,
) -> Result<Option<Relationship>, StoreError> {
    let row = sqlx::query(
        "SELECT * FROM relationships WHERE session_id = ? AND from_entity = ? AND to_entity = ?",
    )
    .bind(session_id)
    .bind(from)
    .bind(to)
    .fetch_optional(conn)
    .await?;
    row.as_ref().map(map_row).transpose()
}

pub async fn upsert(
    conn: &mut SqliteConnection,
    session_id: &str,
    relationship: &Relationship,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO relationships (session_id, from_entity, to_entity, trust, liking, respect, fear, familiarity, romantic_interest, has_met)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (session_id, from_entity, to_entity) DO UPDATE SET
             trust = excluded.trust, liking = excluded.liking, respect = excluded.respect,
             fear = excluded.fear, familiarity = excluded.familiarity,
             romantic_interest = excluded.romantic_interest, has_met = excluded.has_met",
    )
    .bind(session_id)
    .bind(relationship.from_entity.as_str())
    .bind(relationship.to_entity.as_str())
    .bind(i64::from(relationship.attitude.trust))
    .bind(i64::from(relationship.attitude.liking))
    .bind(i64::from(relationship.attitude.respect))
    .bind(i64::from(relationship.attitude.fear))
    .bind(i64::from(relationship.attitude.familiarity))
    .bind(i64::from(relationship.attitude.romantic_interest))
    .bind(relationship.has_met)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn append_change(
    conn: &mut SqliteConnection,
    session_id: &str,
    change: &RelationshipChange,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO relationship_changes (session_id, from_entity, to_entity, dimension, delta, reason, turn_number)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(change.from_entity.as_str())
    .bind(change.to_entity.as_str())
    .bind(change.dimension.as_str())
    .bind(change.delta)
    .bind(&change.reason)
    .bind(change.turn_number)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_changes(
    conn: &mut SqliteConnection,
    session_id: &str,
    from: &str,
    to: &str,
) -> Result<Vec<RelationshipChange>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM relationship_changes
         WHERE session_id = ? AND from_entity = ? AND to_entity = ?
         ORDER BY id",
    )
    .bind(session_id)
    .bind(from)
    .bind(to)
    .fetch_all(conn)
    .await?;

    let ser = |e: fateweaver_domain::DomainError| StoreError::Serialization(e.to_string());

    rows.iter()
        .map(|row| {
            let from_entity: String = row.try_get("from_entity")?;
            let to_entity: String = row.try_get("to_entity")?;
            let dimension: String = row.try_get("dimension")?;
            Ok(RelationshipChange {
                from_entity: EntityKey::new(from_entity).map_err(ser)?,
                to_entity: EntityKey::new(to_entity).map_err(ser)?,
                dimension: dimension.parse::<AttitudeDimension>().map_err(ser)?,
                delta: row.try_get::<i64, _>("delta")? as i32,
                reason: row.try_get("reason")?,
                turn_number: row.try_get::<i64, _>("turn_number")? as u32,
            })
        })
        .collect()
}

/// Relationships pointing at one entity.
pub async fn list_toward(
    conn: &mut SqliteConnection,
    session_id: &str,
    to: &str,
) -> Result<Vec<Relationship>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM relationships WHERE session_id = ? AND to_entity = ? ORDER BY from_entity",
    )
    .bind(session_id)
    .bind(to)
    .fetch_all(conn)
    .await?;
    rows.iter().map(map_row).collect()
}

/// Relationships originating from one entity.
pub async fn list_from(
    conn: &mut SqliteConnection,
    session_id: &str,
    from: &str,
) -> Result<Vec<Relationship>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM relationships WHERE session_id = ? AND from_entity = ? ORDER BY to_entity",
    )
    .bind(session_id)
    .bind(from)
    .fetch_all(conn)
    .await?;
    rows.iter().map(map_row).collect()
}
