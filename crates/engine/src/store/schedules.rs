//! NPC schedule table access.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use fateweaver_domain::{DayOfWeek, EntityKey, LocationKey, ScheduleEntry};

use super::StoreError;

fn map_row(row: &SqliteRow) -> Result<ScheduleEntry, StoreError> {
    let entity: String = row.try_get("entity_key")?;
    let day_of_week: String = row.try_get("day_of_week")?;
    let location: String = row.try_get("location_key")?;

    let ser = |e: fateweaver_domain::DomainError| StoreError::Serialization(e.to_string());

    Ok(ScheduleEntry {
        entity: EntityKey::new(entity).map_err(ser)?,
        day_of_week: day_of_week.parse::<DayOfWeek>().map_err(ser)?,
        time_minutes: row.try_get::<i64, _>("time_minutes")? as u32,
        location: LocationKey::new(location).map_err(ser)?,
        activity: row.try_get("activity")?,
    })
}

pub async fn insert(
    conn: &mut SqliteConnection,
    session_id: &str,
    entry: &ScheduleEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO schedules (session_id, entity_key, day_of_week, time_minutes, location_key, activity)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(entry.entity.as_str())
    .bind(entry.day_of_week.as_str())
    .bind(i64::from(entry.time_minutes))
    .bind(entry.location.as_str())
    .bind(&entry.activity)
    .execute(conn)
    .await?;
    Ok(())
}

/// All entries for a weekday, ordered by time.
pub async fn list_for_day(
    conn: &mut SqliteConnection,
    session_id: &str,
    day_of_week: DayOfWeek,
) -> Result<Vec<ScheduleEntry>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM schedules WHERE session_id = ? AND day_of_week = ?
         ORDER BY entity_key, time_minutes",
    )
    .bind(session_id)
    .bind(day_of_week.as_str())
    .fetch_all(conn)
    .await?;
    rows.iter().map(map_row).collect()
}

pub async fn delete_for_entity(
    conn: &mut SqliteConnection,
    session_id: &str,
    entity_key: &str,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM schedules WHERE session_id = ? AND entity_key = ?")
        .bind(session_id)
        .bind(entity_key)
        .execute(conn)
        .await?;
    Ok(())
}
