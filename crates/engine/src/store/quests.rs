//! Quest and appointment table access.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use fateweaver_domain::{
    Appointment, EntityKey, ItemKey, LocationKey, Quest, QuestKey, QuestStatus,
};

use super::StoreError;

fn map_quest(row: &SqliteRow) -> Result<Quest, StoreError> {
    let key: String = row.try_get("key")?;
    let status: String = row.try_get("status")?;
    let target_entity: Option<String> = row.try_get("target_entity")?;
    let destination: Option<String> = row.try_get("destination")?;
    let quest_item: Option<String> = row.try_get("quest_item")?;

    let ser = |e: fateweaver_domain::DomainError| StoreError::Serialization(e.to_string());

    Ok(Quest {
        key: QuestKey::new(key).map_err(ser)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        status: status.parse::<QuestStatus>().map_err(ser)?,
        target_entity: target_entity.map(EntityKey::new).transpose().map_err(ser)?,
        destination: destination.map(LocationKey::new).transpose().map_err(ser)?,
        quest_item: quest_item.map(ItemKey::new).transpose().map_err(ser)?,
    })
}

pub async fn insert(
    conn: &mut SqliteConnection,
    session_id: &str,
    quest: &Quest,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO quests (session_id, key, name, description, status, target_entity, destination, quest_item)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(quest.key.as_str())
    .bind(&quest.name)
    .bind(&quest.description)
    .bind(quest.status.as_str())
    .bind(quest.target_entity.as_ref().map(|e| e.as_str().to_string()))
    .bind(quest.destination.as_ref().map(|l| l.as_str().to_string()))
    .bind(quest.quest_item.as_ref().map(|i| i.as_str().to_string()))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
) -> Result<Option<Quest>, StoreError> {
    let row = sqlx::query("SELECT * FROM quests WHERE session_id = ? AND key = ?")
        .bind(session_id)
        .bind(key)
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(map_quest).transpose()
}

pub async fn set_status(
    conn: &mut SqliteConnection,
    session_id: &str,
    key: &str,
    status: QuestStatus,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE quests SET status = ? WHERE session_id = ? AND key = ?")
        .bind(status.as_str())
        .bind(session_id)
        .bind(key)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub async fn list_active(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<Vec<Quest>, StoreError> {
    let rows = sqlx::query(
        "SELECT * FROM quests WHERE session_id = ? AND status = 'active' ORDER BY key",
    )
    .bind(session_id)
    .fetch_all(conn)
    .await?;
    rows.iter().map(map_quest).collect()
}

pub async fn insert_appointment(
    conn: &mut SqliteConnection,
    session_id: &str,
    appointment: &Appointment,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO appointments (session_id, entity_key, day, time_minutes, location_key, description)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(appointment.entity.as_str())
    .bind(i64::from(appointment.day))
    .bind(i64::from(appointment.time_minutes))
    .bind(appointment.location.as_str())
    .bind(&appointment.description)
    .execute(conn)
    .await?;
    Ok(())
}

/// Appointments for an entity falling inside the next `window_minutes` of
/// game time.
pub async fn upcoming_appointments(
    conn: &mut SqliteConnection,
    session_id: &str,
    entity_key: &str,
    day: u32,
    minutes_of_day: u32,
    window_minutes: u32,
) -> Result<Vec<Appointment>, StoreError> {
    let now = i64::from(day) * 1440 + i64::from(minutes_of_day);
    let until = now + i64::from(window_minutes);
    let rows = sqlx::query(
        "SELECT * FROM appointments
         WHERE session_id = ? AND entity_key = ?
           AND (day * 1440 + time_minutes) BETWEEN ? AND ?
         ORDER BY day, time_minutes",
    )
    .bind(session_id)
    .bind(entity_key)
    .bind(now)
    .bind(until)
    .fetch_all(conn)
    .await?;

    let ser = |e: fateweaver_domain::DomainError| StoreError::Serialization(e.to_string());

    rows.iter()
        .map(|row| {
            let entity: String = row.try_get("entity_key")?;
            let location: String = row.try_get("location_key")?;
            Ok(Appointment {
                entity: EntityKey::new(entity).map_err(ser)?,
                day: row.try_get::<i64, _>("day")? as u32,
                time_minutes: row.try_get::<i64, _>("time_minutes")? as u32,
                location: LocationKey::new(location).map_err(ser)?,
                description: row.try_get("description")?,
            })
        })
        .collect()
}
