//! Time state table access.

use sqlx::{Row, SqliteConnection};

use fateweaver_domain::{GameClock, Weather};

use super::StoreError;

pub async fn get(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<Option<GameClock>, StoreError> {
    let row = sqlx::query(
        "SELECT current_day, minutes_of_day, weather FROM time_state WHERE session_id = ?",
    )
    .bind(session_id)
    .fetch_optional(conn)
    .await?;

    row.map(|row| {
        let weather: String = row.try_get("weather")?;
        Ok(GameClock {
            day: row.try_get::<i64, _>("current_day")? as u32,
            minutes_of_day: row.try_get::<i64, _>("minutes_of_day")? as u32,
            weather: weather
                .parse::<Weather>()
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
        })
    })
    .transpose()
}

pub async fn set(
    conn: &mut SqliteConnection,
    session_id: &str,
    clock: &GameClock,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO time_state (session_id, current_day, minutes_of_day, weather)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (session_id) DO UPDATE SET
             current_day = excluded.current_day,
             minutes_of_day = excluded.minutes_of_day,
             weather = excluded.weather",
    )
    .bind(session_id)
    .bind(i64::from(clock.day))
    .bind(i64::from(clock.minutes_of_day))
    .bind(clock.weather.as_str())
    .execute(conn)
    .await?;
    Ok(())
}
