//! Mood entries and habit logs. Every mutation addresses a row by its uuid
//! and the session owner, never by position in a list.

use axum::extract::Path;
use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::{Extension, Json, TypedHeader};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::require_session;
use crate::models::{HabitLog, MoodEntry};
use crate::{breaks, proceeds, Error, Payload};

pub fn valid_intensity(intensity: i16) -> bool {
    (1..=5).contains(&intensity)
}

pub async fn list_moods(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Extension(pg): Extension<PgPool>,
) -> Payload<MoodEntryList> {
    let session = require_session(bearer.token(), &pg).await?;

    let entries = sqlx::query_as::<_, MoodEntry>(
        "SELECT * FROM mood_entries WHERE student = $1 ORDER BY recorded_at DESC",
    )
    .bind(session.belongs_to)
    .fetch_all(&pg)
    .await
    .map_err(Error::from)?;

    proceeds(MoodEntryList { entries })
}

pub async fn record_mood(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(entry): Json<RecordMood>,
    Extension(pg): Extension<PgPool>,
) -> Payload<MoodEntry> {
    let session = require_session(bearer.token(), &pg).await?;

    if let Err(err) = check_mood(&entry) {
        return breaks(err);
    }

    let record = MoodEntry {
        uuid: Uuid::new_v4(),
        student: session.belongs_to,
        mood: entry.mood,
        intensity: entry.intensity,
        note: entry.note,
        recorded_at: Utc::now(),
    };

    let res = sqlx::query("INSERT INTO mood_entries VALUES ($1, $2, $3, $4, $5, $6)")
        .bind(record.uuid)
        .bind(record.student)
        .bind(&record.mood)
        .bind(record.intensity)
        .bind(&record.note)
        .bind(record.recorded_at)
        .execute(&pg)
        .await
        .map_err(Error::from)?;

    if res.rows_affected() < 1 {
        return breaks(Error::InternalError {
            kind: "DatabaseError",
            message: "Could not save mood entry!".to_string(),
        });
    }
    proceeds(record)
}

pub async fn update_mood(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(entry): Json<RecordMood>,
    Extension(pg): Extension<PgPool>,
) -> Payload<MoodEntry> {
    let session = require_session(bearer.token(), &pg).await?;

    if let Err(err) = check_mood(&entry) {
        return breaks(err);
    }

    let updated = sqlx::query_as::<_, MoodEntry>(
        "UPDATE mood_entries SET mood = $1, intensity = $2, note = $3 \
         WHERE uuid = $4 AND student = $5 RETURNING *",
    )
    .bind(&entry.mood)
    .bind(entry.intensity)
    .bind(&entry.note)
    .bind(id)
    .bind(session.belongs_to)
    .fetch_optional(&pg)
    .await
    .map_err(Error::from)?;

    match updated {
        Some(record) => proceeds(record),
        None => breaks(Error::NotFound {
            message: format!("No mood entry with id `{}`!", id),
        }),
    }
}

pub async fn delete_mood(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
) -> Payload<RecordDeleted> {
    let session = require_session(bearer.token(), &pg).await?;

    let affected = sqlx::query("DELETE FROM mood_entries WHERE uuid = $1 AND student = $2")
        .bind(id)
        .bind(session.belongs_to)
        .execute(&pg)
        .await
        .map_err(Error::from)?;

    if affected.rows_affected() < 1 {
        return breaks(Error::NotFound {
            message: format!("No mood entry with id `{}`!", id),
        });
    }
    proceeds(RecordDeleted { record_id: id })
}

pub async fn list_habits(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Extension(pg): Extension<PgPool>,
) -> Payload<HabitLogList> {
    let session = require_session(bearer.token(), &pg).await?;

    let logs = sqlx::query_as::<_, HabitLog>(
        "SELECT * FROM habit_logs WHERE student = $1 ORDER BY logged_on DESC, created_at DESC",
    )
    .bind(session.belongs_to)
    .fetch_all(&pg)
    .await
    .map_err(Error::from)?;

    proceeds(HabitLogList { logs })
}

pub async fn log_habit(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(log): Json<LogHabit>,
    Extension(pg): Extension<PgPool>,
) -> Payload<HabitLog> {
    let session = require_session(bearer.token(), &pg).await?;

    if log.habit.is_empty() {
        return breaks(Error::InvalidPayload {
            message: "`habit` must not be empty!".to_string(),
        });
    }

    let record = HabitLog {
        uuid: Uuid::new_v4(),
        student: session.belongs_to,
        habit: log.habit,
        completed: log.completed,
        logged_on: log.logged_on,
        created_at: Utc::now(),
    };

    let res = sqlx::query("INSERT INTO habit_logs VALUES ($1, $2, $3, $4, $5, $6)")
        .bind(record.uuid)
        .bind(record.student)
        .bind(&record.habit)
        .bind(record.completed)
        .bind(record.logged_on)
        .bind(record.created_at)
        .execute(&pg)
        .await
        .map_err(Error::from)?;

    if res.rows_affected() < 1 {
        return breaks(Error::InternalError {
            kind: "DatabaseError",
            message: "Could not save habit log!".to_string(),
        });
    }
    proceeds(record)
}

pub async fn update_habit(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(log): Json<LogHabit>,
    Extension(pg): Extension<PgPool>,
) -> Payload<HabitLog> {
    let session = require_session(bearer.token(), &pg).await?;

    if log.habit.is_empty() {
        return breaks(Error::InvalidPayload {
            message: "`habit` must not be empty!".to_string(),
        });
    }

    let updated = sqlx::query_as::<_, HabitLog>(
        "UPDATE habit_logs SET habit = $1, completed = $2, logged_on = $3 \
         WHERE uuid = $4 AND student = $5 RETURNING *",
    )
    .bind(&log.habit)
    .bind(log.completed)
    .bind(log.logged_on)
    .bind(id)
    .bind(session.belongs_to)
    .fetch_optional(&pg)
    .await
    .map_err(Error::from)?;

    match updated {
        Some(record) => proceeds(record),
        None => breaks(Error::NotFound {
            message: format!("No habit log with id `{}`!", id),
        }),
    }
}

pub async fn delete_habit(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
) -> Payload<RecordDeleted> {
    let session = require_session(bearer.token(), &pg).await?;

    let affected = sqlx::query("DELETE FROM habit_logs WHERE uuid = $1 AND student = $2")
        .bind(id)
        .bind(session.belongs_to)
        .execute(&pg)
        .await
        .map_err(Error::from)?;

    if affected.rows_affected() < 1 {
        return breaks(Error::NotFound {
            message: format!("No habit log with id `{}`!", id),
        });
    }
    proceeds(RecordDeleted { record_id: id })
}

fn check_mood(entry: &RecordMood) -> Result<(), Error> {
    if entry.mood.is_empty() {
        return Err(Error::invalid("`mood` must not be empty!"));
    }
    if !valid_intensity(entry.intensity) {
        return Err(Error::invalid(format!(
            "`intensity` must be between 1 and 5, got {}!",
            entry.intensity
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct MoodEntryList {
    pub entries: Vec<MoodEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordMood {
    pub mood: String,
    pub intensity: i16,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitLogList {
    pub logs: Vec<HabitLog>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogHabit {
    pub habit: String,
    pub completed: bool,
    pub logged_on: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordDeleted {
    pub record_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_bounds() {
        assert!(valid_intensity(1));
        assert!(valid_intensity(5));
        assert!(!valid_intensity(0));
        assert!(!valid_intensity(6));
        assert!(!valid_intensity(-3));
    }

    #[test]
    fn empty_mood_is_rejected() {
        let entry = RecordMood {
            mood: String::new(),
            intensity: 3,
            note: None,
        };
        assert!(check_mood(&entry).is_err());
    }

    #[test]
    fn valid_mood_passes() {
        let entry = RecordMood {
            mood: "calm".to_string(),
            intensity: 2,
            note: Some("after evening walk".to_string()),
        };
        assert!(check_mood(&entry).is_ok());
    }
}
