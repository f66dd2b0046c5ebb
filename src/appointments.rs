use axum::extract::Path;
use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::{Extension, Json, TypedHeader};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::require_session;
use crate::models::{Appointment, AppointmentStatus, Counselor};
use crate::{breaks, proceeds, Error, Payload};

/// Longest bookable slot, in minutes.
const MAX_SLOT_MINUTES: i64 = 60;

pub async fn list_counselors(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Extension(pg): Extension<PgPool>,
) -> Payload<CounselorList> {
    require_session(bearer.token(), &pg).await?;

    let counselors = sqlx::query_as::<_, Counselor>("SELECT * FROM counselors ORDER BY name")
        .fetch_all(&pg)
        .await
        .map_err(Error::from)?;

    proceeds(CounselorList { counselors })
}

pub async fn list_appointments(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Extension(pg): Extension<PgPool>,
) -> Payload<AppointmentList> {
    let session = require_session(bearer.token(), &pg).await?;

    let appointments = sqlx::query_as::<_, Appointment>(
        "SELECT * FROM appointments WHERE student = $1 ORDER BY date DESC, start_time DESC",
    )
    .bind(session.belongs_to)
    .fetch_all(&pg)
    .await
    .map_err(Error::from)?;

    proceeds(AppointmentList { appointments })
}

pub async fn book_appointment(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(booking): Json<BookAppointment>,
    Extension(pg): Extension<PgPool>,
) -> Payload<Appointment> {
    let session = require_session(bearer.token(), &pg).await?;

    let (start_time, end_time) = match validate_slot(&booking.start, &booking.end) {
        Ok(times) => times,
        Err(err) => return breaks(err),
    };

    if !crate::sos::is_contact_id(&booking.counselor) {
        return breaks(Error::InvalidPayload {
            message: "`counselor` must be a 24-character hex identifier!".to_string(),
        });
    }
    let contact = booking.counselor.to_ascii_lowercase();

    let counselor =
        sqlx::query_as::<_, Counselor>("SELECT * FROM counselors WHERE contact_id = $1 LIMIT 1")
            .bind(&contact)
            .fetch_optional(&pg)
            .await
            .map_err(Error::from)?;
    if counselor.is_none() {
        return breaks(Error::NotFound {
            message: format!("Counselor `{}` does not exist!", contact),
        });
    }

    let appointment = Appointment {
        uuid: Uuid::new_v4(),
        student: session.belongs_to,
        counselor: contact,
        date: booking.date,
        start_time,
        end_time,
        status: AppointmentStatus::Pending,
        created_at: Utc::now(),
    };

    let res = sqlx::query("INSERT INTO appointments VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
        .bind(appointment.uuid)
        .bind(appointment.student)
        .bind(&appointment.counselor)
        .bind(appointment.date)
        .bind(appointment.start_time)
        .bind(appointment.end_time)
        .bind(&appointment.status)
        .bind(appointment.created_at)
        .execute(&pg)
        .await
        .map_err(Error::from)?;

    if res.rows_affected() < 1 {
        return breaks(Error::InternalError {
            kind: "DatabaseError",
            message: "Could not save appointment!".to_string(),
        });
    }
    proceeds(appointment)
}

pub async fn cancel_appointment(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Extension(pg): Extension<PgPool>,
) -> Payload<AppointmentCancelled> {
    let session = require_session(bearer.token(), &pg).await?;

    let appointment = sqlx::query_as::<_, Appointment>(
        "SELECT * FROM appointments WHERE uuid = $1 AND student = $2 LIMIT 1",
    )
    .bind(id)
    .bind(session.belongs_to)
    .fetch_optional(&pg)
    .await
    .map_err(Error::from)?;

    let appointment = match appointment {
        Some(appointment) => appointment,
        None => {
            return breaks(Error::NotFound {
                message: format!("No appointment with id `{}`!", id),
            })
        }
    };

    if appointment.status != AppointmentStatus::Pending {
        return breaks(Error::InvalidPayload {
            message: "Only pending appointments can be cancelled!".to_string(),
        });
    }

    let affected = sqlx::query("DELETE FROM appointments WHERE uuid = $1 AND student = $2")
        .bind(id)
        .bind(session.belongs_to)
        .execute(&pg)
        .await
        .map_err(Error::from)?;

    proceeds(AppointmentCancelled {
        appointment_id: id,
        cancelled: affected.rows_affected() >= 1,
    })
}

/// Parses and validates a booking slot. An end at or before the start is
/// treated as rolling over past midnight into the next day; the resulting
/// duration must stay within [`MAX_SLOT_MINUTES`].
pub fn validate_slot(start: &str, end: &str) -> Result<(NaiveTime, NaiveTime), Error> {
    let start_time = parse_slot_time(start)?;
    let end_time = parse_slot_time(end)?;
    let minutes = slot_duration_minutes(start_time, end_time);
    if minutes > MAX_SLOT_MINUTES {
        return Err(Error::invalid(format!(
            "Appointment slot is {} minutes long, at most {} allowed!",
            minutes, MAX_SLOT_MINUTES
        )));
    }
    Ok((start_time, end_time))
}

fn parse_slot_time(value: &str) -> Result<NaiveTime, Error> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| Error::invalid(format!("`{}` is not a valid HH:MM time!", value)))
}

fn slot_duration_minutes(start: NaiveTime, end: NaiveTime) -> i64 {
    let minutes = (end - start).num_minutes();
    if minutes <= 0 {
        // end on the next day
        minutes + 24 * 60
    } else {
        minutes
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CounselorList {
    pub counselors: Vec<Counselor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentList {
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointment {
    pub counselor: String,
    pub date: NaiveDate,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentCancelled {
    pub appointment_id: Uuid,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(value: &str) -> NaiveTime {
        NaiveTime::parse_from_str(value, "%H:%M").unwrap()
    }

    #[test]
    fn same_day_slot_is_accepted() {
        assert!(validate_slot("09:00", "09:45").is_ok());
        assert!(validate_slot("09:00", "10:00").is_ok());
    }

    #[test]
    fn earlier_end_rolls_over_to_next_day() {
        assert_eq!(slot_duration_minutes(time("09:00"), time("08:30")), 23 * 60 + 30);
        assert!(validate_slot("09:00", "08:30").is_err());
    }

    #[test]
    fn equal_start_and_end_is_a_full_day() {
        assert_eq!(slot_duration_minutes(time("09:00"), time("09:00")), 24 * 60);
        assert!(validate_slot("09:00", "09:00").is_err());
    }

    #[test]
    fn midnight_rollover_within_cap_is_accepted() {
        assert_eq!(slot_duration_minutes(time("23:30"), time("00:15")), 45);
        assert!(validate_slot("23:30", "00:15").is_ok());
    }

    #[test]
    fn slot_over_an_hour_is_rejected() {
        assert!(validate_slot("09:00", "10:01").is_err());
    }

    #[test]
    fn malformed_time_is_rejected() {
        assert!(validate_slot("9 o'clock", "09:45").is_err());
        assert!(validate_slot("09:00", "25:00").is_err());
    }
}
