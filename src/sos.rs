//! SOS emergency alerts. A trigger resolves the chosen counselor, dispatches
//! an outbound call when the method asks for one, and records a log row
//! either way. The response reports call delivery truthfully instead of
//! hiding provider failures behind "SOS triggered".

use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::{Extension, Json, TypedHeader};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::require_session;
use crate::models::{Counselor, SosLog, SosMethod};
use crate::telephony::Telephony;
use crate::{breaks, proceeds, Error, Payload};

/// Counselor directory identifiers are exactly 24 hex characters.
pub fn is_contact_id(value: &str) -> bool {
    value.len() == 24 && value.chars().all(|c| c.is_ascii_hexdigit())
}

pub async fn trigger_sos(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(trigger): Json<TriggerSos>,
    Extension(pg): Extension<PgPool>,
    Extension(telephony): Extension<Telephony>,
) -> Payload<SosTriggered> {
    let session = require_session(bearer.token(), &pg).await?;

    if !is_contact_id(&trigger.contact) {
        return breaks(Error::InvalidPayload {
            message: "`contact` must be a 24-character hex identifier!".to_string(),
        });
    }
    let contact = trigger.contact.to_ascii_lowercase();

    let counselor =
        sqlx::query_as::<_, Counselor>("SELECT * FROM counselors WHERE contact_id = $1 LIMIT 1")
            .bind(&contact)
            .fetch_optional(&pg)
            .await
            .map_err(Error::from)?;

    let counselor = match counselor {
        Some(counselor) => counselor,
        None => {
            return breaks(Error::NotFound {
                message: format!("Counselor `{}` does not exist!", contact),
            })
        }
    };

    log::warn!(
        "SOS triggered by student `{}` towards `{}` via {:?}",
        session.belongs_to,
        counselor.name,
        trigger.method
    );

    let call_delivered = match trigger.method {
        SosMethod::Call => Some(telephony.place_call(&counselor.phone).await.is_ok()),
        // sms/app delivery is handled by other collaborators, only recorded here
        SosMethod::Sms | SosMethod::App => None,
    };

    let record = SosLog {
        uuid: Uuid::new_v4(),
        student: session.belongs_to,
        method: trigger.method,
        alerted: vec![contact],
        call_delivered,
        created_at: Utc::now(),
    };

    let res = sqlx::query("INSERT INTO sos_logs VALUES ($1, $2, $3, $4, $5, $6)")
        .bind(record.uuid)
        .bind(record.student)
        .bind(record.method)
        .bind(&record.alerted)
        .bind(record.call_delivered)
        .bind(record.created_at)
        .execute(&pg)
        .await
        .map_err(Error::from)?;

    if res.rows_affected() < 1 {
        return breaks(Error::InternalError {
            kind: "DatabaseError",
            message: "Could not record SOS log!".to_string(),
        });
    }

    proceeds(SosTriggered {
        sos_id: record.uuid,
        method: record.method,
        call_delivered: record.call_delivered,
    })
}

pub async fn list_sos_logs(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Extension(pg): Extension<PgPool>,
) -> Payload<SosLogList> {
    let session = require_session(bearer.token(), &pg).await?;

    let logs = sqlx::query_as::<_, SosLog>(
        "SELECT * FROM sos_logs WHERE student = $1 ORDER BY created_at DESC",
    )
    .bind(session.belongs_to)
    .fetch_all(&pg)
    .await
    .map_err(Error::from)?;

    proceeds(SosLogList { logs })
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerSos {
    pub contact: String,
    pub method: SosMethod,
}

#[derive(Debug, Clone, Serialize)]
pub struct SosTriggered {
    pub sos_id: Uuid,
    pub method: SosMethod,
    pub call_delivered: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SosLogList {
    pub logs: Vec<SosLog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_24_hex_characters() {
        assert!(is_contact_id("5f3a9c1b2d4e6f7a8b9c0d1e"));
        assert!(is_contact_id("5F3A9C1B2D4E6F7A8B9C0D1E"));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(!is_contact_id("5f3a9c1b2d4e6f7a8b9c0d1"));
        assert!(!is_contact_id("5f3a9c1b2d4e6f7a8b9c0d1e5"));
        assert!(!is_contact_id(""));
    }

    #[test]
    fn rejects_non_hex_characters() {
        assert!(!is_contact_id("5f3a9c1b2d4e6f7a8b9c0d1g"));
        assert!(!is_contact_id("5f3a9c1b-d4e6f7a8b9c0d1e"));
    }

    #[test]
    fn method_deserializes_lowercase() {
        let trigger: TriggerSos = serde_json::from_str(
            r#"{"contact": "5f3a9c1b2d4e6f7a8b9c0d1e", "method": "call"}"#,
        )
        .unwrap();
        assert_eq!(trigger.method, SosMethod::Call);
        assert!(serde_json::from_str::<TriggerSos>(
            r#"{"contact": "5f3a9c1b2d4e6f7a8b9c0d1e", "method": "carrier-pigeon"}"#
        )
        .is_err());
    }
}
