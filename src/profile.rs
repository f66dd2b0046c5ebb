use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::{Extension, Json, TypedHeader};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::require_session;
use crate::models::{StudentData, StudentStatus};
use crate::{breaks, proceeds, Error, Payload};

pub async fn read_profile(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Extension(pg): Extension<PgPool>,
) -> Payload<StudentProfile> {
    let session = require_session(bearer.token(), &pg).await?;

    let student = sqlx::query_as::<_, StudentData>("SELECT * FROM students WHERE uuid = $1 LIMIT 1")
        .bind(session.belongs_to)
        .fetch_one(&pg)
        .await
        .map_err(Error::from)?;

    proceeds(StudentProfile::from(student))
}

pub async fn update_profile(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(update): Json<UpdateProfile>,
    Extension(pg): Extension<PgPool>,
) -> Payload<StudentProfile> {
    let session = require_session(bearer.token(), &pg).await?;

    if update.phone.is_empty() {
        return breaks(Error::InvalidPayload {
            message: "`phone` must not be empty!".to_string(),
        });
    }

    let student = sqlx::query_as::<_, StudentData>(
        "UPDATE students SET phone = $1 WHERE uuid = $2 RETURNING *",
    )
    .bind(&update.phone)
    .bind(session.belongs_to)
    .fetch_one(&pg)
    .await
    .map_err(Error::from)?;

    proceeds(StudentProfile::from(student))
}

/// The student row as clients see it. The password hash never leaves the
/// server.
#[derive(Debug, Clone, Serialize)]
pub struct StudentProfile {
    pub student_id: Uuid,
    pub alias: String,
    pub phone: String,
    pub status: StudentStatus,
    pub must_change_password: bool,
    pub created_at: DateTime<Utc>,
}

impl From<StudentData> for StudentProfile {
    fn from(data: StudentData) -> Self {
        Self {
            student_id: data.uuid,
            alias: data.alias,
            phone: data.phone,
            status: data.status,
            must_change_password: data.must_change_password,
            created_at: data.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfile {
    pub phone: String,
}
