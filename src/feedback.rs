use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::{Extension, Json, TypedHeader};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::require_session;
use crate::models::Feedback;
use crate::{breaks, proceeds, Error, Payload};

pub fn valid_rating(rating: i16) -> bool {
    (1..=5).contains(&rating)
}

pub async fn list_feedback(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Extension(pg): Extension<PgPool>,
) -> Payload<FeedbackList> {
    let session = require_session(bearer.token(), &pg).await?;

    let feedback = sqlx::query_as::<_, Feedback>(
        "SELECT * FROM feedback WHERE student = $1 ORDER BY created_at DESC",
    )
    .bind(session.belongs_to)
    .fetch_all(&pg)
    .await
    .map_err(Error::from)?;

    proceeds(FeedbackList { feedback })
}

pub async fn submit_feedback(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(submission): Json<SubmitFeedback>,
    Extension(pg): Extension<PgPool>,
) -> Payload<Feedback> {
    let session = require_session(bearer.token(), &pg).await?;

    if !valid_rating(submission.rating) {
        return breaks(Error::InvalidPayload {
            message: format!(
                "`rating` must be between 1 and 5, got {}!",
                submission.rating
            ),
        });
    }
    if submission.category.is_empty() {
        return breaks(Error::InvalidPayload {
            message: "`category` must not be empty!".to_string(),
        });
    }

    let record = Feedback {
        uuid: Uuid::new_v4(),
        student: session.belongs_to,
        rating: submission.rating,
        category: submission.category,
        comment: submission.comment,
        created_at: Utc::now(),
    };

    let res = sqlx::query("INSERT INTO feedback VALUES ($1, $2, $3, $4, $5, $6)")
        .bind(record.uuid)
        .bind(record.student)
        .bind(record.rating)
        .bind(&record.category)
        .bind(&record.comment)
        .bind(record.created_at)
        .execute(&pg)
        .await
        .map_err(Error::from)?;

    if res.rows_affected() < 1 {
        return breaks(Error::InternalError {
            kind: "DatabaseError",
            message: "Could not save feedback!".to_string(),
        });
    }
    proceeds(record)
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackList {
    pub feedback: Vec<Feedback>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitFeedback {
    pub rating: i16,
    pub category: String,
    #[serde(default)]
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        assert!(valid_rating(1));
        assert!(valid_rating(3));
        assert!(valid_rating(5));
        assert!(!valid_rating(0));
        assert!(!valid_rating(6));
    }
}
