use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::{Extension, Json, TypedHeader};
use chrono::{DateTime, Duration, Utc};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ops::Add;

use crate::models::{StudentData, StudentSession, StudentStatus};
use crate::{breaks, proceeds, Error, Payload};
use sqlx::PgPool;
use uuid::Uuid;

const SESSION_LIFETIME_DAYS: i64 = 2;
const TEMP_PASSWORD_LEN: usize = 12;

/// Resolves a bearer token into its live session. Expired sessions are
/// deleted on sight, so every protected handler goes through here instead
/// of re-checking expiry on its own.
pub async fn require_session(token: &str, pg: &PgPool) -> Result<StudentSession, Error> {
    if token.is_empty() {
        return Err(Error::InvalidSession {
            message: "No session token provided!".to_string(),
        });
    }
    let session = sqlx::query_as::<_, StudentSession>(
        "SELECT * FROM student_sessions WHERE ssid = $1 LIMIT 1",
    )
    .bind(token)
    .fetch_optional(pg)
    .await
    .map_err(Error::from)?;

    let session = match session {
        Some(session) => session,
        None => {
            return Err(Error::InvalidSession {
                message: "Unknown session token!".to_string(),
            })
        }
    };

    if Utc::now().gt(&session.expires_at) {
        sqlx::query("DELETE FROM student_sessions WHERE ssid = $1")
            .bind(token)
            .execute(pg)
            .await
            .map_err(Error::from)?;
        return Err(Error::SessionExpired {
            message: "Session has expired, log in again!".to_string(),
        });
    }
    Ok(session)
}

pub async fn register_student(
    Json(student): Json<CreateStudent>,
    Extension(pg): Extension<PgPool>,
) -> Payload<CreatedStudent> {
    if student.password.is_empty() {
        return breaks(Error::MissingCredentials {
            message: "Provided password was empty!".to_string(),
        });
    }
    if student.alias.is_empty() || student.phone.is_empty() {
        return breaks(Error::InvalidPayload {
            message: "`alias` and `phone` must not be empty!".to_string(),
        });
    }

    let existing =
        sqlx::query_as::<_, StudentData>("SELECT * FROM students WHERE alias = $1 LIMIT 1")
            .bind(&student.alias)
            .fetch_optional(&pg)
            .await
            .map_err(Error::from)?;
    if existing.is_some() {
        return breaks(Error::UserAlreadyExists {
            message: "Student with provided alias already exists!".to_string(),
        });
    }

    let data = StudentData {
        uuid: Uuid::new_v4(),
        alias: student.alias,
        phone: student.phone,
        password_hash: hash_password(&student.password)?,
        status: StudentStatus::Active,
        must_change_password: false,
        created_at: Utc::now(),
    };

    let res = sqlx::query("INSERT INTO students VALUES ($1, $2, $3, $4, $5, $6, $7)")
        .bind(data.uuid)
        .bind(&data.alias)
        .bind(&data.phone)
        .bind(&data.password_hash)
        .bind(&data.status)
        .bind(data.must_change_password)
        .bind(data.created_at)
        .execute(&pg)
        .await
        .map_err(Error::from)?;

    if res.rows_affected() < 1 {
        return breaks(Error::InternalError {
            kind: "DatabaseError",
            message: "Could not save student to database!".to_string(),
        });
    }
    log::info!("Registered new student `{}`", data.alias);
    proceeds(CreatedStudent {
        student_id: data.uuid,
    })
}

pub async fn login_student(
    Json(login): Json<LoginStudent>,
    Extension(pg): Extension<PgPool>,
) -> Payload<LoggedInStudent> {
    if login.password.is_empty() {
        return breaks(Error::MissingCredentials {
            message: "`password` parameter was empty".to_string(),
        });
    }

    let student =
        sqlx::query_as::<_, StudentData>("SELECT * FROM students WHERE alias = $1 LIMIT 1")
            .bind(&login.alias)
            .fetch_optional(&pg)
            .await
            .map_err(Error::from)?;

    let student = if let Some(student) = student {
        student
    } else {
        return breaks(Error::UserDoesNotExist {
            message: format!("Student with alias `{}` does not exist!", login.alias),
        });
    };

    if student.status == StudentStatus::Suspended {
        return breaks(Error::AuthenticationFailure {
            message: "Account is suspended!".to_string(),
        });
    }

    let hash = PasswordHash::new(&student.password_hash).map_err(Error::from)?;
    let matches = Pbkdf2
        .verify_password(login.password.as_bytes(), &hash)
        .is_ok();
    if !matches {
        return breaks(Error::AuthenticationFailure {
            message: "Passwords do not match!".to_string(),
        });
    }

    let existing = sqlx::query_as::<_, StudentSession>(
        "SELECT * FROM student_sessions WHERE belongs_to = $1 LIMIT 1",
    )
    .bind(student.uuid)
    .fetch_optional(&pg)
    .await
    .map_err(Error::from)?;

    if let Some(existing) = existing {
        if Utc::now().lt(&existing.expires_at) {
            // already authenticated
            return proceeds(LoggedInStudent {
                ssid: existing.ssid,
                student_id: existing.belongs_to,
                expires_at: existing.expires_at,
                must_change_password: student.must_change_password,
            });
        }
        sqlx::query("DELETE FROM student_sessions WHERE ssid = $1")
            .bind(&existing.ssid)
            .execute(&pg)
            .await
            .map_err(Error::from)?;
    }

    let ssid = new_session_token();
    let expires_at = Utc::now().add(Duration::days(SESSION_LIFETIME_DAYS));
    let res = sqlx::query("INSERT INTO student_sessions VALUES($1, $2, $3)")
        .bind(&ssid)
        .bind(student.uuid)
        .bind(expires_at)
        .execute(&pg)
        .await
        .map_err(Error::from)?;

    if res.rows_affected() < 1 {
        return breaks(Error::InternalError {
            kind: "DatabaseError",
            message: "Could not store session!".to_string(),
        });
    }

    proceeds(LoggedInStudent {
        ssid,
        student_id: student.uuid,
        expires_at,
        must_change_password: student.must_change_password,
    })
}

pub async fn logout_student(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Extension(pg): Extension<PgPool>,
) -> Payload<SessionDropped> {
    let session = require_session(bearer.token(), &pg).await?;

    let affected = sqlx::query("DELETE FROM student_sessions WHERE ssid = $1")
        .bind(&session.ssid)
        .execute(&pg)
        .await
        .map_err(Error::from)?;

    proceeds(SessionDropped {
        student_id: session.belongs_to,
        drop_success: affected.rows_affected() >= 1,
    })
}

pub async fn reset_password(
    Json(reset): Json<ResetPassword>,
    Extension(pg): Extension<PgPool>,
) -> Payload<PasswordReset> {
    let student =
        sqlx::query_as::<_, StudentData>("SELECT * FROM students WHERE alias = $1 LIMIT 1")
            .bind(&reset.alias)
            .fetch_optional(&pg)
            .await
            .map_err(Error::from)?;

    // same error for unknown alias and wrong phone, no account probing
    let student = match student {
        Some(student) if student.phone == reset.phone => student,
        _ => {
            return breaks(Error::AuthenticationFailure {
                message: "Alias and phone do not match any account!".to_string(),
            })
        }
    };

    let temporary = temp_password(TEMP_PASSWORD_LEN);
    let res = sqlx::query(
        "UPDATE students SET password_hash = $1, must_change_password = TRUE WHERE uuid = $2",
    )
    .bind(hash_password(&temporary)?)
    .bind(student.uuid)
    .execute(&pg)
    .await
    .map_err(Error::from)?;

    if res.rows_affected() < 1 {
        return breaks(Error::InternalError {
            kind: "DatabaseError",
            message: "Could not reset password!".to_string(),
        });
    }
    log::info!("Password reset for student `{}`", student.alias);
    proceeds(PasswordReset {
        student_id: student.uuid,
        temporary_password: temporary,
    })
}

pub async fn change_password(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(change): Json<ChangePassword>,
    Extension(pg): Extension<PgPool>,
) -> Payload<PasswordChanged> {
    let session = require_session(bearer.token(), &pg).await?;

    if change.new_password.is_empty() {
        return breaks(Error::MissingCredentials {
            message: "New password was empty!".to_string(),
        });
    }

    let student = sqlx::query_as::<_, StudentData>("SELECT * FROM students WHERE uuid = $1 LIMIT 1")
        .bind(session.belongs_to)
        .fetch_one(&pg)
        .await
        .map_err(Error::from)?;

    let hash = PasswordHash::new(&student.password_hash).map_err(Error::from)?;
    if Pbkdf2
        .verify_password(change.current_password.as_bytes(), &hash)
        .is_err()
    {
        return breaks(Error::AuthenticationFailure {
            message: "Current password does not match!".to_string(),
        });
    }

    sqlx::query(
        "UPDATE students SET password_hash = $1, must_change_password = FALSE WHERE uuid = $2",
    )
    .bind(hash_password(&change.new_password)?)
    .bind(student.uuid)
    .execute(&pg)
    .await
    .map_err(Error::from)?;

    // every other device has to log in with the new password
    sqlx::query("DELETE FROM student_sessions WHERE belongs_to = $1 AND ssid <> $2")
        .bind(student.uuid)
        .bind(&session.ssid)
        .execute(&pg)
        .await
        .map_err(Error::from)?;

    proceeds(PasswordChanged {
        student_id: student.uuid,
    })
}

pub fn hash_password(password: &str) -> Result<String, Error> {
    Ok(Pbkdf2
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string())
}

fn new_session_token() -> String {
    let ssid_bytes: [u8; 32] = thread_rng().gen();
    let mut hasher: Sha256 = Digest::new();
    hasher.update(ssid_bytes);
    hex::encode(hasher.finalize())
}

fn temp_password(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStudent {
    pub alias: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedStudent {
    pub student_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginStudent {
    alias: String,
    password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedInStudent {
    ssid: String,
    student_id: Uuid,
    expires_at: DateTime<Utc>,
    must_change_password: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDropped {
    pub student_id: Uuid,
    pub drop_success: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPassword {
    pub alias: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordReset {
    pub student_id: Uuid,
    pub temporary_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordChanged {
    pub student_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_is_sha256_hex() {
        let token = new_session_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn session_tokens_are_unique() {
        assert_ne!(new_session_token(), new_session_token());
    }

    #[test]
    fn temp_password_is_alphanumeric() {
        let pw = temp_password(TEMP_PASSWORD_LEN);
        assert_eq!(pw.len(), TEMP_PASSWORD_LEN);
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("s3cretpass").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Pbkdf2.verify_password(b"s3cretpass", &parsed).is_ok());
        assert!(Pbkdf2.verify_password(b"wrongpass", &parsed).is_err());
    }
}
