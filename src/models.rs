use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentData {
    pub uuid: Uuid,
    pub alias: String,
    pub phone: String,
    pub password_hash: String,
    pub status: StudentStatus,
    pub must_change_password: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "student_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentSession {
    pub ssid: String,
    pub belongs_to: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Staff entry students can book with or alert. The `contact_id` is the
/// 24-hex directory identifier clients present everywhere a counselor is
/// referenced.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Counselor {
    pub contact_id: String,
    pub name: String,
    pub phone: String,
    pub role: CounselorRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "counselor_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CounselorRole {
    Counselor,
    Psychologist,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub uuid: Uuid,
    pub student: Uuid,
    pub counselor: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "appointment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MoodEntry {
    pub uuid: Uuid,
    pub student: Uuid,
    pub mood: String,
    pub intensity: i16,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HabitLog {
    pub uuid: Uuid,
    pub student: Uuid,
    pub habit: String,
    pub completed: bool,
    pub logged_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feedback {
    pub uuid: Uuid,
    pub student: Uuid,
    pub rating: i16,
    pub category: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Resource {
    pub uuid: Uuid,
    pub title: String,
    pub kind: String,
    pub language: String,
    pub tags: Vec<String>,
    pub link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SosLog {
    pub uuid: Uuid,
    pub student: Uuid,
    pub method: SosMethod,
    pub alerted: Vec<String>,
    pub call_delivered: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sos_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SosMethod {
    Call,
    Sms,
    App,
}
