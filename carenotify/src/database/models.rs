//! Database models
//!
//! Rust structs representing database entities.
//! All models use serde for serialization to API clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Category of a notification, stored as lowercase text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Medicine,
    Appointment,
    Tip,
    Schedule,
    Other,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Medicine => "medicine",
            NotificationKind::Appointment => "appointment",
            NotificationKind::Tip => "tip",
            NotificationKind::Schedule => "schedule",
            NotificationKind::Other => "other",
        }
    }
}

// Rows written by older clients may carry free-form types.
impl From<String> for NotificationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "medicine" => NotificationKind::Medicine,
            "appointment" => NotificationKind::Appointment,
            "tip" => NotificationKind::Tip,
            "schedule" => NotificationKind::Schedule,
            _ => NotificationKind::Other,
        }
    }
}

/// Server-owned notification with read state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Create notification request
#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

/// Application user. Credentials live with the auth layer, not here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: Option<i64>,
    pub phone: Option<String>,
    pub sms_opt_in: bool,
    pub is_premium: bool,
    pub has_added_emergency_contacts: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Create user request
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Update profile request. Only fields that are present change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i64>,
    pub phone: Option<String>,
}

/// SMS reminder preferences of a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsSettings {
    pub phone: Option<String>,
    pub sms_opt_in: Option<bool>,
}

/// Daily task with an `HH:mm` due time
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Schedule {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub time: String,
    /// Minutes
    pub duration: i64,
    pub category: String,
    pub completed: bool,
    pub sms_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Create schedule request
#[derive(Debug, Clone, Deserialize)]
pub struct NewSchedule {
    pub user_id: i64,
    pub title: String,
    pub time: String,
    pub duration: i64,
    pub category: String,
    #[serde(default = "default_sms_enabled")]
    pub sms_enabled: bool,
}

/// Update schedule request. Only fields that are present change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSchedule {
    pub title: Option<String>,
    pub time: Option<String>,
    pub duration: Option<i64>,
    pub category: Option<String>,
    pub completed: Option<bool>,
    pub sms_enabled: Option<bool>,
}

/// Medicine taken every day at `time`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Medicine {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub time: String,
    pub stock_level: i64,
    pub sms_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Create medicine request
#[derive(Debug, Clone, Deserialize)]
pub struct NewMedicine {
    pub user_id: i64,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub time: String,
    #[serde(default)]
    pub stock_level: Option<i64>,
    #[serde(default = "default_sms_enabled")]
    pub sms_enabled: bool,
}

/// Update medicine request. Only fields that are present change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMedicine {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub time: Option<String>,
    pub stock_level: Option<i64>,
    pub sms_enabled: Option<bool>,
}

fn default_sms_enabled() -> bool {
    true
}

/// Family member who receives safety notifications about a user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmergencyContact {
    pub id: i64,
    pub user_id: i64,
    pub email: String,
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Uploaded health report with the readings extracted from it
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HealthReport {
    pub id: i64,
    pub user_id: i64,
    pub file_name: String,
    pub upload_date: DateTime<Utc>,
    /// `systolic/diastolic`, e.g. "120/80"
    pub blood_pressure: Option<String>,
    pub blood_sugar: Option<String>,
    pub heart_rate: Option<String>,
}

/// Upload health report request
#[derive(Debug, Clone, Deserialize)]
pub struct NewHealthReport {
    pub user_id: i64,
    pub file_name: String,
    #[serde(default)]
    pub blood_pressure: Option<String>,
    #[serde(default)]
    pub blood_sugar: Option<String>,
    #[serde(default)]
    pub heart_rate: Option<String>,
}
