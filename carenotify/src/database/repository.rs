//! Repository layer for database operations
//!
//! CRUD operations for users, care records, notifications, emergency
//! contacts and health reports. Multi-row replacements run in a
//! transaction.

use super::models::*;
use crate::config::{DEFAULT_CONTACT_NAME, DEFAULT_CONTACT_RELATIONSHIP, DEFAULT_MEDICINE_STOCK};
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::SqlitePool;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ===== Users =====

    pub async fn create_user(&self, req: NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, first_name, last_name, email, age, phone, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&req.username)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.email)
        .bind(req.age)
        .bind(&req.phone)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created user: {}", user.id);
        Ok(user)
    }

    pub async fn get_user(&self, id: i64) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("User", id))
    }

    /// Whether a user already holds `username` or `email`
    pub async fn user_exists(&self, username: &str, email: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ? OR email = ?")
                .bind(username)
                .bind(email)
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }

    /// Whether another user already holds `email`
    pub async fn email_taken(&self, email: &str, except_id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?")
            .bind(email)
            .bind(except_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    pub async fn update_user(&self, id: i64, req: &UpdateUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                email = COALESCE(?, email),
                age = COALESCE(?, age),
                phone = COALESCE(?, phone)
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.email)
        .bind(req.age)
        .bind(&req.phone)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("User", id))?;

        tracing::debug!("Updated user: {}", id);
        Ok(user)
    }

    pub async fn update_sms_settings(&self, id: i64, req: &SmsSettings) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                phone = COALESCE(?, phone),
                sms_opt_in = COALESCE(?, sms_opt_in)
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&req.phone)
        .bind(req.sms_opt_in)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("User", id))?;

        tracing::debug!("Updated SMS settings for user: {}", id);
        Ok(user)
    }

    pub async fn set_premium(&self, id: i64) -> Result<User> {
        sqlx::query_as::<_, User>("UPDATE users SET is_premium = 1 WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("User", id))
    }

    // ===== Notifications =====

    pub async fn create_notification(&self, req: NewNotification) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, title, message, kind, read, created_at)
            VALUES (?, ?, ?, ?, 0, ?)
            RETURNING *
            "#,
        )
        .bind(req.user_id)
        .bind(&req.title)
        .bind(&req.message)
        .bind(req.kind.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            "Created notification: {} for user: {}",
            notification.id,
            notification.user_id
        );
        Ok(notification)
    }

    /// List a user's notifications, newest first
    pub async fn list_notifications(&self, user_id: i64) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    /// Mark one notification read. Returns false when no such notification exists.
    pub async fn mark_notification_read(&self, id: i64) -> Result<bool> {
        let rows = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Marked notification read: {} ({} rows)", id, rows);
        Ok(rows > 0)
    }

    /// Mark every notification of a user read. Returns false when the user
    /// has no notifications at all.
    pub async fn mark_all_notifications_read(&self, user_id: i64) -> Result<bool> {
        let rows = sqlx::query("UPDATE notifications SET read = 1 WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Marked {} notifications read for user: {}", rows, user_id);
        Ok(rows > 0)
    }

    // ===== Schedules =====

    pub async fn create_schedule(&self, req: NewSchedule) -> Result<Schedule> {
        let schedule = sqlx::query_as::<_, Schedule>(
            r#"
            INSERT INTO schedules (user_id, title, time, duration, category, completed, sms_enabled, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(req.user_id)
        .bind(&req.title)
        .bind(&req.time)
        .bind(req.duration)
        .bind(&req.category)
        .bind(req.sms_enabled)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created schedule: {} for user: {}", schedule.id, schedule.user_id);
        Ok(schedule)
    }

    pub async fn list_schedules(&self, user_id: i64) -> Result<Vec<Schedule>> {
        let schedules = sqlx::query_as::<_, Schedule>(
            "SELECT * FROM schedules WHERE user_id = ? ORDER BY time ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(schedules)
    }

    pub async fn set_schedule_completed(&self, id: i64, completed: bool) -> Result<Schedule> {
        sqlx::query_as::<_, Schedule>("UPDATE schedules SET completed = ? WHERE id = ? RETURNING *")
            .bind(completed)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Schedule", id))
    }

    pub async fn update_schedule(&self, id: i64, req: &UpdateSchedule) -> Result<Schedule> {
        let schedule = sqlx::query_as::<_, Schedule>(
            r#"
            UPDATE schedules SET
                title = COALESCE(?, title),
                time = COALESCE(?, time),
                duration = COALESCE(?, duration),
                category = COALESCE(?, category),
                completed = COALESCE(?, completed),
                sms_enabled = COALESCE(?, sms_enabled)
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&req.title)
        .bind(&req.time)
        .bind(req.duration)
        .bind(&req.category)
        .bind(req.completed)
        .bind(req.sms_enabled)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Schedule", id))?;

        tracing::debug!("Updated schedule: {}", id);
        Ok(schedule)
    }

    pub async fn delete_schedule(&self, id: i64) -> Result<()> {
        let rows = sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Schedule", id));
        }

        tracing::debug!("Deleted schedule: {}", id);
        Ok(())
    }

    // ===== Medicines =====

    pub async fn create_medicine(&self, req: NewMedicine) -> Result<Medicine> {
        let medicine = sqlx::query_as::<_, Medicine>(
            r#"
            INSERT INTO medicines (user_id, name, dosage, frequency, time, stock_level, sms_enabled, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(req.user_id)
        .bind(&req.name)
        .bind(&req.dosage)
        .bind(&req.frequency)
        .bind(&req.time)
        .bind(req.stock_level.unwrap_or(DEFAULT_MEDICINE_STOCK))
        .bind(req.sms_enabled)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created medicine: {} for user: {}", medicine.id, medicine.user_id);
        Ok(medicine)
    }

    pub async fn list_medicines(&self, user_id: i64) -> Result<Vec<Medicine>> {
        let medicines = sqlx::query_as::<_, Medicine>(
            "SELECT * FROM medicines WHERE user_id = ? ORDER BY time ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(medicines)
    }

    pub async fn update_medicine(&self, id: i64, req: &UpdateMedicine) -> Result<Medicine> {
        let medicine = sqlx::query_as::<_, Medicine>(
            r#"
            UPDATE medicines SET
                name = COALESCE(?, name),
                dosage = COALESCE(?, dosage),
                frequency = COALESCE(?, frequency),
                time = COALESCE(?, time),
                stock_level = COALESCE(?, stock_level),
                sms_enabled = COALESCE(?, sms_enabled)
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&req.name)
        .bind(&req.dosage)
        .bind(&req.frequency)
        .bind(&req.time)
        .bind(req.stock_level)
        .bind(req.sms_enabled)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Medicine", id))?;

        tracing::debug!("Updated medicine: {}", id);
        Ok(medicine)
    }

    pub async fn delete_medicine(&self, id: i64) -> Result<()> {
        let rows = sqlx::query("DELETE FROM medicines WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Medicine", id));
        }

        tracing::debug!("Deleted medicine: {}", id);
        Ok(())
    }

    // ===== Emergency contacts =====

    pub async fn list_contacts(&self, user_id: i64) -> Result<Vec<EmergencyContact>> {
        let contacts = sqlx::query_as::<_, EmergencyContact>(
            "SELECT * FROM emergency_contacts WHERE user_id = ? ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(contacts)
    }

    /// Replace a user's contacts with `emails` and flag the user as having
    /// registered contacts.
    pub async fn replace_contacts(
        &self,
        user_id: i64,
        emails: &[String],
    ) -> Result<Vec<EmergencyContact>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM emergency_contacts WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let mut contacts = Vec::with_capacity(emails.len());
        for email in emails {
            let contact = sqlx::query_as::<_, EmergencyContact>(
                r#"
                INSERT INTO emergency_contacts (user_id, email, name, relationship, created_at)
                VALUES (?, ?, ?, ?, ?)
                RETURNING *
                "#,
            )
            .bind(user_id)
            .bind(email)
            .bind(DEFAULT_CONTACT_NAME)
            .bind(DEFAULT_CONTACT_RELATIONSHIP)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

            contacts.push(contact);
        }

        sqlx::query("UPDATE users SET has_added_emergency_contacts = 1 WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!("Stored {} emergency contacts for user: {}", contacts.len(), user_id);
        Ok(contacts)
    }

    // ===== Health reports =====

    pub async fn create_report(&self, req: &NewHealthReport) -> Result<HealthReport> {
        let report = sqlx::query_as::<_, HealthReport>(
            r#"
            INSERT INTO health_reports (user_id, file_name, upload_date, blood_pressure, blood_sugar, heart_rate)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(req.user_id)
        .bind(&req.file_name)
        .bind(Utc::now())
        .bind(&req.blood_pressure)
        .bind(&req.blood_sugar)
        .bind(&req.heart_rate)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created health report: {} for user: {}", report.id, report.user_id);
        Ok(report)
    }

    pub async fn get_report(&self, id: i64) -> Result<HealthReport> {
        sqlx::query_as::<_, HealthReport>("SELECT * FROM health_reports WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Health report", id))
    }

    pub async fn list_reports(&self, user_id: i64) -> Result<Vec<HealthReport>> {
        let reports = sqlx::query_as::<_, HealthReport>(
            "SELECT * FROM health_reports WHERE user_id = ? ORDER BY upload_date DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reports)
    }

    pub async fn delete_report(&self, id: i64) -> Result<()> {
        let rows = sqlx::query("DELETE FROM health_reports WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Health report", id));
        }

        tracing::debug!("Deleted health report: {}", id);
        Ok(())
    }
}
