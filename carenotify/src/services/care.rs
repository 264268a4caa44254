//! Care records service
//!
//! Schedules and medicines that drive the reminder engine.

use crate::config::REMINDER_TIME_FORMAT;
use crate::database::{
    Medicine, NewMedicine, NewSchedule, Repository, Schedule, UpdateMedicine, UpdateSchedule,
};
use crate::error::{AppError, Result};
use chrono::NaiveTime;

/// Times are compared as strings by the due-check, so only the zero-padded
/// `HH:mm` form is accepted.
fn validate_time(time: &str) -> Result<()> {
    if time.len() != 5 || NaiveTime::parse_from_str(time, REMINDER_TIME_FORMAT).is_err() {
        return Err(AppError::Validation(format!(
            "Invalid time '{}', expected HH:mm",
            time
        )));
    }
    Ok(())
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

#[derive(Clone)]
pub struct CareService {
    repo: Repository,
}

impl CareService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn create_schedule(&self, req: NewSchedule) -> Result<Schedule> {
        require("Title", &req.title)?;
        validate_time(&req.time)?;
        if req.duration < 0 {
            return Err(AppError::Validation("Duration must not be negative".to_string()));
        }
        self.repo.get_user(req.user_id).await?;

        let schedule = self.repo.create_schedule(req).await?;
        tracing::info!("Created schedule {} at {}", schedule.id, schedule.time);
        Ok(schedule)
    }

    pub async fn list_schedules(&self, user_id: i64) -> Result<Vec<Schedule>> {
        self.repo.list_schedules(user_id).await
    }

    pub async fn set_schedule_completed(&self, id: i64, completed: bool) -> Result<Schedule> {
        self.repo.set_schedule_completed(id, completed).await
    }

    /// Apply a partial update. Fields left unset keep their stored values.
    pub async fn update_schedule(&self, id: i64, req: UpdateSchedule) -> Result<Schedule> {
        if let Some(title) = &req.title {
            require("Title", title)?;
        }
        if let Some(time) = &req.time {
            validate_time(time)?;
        }
        if req.duration.is_some_and(|d| d < 0) {
            return Err(AppError::Validation("Duration must not be negative".to_string()));
        }

        let schedule = self.repo.update_schedule(id, &req).await?;
        tracing::info!("Updated schedule {} at {}", schedule.id, schedule.time);
        Ok(schedule)
    }

    pub async fn delete_schedule(&self, id: i64) -> Result<()> {
        self.repo.delete_schedule(id).await
    }

    pub async fn create_medicine(&self, req: NewMedicine) -> Result<Medicine> {
        require("Name", &req.name)?;
        validate_time(&req.time)?;
        if req.stock_level.is_some_and(|s| s < 0) {
            return Err(AppError::Validation("Stock level must not be negative".to_string()));
        }
        self.repo.get_user(req.user_id).await?;

        let medicine = self.repo.create_medicine(req).await?;
        tracing::info!("Created medicine {} at {}", medicine.id, medicine.time);
        Ok(medicine)
    }

    pub async fn list_medicines(&self, user_id: i64) -> Result<Vec<Medicine>> {
        self.repo.list_medicines(user_id).await
    }

    pub async fn update_medicine(&self, id: i64, req: UpdateMedicine) -> Result<Medicine> {
        if let Some(name) = &req.name {
            require("Name", name)?;
        }
        if let Some(time) = &req.time {
            validate_time(time)?;
        }
        if req.stock_level.is_some_and(|s| s < 0) {
            return Err(AppError::Validation("Stock level must not be negative".to_string()));
        }

        let medicine = self.repo.update_medicine(id, &req).await?;
        tracing::info!("Updated medicine {} at {}", medicine.id, medicine.time);
        Ok(medicine)
    }

    pub async fn delete_medicine(&self, id: i64) -> Result<()> {
        self.repo.delete_medicine(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::tests::{create_test_repo, create_test_user};

    fn schedule(user_id: i64, time: &str) -> NewSchedule {
        NewSchedule {
            user_id,
            title: "Morning walk".to_string(),
            time: time.to_string(),
            duration: 30,
            category: "exercise".to_string(),
            sms_enabled: true,
        }
    }

    #[test]
    fn test_validate_time() {
        assert!(validate_time("09:00").is_ok());
        assert!(validate_time("23:59").is_ok());
        assert!(validate_time("9:00").is_err());
        assert!(validate_time("24:00").is_err());
        assert!(validate_time("09:60").is_err());
        assert!(validate_time("").is_err());
        assert!(validate_time("09:00:00").is_err());
    }

    #[tokio::test]
    async fn test_create_schedule_validates() {
        let repo = create_test_repo().await;
        let user = create_test_user(&repo, "asha").await;
        let service = CareService::new(repo);

        let created = service.create_schedule(schedule(user.id, "09:00")).await.unwrap();
        assert!(!created.completed);

        let bad_time = service.create_schedule(schedule(user.id, "9am")).await;
        assert!(matches!(bad_time, Err(AppError::Validation(_))));

        let unknown_user = service.create_schedule(schedule(9_999, "09:00")).await;
        assert!(matches!(unknown_user, Err(AppError::NotFound { .. })));

        assert_eq!(service.list_schedules(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_complete_and_delete_schedule() {
        let repo = create_test_repo().await;
        let user = create_test_user(&repo, "asha").await;
        let service = CareService::new(repo);

        let created = service.create_schedule(schedule(user.id, "18:30")).await.unwrap();
        let updated = service.set_schedule_completed(created.id, true).await.unwrap();
        assert!(updated.completed);

        service.delete_schedule(created.id).await.unwrap();
        assert!(matches!(
            service.delete_schedule(created.id).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_medicine_defaults_stock() {
        let repo = create_test_repo().await;
        let user = create_test_user(&repo, "asha").await;
        let service = CareService::new(repo);

        let medicine = service
            .create_medicine(NewMedicine {
                user_id: user.id,
                name: "Metformin".to_string(),
                dosage: "500mg".to_string(),
                frequency: "daily".to_string(),
                time: "08:00".to_string(),
                stock_level: None,
                sms_enabled: true,
            })
            .await
            .unwrap();

        assert_eq!(medicine.stock_level, 30);
        assert_eq!(service.list_medicines(user.id).await.unwrap().len(), 1);

        service.delete_medicine(medicine.id).await.unwrap();
        assert!(service.list_medicines(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_schedule_validates() {
        let repo = create_test_repo().await;
        let user = create_test_user(&repo, "asha").await;
        let service = CareService::new(repo);

        let created = service.create_schedule(schedule(user.id, "09:00")).await.unwrap();

        let bad_time = service
            .update_schedule(
                created.id,
                UpdateSchedule {
                    time: Some("9:30".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(bad_time, Err(AppError::Validation(_))));

        let blank_title = service
            .update_schedule(
                created.id,
                UpdateSchedule {
                    title: Some("  ".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(blank_title, Err(AppError::Validation(_))));

        let updated = service
            .update_schedule(
                created.id,
                UpdateSchedule {
                    time: Some("09:30".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.time, "09:30");
        assert_eq!(updated.title, "Morning walk");

        let missing = service.update_schedule(9_999, UpdateSchedule::default()).await;
        assert!(matches!(missing, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_medicine_validates() {
        let repo = create_test_repo().await;
        let user = create_test_user(&repo, "asha").await;
        let service = CareService::new(repo);

        let medicine = service
            .create_medicine(NewMedicine {
                user_id: user.id,
                name: "Metformin".to_string(),
                dosage: "500mg".to_string(),
                frequency: "daily".to_string(),
                time: "08:00".to_string(),
                stock_level: None,
                sms_enabled: true,
            })
            .await
            .unwrap();

        let negative = service
            .update_medicine(
                medicine.id,
                UpdateMedicine {
                    stock_level: Some(-1),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(negative, Err(AppError::Validation(_))));

        let bad_time = service
            .update_medicine(
                medicine.id,
                UpdateMedicine {
                    time: Some("25:00".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(bad_time, Err(AppError::Validation(_))));

        let updated = service
            .update_medicine(
                medicine.id,
                UpdateMedicine {
                    time: Some("20:00".to_string()),
                    dosage: Some("250mg".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.time, "20:00");
        assert_eq!(updated.dosage, "250mg");
        assert_eq!(updated.stock_level, 30);
    }
}
