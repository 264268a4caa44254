//! Users service
//!
//! Provisions user profiles and manages their SMS and premium settings.
//! There are no credentials here: callers identify users by id.

use crate::database::{NewUser, Repository, SmsSettings, UpdateUser, User};
use crate::error::{AppError, Result};
use crate::services::contacts::is_valid_email;
use serde::Serialize;

/// Result of a premium upgrade
#[derive(Debug, Clone, Serialize)]
pub struct PremiumUpgrade {
    pub success: bool,
    pub message: String,
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    if !is_valid_email(email) {
        return Err(AppError::Validation(format!("Invalid email format: {}", email)));
    }
    Ok(())
}

#[derive(Clone)]
pub struct UsersService {
    repo: Repository,
}

impl UsersService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn create(&self, req: NewUser) -> Result<User> {
        require("Username", &req.username)?;
        require("First name", &req.first_name)?;
        require("Last name", &req.last_name)?;
        validate_email(&req.email)?;
        if req.age.is_some_and(|a| a < 0) {
            return Err(AppError::Validation("Age must not be negative".to_string()));
        }

        if self.repo.user_exists(&req.username, &req.email).await? {
            return Err(AppError::Validation("User already exists".to_string()));
        }

        let user = self.repo.create_user(req).await?;
        tracing::info!("Created user {} ({})", user.id, user.username);
        Ok(user)
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        self.repo.get_user(id).await
    }

    /// Apply a partial profile update. The username cannot change.
    pub async fn update(&self, id: i64, req: UpdateUser) -> Result<User> {
        if let Some(first_name) = &req.first_name {
            require("First name", first_name)?;
        }
        if let Some(last_name) = &req.last_name {
            require("Last name", last_name)?;
        }
        if let Some(email) = &req.email {
            validate_email(email)?;
            if self.repo.email_taken(email, id).await? {
                return Err(AppError::Validation("Email already in use".to_string()));
            }
        }
        if req.age.is_some_and(|a| a < 0) {
            return Err(AppError::Validation("Age must not be negative".to_string()));
        }

        let user = self.repo.update_user(id, &req).await?;
        tracing::info!("Updated profile for user {}", id);
        Ok(user)
    }

    pub async fn sms_settings(&self, id: i64) -> Result<SmsSettings> {
        let user = self.repo.get_user(id).await?;
        Ok(SmsSettings {
            phone: user.phone,
            sms_opt_in: Some(user.sms_opt_in),
        })
    }

    /// Opting in requires a phone number, either already stored or sent
    /// with the same request.
    pub async fn update_sms_settings(&self, id: i64, req: SmsSettings) -> Result<SmsSettings> {
        if let Some(phone) = &req.phone {
            require("Phone", phone)?;
        }

        if req.sms_opt_in == Some(true) && req.phone.is_none() {
            let current = self.repo.get_user(id).await?;
            if current.phone.as_deref().map_or(true, |p| p.trim().is_empty()) {
                return Err(AppError::Validation(
                    "A phone number is required to enable SMS".to_string(),
                ));
            }
        }

        let user = self.repo.update_sms_settings(id, &req).await?;
        tracing::info!("SMS settings for user {}: opt-in {}", id, user.sms_opt_in);

        Ok(SmsSettings {
            phone: user.phone,
            sms_opt_in: Some(user.sms_opt_in),
        })
    }

    /// Mark the user premium. Upgrading twice is not an error.
    pub async fn upgrade_premium(&self, id: i64) -> Result<PremiumUpgrade> {
        let current = self.repo.get_user(id).await?;
        if current.is_premium {
            return Ok(PremiumUpgrade {
                success: true,
                message: "Already a premium member".to_string(),
            });
        }

        self.repo.set_premium(id).await?;
        tracing::info!("User {} upgraded to premium", id);

        Ok(PremiumUpgrade {
            success: true,
            message: "Upgraded to premium".to_string(),
        })
    }
}
