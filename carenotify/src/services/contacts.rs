//! Emergency contacts service
//!
//! Validates and stores a user's emergency contacts. Registering contacts
//! also leaves a notification for the user and tells the contacts the user
//! is active.

use crate::config::MAX_EMERGENCY_CONTACTS;
use crate::database::{EmergencyContact, NewNotification, NotificationKind, Repository};
use crate::error::{AppError, Result};
use crate::services::alerts::{AlertDispatcher, AlertTrigger};
use std::collections::HashSet;

/// `local@domain.tld` with no whitespace and exactly one `@`
pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Reject an email list before anything is written
fn validate_emails(emails: &[String]) -> Result<()> {
    if emails.is_empty() {
        return Err(AppError::Validation(
            "At least one email address is required".to_string(),
        ));
    }

    if emails.len() > MAX_EMERGENCY_CONTACTS {
        return Err(AppError::Validation(format!(
            "At most {} emergency contacts are allowed",
            MAX_EMERGENCY_CONTACTS
        )));
    }

    let unique: HashSet<&String> = emails.iter().collect();
    if unique.len() != emails.len() {
        return Err(AppError::Validation("Emails must be unique.".to_string()));
    }

    if let Some(bad) = emails.iter().find(|e| !is_valid_email(e)) {
        return Err(AppError::Validation(format!("Invalid email format: {}", bad)));
    }

    Ok(())
}

#[derive(Clone)]
pub struct ContactsService {
    repo: Repository,
    dispatcher: AlertDispatcher,
}

impl ContactsService {
    pub fn new(repo: Repository, dispatcher: AlertDispatcher) -> Self {
        Self { repo, dispatcher }
    }

    /// First-time registration: store the contacts, notify the user and
    /// email every contact.
    pub async fn register(&self, user_id: i64, emails: Vec<String>) -> Result<Vec<EmergencyContact>> {
        let contacts = self.store(user_id, &emails).await?;

        self.repo
            .create_notification(NewNotification {
                user_id,
                title: "Emergency contacts added".to_string(),
                message: format!(
                    "{} emergency contact(s) will be notified about your safety updates",
                    contacts.len()
                ),
                kind: NotificationKind::Other,
            })
            .await?;

        if let Err(e) = self
            .dispatcher
            .dispatch(user_id, &AlertTrigger::ContactsRegistered, None)
            .await
        {
            tracing::error!("Failed to notify new emergency contacts of user {}: {}", user_id, e);
        }

        tracing::info!("Registered {} emergency contacts for user {}", contacts.len(), user_id);
        Ok(contacts)
    }

    /// Replace the contacts without emailing anyone
    pub async fn update(&self, user_id: i64, emails: Vec<String>) -> Result<Vec<EmergencyContact>> {
        let contacts = self.store(user_id, &emails).await?;
        tracing::info!("Updated emergency contacts for user {}", user_id);
        Ok(contacts)
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<EmergencyContact>> {
        self.repo.list_contacts(user_id).await
    }

    async fn store(&self, user_id: i64, emails: &[String]) -> Result<Vec<EmergencyContact>> {
        validate_emails(emails)?;
        // Unknown users are a 404, not a foreign key failure.
        self.repo.get_user(user_id).await?;
        self.repo.replace_contacts(user_id, emails).await
    }
}
