//! Emergency alert dispatcher
//!
//! Renders and sends safety emails to a user's emergency contacts. Delivery
//! is best-effort: every contact is attempted, failures are logged and
//! counted, and nothing propagates back into the workflow that triggered
//! the alert.

use crate::config::{
    SmtpSettings, DIASTOLIC_ALERT_THRESHOLD, PLATFORM_NAME, SYSTOLIC_ALERT_THRESHOLD,
};
use crate::database::{Repository, User};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Local;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use std::sync::Arc;

/// Whether a blood pressure reading ("systolic/diastolic") warrants an alert.
///
/// Each side is trimmed and parsed on its own; a side that does not parse
/// simply does not contribute.
pub fn is_abnormal(blood_pressure: Option<&str>) -> bool {
    let Some(reading) = blood_pressure else {
        return false;
    };

    let mut parts = reading.split('/');
    let systolic = parts.next().and_then(|s| s.trim().parse::<f64>().ok());
    let diastolic = parts.next().and_then(|s| s.trim().parse::<f64>().ok());

    systolic.is_some_and(|s| s > SYSTOLIC_ALERT_THRESHOLD)
        || diastolic.is_some_and(|d| d > DIASTOLIC_ALERT_THRESHOLD)
}

/// What caused an alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertTrigger {
    /// Contacts were just registered; tells them the user is active
    ContactsRegistered,
    /// A health report came in with abnormal readings
    AbnormalReport { blood_pressure: String },
    /// The user shared a report with their contacts
    ReportShared { report_id: i64, file_name: String },
}

/// Caller-supplied subject and HTML body replacing the default wording
#[derive(Debug, Clone)]
pub struct AlertContent {
    pub subject: String,
    pub html_body: String,
}

/// One rendered email to one contact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Delivery counts for one dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// How alert emails leave the process
#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn send(&self, email: &AlertEmail) -> Result<()>;
}

/// Writes alerts to the log instead of sending them
pub struct LogTransport;

#[async_trait]
impl AlertTransport for LogTransport {
    async fn send(&self, email: &AlertEmail) -> Result<()> {
        tracing::info!("Sending health alert to: {}", email.to);
        tracing::info!("Subject: {}", email.subject);
        tracing::debug!("Body: {}", email.html_body);
        Ok(())
    }
}

/// Keeps sent alerts in memory. Addresses registered with
/// [`MemoryTransport::failing`] are rejected.
#[cfg(any(test, feature = "test-util"))]
#[derive(Clone, Default)]
pub struct MemoryTransport {
    sent: Arc<std::sync::Mutex<Vec<AlertEmail>>>,
    rejected: Arc<Vec<String>>,
}

#[cfg(any(test, feature = "test-util"))]
impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(addresses: &[&str]) -> Self {
        Self {
            sent: Arc::default(),
            rejected: Arc::new(addresses.iter().map(|a| a.to_string()).collect()),
        }
    }

    pub fn sent(&self) -> Vec<AlertEmail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl AlertTransport for MemoryTransport {
    async fn send(&self, email: &AlertEmail) -> Result<()> {
        if self.rejected.contains(&email.to) {
            return Err(AppError::Alert(format!("mailbox unavailable: {}", email.to)));
        }

        self.sent
            .lock()
            .map_err(|_| AppError::Alert("sent-mail log poisoned".to_string()))?
            .push(email.clone());
        Ok(())
    }
}

/// Sends alerts through an SMTP relay with STARTTLS
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpTransport {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let creds = Credentials::new(settings.username.clone(), settings.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| AppError::Alert(e.to_string()))?
            .port(settings.port)
            .credentials(creds)
            .build();

        let from = settings
            .from
            .parse()
            .map_err(|e| AppError::Alert(format!("Invalid sender '{}': {}", settings.from, e)))?;

        tracing::info!(
            "Created SMTP alert transport via {}:{} as {}",
            settings.host,
            settings.port,
            settings.username
        );

        Ok(Self { transport, from })
    }

    fn build_message(&self, email: &AlertEmail) -> Result<Message> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::Alert(format!("Invalid recipient '{}': {}", email.to, e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())
            .map_err(|e| AppError::Alert(e.to_string()))
    }
}

#[async_trait]
impl AlertTransport for SmtpTransport {
    async fn send(&self, email: &AlertEmail) -> Result<()> {
        let message = self.build_message(email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Alert(e.to_string()))?;

        tracing::info!("Alert email sent to {}", email.to);
        Ok(())
    }
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Default subject and body for a trigger
fn render_default(user: &User, trigger: &AlertTrigger, report_base_url: &str) -> AlertContent {
    let name = escape_html(&user.full_name());
    let first_name = escape_html(&user.first_name);
    let time = Local::now().format("%Y-%m-%d %H:%M:%S");

    match trigger {
        AlertTrigger::ContactsRegistered => AlertContent {
            subject: format!("Update from {}: {} has logged in", PLATFORM_NAME, user.full_name()),
            html_body: format!(
                "<p>Dear Family Member,</p>\
                 <p>This is an automated message from {platform} to let you know that \
                 {name} has just logged into our platform.</p>\
                 <p><strong>Login Time:</strong> {time}</p>\
                 <p>This notification is part of our commitment to user safety, as requested by {first_name}.</p>\
                 <p>Thank you,<br>The {platform} Team</p>",
                platform = PLATFORM_NAME,
            ),
        },
        AlertTrigger::AbnormalReport { blood_pressure } => AlertContent {
            subject: format!("Health Alert from {}", PLATFORM_NAME),
            html_body: format!(
                "<p>Dear Family Member,<br>\
                 This is an automated alert from {platform}.<br>\
                 <b>{name}</b> has uploaded a health report with abnormal values.<br>\
                 <b>Blood Pressure:</b> {bp}<br>\
                 <b>Time:</b> {time}<br>\
                 Please check in with them if needed.<br>\
                 <br>Thank you,<br>The {platform} Team</p>",
                platform = PLATFORM_NAME,
                bp = escape_html(blood_pressure),
            ),
        },
        AlertTrigger::ReportShared {
            report_id,
            file_name,
        } => {
            let link = format!("{}/api/reports/{}/view", report_base_url, report_id);
            AlertContent {
                subject: format!("Health Report from {}", user.full_name()),
                html_body: format!(
                    "<p>Dear Family Member,<br>\
                     {name} has shared a health report with you.<br>\
                     <b>Report:</b> {file}<br>\
                     <b>Download:</b> <a href=\"{link}\">{link}</a><br>\
                     <b>Time:</b> {time}<br>\
                     <br>Thank you,<br>The {platform} Team</p>",
                    file = escape_html(file_name),
                    platform = PLATFORM_NAME,
                ),
            }
        }
    }
}

/// Fans an alert out to every emergency contact of a user
#[derive(Clone)]
pub struct AlertDispatcher {
    repo: Repository,
    transport: Arc<dyn AlertTransport>,
    report_base_url: String,
}

impl AlertDispatcher {
    pub fn new(
        repo: Repository,
        transport: Arc<dyn AlertTransport>,
        report_base_url: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            transport,
            report_base_url: report_base_url.into(),
        }
    }

    /// Send one email per contact of `user_id`.
    ///
    /// Fails only when the user or their contacts cannot be loaded; delivery
    /// failures are counted in the returned report.
    pub async fn dispatch(
        &self,
        user_id: i64,
        trigger: &AlertTrigger,
        content: Option<AlertContent>,
    ) -> Result<DispatchReport> {
        let user = self.repo.get_user(user_id).await?;
        let contacts = self.repo.list_contacts(user_id).await?;

        let content =
            content.unwrap_or_else(|| render_default(&user, trigger, &self.report_base_url));

        let mut report = DispatchReport::default();

        for contact in contacts {
            let email = AlertEmail {
                to: contact.email,
                subject: content.subject.clone(),
                html_body: content.html_body.clone(),
            };

            report.attempted += 1;
            match self.transport.send(&email).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("Failed to send alert to {}: {}", email.to, e);
                }
            }
        }

        tracing::info!(
            "Dispatched {:?} alert for user {}: {} attempted, {} delivered, {} failed",
            trigger,
            user_id,
            report.attempted,
            report.delivered,
            report.failed
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::tests::{create_test_repo, create_test_user};

    #[test]
    fn test_is_abnormal_thresholds() {
        assert!(!is_abnormal(Some("120/80")));
        assert!(!is_abnormal(Some("140/90")));
        assert!(is_abnormal(Some("141/80")));
        assert!(is_abnormal(Some("120/91")));
        assert!(is_abnormal(Some(" 150 / 70 ")));
    }

    #[test]
    fn test_is_abnormal_ignores_unparseable_parts() {
        assert!(!is_abnormal(None));
        assert!(!is_abnormal(Some("")));
        assert!(!is_abnormal(Some("high")));
        assert!(is_abnormal(Some("abc/95")));
        assert!(is_abnormal(Some("150")));
        assert!(!is_abnormal(Some("120/")));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>&\"'"), "&lt;b&gt;&amp;&quot;&#39;");
    }

    async fn dispatcher_with_contacts(
        transport: MemoryTransport,
        emails: &[&str],
    ) -> (AlertDispatcher, i64) {
        let repo = create_test_repo().await;
        let user = create_test_user(&repo, "asha").await;
        let emails: Vec<String> = emails.iter().map(|e| e.to_string()).collect();
        repo.replace_contacts(user.id, &emails).await.unwrap();

        let dispatcher = AlertDispatcher::new(repo, Arc::new(transport), "http://localhost:5000");
        (dispatcher, user.id)
    }

    #[tokio::test]
    async fn test_dispatch_sends_one_email_per_contact() {
        let transport = MemoryTransport::new();
        let (dispatcher, user_id) =
            dispatcher_with_contacts(transport.clone(), &["a@x.com", "b@y.org"]).await;

        let report = dispatcher
            .dispatch(
                user_id,
                &AlertTrigger::AbnormalReport {
                    blood_pressure: "150/95".to_string(),
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            report,
            DispatchReport {
                attempted: 2,
                delivered: 2,
                failed: 0
            }
        );

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "a@x.com");
        assert_eq!(sent[0].subject, "Health Alert from WellnessBuddy");
        assert!(sent[0].html_body.contains("150/95"));
        assert!(sent[0].html_body.contains("Asha Rao"));
    }

    #[tokio::test]
    async fn test_dispatch_counts_failures_without_aborting() {
        let transport = MemoryTransport::failing(&["a@x.com"]);
        let (dispatcher, user_id) =
            dispatcher_with_contacts(transport.clone(), &["a@x.com", "b@y.org"]).await;

        let report = dispatcher
            .dispatch(user_id, &AlertTrigger::ContactsRegistered, None)
            .await
            .unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(transport.sent()[0].to, "b@y.org");
    }

    #[tokio::test]
    async fn test_report_shared_links_report() {
        let transport = MemoryTransport::new();
        let (dispatcher, user_id) = dispatcher_with_contacts(transport.clone(), &["a@x.com"]).await;

        dispatcher
            .dispatch(
                user_id,
                &AlertTrigger::ReportShared {
                    report_id: 12,
                    file_name: "labs.pdf".to_string(),
                },
                None,
            )
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].subject, "Health Report from Asha Rao");
        assert!(sent[0]
            .html_body
            .contains("http://localhost:5000/api/reports/12/view"));
        assert!(sent[0].html_body.contains("labs.pdf"));
    }

    #[tokio::test]
    async fn test_custom_content_overrides_default() {
        let transport = MemoryTransport::new();
        let (dispatcher, user_id) = dispatcher_with_contacts(transport.clone(), &["a@x.com"]).await;

        dispatcher
            .dispatch(
                user_id,
                &AlertTrigger::ContactsRegistered,
                Some(AlertContent {
                    subject: "Checking in".to_string(),
                    html_body: "<p>Hi</p>".to_string(),
                }),
            )
            .await
            .unwrap();

        assert_eq!(transport.sent()[0].subject, "Checking in");
    }

    #[tokio::test]
    async fn test_dispatch_without_contacts_is_empty() {
        let transport = MemoryTransport::new();
        let (dispatcher, user_id) = dispatcher_with_contacts(transport.clone(), &[]).await;

        let report = dispatcher
            .dispatch(user_id, &AlertTrigger::ContactsRegistered, None)
            .await
            .unwrap();

        assert_eq!(report, DispatchReport::default());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_user_fails() {
        let transport = MemoryTransport::new();
        let (dispatcher, _) = dispatcher_with_contacts(transport, &[]).await;

        let result = dispatcher
            .dispatch(9_999, &AlertTrigger::ContactsRegistered, None)
            .await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }
}
