//! Health reports service
//!
//! Stores uploaded report readings and alerts emergency contacts when the
//! readings are abnormal or when the user shares a report.

use crate::database::{HealthReport, NewHealthReport, Repository};
use crate::error::Result;
use crate::services::alerts::{is_abnormal, AlertDispatcher, AlertTrigger, DispatchReport};
use serde::Serialize;

/// Stored report and whether contacts were alerted about it
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub report: HealthReport,
    pub alerted: bool,
}

#[derive(Clone)]
pub struct ReportsService {
    repo: Repository,
    dispatcher: AlertDispatcher,
}

impl ReportsService {
    pub fn new(repo: Repository, dispatcher: AlertDispatcher) -> Self {
        Self { repo, dispatcher }
    }

    /// Persist a report, then alert contacts if its blood pressure is abnormal.
    /// The upload succeeds even if the alert cannot be sent.
    pub async fn upload(&self, req: NewHealthReport) -> Result<UploadOutcome> {
        self.repo.get_user(req.user_id).await?;
        let report = self.repo.create_report(&req).await?;

        let mut alerted = false;
        if is_abnormal(report.blood_pressure.as_deref()) {
            let trigger = AlertTrigger::AbnormalReport {
                blood_pressure: report.blood_pressure.clone().unwrap_or_default(),
            };

            match self.dispatcher.dispatch(report.user_id, &trigger, None).await {
                Ok(dispatch) => alerted = dispatch.attempted > 0,
                Err(e) => {
                    tracing::error!("Abnormal report {} alert failed: {}", report.id, e);
                }
            }
        }

        tracing::info!(
            "Uploaded health report {} for user {} (alerted: {})",
            report.id,
            report.user_id,
            alerted
        );

        Ok(UploadOutcome { report, alerted })
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<HealthReport>> {
        self.repo.get_user(user_id).await?;
        self.repo.list_reports(user_id).await
    }

    /// Stored readings for one report. Shared-report emails link here.
    pub async fn get(&self, report_id: i64) -> Result<HealthReport> {
        self.repo.get_report(report_id).await
    }

    pub async fn delete(&self, report_id: i64) -> Result<()> {
        self.repo.delete_report(report_id).await?;
        tracing::info!("Deleted health report {}", report_id);
        Ok(())
    }

    /// Email a stored report's link to every contact of its owner
    pub async fn send_to_contacts(&self, report_id: i64) -> Result<DispatchReport> {
        let report = self.repo.get_report(report_id).await?;

        self.dispatcher
            .dispatch(
                report.user_id,
                &AlertTrigger::ReportShared {
                    report_id: report.id,
                    file_name: report.file_name.clone(),
                },
                None,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::tests::{create_test_repo, create_test_user};
    use crate::error::AppError;
    use crate::services::alerts::MemoryTransport;
    use std::sync::Arc;

    async fn setup(contacts: &[&str]) -> (ReportsService, MemoryTransport, i64) {
        let repo = create_test_repo().await;
        let user = create_test_user(&repo, "asha").await;
        let emails: Vec<String> = contacts.iter().map(|e| e.to_string()).collect();
        repo.replace_contacts(user.id, &emails).await.unwrap();

        let transport = MemoryTransport::new();
        let dispatcher =
            AlertDispatcher::new(repo.clone(), Arc::new(transport.clone()), "http://localhost:5000");
        (ReportsService::new(repo, dispatcher), transport, user.id)
    }

    fn report(user_id: i64, bp: Option<&str>) -> NewHealthReport {
        NewHealthReport {
            user_id,
            file_name: "labs.pdf".to_string(),
            blood_pressure: bp.map(str::to_string),
            blood_sugar: Some("95 mg/dL".to_string()),
            heart_rate: Some("72 bpm".to_string()),
        }
    }

    #[tokio::test]
    async fn test_abnormal_upload_alerts_each_contact() {
        let (service, transport, user_id) = setup(&["a@x.com", "b@y.org"]).await;

        let outcome = service.upload(report(user_id, Some("150/95"))).await.unwrap();

        assert!(outcome.alerted);
        assert_eq!(outcome.report.file_name, "labs.pdf");
        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|e| e.subject == "Health Alert from WellnessBuddy"));
    }

    #[tokio::test]
    async fn test_normal_upload_sends_nothing() {
        let (service, transport, user_id) = setup(&["a@x.com"]).await;

        let outcome = service.upload(report(user_id, Some("120/80"))).await.unwrap();
        assert!(!outcome.alerted);

        let outcome = service.upload(report(user_id, None)).await.unwrap();
        assert!(!outcome.alerted);

        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_abnormal_upload_without_contacts() {
        let (service, transport, user_id) = setup(&[]).await;

        let outcome = service.upload(report(user_id, Some("160/100"))).await.unwrap();
        assert!(!outcome.alerted);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_to_contacts() {
        let (service, transport, user_id) = setup(&["a@x.com"]).await;
        let outcome = service.upload(report(user_id, Some("120/80"))).await.unwrap();

        let dispatch = service.send_to_contacts(outcome.report.id).await.unwrap();
        assert_eq!(dispatch.delivered, 1);
        assert_eq!(transport.sent()[0].subject, "Health Report from Asha Rao");

        let missing = service.send_to_contacts(9_999).await;
        assert!(matches!(missing, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_get_and_delete() {
        let (service, _transport, user_id) = setup(&[]).await;
        let first = service.upload(report(user_id, Some("120/80"))).await.unwrap();
        service.upload(report(user_id, None)).await.unwrap();

        assert_eq!(service.list(user_id).await.unwrap().len(), 2);
        assert!(matches!(
            service.list(9_999).await,
            Err(AppError::NotFound { .. })
        ));

        let fetched = service.get(first.report.id).await.unwrap();
        assert_eq!(fetched.blood_pressure.as_deref(), Some("120/80"));

        service.delete(first.report.id).await.unwrap();
        assert_eq!(service.list(user_id).await.unwrap().len(), 1);
        assert!(matches!(
            service.get(first.report.id).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
