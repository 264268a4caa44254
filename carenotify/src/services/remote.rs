//! HTTP client for the notification server
//!
//! Lets the agent use the server's durable notifications and care records
//! through the same traits the server uses against SQLite directly.

use crate::database::{Medicine, Notification, Schedule};
use crate::error::{AppError, Result};
use crate::services::notifications::DurableStore;
use crate::services::reminders::CareRecordSource;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Error body returned by the server
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("carenotify/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!("Using notification server at {}", base_url);

        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn non-2xx responses into `AppError::Remote`
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);

        Err(AppError::Remote {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);

        let response = Self::check(self.http.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn patch(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        tracing::debug!("PATCH {}", url);

        Self::check(self.http.patch(&url).send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl DurableStore for ApiClient {
    async fn notifications_for(&self, user_id: i64) -> Result<Vec<Notification>> {
        self.get_json(&format!("/api/notifications/{}", user_id)).await
    }

    async fn mark_read(&self, id: i64) -> Result<()> {
        self.patch(&format!("/api/notifications/{}/read", id)).await
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<()> {
        self.patch(&format!("/api/notifications/{}/read-all", user_id))
            .await
    }
}

#[async_trait]
impl CareRecordSource for ApiClient {
    async fn schedules(&self, user_id: i64) -> Result<Vec<Schedule>> {
        self.get_json(&format!("/api/schedules/{}", user_id)).await
    }

    async fn medicines(&self, user_id: i64) -> Result<Vec<Medicine>> {
        self.get_json(&format!("/api/medicines/{}", user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalised() {
        let client = ApiClient::new("http://127.0.0.1:5000/").unwrap();
        assert_eq!(
            client.url("/api/notifications/1"),
            "http://127.0.0.1:5000/api/notifications/1"
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_http_error() {
        // Port 9 (discard) is not expected to accept connections locally.
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        let result = client.notifications_for(1).await;
        assert!(matches!(result, Err(AppError::Http(_))));
    }
}
