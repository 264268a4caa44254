//! Notification routes
//!
//! Durable notifications only; local reminders never reach the server.

use crate::app::AppState;
use crate::database::Notification;
use crate::error::Result;
use crate::services::DurableStore;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

/// List a user's notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Notification>>> {
    Ok(Json(state.repo.list_notifications(user_id).await?))
}

/// Mark one notification read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    DurableStore::mark_read(&state.repo, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark all of a user's notifications read. 404 when the user has none.
pub async fn mark_all_read(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<StatusCode> {
    DurableStore::mark_all_read(&state.repo, user_id).await?;
    tracing::info!("Marked all notifications read for user {}", user_id);
    Ok(StatusCode::NO_CONTENT)
}
