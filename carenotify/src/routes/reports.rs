//! Health report routes

use crate::app::AppState;
use crate::database::{HealthReport, NewHealthReport};
use crate::error::Result;
use crate::services::alerts::DispatchReport;
use crate::services::reports::UploadOutcome;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

/// Store extracted report readings; abnormal readings alert the contacts
pub async fn upload_report(
    State(state): State<AppState>,
    Json(req): Json<NewHealthReport>,
) -> Result<(StatusCode, Json<UploadOutcome>)> {
    let outcome = state.reports_service.upload(req).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn send_to_contacts(
    State(state): State<AppState>,
    Path(report_id): Path<i64>,
) -> Result<Json<DispatchReport>> {
    Ok(Json(state.reports_service.send_to_contacts(report_id).await?))
}

pub async fn list_reports(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<HealthReport>>> {
    Ok(Json(state.reports_service.list(user_id).await?))
}

/// Target of the link in shared-report emails
pub async fn view_report(
    State(state): State<AppState>,
    Path(report_id): Path<i64>,
) -> Result<Json<HealthReport>> {
    Ok(Json(state.reports_service.get(report_id).await?))
}

pub async fn delete_report(
    State(state): State<AppState>,
    Path(report_id): Path<i64>,
) -> Result<StatusCode> {
    state.reports_service.delete(report_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
