//! Schedule and medicine routes

use crate::app::AppState;
use crate::database::{
    Medicine, NewMedicine, NewSchedule, Schedule, UpdateMedicine, UpdateSchedule,
};
use crate::error::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CompletedRequest {
    pub completed: bool,
}

pub async fn list_schedules(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Schedule>>> {
    Ok(Json(state.care_service.list_schedules(user_id).await?))
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Json(req): Json<NewSchedule>,
) -> Result<(StatusCode, Json<Schedule>)> {
    let schedule = state.care_service.create_schedule(req).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn set_schedule_completed(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CompletedRequest>,
) -> Result<Json<Schedule>> {
    Ok(Json(
        state
            .care_service
            .set_schedule_completed(id, req.completed)
            .await?,
    ))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSchedule>,
) -> Result<Json<Schedule>> {
    Ok(Json(state.care_service.update_schedule(id, req).await?))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.care_service.delete_schedule(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_medicines(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Medicine>>> {
    Ok(Json(state.care_service.list_medicines(user_id).await?))
}

pub async fn create_medicine(
    State(state): State<AppState>,
    Json(req): Json<NewMedicine>,
) -> Result<(StatusCode, Json<Medicine>)> {
    let medicine = state.care_service.create_medicine(req).await?;
    Ok((StatusCode::CREATED, Json(medicine)))
}

pub async fn update_medicine(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateMedicine>,
) -> Result<Json<Medicine>> {
    Ok(Json(state.care_service.update_medicine(id, req).await?))
}

pub async fn delete_medicine(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.care_service.delete_medicine(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
