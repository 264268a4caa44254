//! User profile routes

use crate::app::AppState;
use crate::database::{NewUser, SmsSettings, UpdateUser, User};
use crate::error::Result;
use crate::services::users::PremiumUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<NewUser>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state.users_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>> {
    Ok(Json(state.users_service.get(user_id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateUser>,
) -> Result<Json<User>> {
    Ok(Json(state.users_service.update(user_id, req).await?))
}

pub async fn get_sms_settings(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<SmsSettings>> {
    Ok(Json(state.users_service.sms_settings(user_id).await?))
}

pub async fn update_sms_settings(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<SmsSettings>,
) -> Result<Json<SmsSettings>> {
    Ok(Json(
        state
            .users_service
            .update_sms_settings(user_id, req)
            .await?,
    ))
}

pub async fn upgrade_premium(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<PremiumUpgrade>> {
    Ok(Json(state.users_service.upgrade_premium(user_id).await?))
}
