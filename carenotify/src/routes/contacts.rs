//! Emergency contact routes

use crate::app::AppState;
use crate::error::Result;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct ContactsRequest {
    #[serde(default)]
    pub emails: Vec<String>,
}

pub async fn list_contacts(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>> {
    let contacts = state.contacts_service.list(user_id).await?;
    Ok(Json(json!({ "contacts": contacts })))
}

/// Register contacts and let them know the user is active
pub async fn register_contacts(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<ContactsRequest>,
) -> Result<Json<Value>> {
    let contacts = state.contacts_service.register(user_id, req.emails).await?;

    Ok(Json(json!({
        "message": "Emergency contacts saved successfully",
        "contacts_count": contacts.len(),
    })))
}

pub async fn update_contacts(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<ContactsRequest>,
) -> Result<Json<Value>> {
    state.contacts_service.update(user_id, req.emails).await?;

    Ok(Json(json!({
        "message": "Emergency contacts updated successfully",
    })))
}
