//! HTTP routes exposed to the companion app and the reminder agent
//!
//! Handlers are grouped by area:
//! - `notifications`: durable notifications and read state
//! - `care`: schedules and medicines
//! - `contacts`: emergency contacts
//! - `reports`: health report uploads and sharing
//! - `users`: profiles, SMS settings and premium status

pub mod care;
pub mod contacts;
pub mod notifications;
pub mod reports;
pub mod users;

use crate::app::AppState;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// Build the application router.
///
/// Routes that take a user id and routes that take a record id share the
/// same `:key` segment where they sit at the same position.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/notifications/:key", get(notifications::list_notifications))
        .route("/api/notifications/:key/read", patch(notifications::mark_read))
        .route("/api/notifications/:key/read-all", patch(notifications::mark_all_read))
        .route("/api/schedules", post(care::create_schedule))
        .route(
            "/api/schedules/:key",
            get(care::list_schedules)
                .patch(care::update_schedule)
                .delete(care::delete_schedule),
        )
        .route("/api/schedules/:key/completed", patch(care::set_schedule_completed))
        .route("/api/medicines", post(care::create_medicine))
        .route(
            "/api/medicines/:key",
            get(care::list_medicines)
                .patch(care::update_medicine)
                .delete(care::delete_medicine),
        )
        .route("/api/users", post(users::create_user))
        .route(
            "/api/users/:user_id",
            get(users::get_user).patch(users::update_user),
        )
        .route(
            "/api/users/:user_id/sms-settings",
            get(users::get_sms_settings).patch(users::update_sms_settings),
        )
        .route("/api/users/:user_id/premium/upgrade", post(users::upgrade_premium))
        .route(
            "/api/users/:user_id/emergency-contacts",
            get(contacts::list_contacts)
                .post(contacts::register_contacts)
                .patch(contacts::update_contacts),
        )
        .route("/api/health-reports", post(reports::upload_report))
        .route("/api/health-reports/:key", get(reports::list_reports))
        .route(
            "/api/health-reports/:key/send-to-contacts",
            post(reports::send_to_contacts),
        )
        .route("/api/reports/:key", delete(reports::delete_report))
        .route("/api/reports/:key/view", get(reports::view_report))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
