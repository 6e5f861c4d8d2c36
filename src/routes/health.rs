use crate::{repository::SubscriberRepository, state::AppState};
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;
use utoipa::ToSchema;

/// Create a router to serve health checks.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(is_alive))
        .route("/status", get(status))
}

/// Simple `is_alive` endpoint that will always return a 200 OK.
/// Used to indicate when the webserver is up and running.
#[tracing::instrument]
#[utoipa::path(
    get,
    path = "/health",
    responses((status = OK, description = "Check if service is alive"))
)]
pub async fn is_alive() -> StatusCode {
    tracing::debug!("Service is alive");
    StatusCode::OK
}

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct Status {
    db_connected: bool,
}

/// Whether the subscriber store can be reached.
#[tracing::instrument(skip(subscribers))]
#[utoipa::path(
    get,
    path = "/health/status",
    responses(
        (status = OK, description = "Current status of all dependent services", body = Status)
    )
)]
pub async fn status(State(subscribers): State<Arc<dyn SubscriberRepository>>) -> Json<Status> {
    let status = Status {
        db_connected: subscribers.is_healthy().await,
    };
    tracing::info!("Status: {:?}", status);
    Json(status)
}
