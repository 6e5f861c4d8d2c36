use crate::state::AppState;
use axum::{routing::get, Router};

pub mod docs;
pub mod health;
pub mod subscribers;

pub fn build_router(app_state: &AppState) -> Router {
    Router::new()
        .nest("/health", health::create_router().with_state(app_state.clone()))
        .nest(
            "/subscribers",
            subscribers::create_router().with_state(app_state.clone()),
        )
        .nest("/docs", docs::create_router())
        .route(
            "/metrics",
            get(crate::metrics::metrics_endpoint).with_state(app_state.metrics().clone()),
        )
}
