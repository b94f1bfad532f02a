use axum::{
    routing::{get, post},
    Router,
};

pub mod artifacts;
pub mod jobs;
pub mod reports;
pub mod system;
pub mod webhooks;

/// Router for everything except the health checks.
pub fn router() -> Router {
    Router::new()
        .route("/webhooks/payment", post(webhooks::payment))
        .nest("/jobs", jobs::router())
        .nest("/reports", reports::router())
        .route("/artifacts/:bucket/*path", get(artifacts::download))
}
