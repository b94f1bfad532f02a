use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tracing::info;

use diagpro_core::{Diagnostic, DiagnosticId};
use diagpro_infra::{CreateOutcome, fulfillment::UNKNOWN_OWNER};

use crate::app::{
    dto::{CreateJobRequest, JobResponse},
    errors,
    services::AppServices,
};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_job))
        .route("/:id", get(get_job))
}

async fn create_job(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<CreateJobRequest>,
) -> Response {
    let id = match req.id {
        Some(raw) => match raw.parse::<DiagnosticId>() {
            Ok(id) => id,
            Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()),
        },
        None => DiagnosticId::generate(),
    };
    let owner = req
        .owner
        .filter(|o| !o.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_OWNER.to_string());

    let job = Diagnostic::new(id, owner, req.input, Utc::now());
    match services.repository.create_if_absent(job).await {
        Ok(CreateOutcome::Created(job)) => {
            info!(diagnostic_id = %job.id, status = %job.status, "diagnostic created");
            (StatusCode::CREATED, Json(JobResponse::from(job))).into_response()
        }
        Ok(CreateOutcome::Existing(job)) => errors::json_error(
            StatusCode::CONFLICT,
            "already_exists",
            format!("diagnostic {} already exists", job.id),
        ),
        Err(e) => errors::repository_error_to_response(e),
    }
}

async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let not_found = || {
        errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("diagnostic {id} not found"))
    };
    // An id that fails validation cannot name a stored job.
    let Ok(parsed) = id.parse::<DiagnosticId>() else {
        return not_found();
    };

    match services.repository.get(&parsed).await {
        Ok(Some(job)) => Json(JobResponse::from(job)).into_response(),
        Ok(None) => not_found(),
        Err(e) => errors::repository_error_to_response(e),
    }
}
