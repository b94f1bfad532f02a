use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};

use diagpro_core::DiagnosticId;
use diagpro_infra::SignedUrl;

use crate::app::{dto::UrlResponse, errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/:id/url", get(report_url))
        .route("/:id/renew-url", get(report_url))
        .route("/:id/download", get(download))
}

/// Every read-path variant goes through this one readiness check.
async fn signed_url(services: &AppServices, id: &str) -> Result<SignedUrl, Response> {
    let Ok(id) = id.parse::<DiagnosticId>() else {
        return Err(errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("diagnostic {id} not found"),
        ));
    };
    services
        .access
        .access_url(&id)
        .await
        .map_err(errors::access_error_to_response)
}

/// `GET /reports/{id}/url` and `GET /reports/{id}/renew-url`.
///
/// URLs are minted per request, so renewing is just asking again.
async fn report_url(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    match signed_url(&services, &id).await {
        Ok(signed) => Json(UrlResponse::from(signed)).into_response(),
        Err(resp) => resp,
    }
}

async fn download(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    match signed_url(&services, &id).await {
        Ok(signed) => Redirect::temporary(&signed.url).into_response(),
        Err(resp) => resp,
    }
}
