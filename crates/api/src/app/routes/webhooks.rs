use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use diagpro_payments::SIGNATURE_HEADER;

use crate::app::{errors, services::AppServices};

/// `POST /webhooks/payment`
///
/// The body is taken as raw bytes; it must reach the verifier unparsed.
pub async fn payment(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match services.webhooks.handle(&body, signature) {
        Ok(_) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        Err(e) => errors::webhook_error_to_response(e),
    }
}
