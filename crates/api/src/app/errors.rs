use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use diagpro_infra::{AccessError, ArtifactError, RepositoryError, SignedUrlError, WebhookError};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn webhook_error_to_response(err: WebhookError) -> axum::response::Response {
    match err {
        WebhookError::Verification(e) => {
            json_error(StatusCode::BAD_REQUEST, "verification_failed", e.to_string())
        }
        WebhookError::Config(e) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", e.to_string())
        }
    }
}

pub fn repository_error_to_response(err: RepositoryError) -> axum::response::Response {
    match err {
        RepositoryError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("diagnostic {id} not found"))
        }
        RepositoryError::Domain(e) => json_error(StatusCode::CONFLICT, "conflict", e.to_string()),
        RepositoryError::Storage(msg) => {
            tracing::error!(error = %msg, "repository failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

pub fn artifact_error_to_response(err: ArtifactError) -> axum::response::Response {
    match err {
        ArtifactError::NotFound { .. } | ArtifactError::InvalidPath(_) => {
            json_error(StatusCode::NOT_FOUND, "artifact_not_found", err.to_string())
        }
        ArtifactError::Config(e) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", e.to_string())
        }
        ArtifactError::Signing(e) => signed_url_error_to_response(e),
        ArtifactError::Io(_) | ArtifactError::Storage(_) => {
            tracing::error!(error = %err, "artifact store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", err.to_string())
        }
    }
}

pub fn signed_url_error_to_response(err: SignedUrlError) -> axum::response::Response {
    match err {
        SignedUrlError::Expired | SignedUrlError::BadSignature | SignedUrlError::Malformed(_) => {
            json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
        }
        SignedUrlError::EmptyKey | SignedUrlError::InvalidBase => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", err.to_string())
        }
    }
}

pub fn access_error_to_response(err: AccessError) -> axum::response::Response {
    match err {
        AccessError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("diagnostic {id} not found"))
        }
        AccessError::NotReady { .. } => json_error(StatusCode::CONFLICT, "not_ready", err.to_string()),
        AccessError::Config(e) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", e.to_string())
        }
        AccessError::Repository(e) => repository_error_to_response(e),
        AccessError::Artifact(e) => artifact_error_to_response(e),
    }
}
