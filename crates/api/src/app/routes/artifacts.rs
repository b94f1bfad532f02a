//! Serves stored artifacts to holders of a valid signed URL.
//!
//! The URL is the only credential: the signature covers bucket, path, expiry
//! and the response headers, so none of them can be altered by the caller.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{info, warn};

use diagpro_infra::{ConfigError, SignedQuery};

use crate::app::{errors, services::AppServices};

/// `GET /artifacts/{bucket}/{*path}`
pub async fn download(
    Extension(services): Extension<Arc<AppServices>>,
    Path((bucket, path)): Path<(String, String)>,
    query: Result<Query<SignedQuery>, QueryRejection>,
) -> Response {
    let path = path.trim_start_matches('/');

    let Some(signer) = services.signer.as_deref() else {
        let err = ConfigError::Missing("URL_SIGNING_KEY");
        return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", err.to_string());
    };
    let Ok(Query(query)) = query else {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", "missing signed url parameters");
    };
    if let Err(e) = signer.verify(&bucket, path, &query, Utc::now()) {
        warn!(%bucket, %path, error = %e, "artifact access refused");
        return errors::signed_url_error_to_response(e);
    }

    let artifact = match services.artifacts.fetch(&bucket, path).await {
        Ok(artifact) => artifact,
        Err(e) => return errors::artifact_error_to_response(e),
    };
    info!(%bucket, %path, bytes = artifact.bytes.len(), "artifact served");

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, query.content_type),
            (header::CACHE_CONTROL, artifact.cache_control),
            (header::CONTENT_DISPOSITION, query.content_disposition),
        ],
        artifact.bytes,
    )
        .into_response()
}
