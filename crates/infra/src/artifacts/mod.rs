//! Durable blob storage plus time-limited signed URL issuance.

mod fs;
mod memory;
mod signer;

pub use fs::FsArtifactStore;
pub use memory::InMemoryArtifactStore;
pub use signer::{SignedQuery, SignedUrl, SignedUrlError, UrlSigner};

use chrono::{Duration, Utc};
use thiserror::Error;

use crate::config::ConfigError;

/// Cache policy for per-user report artifacts: never cached by shared caches.
pub const NO_STORE_CACHE_CONTROL: &str = "private, max-age=0, no-store";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {bucket}/{path}")]
    NotFound { bucket: String, path: String },

    #[error("invalid artifact path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Signing(#[from] SignedUrlError),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

/// A stored blob together with the headers it is served with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
}

#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync + 'static {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), ArtifactError>;

    async fn fetch(&self, bucket: &str, path: &str) -> Result<StoredArtifact, ArtifactError>;

    /// Issue a read-only URL for `bucket/path` valid for `ttl` that forces
    /// `content_disposition` on the response.
    async fn sign_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
        content_disposition: &str,
    ) -> Result<SignedUrl, ArtifactError>;
}

/// Reject empty, absolute, or traversing object keys.
pub(crate) fn validate_key(bucket: &str, path: &str) -> Result<(), ArtifactError> {
    let bad_segment = |s: &str| s.is_empty() || s == "." || s == ".." || s.contains('\\');
    if bad_segment(bucket) || bucket.contains('/') {
        return Err(ArtifactError::InvalidPath(format!("bucket {bucket:?}")));
    }
    if path.starts_with('/') || path.split('/').any(bad_segment) {
        return Err(ArtifactError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Shared `sign_url` body for stores that serve through the API's artifact route.
pub(crate) fn sign_with(
    signer: Option<&UrlSigner>,
    bucket: &str,
    path: &str,
    ttl: Duration,
    content_type: &str,
    content_disposition: &str,
) -> Result<SignedUrl, ArtifactError> {
    let signer = signer.ok_or(ConfigError::Missing("URL_SIGNING_KEY"))?;
    let expires_at = Utc::now() + ttl;
    Ok(signer.sign(bucket, path, expires_at, content_type, content_disposition)?)
}
