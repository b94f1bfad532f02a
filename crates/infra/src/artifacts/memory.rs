use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Duration;

use super::{ArtifactError, ArtifactStore, SignedUrl, StoredArtifact, UrlSigner, sign_with, validate_key};

/// In-memory artifact store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    objects: RwLock<HashMap<(String, String), StoredArtifact>>,
    signer: Option<Arc<UrlSigner>>,
}

impl InMemoryArtifactStore {
    pub fn new(signer: Option<Arc<UrlSigner>>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            signer,
        }
    }

    pub fn contains(&self, bucket: &str, path: &str) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(bucket.to_string(), path.to_string()))
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), ArtifactError> {
        validate_key(bucket, path)?;
        let artifact = StoredArtifact {
            bytes,
            content_type: content_type.to_string(),
            cache_control: cache_control.to_string(),
        };
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((bucket.to_string(), path.to_string()), artifact);
        Ok(())
    }

    async fn fetch(&self, bucket: &str, path: &str) -> Result<StoredArtifact, ArtifactError> {
        validate_key(bucket, path)?;
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            })
    }

    async fn sign_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
        content_disposition: &str,
    ) -> Result<SignedUrl, ArtifactError> {
        validate_key(bucket, path)?;
        // Only the content type is needed; the bytes stay where they are.
        let content_type = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(bucket.to_string(), path.to_string()))
            .map(|object| object.content_type.clone())
            .ok_or_else(|| ArtifactError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            })?;
        sign_with(self.signer.as_deref(), bucket, path, ttl, &content_type, content_disposition)
    }
}
