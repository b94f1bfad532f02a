//! Filesystem artifact store: `{root}/{bucket}/{path}` plus a JSON sidecar
//! holding the serving headers.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::{ArtifactError, ArtifactStore, SignedUrl, StoredArtifact, UrlSigner, sign_with, validate_key};

const META_SUFFIX: &str = ".meta.json";

#[derive(Debug, Serialize, Deserialize)]
struct Meta {
    content_type: String,
    cache_control: String,
}

#[derive(Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
    signer: Option<Arc<UrlSigner>>,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>, signer: Option<Arc<UrlSigner>>) -> Self {
        Self {
            root: root.into(),
            signer,
        }
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf, ArtifactError> {
        validate_key(bucket, path)?;
        let mut full = self.root.join(bucket);
        full.extend(path.split('/'));
        Ok(full)
    }
}

fn meta_path(object: &Path) -> PathBuf {
    let mut name = object.as_os_str().to_owned();
    name.push(META_SUFFIX);
    PathBuf::from(name)
}

/// Write via a temporary sibling and rename so readers never see a torn file.
async fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, target).await?;
    Ok(())
}

#[async_trait::async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), ArtifactError> {
        let object = self.object_path(bucket, path)?;
        if let Some(parent) = object.parent() {
            fs::create_dir_all(parent).await?;
        }

        let meta = serde_json::to_vec(&Meta {
            content_type: content_type.to_string(),
            cache_control: cache_control.to_string(),
        })
        .map_err(|e| ArtifactError::Storage(e.to_string()))?;

        write_atomic(&meta_path(&object), &meta).await?;
        write_atomic(&object, &bytes).await?;
        Ok(())
    }

    async fn fetch(&self, bucket: &str, path: &str) -> Result<StoredArtifact, ArtifactError> {
        let object = self.object_path(bucket, path)?;
        let not_found = || ArtifactError::NotFound {
            bucket: bucket.to_string(),
            path: path.to_string(),
        };

        let bytes = match fs::read(&object).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let meta: Meta = match fs::read(meta_path(&object)).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| ArtifactError::Storage(e.to_string()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };

        Ok(StoredArtifact {
            bytes,
            content_type: meta.content_type,
            cache_control: meta.cache_control,
        })
    }

    async fn sign_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
        content_disposition: &str,
    ) -> Result<SignedUrl, ArtifactError> {
        let object = self.object_path(bucket, path)?;
        let raw = match fs::read(meta_path(&object)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound {
                    bucket: bucket.to_string(),
                    path: path.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let meta: Meta =
            serde_json::from_slice(&raw).map_err(|e| ArtifactError::Storage(e.to_string()))?;
        sign_with(self.signer.as_deref(), bucket, path, ttl, &meta.content_type, content_disposition)
    }
}
