//! Read path: a job's report is reachable only through a short-lived signed URL,
//! and only once the job is `ready`.

use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use tracing::{info, instrument};

use diagpro_core::{DiagnosticId, DiagnosticStatus};

use crate::artifacts::{ArtifactError, ArtifactStore, SignedUrl};
use crate::config::{ConfigError, DEFAULT_SIGNED_URL_TTL_MINUTES};
use crate::repository::{DiagnosticRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("diagnostic not found: {0}")]
    NotFound(DiagnosticId),

    #[error("report not ready: diagnostic {id} is {status}")]
    NotReady {
        id: DiagnosticId,
        status: DiagnosticStatus,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// `attachment; filename="{id}.pdf"`
pub fn download_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{filename}\"")
}

pub struct ReportAccessService {
    repository: Arc<dyn DiagnosticRepository>,
    artifacts: Arc<dyn ArtifactStore>,
    bucket: Option<String>,
    ttl: Duration,
}

impl ReportAccessService {
    pub fn new(
        repository: Arc<dyn DiagnosticRepository>,
        artifacts: Arc<dyn ArtifactStore>,
        bucket: Option<String>,
    ) -> Self {
        Self {
            repository,
            artifacts,
            bucket,
            ttl: Duration::minutes(DEFAULT_SIGNED_URL_TTL_MINUTES),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The single authorization path for both the URL and redirect variants.
    #[instrument(skip(self), fields(diagnostic_id = %id))]
    pub async fn access_url(&self, id: &DiagnosticId) -> Result<SignedUrl, AccessError> {
        let job = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| AccessError::NotFound(id.clone()))?;

        let Some(path) = job.ready_artifact() else {
            return Err(AccessError::NotReady {
                id: id.clone(),
                status: job.status,
            });
        };

        let bucket = self
            .bucket
            .as_deref()
            .ok_or(ConfigError::Missing("REPORTS_BUCKET"))?;
        let signed = self
            .artifacts
            .sign_url(bucket, path, self.ttl, &download_disposition(&job.report_filename()))
            .await?;

        info!(expires_at = %signed.expires_at, "report url issued");
        Ok(signed)
    }
}
