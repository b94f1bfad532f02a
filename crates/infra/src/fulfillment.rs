//! Fulfillment pipeline: paid job -> analysis -> PDF -> artifact -> `ready`.
//!
//! Steps run strictly in order for one job:
//! lookup-or-create, processing, analyze, render, upload, finalize.
//! Every invocation that returns normally leaves the job in `ready` or
//! `failed` (or untouched, when it was already terminal).

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use diagpro_ai::Analyst;
use diagpro_core::{
    Diagnostic, DiagnosticId, DiagnosticInput, DiagnosticStatus, DiagnosticUpdate,
    REPORT_CONTENT_TYPE, artifact_path_for,
};
use diagpro_report::{RenderError, ReportRenderer};

use crate::artifacts::{ArtifactError, ArtifactStore, NO_STORE_CACHE_CONTROL};
use crate::config::ConfigError;
use crate::repository::{DiagnosticRepository, RepositoryError};

/// Owner recorded for jobs first seen through a payment event without a payer contact.
pub const UNKNOWN_OWNER: &str = "unknown";

/// What the payment event told us about the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentRequest {
    pub diagnostic_id: DiagnosticId,
    pub payer_contact: Option<String>,
    pub event_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    Ready { artifact_path: String },
    Failed { reason: String },
    /// The job was already terminal; nothing was changed.
    Skipped { status: DiagnosticStatus },
}

#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("render task failed: {0}")]
    Task(String),
}

pub struct FulfillmentPipeline {
    repository: Arc<dyn DiagnosticRepository>,
    analyst: Analyst,
    renderer: ReportRenderer,
    artifacts: Arc<dyn ArtifactStore>,
    bucket: Option<String>,
}

impl FulfillmentPipeline {
    pub fn new(
        repository: Arc<dyn DiagnosticRepository>,
        analyst: Analyst,
        artifacts: Arc<dyn ArtifactStore>,
        bucket: Option<String>,
    ) -> Self {
        Self {
            repository,
            analyst,
            renderer: ReportRenderer::new(),
            artifacts,
            bucket,
        }
    }

    /// Drive one job to a terminal state.
    ///
    /// Errors returned here are repository failures around the state
    /// transitions themselves; anything that goes wrong while producing the
    /// artifact ends as `FulfillmentOutcome::Failed` with the job in `failed`.
    #[instrument(
        skip(self, request),
        fields(diagnostic_id = %request.diagnostic_id, event_id = %request.event_id)
    )]
    pub async fn fulfill(
        &self,
        request: FulfillmentRequest,
    ) -> Result<FulfillmentOutcome, FulfillmentError> {
        let id = request.diagnostic_id;
        let now = Utc::now();

        let owner = request.payer_contact.unwrap_or_else(|| UNKNOWN_OWNER.to_string());
        let created = self
            .repository
            .create_if_absent(Diagnostic::new(id.clone(), owner, DiagnosticInput::default(), now))
            .await?;
        if created.was_created() {
            info!(status = %DiagnosticStatus::Pending, "diagnostic created from payment event");
        }
        let job = created.into_inner();

        if job.status.is_terminal() {
            info!(status = %job.status, "diagnostic already terminal, skipping");
            return Ok(FulfillmentOutcome::Skipped { status: job.status });
        }

        let job = match self.repository.apply(&id, &DiagnosticUpdate::processing(Utc::now())).await {
            Ok(job) => job,
            // Another delivery finished the job between our read and this write.
            Err(e) if e.is_illegal_transition() => {
                let status = self
                    .repository
                    .get(&id)
                    .await?
                    .map(|d| d.status)
                    .unwrap_or(job.status);
                info!(%status, "diagnostic became terminal concurrently, skipping");
                return Ok(FulfillmentOutcome::Skipped { status });
            }
            Err(e) => return Err(e.into()),
        };
        info!(status = %job.status, "diagnostic processing");

        match self.produce_artifact(&job).await {
            Ok(path) => {
                self.repository
                    .apply(&id, &DiagnosticUpdate::ready(path.clone(), Utc::now()))
                    .await?;
                info!(status = %DiagnosticStatus::Ready, artifact_path = %path, "diagnostic ready");
                Ok(FulfillmentOutcome::Ready { artifact_path: path })
            }
            Err(err) => {
                error!(error = %err, "fulfillment failed");
                self.repository
                    .apply(&id, &DiagnosticUpdate::failed(Utc::now()))
                    .await?;
                info!(status = %DiagnosticStatus::Failed, "diagnostic failed");
                Ok(FulfillmentOutcome::Failed {
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Steps 3 to 5. Analysis never errors (the analyst substitutes fallback
    /// text); render and upload failures propagate.
    async fn produce_artifact(&self, job: &Diagnostic) -> Result<String, FulfillmentError> {
        let analysis = self.analyst.analyze(&job.input).await;
        if analysis.is_fallback() {
            warn!(provider = %self.analyst.provider_name(), "report uses fallback analysis");
        }

        let renderer = self.renderer;
        let text = analysis.text;
        let pdf = tokio::task::spawn_blocking(move || renderer.render(&text))
            .await
            .map_err(|e| FulfillmentError::Task(e.to_string()))??;

        let bucket = self
            .bucket
            .as_deref()
            .ok_or(ConfigError::Missing("REPORTS_BUCKET"))?;
        let path = artifact_path_for(&job.id);
        self.artifacts
            .upload(bucket, &path, pdf, REPORT_CONTENT_TYPE, NO_STORE_CACHE_CONTROL)
            .await?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{InMemoryArtifactStore, SignedUrl, StoredArtifact};
    use crate::repository::InMemoryDiagnosticRepository;
    use diagpro_ai::{AiError, AnalysisProvider};

    struct Canned;

    #[async_trait::async_trait]
    impl AnalysisProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn analyze(&self, _input: &DiagnosticInput) -> Result<String, AiError> {
            Ok("Initial Assessment\nReplace the fuel filter.".to_string())
        }
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl AnalysisProvider for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn analyze(&self, _input: &DiagnosticInput) -> Result<String, AiError> {
            Err(AiError::Transport("connection refused".into()))
        }
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl ArtifactStore for BrokenStore {
        async fn upload(
            &self,
            _bucket: &str,
            _path: &str,
            _bytes: Vec<u8>,
            _content_type: &str,
            _cache_control: &str,
        ) -> Result<(), ArtifactError> {
            Err(ArtifactError::Storage("bucket unavailable".into()))
        }

        async fn fetch(&self, bucket: &str, path: &str) -> Result<StoredArtifact, ArtifactError> {
            Err(ArtifactError::NotFound {
                bucket: bucket.into(),
                path: path.into(),
            })
        }

        async fn sign_url(
            &self,
            _bucket: &str,
            _path: &str,
            _ttl: chrono::Duration,
            _content_disposition: &str,
        ) -> Result<SignedUrl, ArtifactError> {
            Err(ArtifactError::Storage("bucket unavailable".into()))
        }
    }

    fn request(id: &str) -> FulfillmentRequest {
        FulfillmentRequest {
            diagnostic_id: id.parse().unwrap(),
            payer_contact: Some("payer@example.com".into()),
            event_id: "evt_1".into(),
        }
    }

    fn pipeline(
        repo: Arc<InMemoryDiagnosticRepository>,
        provider: Arc<dyn AnalysisProvider>,
        store: Arc<dyn ArtifactStore>,
        bucket: Option<&str>,
    ) -> FulfillmentPipeline {
        FulfillmentPipeline::new(repo, Analyst::new(provider), store, bucket.map(str::to_string))
    }

    #[tokio::test]
    async fn unseen_job_is_created_and_reaches_ready() {
        let repo = InMemoryDiagnosticRepository::arc();
        let store = Arc::new(InMemoryArtifactStore::new(None));
        let p = pipeline(repo.clone(), Arc::new(Canned), store.clone(), Some("reports"));

        let outcome = p.fulfill(request("42")).await.unwrap();
        assert_eq!(
            outcome,
            FulfillmentOutcome::Ready {
                artifact_path: "reports/42.pdf".into()
            }
        );

        let job = repo.get(&"42".parse().unwrap()).await.unwrap().unwrap();
        assert_eq!(job.status, DiagnosticStatus::Ready);
        assert_eq!(job.owner, "payer@example.com");
        assert_eq!(job.ready_artifact(), Some("reports/42.pdf"));

        let stored = store.fetch("reports", "reports/42.pdf").await.unwrap();
        assert!(stored.bytes.starts_with(b"%PDF"));
        assert_eq!(stored.content_type, "application/pdf");
        assert_eq!(stored.cache_control, "private, max-age=0, no-store");
    }

    #[tokio::test]
    async fn upload_failure_ends_failed_without_path() {
        let repo = InMemoryDiagnosticRepository::arc();
        let p = pipeline(repo.clone(), Arc::new(Canned), Arc::new(BrokenStore), Some("reports"));

        let outcome = p.fulfill(request("42")).await.unwrap();
        assert!(matches!(outcome, FulfillmentOutcome::Failed { .. }));

        let job = repo.get(&"42".parse().unwrap()).await.unwrap().unwrap();
        assert_eq!(job.status, DiagnosticStatus::Failed);
        assert!(job.artifact_path.is_none());
    }

    #[tokio::test]
    async fn missing_bucket_ends_failed() {
        let repo = InMemoryDiagnosticRepository::arc();
        let store = Arc::new(InMemoryArtifactStore::new(None));
        let p = pipeline(repo.clone(), Arc::new(Canned), store.clone(), None);

        let outcome = p.fulfill(request("5")).await.unwrap();
        assert_eq!(
            outcome,
            FulfillmentOutcome::Failed {
                reason: "REPORTS_BUCKET is not configured".into()
            }
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_still_produces_report() {
        let repo = InMemoryDiagnosticRepository::arc();
        let store = Arc::new(InMemoryArtifactStore::new(None));
        let p = pipeline(repo.clone(), Arc::new(Unreachable), store.clone(), Some("reports"));

        let outcome = p.fulfill(request("8")).await.unwrap();
        assert!(matches!(outcome, FulfillmentOutcome::Ready { .. }));
        assert!(store.contains("reports", "reports/8.pdf"));
    }

    #[tokio::test]
    async fn pre_registered_job_keeps_owner_and_input() {
        let repo = InMemoryDiagnosticRepository::arc();
        let input = DiagnosticInput {
            equipment_type: Some("Generator".into()),
            ..Default::default()
        };
        repo.create_if_absent(Diagnostic::new("9".parse().unwrap(), "user-1", input.clone(), Utc::now()))
            .await
            .unwrap();

        let store = Arc::new(InMemoryArtifactStore::new(None));
        let p = pipeline(repo.clone(), Arc::new(Canned), store, Some("reports"));
        p.fulfill(request("9")).await.unwrap();

        let job = repo.get(&"9".parse().unwrap()).await.unwrap().unwrap();
        assert_eq!(job.owner, "user-1");
        assert_eq!(job.input, input);
        assert_eq!(job.status, DiagnosticStatus::Ready);
    }

    #[tokio::test]
    async fn terminal_jobs_are_skipped() {
        let repo = InMemoryDiagnosticRepository::arc();
        let store = Arc::new(InMemoryArtifactStore::new(None));
        let p = pipeline(repo.clone(), Arc::new(Canned), Arc::new(BrokenStore), Some("reports"));
        p.fulfill(request("3")).await.unwrap();

        // Redelivery after failure: no transition out of `failed`.
        let p = pipeline(repo.clone(), Arc::new(Canned), store.clone(), Some("reports"));
        let outcome = p.fulfill(request("3")).await.unwrap();
        assert_eq!(
            outcome,
            FulfillmentOutcome::Skipped {
                status: DiagnosticStatus::Failed
            }
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn missing_payer_contact_records_unknown_owner() {
        let repo = InMemoryDiagnosticRepository::arc();
        let store = Arc::new(InMemoryArtifactStore::new(None));
        let p = pipeline(repo.clone(), Arc::new(Canned), store, Some("reports"));

        let mut req = request("11");
        req.payer_contact = None;
        p.fulfill(req).await.unwrap();

        let job = repo.get(&"11".parse().unwrap()).await.unwrap().unwrap();
        assert_eq!(job.owner, UNKNOWN_OWNER);
    }
}
