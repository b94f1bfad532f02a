//! Service wiring: every collaborator is built once from `AppConfig` and
//! shared with handlers through an `Extension<Arc<AppServices>>`.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{info, warn};

use diagpro_ai::{Analyst, VertexGeminiProvider};
use diagpro_infra::{
    AppConfig, ArtifactStore, DiagnosticRepository, FsArtifactStore, FulfillmentPipeline,
    InMemoryArtifactStore, InMemoryDiagnosticRepository, PostgresDiagnosticRepository,
    ReportAccessService, RepositoryError, SignedUrlError, TokioScheduler, UrlSigner,
    WebhookHandler, WebhookSettings,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),

    #[error("url signer: {0}")]
    Signer(#[from] SignedUrlError),
}

pub struct AppServices {
    pub repository: Arc<dyn DiagnosticRepository>,
    pub artifacts: Arc<dyn ArtifactStore>,
    /// `None` when `URL_SIGNING_KEY` is unset; artifact reads then fail with 500.
    pub signer: Option<Arc<UrlSigner>>,
    pub webhooks: WebhookHandler,
    pub access: ReportAccessService,
}

impl AppServices {
    /// Wire services around an existing repository and artifact store, using
    /// the configured analysis provider.
    pub fn new(
        config: &AppConfig,
        repository: Arc<dyn DiagnosticRepository>,
        artifacts: Arc<dyn ArtifactStore>,
        signer: Option<Arc<UrlSigner>>,
    ) -> Self {
        let analyst = Analyst::new(Arc::new(VertexGeminiProvider::new(config.vertex.clone())));
        Self::with_analyst(config, repository, artifacts, signer, analyst)
    }

    pub fn with_analyst(
        config: &AppConfig,
        repository: Arc<dyn DiagnosticRepository>,
        artifacts: Arc<dyn ArtifactStore>,
        signer: Option<Arc<UrlSigner>>,
        analyst: Analyst,
    ) -> Self {
        let pipeline = Arc::new(FulfillmentPipeline::new(
            repository.clone(),
            analyst,
            artifacts.clone(),
            config.reports_bucket.clone(),
        ));

        let webhooks = WebhookHandler::new(
            WebhookSettings {
                secret: config.webhook_secret.as_ref().map(clone_secret),
                tolerance: config.webhook_tolerance,
                dedup_events: config.webhook_dedup_events,
                dedup_capacity: config.webhook_dedup_capacity,
            },
            Arc::new(TokioScheduler::new(pipeline)),
        );

        let access = ReportAccessService::new(
            repository.clone(),
            artifacts.clone(),
            config.reports_bucket.clone(),
        )
        .with_ttl(config.signed_url_ttl);

        Self {
            repository,
            artifacts,
            signer,
            webhooks,
            access,
        }
    }
}

fn clone_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

/// The URL signer, or `None` when no signing key is configured.
pub fn url_signer(config: &AppConfig) -> Result<Option<Arc<UrlSigner>>, SignedUrlError> {
    config
        .url_signing_key
        .as_ref()
        .map(|key| UrlSigner::new(clone_secret(key), config.public_base_url.clone()).map(Arc::new))
        .transpose()
}

/// Build all services from configuration, choosing Postgres and a filesystem
/// artifact root when configured and in-memory adapters otherwise.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StartupError> {
    let signer = url_signer(config)?;
    if signer.is_none() {
        warn!("URL_SIGNING_KEY not set; report URLs cannot be issued");
    }

    let repository: Arc<dyn DiagnosticRepository> = match &config.database_url {
        Some(url) => {
            let repo = PostgresDiagnosticRepository::connect(url.expose_secret()).await?;
            repo.ensure_schema().await?;
            info!("using postgres diagnostic repository");
            Arc::new(repo)
        }
        None => {
            warn!("DATABASE_URL not set; jobs are kept in memory");
            InMemoryDiagnosticRepository::arc()
        }
    };

    let artifacts: Arc<dyn ArtifactStore> = match &config.artifact_dir {
        Some(dir) => {
            info!(root = %dir.display(), "using filesystem artifact store");
            Arc::new(FsArtifactStore::new(dir.clone(), signer.clone()))
        }
        None => {
            warn!("ARTIFACT_DIR not set; artifacts are kept in memory");
            Arc::new(InMemoryArtifactStore::new(signer.clone()))
        }
    };

    Ok(AppServices::new(config, repository, artifacts, signer))
}
