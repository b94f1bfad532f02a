//! Infrastructure layer: configuration, storage adapters, and the services
//! that drive a diagnostic from payment to downloadable report.

pub mod access;
pub mod artifacts;
pub mod config;
pub mod fulfillment;
pub mod repository;
pub mod sweeper;
pub mod webhook;

pub use access::{AccessError, ReportAccessService, download_disposition};
pub use artifacts::{
    ArtifactError, ArtifactStore, FsArtifactStore, InMemoryArtifactStore, NO_STORE_CACHE_CONTROL,
    SignedQuery, SignedUrl, SignedUrlError, StoredArtifact, UrlSigner,
};
pub use config::{AppConfig, ConfigError};
pub use fulfillment::{FulfillmentError, FulfillmentOutcome, FulfillmentPipeline, FulfillmentRequest};
pub use repository::{
    CreateOutcome, DiagnosticRepository, InMemoryDiagnosticRepository, PostgresDiagnosticRepository,
    RepositoryError,
};
pub use sweeper::{StaleProcessingSweeper, SweeperConfig, SweeperHandle};
pub use webhook::{
    FulfillmentScheduler, TokioScheduler, WebhookError, WebhookHandler, WebhookOutcome,
    WebhookSettings,
};
