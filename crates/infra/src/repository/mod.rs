//! Durable keyed storage of diagnostic jobs.
//!
//! The repository is the only shared mutable resource in the pipeline. Every
//! write is a field-level update applied atomically against one job's key;
//! callers never read-modify-write whole records.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryDiagnosticRepository;
pub use postgres::PostgresDiagnosticRepository;

use chrono::{DateTime, Utc};
use thiserror::Error;

use diagpro_core::{Diagnostic, DiagnosticId, DiagnosticStatus, DiagnosticUpdate, DomainError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("diagnostic not found: {0}")]
    NotFound(DiagnosticId),

    /// The update was rejected by the state machine or the artifact invariant.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    /// True when the rejection came from the state machine (e.g. the job is terminal).
    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, Self::Domain(DomainError::IllegalTransition { .. }))
    }
}

/// Result of [`DiagnosticRepository::create_if_absent`].
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(Diagnostic),
    Existing(Diagnostic),
}

impl CreateOutcome {
    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    pub fn into_inner(self) -> Diagnostic {
        match self {
            Self::Created(d) | Self::Existing(d) => d,
        }
    }
}

#[async_trait::async_trait]
pub trait DiagnosticRepository: Send + Sync + 'static {
    async fn get(&self, id: &DiagnosticId) -> Result<Option<Diagnostic>, RepositoryError>;

    /// Insert `diagnostic` unless a record with its id exists; either way
    /// return the stored record.
    async fn create_if_absent(&self, diagnostic: Diagnostic) -> Result<CreateOutcome, RepositoryError>;

    /// Atomically apply `update` to the job with `id`.
    ///
    /// The status change must be an edge of the state machine from the
    /// job's *current* status; the check and the write are one operation.
    async fn apply(
        &self,
        id: &DiagnosticId,
        update: &DiagnosticUpdate,
    ) -> Result<Diagnostic, RepositoryError>;

    /// Jobs in `status` whose `updated_at` is strictly before `cutoff`, oldest first.
    async fn list_by_status_older_than(
        &self,
        status: DiagnosticStatus,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Diagnostic>, RepositoryError>;
}
