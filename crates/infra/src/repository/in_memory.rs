use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use diagpro_core::{Diagnostic, DiagnosticId, DiagnosticStatus, DiagnosticUpdate};

use super::{CreateOutcome, DiagnosticRepository, RepositoryError};

/// In-memory repository for tests/dev.
///
/// Each operation holds the write lock for its whole check-and-set, which
/// gives the same atomicity as the conditional `UPDATE` in Postgres.
#[derive(Debug, Default)]
pub struct InMemoryDiagnosticRepository {
    jobs: RwLock<HashMap<DiagnosticId, Diagnostic>>,
}

impl InMemoryDiagnosticRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl DiagnosticRepository for InMemoryDiagnosticRepository {
    async fn get(&self, id: &DiagnosticId) -> Result<Option<Diagnostic>, RepositoryError> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(jobs.get(id).cloned())
    }

    async fn create_if_absent(&self, diagnostic: Diagnostic) -> Result<CreateOutcome, RepositoryError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = jobs.get(&diagnostic.id) {
            return Ok(CreateOutcome::Existing(existing.clone()));
        }
        jobs.insert(diagnostic.id.clone(), diagnostic.clone());
        Ok(CreateOutcome::Created(diagnostic))
    }

    async fn apply(
        &self,
        id: &DiagnosticId,
        update: &DiagnosticUpdate,
    ) -> Result<Diagnostic, RepositoryError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))?;
        job.apply(update)?;
        Ok(job.clone())
    }

    async fn list_by_status_older_than(
        &self,
        status: DiagnosticStatus,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Diagnostic>, RepositoryError> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut matching: Vec<Diagnostic> = jobs
            .values()
            .filter(|j| j.status == status && j.updated_at < cutoff)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        matching.truncate(limit);
        Ok(matching)
    }
}
