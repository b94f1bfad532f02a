//! The diagnostic job record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::DiagnosticId;
use crate::input::DiagnosticInput;
use crate::status::DiagnosticStatus;

/// MIME type of the rendered report.
pub const REPORT_CONTENT_TYPE: &str = "application/pdf";

/// Deterministic artifact location for a job: `reports/{id}.pdf`.
pub fn artifact_path_for(id: &DiagnosticId) -> String {
    format!("reports/{id}.pdf")
}

/// A diagnostic job tracked through `pending -> processing -> ready|failed`.
///
/// Invariant: `artifact_path.is_some()` iff `status == Ready`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub id: DiagnosticId,
    /// Opaque owner identity (payer contact or authenticated user).
    pub owner: String,
    pub status: DiagnosticStatus,
    pub artifact_path: Option<String>,
    pub input: DiagnosticInput,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every transition; the stale-processing sweep keys off it.
    pub updated_at: DateTime<Utc>,
}

impl Diagnostic {
    /// Create a new job in `pending`.
    pub fn new(
        id: DiagnosticId,
        owner: impl Into<String>,
        input: DiagnosticInput,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner: owner.into(),
            status: DiagnosticStatus::Pending,
            artifact_path: None,
            input,
            created_at: now,
            updated_at: now,
        }
    }

    /// Filename offered when the report is downloaded.
    pub fn report_filename(&self) -> String {
        format!("{}.pdf", self.id)
    }

    /// The artifact path, only when the job is `ready` and the path is non-empty.
    ///
    /// This is the single readiness check used by the read path.
    pub fn ready_artifact(&self) -> Option<&str> {
        match (self.status, self.artifact_path.as_deref()) {
            (DiagnosticStatus::Ready, Some(path)) if !path.is_empty() => Some(path),
            _ => None,
        }
    }

    /// Apply a partial update, enforcing the state machine and the
    /// `artifact_path` invariant.
    pub fn apply(&mut self, update: &DiagnosticUpdate) -> Result<(), DomainError> {
        update.validate()?;
        self.status.ensure_transition(update.status)?;
        self.status = update.status;
        self.artifact_path = update.artifact_path.clone();
        self.updated_at = update.at;
        Ok(())
    }
}

/// A field-level transition request.
///
/// Repositories apply it atomically against the job's key instead of
/// writing back a whole record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticUpdate {
    pub status: DiagnosticStatus,
    pub artifact_path: Option<String>,
    pub at: DateTime<Utc>,
}

impl DiagnosticUpdate {
    pub fn processing(at: DateTime<Utc>) -> Self {
        Self {
            status: DiagnosticStatus::Processing,
            artifact_path: None,
            at,
        }
    }

    pub fn ready(artifact_path: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: DiagnosticStatus::Ready,
            artifact_path: Some(artifact_path.into()),
            at,
        }
    }

    pub fn failed(at: DateTime<Utc>) -> Self {
        Self {
            status: DiagnosticStatus::Failed,
            artifact_path: None,
            at,
        }
    }

    /// `artifact_path` must be present and non-empty exactly when moving to `ready`.
    pub fn validate(&self) -> Result<(), DomainError> {
        let has_path = self.artifact_path.as_deref().is_some_and(|p| !p.is_empty());
        match (self.status, has_path) {
            (DiagnosticStatus::Ready, false) => {
                Err(DomainError::invariant("ready requires an artifact path"))
            }
            (status, true) if status != DiagnosticStatus::Ready => Err(DomainError::invariant(
                format!("artifact path is only allowed on ready, not {status}"),
            )),
            _ => Ok(()),
        }
    }
}
