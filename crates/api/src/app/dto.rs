use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use diagpro_core::{Diagnostic, DiagnosticInput, DiagnosticStatus};
use diagpro_infra::SignedUrl;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    /// Caller-chosen id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub input: DiagnosticInput,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub status: DiagnosticStatus,
    pub owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Diagnostic> for JobResponse {
    fn from(job: Diagnostic) -> Self {
        Self {
            id: job.id.to_string(),
            status: job.status,
            owner: job.owner,
            artifact_path: job.artifact_path,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl From<SignedUrl> for UrlResponse {
    fn from(signed: SignedUrl) -> Self {
        Self {
            url: signed.url,
            expires_at: signed.expires_at,
        }
    }
}
