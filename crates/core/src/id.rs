//! Strongly-typed diagnostic identifier.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Maximum accepted identifier length.
pub const MAX_ID_LEN: usize = 64;

/// Identifier of a diagnostic job.
///
/// Ids arrive from two places: the payment processor's correlation field
/// (historically an integer) and client-initiated creation. Both are kept as
/// text, restricted to `[A-Za-z0-9_-]` so the id can be embedded in an
/// artifact path and a download filename without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiagnosticId(String);

impl DiagnosticId {
    /// Parse and validate an identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        validate(&value)?;
        Ok(Self(value))
    }

    /// Create a fresh identifier for a client-initiated job.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate(value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::invalid_id("DiagnosticId: empty"));
    }
    if value.len() > MAX_ID_LEN {
        return Err(DomainError::invalid_id(format!(
            "DiagnosticId: longer than {MAX_ID_LEN} characters"
        )));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(DomainError::invalid_id(format!(
            "DiagnosticId: unexpected character {c:?}"
        )));
    }
    Ok(())
}

impl core::fmt::Display for DiagnosticId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DiagnosticId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for DiagnosticId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DiagnosticId> for String {
    fn from(value: DiagnosticId) -> Self {
        value.0
    }
}

impl From<u64> for DiagnosticId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}
