use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where the report text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Provider,
    Fallback,
}

/// Report text for one diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub text: String,
    pub source: AnalysisSource,
}

impl Analysis {
    pub fn from_provider(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: AnalysisSource::Provider,
        }
    }

    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: AnalysisSource::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == AnalysisSource::Fallback
    }
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("provider not configured: {0}")]
    NotConfigured(&'static str),

    #[error("provider unreachable: {0}")]
    Transport(String),

    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("provider returned no text")]
    EmptyResponse,
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Transport(err.to_string())
    }
}
