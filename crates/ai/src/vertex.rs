//! Vertex AI Gemini provider (`generateContent` REST endpoint).

use serde::{Deserialize, Serialize};
use serde_json::json;

use diagpro_core::DiagnosticInput;

use crate::prompt::build_prompt;
use crate::provider::AnalysisProvider;
use crate::result::AiError;

pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_output_tokens: 2048,
            top_p: 0.8,
            top_k: 40,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VertexConfig {
    pub project: Option<String>,
    pub location: String,
    pub model: String,
    /// OAuth bearer token. Without one the provider reports `NotConfigured`.
    pub access_token: Option<String>,
    /// Base URL override; defaults to `https://{location}-aiplatform.googleapis.com`.
    pub endpoint: Option<String>,
    pub generation: GenerationConfig,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            project: None,
            location: DEFAULT_LOCATION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            access_token: None,
            endpoint: None,
            generation: GenerationConfig::default(),
        }
    }
}

impl VertexConfig {
    /// Full `generateContent` URL for the configured project/location/model.
    pub fn generate_url(&self) -> Result<String, AiError> {
        let project = self
            .project
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(AiError::NotConfigured("GCP_PROJECT"))?;
        let base = match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        };
        Ok(format!(
            "{base}/v1/projects/{project}/locations/{}/publishers/google/models/{}:generateContent",
            self.location, self.model
        ))
    }
}

pub struct VertexGeminiProvider {
    client: reqwest::Client,
    config: VertexConfig,
}

impl VertexGeminiProvider {
    pub fn new(config: VertexConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

pub(crate) fn request_body(prompt: &str, generation: &GenerationConfig) -> serde_json::Value {
    json!({
        "contents": [
            { "role": "user", "parts": [ { "text": prompt } ] }
        ],
        "generationConfig": generation,
    })
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Concatenate the text parts of the first candidate.
pub(crate) fn extract_text(body: &[u8]) -> Result<String, AiError> {
    let parsed: GenerateResponse =
        serde_json::from_slice(body).map_err(|e| AiError::MalformedResponse(e.to_string()))?;

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AiError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait::async_trait]
impl AnalysisProvider for VertexGeminiProvider {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn analyze(&self, input: &DiagnosticInput) -> Result<String, AiError> {
        let url = self.config.generate_url()?;
        let token = self
            .config
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AiError::NotConfigured("VERTEX_ACCESS_TOKEN"))?;

        let body = request_body(&build_prompt(input), &self.config.generation);
        let res = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            return Err(AiError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).chars().take(512).collect(),
            });
        }

        extract_text(&bytes)
    }
}
