use std::sync::Arc;

use tracing::{info, warn};

use diagpro_core::DiagnosticInput;

use crate::fallback::fallback_report;
use crate::provider::AnalysisProvider;
use crate::result::Analysis;

/// Wraps a provider and guarantees text comes back.
///
/// Any provider error is logged and replaced with [`fallback_report`]; the
/// error never reaches the caller.
#[derive(Clone)]
pub struct Analyst {
    provider: Arc<dyn AnalysisProvider>,
}

impl Analyst {
    pub fn new(provider: Arc<dyn AnalysisProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn analyze(&self, input: &DiagnosticInput) -> Analysis {
        match self.provider.analyze(input).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(provider = %self.provider.name(), chars = text.len(), "analysis completed");
                Analysis::from_provider(text)
            }
            Ok(_) => {
                warn!(provider = %self.provider.name(), "provider returned blank text, using fallback");
                Analysis::fallback(fallback_report(input))
            }
            Err(err) => {
                warn!(provider = %self.provider.name(), error = %err, "analysis failed, using fallback");
                Analysis::fallback(fallback_report(input))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{AiError, AnalysisSource};

    struct Fixed(&'static str);

    #[async_trait::async_trait]
    impl AnalysisProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn analyze(&self, _input: &DiagnosticInput) -> Result<String, AiError> {
            Ok(self.0.to_string())
        }
    }

    struct Down;

    #[async_trait::async_trait]
    impl AnalysisProvider for Down {
        fn name(&self) -> &str {
            "down"
        }

        async fn analyze(&self, _input: &DiagnosticInput) -> Result<String, AiError> {
            Err(AiError::Http {
                status: 503,
                body: "backend unavailable".into(),
            })
        }
    }

    fn input() -> DiagnosticInput {
        DiagnosticInput {
            equipment_type: Some("Excavator".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn provider_text_passes_through() {
        let analyst = Analyst::new(Arc::new(Fixed("All good.")));
        let analysis = analyst.analyze(&input()).await;
        assert_eq!(analysis.text, "All good.");
        assert_eq!(analysis.source, AnalysisSource::Provider);
    }

    #[tokio::test]
    async fn provider_error_becomes_fallback() {
        let analyst = Analyst::new(Arc::new(Down));
        let analysis = analyst.analyze(&input()).await;
        assert!(analysis.is_fallback());
        assert_eq!(analysis.text, fallback_report(&input()));
        assert!(!analysis.text.contains("backend unavailable"));
    }

    #[tokio::test]
    async fn blank_text_becomes_fallback() {
        let analyst = Analyst::new(Arc::new(Fixed("   ")));
        assert!(analyst.analyze(&input()).await.is_fallback());
    }
}
