use diagpro_core::DiagnosticInput;

use crate::result::AiError;

/// External analysis call: structured intake in, report text out.
///
/// Implementations report every failure as an `AiError`; they do not
/// substitute fallback text themselves (that is [`crate::Analyst`]'s job).
#[async_trait::async_trait]
pub trait AnalysisProvider: Send + Sync + 'static {
    /// Short identifier used in logs (e.g. model name).
    fn name(&self) -> &str;

    async fn analyze(&self, input: &DiagnosticInput) -> Result<String, AiError>;
}
