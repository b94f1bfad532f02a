//! `diagpro-ai`
//!
//! **Responsibility:** turn a diagnostic intake into report text.
//!
//! Providers return `Result<String, AiError>`. The [`Analyst`] boundary is the
//! only place errors are converted into the deterministic fallback report, so
//! callers always receive text.

pub mod analyst;
pub mod fallback;
pub mod prompt;
pub mod provider;
pub mod result;
pub mod vertex;

pub use analyst::Analyst;
pub use fallback::fallback_report;
pub use prompt::build_prompt;
pub use provider::AnalysisProvider;
pub use result::{AiError, Analysis, AnalysisSource};
pub use vertex::{VertexConfig, VertexGeminiProvider};
