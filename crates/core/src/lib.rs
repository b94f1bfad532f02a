//! `diagpro-core`: diagnostic job model and status state machine.
//!
//! This crate is **pure domain**: no IO, no clocks other than the timestamps
//! callers pass in, no knowledge of payment processors or storage backends.

pub mod diagnostic;
pub mod error;
pub mod id;
pub mod input;
pub mod status;

pub use diagnostic::{Diagnostic, DiagnosticUpdate, REPORT_CONTENT_TYPE, artifact_path_for};
pub use error::DomainError;
pub use id::DiagnosticId;
pub use input::DiagnosticInput;
pub use status::DiagnosticStatus;
