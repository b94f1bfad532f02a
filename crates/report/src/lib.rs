//! `diagpro-report`
//!
//! **Responsibility:** turn report text into a PDF artifact.
//!
//! Layout (wrapping, pagination) is pure and independent of the encoder so it
//! can be tested without decoding PDF bytes.

pub mod error;
pub mod layout;
pub mod pdf;

pub use error::RenderError;
pub use layout::{Page, PlacedLine, layout};
pub use pdf::ReportRenderer;
