//! HTTP API: payment webhook intake, job reads, and report delivery.

pub mod app;
