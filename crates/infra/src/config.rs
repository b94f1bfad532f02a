//! Process configuration, read once from the environment at startup.
//!
//! Settings for external collaborators are optional at load time. A missing
//! value fails only the operation that needs it, via [`ConfigError::Missing`].
//!
//! Recognised variables:
//! - `BIND_ADDR` (default `0.0.0.0:8080`)
//! - `PUBLIC_BASE_URL` (default `http://localhost:8080`)
//! - `WEBHOOK_SIGNING_SECRET`, `WEBHOOK_TOLERANCE_SECS`, `WEBHOOK_DEDUP_EVENTS`,
//!   `WEBHOOK_DEDUP_CAPACITY` (default 10000)
//! - `REPORTS_BUCKET`, `URL_SIGNING_KEY`, `SIGNED_URL_TTL_MINUTES` (default 15)
//! - `ARTIFACT_DIR`, `DATABASE_URL`
//! - `GCP_PROJECT`, `VERTEX_LOCATION`, `VERTEX_MODEL`, `VERTEX_ACCESS_TOKEN`,
//!   `VERTEX_ENDPOINT` (base URL override)
//! - `STALE_PROCESSING_MINUTES`

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use diagpro_ai::vertex::{DEFAULT_LOCATION, DEFAULT_MODEL};
use diagpro_ai::VertexConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_SIGNED_URL_TTL_MINUTES: i64 = 15;
pub const DEFAULT_DEDUP_CAPACITY: usize = 10_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not configured")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl ToString) -> Self {
        Self::Invalid {
            var,
            reason: reason.to_string(),
        }
    }
}

/// Everything the service needs to wire its components.
#[derive(Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub public_base_url: Url,
    pub webhook_secret: Option<SecretString>,
    /// `None` disables the signed-timestamp age check.
    pub webhook_tolerance: Option<Duration>,
    pub webhook_dedup_events: bool,
    /// Most recent event ids remembered for dedup.
    pub webhook_dedup_capacity: usize,
    pub reports_bucket: Option<String>,
    pub url_signing_key: Option<SecretString>,
    pub signed_url_ttl: chrono::Duration,
    /// `None` keeps artifacts in memory.
    pub artifact_dir: Option<PathBuf>,
    /// `None` keeps jobs in memory.
    pub database_url: Option<SecretString>,
    pub vertex: VertexConfig,
    /// `None` disables the stale-processing sweep.
    pub stale_processing_after: Option<chrono::Duration>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("BIND_ADDR", e))?;

        let public_base_url = Url::parse(
            &get("PUBLIC_BASE_URL").unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string()),
        )
        .map_err(|e| ConfigError::invalid("PUBLIC_BASE_URL", e))?;
        if public_base_url.cannot_be_a_base() {
            return Err(ConfigError::invalid("PUBLIC_BASE_URL", "not a base URL"));
        }

        let webhook_tolerance = get("WEBHOOK_TOLERANCE_SECS")
            .map(|v| parse_u64("WEBHOOK_TOLERANCE_SECS", &v))
            .transpose()?
            .map(Duration::from_secs);

        let webhook_dedup_events = get("WEBHOOK_DEDUP_EVENTS")
            .map(|v| parse_bool("WEBHOOK_DEDUP_EVENTS", &v))
            .transpose()?
            .unwrap_or(false);

        let webhook_dedup_capacity = get("WEBHOOK_DEDUP_CAPACITY")
            .map(|v| parse_u64("WEBHOOK_DEDUP_CAPACITY", &v))
            .transpose()?
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .unwrap_or(DEFAULT_DEDUP_CAPACITY);
        if webhook_dedup_capacity == 0 {
            return Err(ConfigError::invalid("WEBHOOK_DEDUP_CAPACITY", "must be at least 1"));
        }

        let ttl_minutes = get("SIGNED_URL_TTL_MINUTES")
            .map(|v| parse_positive_minutes("SIGNED_URL_TTL_MINUTES", &v))
            .transpose()?
            .unwrap_or(DEFAULT_SIGNED_URL_TTL_MINUTES);

        let stale_processing_after = get("STALE_PROCESSING_MINUTES")
            .map(|v| parse_positive_minutes("STALE_PROCESSING_MINUTES", &v))
            .transpose()?
            .map(chrono::Duration::minutes);

        let vertex = VertexConfig {
            project: get("GCP_PROJECT"),
            location: get("VERTEX_LOCATION").unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            model: get("VERTEX_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            access_token: get("VERTEX_ACCESS_TOKEN"),
            endpoint: get("VERTEX_ENDPOINT"),
            ..VertexConfig::default()
        };

        Ok(Self {
            bind_addr,
            public_base_url,
            webhook_secret: get("WEBHOOK_SIGNING_SECRET").map(SecretString::from),
            webhook_tolerance,
            webhook_dedup_events,
            webhook_dedup_capacity,
            reports_bucket: get("REPORTS_BUCKET"),
            url_signing_key: get("URL_SIGNING_KEY").map(SecretString::from),
            signed_url_ttl: chrono::Duration::minutes(ttl_minutes),
            artifact_dir: get("ARTIFACT_DIR").map(PathBuf::from),
            database_url: get("DATABASE_URL").map(SecretString::from),
            vertex,
            stale_processing_after,
        })
    }
}

fn parse_u64(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|e| ConfigError::invalid(var, e))
}

fn parse_positive_minutes(var: &'static str, value: &str) -> Result<i64, ConfigError> {
    let minutes = value.parse::<i64>().map_err(|e| ConfigError::invalid(var, e))?;
    // chrono panics on durations beyond ~i64::MAX milliseconds.
    if !(1..=525_600).contains(&minutes) {
        return Err(ConfigError::invalid(var, "must be between 1 and 525600 minutes"));
    }
    Ok(minutes)
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(var, format!("expected a boolean, got {other:?}"))),
    }
}
