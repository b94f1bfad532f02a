//! HMAC-SHA256 webhook signature verification.
//!
//! Header format: `t=<unix seconds>,v1=<hex digest>[,v1=<hex digest>...]`.
//! The signed payload is `"{t}.{raw body}"`. Several `v1` entries may be
//! present while a secret is being rolled; any one of them matching accepts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::events::PaymentEvent;

type HmacSha256 = Hmac<Sha256>;

/// Name of the HTTP header that carries the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

const SCHEME: &str = "v1";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,

    #[error("malformed signature header: {0}")]
    MalformedHeader(String),

    #[error("no v1 signatures in header")]
    NoSignatures,

    #[error("signature does not match payload")]
    Mismatch,

    #[error("timestamp outside tolerance ({age_secs}s old)")]
    TimestampOutsideTolerance { age_secs: i64 },

    #[error("empty signing secret")]
    EmptySecret,

    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug)]
struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<ParsedHeader, SignatureError> {
    let header = header.trim();
    if header.is_empty() {
        return Err(SignatureError::MissingHeader);
    }

    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or_else(|| SignatureError::MalformedHeader(format!("segment without '=': {part}")))?;

        match key {
            "t" => {
                let t = value
                    .parse::<i64>()
                    .map_err(|_| SignatureError::MalformedHeader("timestamp is not an integer".into()))?;
                timestamp = Some(t);
            }
            SCHEME => {
                // Undecodable entries cannot match; skip rather than reject so a
                // garbled extra entry does not mask a valid one.
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| SignatureError::MalformedHeader("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(SignatureError::NoSignatures);
    }

    Ok(ParsedHeader {
        timestamp,
        signatures,
    })
}

fn mac_for(raw_body: &[u8], secret: &str, timestamp: i64) -> Result<HmacSha256, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::EmptySecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    Ok(mac)
}

fn check(raw_body: &[u8], parsed: &ParsedHeader, secret: &str) -> Result<(), SignatureError> {
    let mac = mac_for(raw_body, secret, parsed.timestamp)?;
    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok());
    if matched { Ok(()) } else { Err(SignatureError::Mismatch) }
}

/// Verify `raw_body` against `header` and decode the event.
///
/// A pure function of its three inputs: no clock, no IO.
pub fn verify(raw_body: &[u8], header: &str, secret: &str) -> Result<PaymentEvent, SignatureError> {
    let parsed = parse_header(header)?;
    check(raw_body, &parsed, secret)?;
    PaymentEvent::from_bytes(raw_body)
}

/// [`verify`] plus a bound on how old the signed timestamp may be.
pub fn verify_with_tolerance(
    raw_body: &[u8],
    header: &str,
    secret: &str,
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Result<PaymentEvent, SignatureError> {
    let parsed = parse_header(header)?;
    check(raw_body, &parsed, secret)?;

    // An age that does not fit in i64 is outside any tolerance.
    match now.timestamp().checked_sub(parsed.timestamp) {
        Some(age_secs) if age_secs.unsigned_abs() <= tolerance.as_secs() => {}
        age_secs => {
            return Err(SignatureError::TimestampOutsideTolerance {
                age_secs: age_secs.unwrap_or(i64::MAX),
            });
        }
    }

    PaymentEvent::from_bytes(raw_body)
}

/// Produce a header value that [`verify`] accepts for `raw_body`.
pub fn sign(raw_body: &[u8], secret: &str, timestamp: i64) -> Result<String, SignatureError> {
    let mac = mac_for(raw_body, secret, timestamp)?;
    let digest = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={timestamp},{SCHEME}={digest}"))
}
