//! HMAC-signed artifact URLs.
//!
//! A URL grants `GET` on exactly one object until its expiry, with the
//! response content type and disposition pinned by the signature:
//!
//! ```text
//! {base}/artifacts/{bucket}/{path}?expires=<unix>
//!     &response-content-disposition=<disposition>
//!     &response-content-type=<mime>
//!     &signature=<hex hmac-sha256>
//! ```
//!
//! The MAC covers `GET\n{bucket}\n{path}\n{expires}\n{content_type}\n{disposition}`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const METHOD: &str = "GET";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignedUrlError {
    #[error("url signing key is empty")]
    EmptyKey,

    #[error("base url cannot carry a path")]
    InvalidBase,

    #[error("signed url has expired")]
    Expired,

    #[error("signature does not match")]
    BadSignature,

    #[error("malformed signed url: {0}")]
    Malformed(String),
}

/// A signed URL and the instant it stops working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Query parameters carried by a signed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    #[serde(rename = "response-content-disposition")]
    pub content_disposition: String,
    #[serde(rename = "response-content-type")]
    pub content_type: String,
    pub signature: String,
}

#[derive(Debug)]
pub struct UrlSigner {
    key: SecretString,
    base_url: Url,
}

impl UrlSigner {
    pub fn new(key: SecretString, base_url: Url) -> Result<Self, SignedUrlError> {
        if key.expose_secret().is_empty() {
            return Err(SignedUrlError::EmptyKey);
        }
        if base_url.cannot_be_a_base() {
            return Err(SignedUrlError::InvalidBase);
        }
        Ok(Self { key, base_url })
    }

    fn mac(
        &self,
        bucket: &str,
        path: &str,
        expires: i64,
        content_type: &str,
        disposition: &str,
    ) -> Result<HmacSha256, SignedUrlError> {
        for part in [bucket, path, content_type, disposition] {
            if part.contains('\n') {
                return Err(SignedUrlError::Malformed("newline in signed component".into()));
            }
        }
        let mut mac = HmacSha256::new_from_slice(self.key.expose_secret().as_bytes())
            .map_err(|_| SignedUrlError::EmptyKey)?;
        mac.update(
            format!("{METHOD}\n{bucket}\n{path}\n{expires}\n{content_type}\n{disposition}")
                .as_bytes(),
        );
        Ok(mac)
    }

    pub fn sign(
        &self,
        bucket: &str,
        path: &str,
        expires_at: DateTime<Utc>,
        content_type: &str,
        disposition: &str,
    ) -> Result<SignedUrl, SignedUrlError> {
        let expires = expires_at.timestamp();
        let signature = hex::encode(
            self.mac(bucket, path, expires, content_type, disposition)?
                .finalize()
                .into_bytes(),
        );

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SignedUrlError::InvalidBase)?
            .pop_if_empty()
            .push("artifacts")
            .push(bucket)
            .extend(path.split('/'));
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("response-content-disposition", disposition)
            .append_pair("response-content-type", content_type)
            .append_pair("signature", &signature);

        // Second precision, matching what the URL carries.
        let expires_at = DateTime::from_timestamp(expires, 0).unwrap_or(expires_at);
        Ok(SignedUrl {
            url: url.into(),
            expires_at,
        })
    }

    /// Check a presented URL. The signature is checked before the expiry so a
    /// forged URL never learns whether its timestamp was acceptable.
    pub fn verify(
        &self,
        bucket: &str,
        path: &str,
        query: &SignedQuery,
        now: DateTime<Utc>,
    ) -> Result<(), SignedUrlError> {
        let presented = hex::decode(&query.signature).map_err(|_| SignedUrlError::BadSignature)?;
        self.mac(
            bucket,
            path,
            query.expires,
            &query.content_type,
            &query.content_disposition,
        )?
        .verify_slice(&presented)
        .map_err(|_| SignedUrlError::BadSignature)?;

        if now.timestamp() >= query.expires {
            return Err(SignedUrlError::Expired);
        }
        Ok(())
    }
}
