//! Payment event types.
//!
//! Only the fields the fulfillment path reads are modelled; everything else in
//! the processor's envelope is ignored on decode.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::signature::SignatureError;

/// Event types we recognise. Anything else is `Unknown` and acknowledged without work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentEventType {
    CheckoutSessionCompleted,
    CheckoutSessionExpired,
    CheckoutSessionAsyncPaymentFailed,
    Unknown(String),
}

impl FromStr for PaymentEventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "checkout.session.expired" => Self::CheckoutSessionExpired,
            "checkout.session.async_payment_failed" => Self::CheckoutSessionAsyncPaymentFailed,
            other => Self::Unknown(other.to_string()),
        })
    }
}

impl PaymentEventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CheckoutSessionExpired => "checkout.session.expired",
            Self::CheckoutSessionAsyncPaymentFailed => "checkout.session.async_payment_failed",
            Self::Unknown(s) => s,
        }
    }

    /// Whether this event type triggers fulfillment.
    pub fn is_payment_completed(&self) -> bool {
        matches!(self, Self::CheckoutSessionCompleted)
    }
}

/// Generic event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Unique identifier for the event; stable across redeliveries.
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp of event creation.
    #[serde(default)]
    pub created: i64,

    #[serde(default)]
    pub livemode: bool,

    pub data: EventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl PaymentEvent {
    /// Parse from raw JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        serde_json::from_slice(bytes).map_err(|e| SignatureError::InvalidPayload(e.to_string()))
    }

    pub fn typed_event_type(&self) -> PaymentEventType {
        match PaymentEventType::from_str(&self.event_type) {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }

    /// Decode `data.object` as a checkout session.
    pub fn as_checkout_session(&self) -> Result<CheckoutSession, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }
}

/// The checkout session object carried by `checkout.session.*` events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,

    /// Correlation field: the diagnostic id supplied when the session was created.
    #[serde(default)]
    pub client_reference_id: Option<String>,

    #[serde(default)]
    pub customer_email: Option<String>,

    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,

    #[serde(default)]
    pub payment_status: Option<String>,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl CheckoutSession {
    /// The correlation id, if present and non-blank.
    pub fn correlation_id(&self) -> Option<&str> {
        self.client_reference_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Best-known payer contact: the collected customer email, then the prefilled one.
    pub fn payer_contact(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(object: serde_json::Value, event_type: &str) -> PaymentEvent {
        serde_json::from_value(json!({
            "id": "evt_123",
            "type": event_type,
            "created": 1_700_000_000,
            "livemode": false,
            "pending_webhooks": 1,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn classifies_event_types() {
        let completed = event(json!({}), "checkout.session.completed");
        assert!(completed.typed_event_type().is_payment_completed());

        let other = event(json!({}), "invoice.paid");
        assert_eq!(other.typed_event_type(), PaymentEventType::Unknown("invoice.paid".into()));
        assert!(!other.typed_event_type().is_payment_completed());
        assert_eq!(other.typed_event_type().as_str(), "invoice.paid");
    }

    #[test]
    fn extracts_correlation_and_payer() {
        let e = event(
            json!({
                "id": "cs_1",
                "client_reference_id": " 42 ",
                "customer_email": "prefill@example.com",
                "customer_details": { "email": "payer@example.com" },
                "amount_total": 2999
            }),
            "checkout.session.completed",
        );
        let session = e.as_checkout_session().unwrap();
        assert_eq!(session.correlation_id(), Some("42"));
        assert_eq!(session.payer_contact(), Some("payer@example.com"));
    }

    #[test]
    fn missing_correlation_is_none() {
        let session: CheckoutSession =
            serde_json::from_value(json!({ "id": "cs_2", "client_reference_id": "" })).unwrap();
        assert_eq!(session.correlation_id(), None);
        assert_eq!(session.payer_contact(), None);
    }
}
