//! Payment webhook handling: verify, classify, schedule, acknowledge.
//!
//! The handler never waits for fulfillment. Once an event is verified the
//! caller gets an acknowledgement whatever happens to the job afterwards;
//! fulfillment results are only visible through the job's status.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{Instrument, error, info, info_span, warn};

use diagpro_core::DiagnosticId;
use diagpro_payments::{PaymentEvent, SignatureError, verify, verify_with_tolerance};

use crate::config::{ConfigError, DEFAULT_DEDUP_CAPACITY};
use crate::fulfillment::{FulfillmentOutcome, FulfillmentPipeline, FulfillmentRequest};

#[derive(Debug, Error)]
pub enum WebhookError {
    /// The signing secret is not configured; nothing can be verified.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("verification failed: {0}")]
    Verification(#[from] SignatureError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Fulfillment was scheduled.
    Accepted {
        event_id: String,
        diagnostic_id: DiagnosticId,
    },
    /// Event type does not trigger work.
    Ignored { event_id: String, event_type: String },
    /// Completed payment without a usable correlation id.
    Dropped { event_id: String, reason: String },
    /// Event id already scheduled once (only with dedup enabled).
    Duplicate { event_id: String },
}

/// Seam between the webhook and the background executor.
///
/// `schedule` must return without waiting for the work to finish.
pub trait FulfillmentScheduler: Send + Sync + 'static {
    fn schedule(&self, request: FulfillmentRequest);
}

/// Runs each fulfillment as a detached tokio task.
pub struct TokioScheduler {
    pipeline: Arc<FulfillmentPipeline>,
}

impl TokioScheduler {
    pub fn new(pipeline: Arc<FulfillmentPipeline>) -> Self {
        Self { pipeline }
    }
}

impl FulfillmentScheduler for TokioScheduler {
    fn schedule(&self, request: FulfillmentRequest) {
        let pipeline = self.pipeline.clone();
        let span = info_span!(
            "fulfillment",
            diagnostic_id = %request.diagnostic_id,
            event_id = %request.event_id
        );
        tokio::spawn(
            async move {
                match pipeline.fulfill(request).await {
                    Ok(FulfillmentOutcome::Ready { artifact_path }) => {
                        info!(%artifact_path, "fulfillment completed");
                    }
                    Ok(FulfillmentOutcome::Failed { reason }) => {
                        warn!(%reason, "fulfillment ended in failed");
                    }
                    Ok(FulfillmentOutcome::Skipped { status }) => {
                        info!(%status, "fulfillment skipped");
                    }
                    Err(err) => {
                        // The job may be parked in `processing`; the stale sweep recovers it.
                        error!(error = %err, "fulfillment aborted");
                    }
                }
            }
            .instrument(span),
        );
    }
}

/// Verification settings for inbound events.
#[derive(Debug)]
pub struct WebhookSettings {
    pub secret: Option<SecretString>,
    /// `None` disables the signed-timestamp age check.
    pub tolerance: Option<Duration>,
    /// Suppress re-scheduling for an event id already accepted by this process.
    pub dedup_events: bool,
    /// How many of the most recent event ids dedup remembers.
    pub dedup_capacity: usize,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            secret: None,
            tolerance: None,
            dedup_events: false,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
        }
    }
}

/// Insertion-ordered set of event ids; the oldest id is evicted once
/// `capacity` is reached.
#[derive(Debug)]
struct RecentEvents {
    capacity: usize,
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl RecentEvents {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            ids: HashSet::new(),
        }
    }

    /// Records `id`. Returns `false` if it is already remembered.
    fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        while self.order.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.ids.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(id.to_string());
        self.ids.insert(id.to_string());
        true
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.order.len()
    }
}

pub struct WebhookHandler {
    settings: WebhookSettings,
    scheduler: Arc<dyn FulfillmentScheduler>,
    seen_events: Mutex<RecentEvents>,
}

impl WebhookHandler {
    pub fn new(settings: WebhookSettings, scheduler: Arc<dyn FulfillmentScheduler>) -> Self {
        let seen_events = Mutex::new(RecentEvents::new(settings.dedup_capacity));
        Self {
            settings,
            scheduler,
            seen_events,
        }
    }

    fn verify(&self, raw_body: &[u8], header: Option<&str>) -> Result<PaymentEvent, WebhookError> {
        let secret = self
            .settings
            .secret
            .as_ref()
            .ok_or(ConfigError::Missing("WEBHOOK_SIGNING_SECRET"))?;
        let header = header.ok_or(SignatureError::MissingHeader)?;
        let event = match self.settings.tolerance {
            Some(tolerance) => {
                verify_with_tolerance(raw_body, header, secret.expose_secret(), Utc::now(), tolerance)?
            }
            None => verify(raw_body, header, secret.expose_secret())?,
        };
        Ok(event)
    }

    /// Returns `true` if `event_id` was not seen before (and records it).
    fn first_sighting(&self, event_id: &str) -> bool {
        if !self.settings.dedup_events {
            return true;
        }
        self.seen_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event_id)
    }

    #[cfg(test)]
    fn remembered_events(&self) -> usize {
        self.seen_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Handle one delivery. `raw_body` must be the exact bytes received.
    pub fn handle(&self, raw_body: &[u8], signature_header: Option<&str>) -> Result<WebhookOutcome, WebhookError> {
        let event = match self.verify(raw_body, signature_header) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "payment webhook rejected");
                return Err(err);
            }
        };
        let event_id = event.id.clone();

        let event_type = event.typed_event_type();
        if !event_type.is_payment_completed() {
            info!(%event_id, event_type = %event_type.as_str(), "payment event ignored");
            return Ok(WebhookOutcome::Ignored {
                event_id,
                event_type: event_type.as_str().to_string(),
            });
        }

        let session = match event.as_checkout_session() {
            Ok(session) => session,
            Err(e) => return Ok(self.drop_event(event_id, format!("undecodable checkout session: {e}"))),
        };
        let Some(correlation) = session.correlation_id() else {
            return Ok(self.drop_event(event_id, "missing client_reference_id".to_string()));
        };
        let diagnostic_id = match correlation.parse::<DiagnosticId>() {
            Ok(id) => id,
            Err(e) => return Ok(self.drop_event(event_id, e.to_string())),
        };

        if !self.first_sighting(&event_id) {
            info!(%event_id, %diagnostic_id, "duplicate payment event suppressed");
            return Ok(WebhookOutcome::Duplicate { event_id });
        }

        self.scheduler.schedule(FulfillmentRequest {
            diagnostic_id: diagnostic_id.clone(),
            payer_contact: session.payer_contact().map(str::to_string),
            event_id: event_id.clone(),
        });
        info!(%event_id, %diagnostic_id, "fulfillment scheduled");

        Ok(WebhookOutcome::Accepted {
            event_id,
            diagnostic_id,
        })
    }

    fn drop_event(&self, event_id: String, reason: String) -> WebhookOutcome {
        // Integration defect on the checkout side, not a runtime failure.
        warn!(%event_id, %reason, "completed payment without usable correlation id dropped");
        WebhookOutcome::Dropped { event_id, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diagpro_payments::sign;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    #[derive(Default)]
    struct Recording(Mutex<Vec<FulfillmentRequest>>);

    impl FulfillmentScheduler for Recording {
        fn schedule(&self, request: FulfillmentRequest) {
            self.0.lock().unwrap().push(request);
        }
    }

    impl Recording {
        fn calls(&self) -> Vec<FulfillmentRequest> {
            self.0.lock().unwrap().clone()
        }
    }

    fn handler(dedup: bool) -> (WebhookHandler, Arc<Recording>) {
        handler_with(WebhookSettings {
            secret: Some(SecretString::from(SECRET.to_string())),
            dedup_events: dedup,
            ..WebhookSettings::default()
        })
    }

    fn handler_with(settings: WebhookSettings) -> (WebhookHandler, Arc<Recording>) {
        let scheduler = Arc::new(Recording::default());
        let handler = WebhookHandler::new(settings, scheduler.clone());
        (handler, scheduler)
    }

    fn body(event_type: &str, object: serde_json::Value) -> Vec<u8> {
        body_with_id("evt_1", event_type, object)
    }

    fn body_with_id(event_id: &str, event_type: &str, object: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": event_id,
            "type": event_type,
            "created": 1_700_000_000,
            "livemode": false,
            "data": { "object": object }
        }))
        .unwrap()
    }

    fn signed(raw: &[u8]) -> String {
        sign(raw, SECRET, Utc::now().timestamp()).unwrap()
    }

    #[test]
    fn completed_payment_schedules_fulfillment() {
        let (h, calls) = handler(false);
        let raw = body(
            "checkout.session.completed",
            json!({ "id": "cs_1", "client_reference_id": "42", "customer_details": { "email": "p@example.com" } }),
        );
        let outcome = h.handle(&raw, Some(&signed(&raw))).unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Accepted {
                event_id: "evt_1".into(),
                diagnostic_id: "42".parse().unwrap()
            }
        );
        let calls = calls.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].payer_contact.as_deref(), Some("p@example.com"));
    }

    #[test]
    fn other_event_types_are_acknowledged_without_work() {
        let (h, calls) = handler(false);
        for event_type in ["checkout.session.expired", "invoice.paid", "charge.refunded"] {
            let raw = body(event_type, json!({ "id": "x", "client_reference_id": "42" }));
            let outcome = h.handle(&raw, Some(&signed(&raw))).unwrap();
            assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));
        }
        assert!(calls.calls().is_empty());
    }

    #[test]
    fn missing_or_invalid_correlation_is_dropped() {
        let (h, calls) = handler(false);
        for object in [
            json!({ "id": "cs_1" }),
            json!({ "id": "cs_1", "client_reference_id": "   " }),
            json!({ "id": "cs_1", "client_reference_id": "../../etc" }),
        ] {
            let raw = body("checkout.session.completed", object);
            let outcome = h.handle(&raw, Some(&signed(&raw))).unwrap();
            assert!(matches!(outcome, WebhookOutcome::Dropped { .. }));
        }
        assert!(calls.calls().is_empty());
    }

    #[test]
    fn bad_signature_is_rejected_without_side_effects() {
        let (h, calls) = handler(false);
        let raw = body("checkout.session.completed", json!({ "id": "cs", "client_reference_id": "42" }));
        let forged = sign(&raw, "whsec_wrong", Utc::now().timestamp()).unwrap();

        assert!(matches!(
            h.handle(&raw, Some(&forged)),
            Err(WebhookError::Verification(SignatureError::Mismatch))
        ));
        assert!(matches!(
            h.handle(&raw, None),
            Err(WebhookError::Verification(SignatureError::MissingHeader))
        ));
        assert!(calls.calls().is_empty());
    }

    #[test]
    fn missing_secret_is_a_configuration_error() {
        let scheduler = Arc::new(Recording::default());
        let h = WebhookHandler::new(WebhookSettings::default(), scheduler.clone());
        let raw = body("checkout.session.completed", json!({ "id": "cs", "client_reference_id": "42" }));
        assert!(matches!(
            h.handle(&raw, Some(&signed(&raw))),
            Err(WebhookError::Config(ConfigError::Missing("WEBHOOK_SIGNING_SECRET")))
        ));
        assert!(scheduler.calls().is_empty());
    }

    #[test]
    fn redelivery_reschedules_unless_dedup_enabled() {
        let raw = body("checkout.session.completed", json!({ "id": "cs", "client_reference_id": "42" }));

        let (h, calls) = handler(false);
        h.handle(&raw, Some(&signed(&raw))).unwrap();
        h.handle(&raw, Some(&signed(&raw))).unwrap();
        assert_eq!(calls.calls().len(), 2);

        let (h, calls) = handler(true);
        h.handle(&raw, Some(&signed(&raw))).unwrap();
        let second = h.handle(&raw, Some(&signed(&raw))).unwrap();
        assert_eq!(second, WebhookOutcome::Duplicate { event_id: "evt_1".into() });
        assert_eq!(calls.calls().len(), 1);
    }

    #[test]
    fn stale_timestamp_is_rejected_when_tolerance_set() {
        let (h, scheduler) = handler_with(WebhookSettings {
            secret: Some(SecretString::from(SECRET.to_string())),
            tolerance: Some(Duration::from_secs(300)),
            ..WebhookSettings::default()
        });
        let raw = body("checkout.session.completed", json!({ "id": "cs", "client_reference_id": "42" }));
        let old = sign(&raw, SECRET, Utc::now().timestamp() - 3600).unwrap();
        assert!(matches!(
            h.handle(&raw, Some(&old)),
            Err(WebhookError::Verification(SignatureError::TimestampOutsideTolerance { .. }))
        ));
        assert!(scheduler.calls().is_empty());
    }

    #[test]
    fn recent_events_evict_oldest_past_capacity() {
        let mut recent = RecentEvents::new(2);
        assert!(recent.insert("a"));
        assert!(recent.insert("b"));
        assert!(!recent.insert("a"));
        assert!(recent.insert("c"));
        assert_eq!(recent.len(), 2);
        // "a" was evicted, "b" and "c" are still remembered.
        assert!(!recent.insert("b"));
        assert!(!recent.insert("c"));
        assert!(recent.insert("a"));
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn dedup_memory_is_bounded() {
        let (h, calls) = handler_with(WebhookSettings {
            secret: Some(SecretString::from(SECRET.to_string())),
            dedup_events: true,
            dedup_capacity: 3,
            ..WebhookSettings::default()
        });
        let object = json!({ "id": "cs", "client_reference_id": "42" });

        for i in 0..50 {
            let raw = body_with_id(&format!("evt_{i}"), "checkout.session.completed", object.clone());
            h.handle(&raw, Some(&signed(&raw))).unwrap();
            assert!(h.remembered_events() <= 3);
        }
        assert_eq!(h.remembered_events(), 3);
        assert_eq!(calls.calls().len(), 50);

        // Recent ids are still suppressed; evicted ones are scheduled again.
        let recent = body_with_id("evt_49", "checkout.session.completed", object.clone());
        assert_eq!(
            h.handle(&recent, Some(&signed(&recent))).unwrap(),
            WebhookOutcome::Duplicate { event_id: "evt_49".into() }
        );
        let evicted = body_with_id("evt_0", "checkout.session.completed", object);
        assert!(matches!(
            h.handle(&evicted, Some(&signed(&evicted))).unwrap(),
            WebhookOutcome::Accepted { .. }
        ));
        assert_eq!(calls.calls().len(), 51);
    }
}
