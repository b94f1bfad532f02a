//! `diagpro-payments`: inbound payment-processor events.
//!
//! Verification always runs on the **raw** request body: re-serialising JSON
//! before computing the signature changes the bytes and breaks the match.
//!
//! ```text
//! raw body + signature header + secret ──▶ verify ──▶ PaymentEvent
//!                                            │
//!                                            └──▶ SignatureError (fail closed)
//! ```

pub mod events;
pub mod signature;

pub use events::{CheckoutSession, CustomerDetails, EventData, PaymentEvent, PaymentEventType};
pub use signature::{SIGNATURE_HEADER, SignatureError, sign, verify, verify_with_tolerance};
