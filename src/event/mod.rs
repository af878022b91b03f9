//! Platform event adapters.
//!
//! Every invocation arrives as one JSON envelope. This module classifies the
//! envelope shape, normalizes it into a [`Request`](crate::request::Request)
//! (or one request per queue record), runs the dispatcher, and serializes the
//! result back into the shape the platform expects:
//!
//! - HTTP proxy events produce an HTTP response envelope
//!   (`statusCode`/`headers`/`body`/`isBase64Encoded`).
//! - Queue batches produce a partial-batch report
//!   (`batchItemFailures` listing the records that failed).
//! - Scheduled triggers produce an HTTP response envelope for the synthetic
//!   job route.
//!
//! Unrecognized payloads get a 400 envelope without touching any route.

mod http;
mod queue;
mod scheduled;

pub use http::HttpEventBuilder;

use serde_json::{json, Value};
use tracing::warn;

use crate::dispatcher::Dispatcher;
use crate::response::Response;

/// Envelope shape, decided before any route work happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventKind {
    Http,
    Queue,
    Scheduled,
    Unknown,
}

/// Classify a raw platform event by its envelope markers.
pub(crate) fn classify(event: &Value) -> EventKind {
    if event.get("Records").is_some_and(Value::is_array) {
        return EventKind::Queue;
    }
    if event.get("source").and_then(Value::as_str) == Some("aws.events") {
        return EventKind::Scheduled;
    }
    if event.get("httpMethod").is_some_and(Value::is_string) {
        return EventKind::Http;
    }
    EventKind::Unknown
}

/// Run one platform event through the pipeline and return the platform reply.
pub(crate) fn handle(dispatcher: &Dispatcher, event: Value) -> Value {
    match classify(&event) {
        EventKind::Http => http::handle(dispatcher, event),
        EventKind::Queue => queue::handle(dispatcher, event),
        EventKind::Scheduled => scheduled::handle(dispatcher, event),
        EventKind::Unknown => {
            warn!("Unrecognized event payload; returning 400");
            Response::json(400, json!({"detail": "Unrecognized event payload"})).to_envelope()
        }
    }
}
