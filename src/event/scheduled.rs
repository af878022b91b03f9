//! Scheduled trigger adapter.
//!
//! A scheduler event (`source == "aws.events"`) names the firing rule in
//! `resources[0]`; the trailing ARN segment is the job name, dispatched
//! against the synthetic route `POST /job_/{job-name}` with no body.

use http::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::dispatcher::Dispatcher;
use crate::ids::InvocationId;
use crate::request::{CaptureVec, FieldVec, QueryVec, Request};
use crate::response::Response;

pub(crate) fn handle(dispatcher: &Dispatcher, event: Value) -> Value {
    let envelope = Arc::new(event);
    let Some(job) = envelope
        .get("resources")
        .and_then(Value::as_array)
        .and_then(|resources| resources.first())
        .and_then(Value::as_str)
        .map(job_name)
    else {
        warn!("Scheduled event names no resource");
        return Response::json(400, json!({"detail": "Scheduled event names no resource"}))
            .to_envelope();
    };

    let request = Request {
        invocation_id: InvocationId::from_platform_or_new(
            envelope.get("id").and_then(Value::as_str),
        ),
        method: Method::POST,
        path: format!("/job_/{job}"),
        path_params: CaptureVec::new(),
        query: QueryVec::new(),
        headers: FieldVec::new(),
        cookies: FieldVec::new(),
        body: None,
        envelope: Arc::clone(&envelope),
    };

    debug!(job = %job, "Scheduled trigger dispatching");
    dispatcher.dispatch(&request).to_envelope()
}

/// Job name from a rule ARN: the segment after the last `/` or `:`.
fn job_name(resource: &str) -> &str {
    resource.rsplit(['/', ':']).next().unwrap_or(resource)
}
