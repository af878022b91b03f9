//! Queue batch event adapter.
//!
//! Each record in the batch runs the full pipeline independently against the
//! synthetic route `POST /queue_/{queue-name}`, so per-message validation and
//! handler errors never block the rest of the batch. The reply lists the
//! failed message ids in the platform's partial-batch shape:
//! `{"batchItemFailures": [{"itemIdentifier": id}, ...]}`.

use http::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::dispatcher::Dispatcher;
use crate::ids::InvocationId;
use crate::request::{CaptureVec, FieldVec, QueryVec, Request};

pub(crate) fn handle(dispatcher: &Dispatcher, event: Value) -> Value {
    let envelope = Arc::new(event);
    let records: &[Value] = envelope
        .get("Records")
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice);

    let mut failures: Vec<Value> = Vec::new();
    for record in records {
        let message_id = record.get("messageId").and_then(Value::as_str);
        let Some(queue) = record
            .get("eventSourceARN")
            .and_then(Value::as_str)
            .map(queue_name)
        else {
            warn!(message_id = ?message_id, "Queue record without eventSourceARN");
            report_failure(&mut failures, message_id);
            continue;
        };

        let request = Request {
            invocation_id: InvocationId::from_platform_or_new(message_id),
            method: Method::POST,
            path: format!("/queue_/{queue}"),
            path_params: CaptureVec::new(),
            query: QueryVec::new(),
            headers: FieldVec::new(),
            cookies: FieldVec::new(),
            body: record.get("body").and_then(Value::as_str).map(str::to_string),
            envelope: Arc::clone(&envelope),
        };

        let response = dispatcher.dispatch(&request);
        if response.status >= 400 {
            warn!(
                queue = %queue,
                message_id = ?message_id,
                status = response.status,
                "Queue record failed"
            );
            report_failure(&mut failures, message_id);
        } else {
            debug!(queue = %queue, message_id = ?message_id, "Queue record processed");
        }
    }

    json!({ "batchItemFailures": failures })
}

fn report_failure(failures: &mut Vec<Value>, message_id: Option<&str>) {
    match message_id {
        Some(id) => failures.push(json!({ "itemIdentifier": id })),
        // Without an id the platform cannot retry just this record.
        None => warn!("Failed queue record has no messageId; not reportable"),
    }
}

/// Queue name from an ARN: everything after the last colon.
fn queue_name(arn: &str) -> &str {
    arn.rsplit(':').next().unwrap_or(arn)
}
