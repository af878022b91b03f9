//! Shared fixtures for the integration suite.

use portico::{handler_fn, SharedHandler};
use serde_json::Value;

/// Handler replying with every bound argument echoed as the JSON body.
pub fn echo_args() -> SharedHandler {
    handler_fn(|_req, args| Ok(Value::Object(args.0).into()))
}

/// Handler replying with a fixed marker value.
pub fn fixed(value: Value) -> SharedHandler {
    handler_fn(move |_req, _args| Ok(value.clone().into()))
}

/// Parse an HTTP envelope's body string back into JSON.
pub fn body_json(envelope: &Value) -> Value {
    let raw = envelope["body"].as_str().expect("envelope body is a string");
    serde_json::from_str(raw).expect("envelope body is JSON")
}
