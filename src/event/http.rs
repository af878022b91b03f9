//! HTTP proxy event adapter.
//!
//! Accepts the gateway's v1 proxy shape: `httpMethod`, `path`,
//! `headers`/`multiValueHeaders`, `queryStringParameters`/
//! `multiValueQueryStringParameters`, `body` with `isBase64Encoded`, and
//! `requestContext.requestId`. Multi-value forms win over their single-value
//! twins when both are present.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::dispatcher::Dispatcher;
use crate::ids::InvocationId;
use crate::request::{parse_cookie_header, CaptureVec, FieldVec, QueryVec, Request};
use crate::response::Response;

pub(crate) fn handle(dispatcher: &Dispatcher, event: Value) -> Value {
    match build_request(event, &dispatcher.config) {
        Ok(request) => dispatcher.dispatch(&request).to_envelope(),
        Err(response) => response.to_envelope(),
    }
}

/// Normalize a proxy event into a [`Request`]. Returns a ready-to-serialize
/// error response when the envelope cannot be read as a request at all.
pub(crate) fn build_request(event: Value, config: &RuntimeConfig) -> Result<Request, Response> {
    let envelope = Arc::new(event);
    let evt = envelope.as_ref();

    let method_text = evt
        .get("httpMethod")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let Ok(method) = Method::from_bytes(method_text.as_bytes()) else {
        warn!(method = %method_text, "Unusable HTTP method in event");
        return Err(Response::json(
            400,
            json!({"detail": "Unsupported HTTP method"}),
        ));
    };

    let raw_path = evt.get("path").and_then(Value::as_str).unwrap_or("/");
    let path = config.strip_base(raw_path);

    let mut query = QueryVec::new();
    if let Some(multi) = evt
        .get("multiValueQueryStringParameters")
        .and_then(Value::as_object)
    {
        collect_multi(multi, &mut |name, value| {
            query.push((name.to_string(), value.to_string()));
        });
    } else if let Some(single) = evt.get("queryStringParameters").and_then(Value::as_object) {
        for (name, value) in single {
            if let Some(text) = value.as_str() {
                query.push((name.clone(), text.to_string()));
            }
        }
    }

    let mut headers = FieldVec::new();
    if let Some(multi) = evt.get("multiValueHeaders").and_then(Value::as_object) {
        collect_multi(multi, &mut |name, value| {
            headers.push((name.to_ascii_lowercase(), value.to_string()));
        });
    } else if let Some(single) = evt.get("headers").and_then(Value::as_object) {
        for (name, value) in single {
            if let Some(text) = value.as_str() {
                headers.push((name.to_ascii_lowercase(), text.to_string()));
            }
        }
    }

    let mut cookies = FieldVec::new();
    for (name, value) in &headers {
        if name == "cookie" {
            parse_cookie_header(value, &mut cookies);
        }
    }
    // Some gateways deliver cookies as a top-level array instead of a header.
    if let Some(items) = evt.get("cookies").and_then(Value::as_array) {
        for item in items {
            if let Some(text) = item.as_str() {
                parse_cookie_header(text, &mut cookies);
            }
        }
    }

    let mut body = evt
        .get("body")
        .and_then(Value::as_str)
        .map(str::to_string);
    let encoded = evt
        .get("isBase64Encoded")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if encoded {
        if let Some(raw) = body.take() {
            match BASE64.decode(raw.trim()) {
                Ok(bytes) => body = Some(String::from_utf8_lossy(&bytes).into_owned()),
                Err(err) => {
                    warn!(error = %err, "Base64 body decode failed; keeping raw body");
                    body = Some(raw);
                }
            }
        }
    }

    let invocation_id = InvocationId::from_platform_or_new(
        evt.pointer("/requestContext/requestId")
            .and_then(Value::as_str),
    );

    debug!(
        invocation_id = %invocation_id,
        method = %method,
        path = %path,
        query_count = query.len(),
        header_count = headers.len(),
        "HTTP event normalized"
    );

    Ok(Request {
        invocation_id,
        method,
        path,
        path_params: CaptureVec::new(),
        query,
        headers,
        cookies,
        body,
        envelope,
    })
}

/// Walk a multi-value map where each value is either an array of strings or a
/// bare string, visiting every (name, value) occurrence in order.
fn collect_multi(map: &Map<String, Value>, visit: &mut dyn FnMut(&str, &str)) {
    for (name, entry) in map {
        match entry {
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = item.as_str() {
                        visit(name, text);
                    }
                }
            }
            Value::String(text) => visit(name, text),
            _ => {}
        }
    }
}

/// Builds gateway-style proxy events for tests and local harnesses.
///
/// ```
/// use portico::HttpEventBuilder;
/// use serde_json::json;
///
/// let event = HttpEventBuilder::post("/pets?verbose=1")
///     .header("x-api-key", "secret")
///     .json(&json!({"name": "rex"}))
///     .build();
/// assert_eq!(event["httpMethod"], "POST");
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct HttpEventBuilder {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<String>,
    base64: bool,
    request_id: Option<String>,
}

impl HttpEventBuilder {
    /// Start from a method and a `path?query` string. Query pairs are
    /// percent-decoded the way the gateway decodes them before delivery.
    pub fn new(method: Method, path_and_query: &str) -> Self {
        let (path, query_text) = match path_and_query.split_once('?') {
            Some((path, rest)) => (path, rest),
            None => (path_and_query, ""),
        };
        let query = url::form_urlencoded::parse(query_text.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        HttpEventBuilder {
            method,
            path: path.to_string(),
            query,
            headers: Vec::new(),
            body: None,
            base64: false,
            request_id: None,
        }
    }

    pub fn get(path_and_query: &str) -> Self {
        Self::new(Method::GET, path_and_query)
    }

    pub fn post(path_and_query: &str) -> Self {
        Self::new(Method::POST, path_and_query)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query_pair(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// JSON body; sets `content-type: application/json` unless one is set.
    pub fn json(mut self, body: &Value) -> Self {
        self.body = Some(body.to_string());
        if !self.has_header("content-type") {
            self.headers
                .push(("content-type".to_string(), "application/json".to_string()));
        }
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Binary body, carried base64-encoded with `isBase64Encoded: true`.
    pub fn body_base64(mut self, bytes: &[u8]) -> Self {
        self.body = Some(BASE64.encode(bytes));
        self.base64 = true;
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn build(self) -> Value {
        let mut multi_query = Map::new();
        for (name, value) in self.query {
            push_multi(&mut multi_query, name, value);
        }
        let mut multi_headers = Map::new();
        for (name, value) in self.headers {
            push_multi(&mut multi_headers, name, value);
        }
        json!({
            "httpMethod": self.method.as_str(),
            "path": self.path,
            "multiValueQueryStringParameters": Value::Object(multi_query),
            "multiValueHeaders": Value::Object(multi_headers),
            "body": self.body,
            "isBase64Encoded": self.base64,
            "requestContext": {"requestId": self.request_id},
        })
    }
}

fn push_multi(map: &mut Map<String, Value>, name: String, value: String) {
    let entry = map.entry(name).or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(items) = entry {
        items.push(Value::String(value));
    }
}
