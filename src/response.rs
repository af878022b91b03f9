//! Response type and its HTTP envelope serialization.

use base64::Engine as _;
use serde_json::{json, Map, Value};

/// Response payload variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Text(String),
    Binary(Vec<u8>),
}

/// Ordered response headers with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Headers(Vec::new())
    }

    /// Set a header, replacing any existing occurrences of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.0.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.0.push((name, value.into()));
    }

    /// Add a header without touching existing occurrences.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Headers(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Body,
}

impl Response {
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Response {
            status,
            headers: Headers::new(),
            body: Body::Json(body),
        }
    }

    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Response {
            status,
            headers: Headers::new(),
            body: Body::Text(body.into()),
        }
    }

    #[must_use]
    pub fn empty(status: u16) -> Self {
        Response {
            status,
            headers: Headers::new(),
            body: Body::Empty,
        }
    }

    /// Binary payload; serialized base64 in the envelope.
    #[must_use]
    pub fn binary(status: u16, bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.set("content-type", content_type);
        Response {
            status,
            headers,
            body: Body::Binary(bytes),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Serialize into the proxy-integration envelope the platform expects.
    ///
    /// Statuses that forbid a payload (informational, 204, 304) always
    /// serialize with a null body, whatever the response carries.
    #[must_use]
    pub fn to_envelope(&self) -> Value {
        let mut headers = self.headers.clone();
        let mut base64_encoded = false;

        let body = if !body_allowed_for_status(self.status) {
            Value::Null
        } else {
            match &self.body {
                Body::Empty => Value::Null,
                Body::Json(value) => {
                    if !headers.contains("content-type") {
                        headers.set("content-type", "application/json");
                    }
                    Value::String(value.to_string())
                }
                Body::Text(text) => {
                    if !headers.contains("content-type") {
                        headers.set("content-type", "text/plain; charset=utf-8");
                    }
                    Value::String(text.clone())
                }
                Body::Binary(bytes) => {
                    if !headers.contains("content-type") {
                        headers.set("content-type", "application/octet-stream");
                    }
                    base64_encoded = true;
                    Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
                }
            }
        };

        let mut header_map = Map::new();
        for (name, value) in headers.iter() {
            header_map.insert(name.to_string(), Value::String(value.to_string()));
        }

        json!({
            "statusCode": self.status,
            "headers": Value::Object(header_map),
            "body": body,
            "isBase64Encoded": base64_encoded,
        })
    }
}

/// Whether an HTTP status permits a response payload.
#[must_use]
pub fn body_allowed_for_status(status: u16) -> bool {
    status >= 200 && status != 204 && status != 304
}
