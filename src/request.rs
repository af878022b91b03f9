//! Normalized request passed through the dispatch pipeline.
//!
//! Event adapters build exactly one [`Request`] per invocation, whatever the
//! triggering platform event looked like. Everything downstream (middleware,
//! binding, handlers) reads this shape and never the raw envelope, except
//! through the deliberate [`Request::envelope`] escape hatch.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use serde_json::Value;
use smallvec::SmallVec;

use crate::ids::InvocationId;

/// Maximum inline path captures before spilling to the heap.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum inline headers/cookies before spilling to the heap.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Converter-typed path captures. Names are `Arc<str>` because they are
/// shared with the compiled route and cloned per invocation.
pub type CaptureVec = SmallVec<[(Arc<str>, Value); MAX_INLINE_PARAMS]>;

/// Multi-value query pairs in wire order.
pub type QueryVec = SmallVec<[(String, String); MAX_INLINE_PARAMS]>;

/// Multi-value header or cookie pairs. Header names are stored lowercase.
pub type FieldVec = SmallVec<[(String, String); MAX_INLINE_HEADERS]>;

#[derive(Debug, Clone)]
pub struct Request {
    /// Correlation id for tracing, carried into every log line.
    pub invocation_id: InvocationId,
    pub method: Method,
    /// Normalized path, leading slash, base path already stripped.
    pub path: String,
    /// Captures from the matched template, typed by their converters.
    pub path_params: CaptureVec,
    /// Query pairs; a repeated key appears once per occurrence.
    pub query: QueryVec,
    /// Headers with lowercase names; a repeated header appears once per value.
    pub headers: FieldVec,
    /// Pairs parsed from the Cookie header(s).
    pub cookies: FieldVec,
    /// Raw body text, already base64-decoded when the envelope flagged it.
    pub body: Option<String>,
    /// The untouched platform event.
    pub envelope: Arc<Value>,
}

impl Request {
    #[inline]
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&Value> {
        self.path_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// First occurrence of a query key.
    #[inline]
    #[must_use]
    pub fn query_first(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every occurrence of a query key, in wire order.
    #[must_use]
    pub fn query_all(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// First occurrence of a header (case-insensitive).
    #[inline]
    #[must_use]
    pub fn header_first(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every occurrence of a header, in wire order.
    #[must_use]
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path params as a map. Allocates; prefer [`Request::path_param`] in the
    /// dispatch path.
    #[must_use]
    pub fn path_params_map(&self) -> HashMap<String, Value> {
        self.path_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// The raw envelope for handlers that opt into it.
    #[must_use]
    pub fn envelope(&self) -> &Value {
        &self.envelope
    }
}

/// Split a `Cookie` header value into pairs. Malformed fragments without an
/// `=` are skipped rather than rejected.
pub(crate) fn parse_cookie_header(raw: &str, out: &mut FieldVec) {
    for piece in raw.split(';') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if let Some((name, value)) = piece.split_once('=') {
            out.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Request {
        let mut headers = FieldVec::new();
        headers.push(("x-tag".to_string(), "a".to_string()));
        headers.push(("x-tag".to_string(), "b".to_string()));
        let mut query = QueryVec::new();
        query.push(("id".to_string(), "1".to_string()));
        query.push(("id".to_string(), "2".to_string()));
        let mut captures = CaptureVec::new();
        captures.push((Arc::from("pet_id"), json!(7)));
        Request {
            invocation_id: InvocationId::new(),
            method: Method::GET,
            path: "/pets/7".to_string(),
            path_params: captures,
            query,
            headers,
            cookies: FieldVec::new(),
            body: None,
            envelope: Arc::new(Value::Null),
        }
    }

    #[test]
    fn test_query_first_takes_first_occurrence() {
        let req = sample();
        assert_eq!(req.query_first("id"), Some("1"));
        assert_eq!(req.query_all("id"), vec!["1", "2"]);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = sample();
        assert_eq!(req.header_first("X-Tag"), Some("a"));
        assert_eq!(req.header_all("X-TAG").len(), 2);
    }

    #[test]
    fn test_path_param_is_typed() {
        let req = sample();
        assert_eq!(req.path_param("pet_id"), Some(&json!(7)));
    }

    #[test]
    fn test_parse_cookie_header_skips_malformed() {
        let mut out = FieldVec::new();
        parse_cookie_header("session=abc; ; broken; theme=dark", &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], ("session".to_string(), "abc".to_string()));
        assert_eq!(out[1], ("theme".to_string(), "dark".to_string()));
    }
}
