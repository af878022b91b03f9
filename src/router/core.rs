//! Router core module. Template compilation, precedence ordering, and the
//! per-invocation match scan.

use std::sync::Arc;
use std::time::Instant;

use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::app::RouteSpec;
use crate::errors::BuildError;
use crate::request::CaptureVec;

#[allow(clippy::expect_used)]
static PARAM_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid parameter name regex"));

/// Typed placeholder converter. Decides both the capture grammar and the
/// JSON value produced for a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    Str,
    Path,
    Int,
    Float,
    Uuid,
}

impl Converter {
    /// Parse a converter token. Long spellings are accepted alongside the
    /// short ones (`string`/`str`, `integer`/`int`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "str" | "string" => Some(Converter::Str),
            "path" => Some(Converter::Path),
            "int" | "integer" => Some(Converter::Int),
            "float" => Some(Converter::Float),
            "uuid" => Some(Converter::Uuid),
            _ => None,
        }
    }

    fn regex_fragment(self) -> &'static str {
        match self {
            Converter::Str => "[^/]+",
            Converter::Path => ".*",
            Converter::Int => "[0-9]+",
            Converter::Float => r"[0-9]+(?:\.[0-9]+)?",
            Converter::Uuid => "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        }
    }

    /// Precedence rank. Lower ranks are tried first, so literals beat
    /// converters and narrow converters beat `str`.
    fn rank(self) -> u8 {
        match self {
            Converter::Uuid => 1,
            Converter::Int => 2,
            Converter::Float => 3,
            Converter::Str => 4,
            Converter::Path => 5,
        }
    }

    /// Turn a captured (percent-decoded) segment into its typed value.
    /// `None` means the capture fails the converter after all, which is a
    /// match failure for the whole route.
    fn convert(self, raw: &str) -> Option<Value> {
        match self {
            Converter::Str | Converter::Path => Some(Value::String(raw.to_string())),
            Converter::Int => raw.parse::<i64>().ok().map(Value::from),
            Converter::Float => {
                let parsed = raw.parse::<f64>().ok()?;
                serde_json::Number::from_f64(parsed).map(Value::Number)
            }
            Converter::Uuid => Some(Value::String(raw.to_ascii_lowercase())),
        }
    }
}

#[derive(Debug, Clone)]
enum TemplatePart {
    Literal(String),
    Capture { name: Arc<str>, converter: Converter },
}

/// One route compiled for matching.
#[derive(Debug, Clone)]
pub(crate) struct CompiledRoute {
    pub method: Method,
    pub template: String,
    regex: Regex,
    captures: Vec<(Arc<str>, Converter)>,
    /// Per-segment precedence rank, compared lexicographically.
    rank: Vec<u8>,
    /// Literal text plus converter class per segment; two routes with the
    /// same method and shape accept exactly the same paths.
    shape: String,
    pub spec: Arc<RouteSpec>,
}

/// Successful resolution: the route plus its typed captures.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteSpec>,
    pub captures: CaptureVec,
}

/// Outcome of a resolution attempt.
#[derive(Debug, Clone)]
pub enum RouteResolution {
    Matched(RouteMatch),
    /// The path exists under other methods.
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

/// Immutable routing table. Built once by the app builder, shared across
/// invocations.
#[derive(Debug, Clone)]
pub struct Router {
    entries: Vec<CompiledRoute>,
}

impl Router {
    /// Compile and order the table. Template syntax errors and ambiguous
    /// pairs surface here rather than at match time.
    pub(crate) fn build(specs: Vec<Arc<RouteSpec>>) -> Result<Self, BuildError> {
        let mut entries = Vec::with_capacity(specs.len());
        for spec in specs {
            entries.push(compile_route(spec)?);
        }

        // Stable sort keeps registration order among disjoint equals.
        entries.sort_by(|a, b| a.rank.cmp(&b.rank));

        for i in 0..entries.len() {
            for later in entries.iter().skip(i + 1) {
                let first = &entries[i];
                if first.method == later.method && first.shape == later.shape {
                    return Err(BuildError::AmbiguousRoute {
                        method: first.method.clone(),
                        first: first.template.clone(),
                        second: later.template.clone(),
                    });
                }
            }
        }

        let summary: Vec<String> = entries
            .iter()
            .take(10)
            .map(|e| format!("{} {}", e.method, e.template))
            .collect();
        info!(
            routes_count = entries.len(),
            routes_summary = ?summary,
            "Routing table compiled"
        );

        Ok(Router { entries })
    }

    /// Resolve a method and path against the table.
    ///
    /// The scan walks routes in precedence order; the first route whose
    /// regex and converters both accept the path wins. A route whose regex
    /// matches but whose converter rejects the capture (an out-of-range
    /// integer, say) does not match and does not shadow later routes.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> RouteResolution {
        debug!(method = %method, path = %path, "Route match attempt");
        let started = Instant::now();

        let mut allowed: Vec<Method> = Vec::new();
        for entry in &self.entries {
            let Some(captures) = entry.try_captures(path) else {
                continue;
            };
            if entry.method != *method {
                if !allowed.contains(&entry.method) {
                    allowed.push(entry.method.clone());
                }
                continue;
            }

            let elapsed = started.elapsed();
            if elapsed.as_millis() > 1 {
                warn!(
                    method = %method,
                    path = %path,
                    template = %entry.template,
                    duration_us = elapsed.as_micros() as u64,
                    "Slow route matching detected"
                );
            } else {
                debug!(
                    method = %method,
                    path = %path,
                    template = %entry.template,
                    duration_us = elapsed.as_micros() as u64,
                    "Route matched"
                );
            }
            return RouteResolution::Matched(RouteMatch {
                route: Arc::clone(&entry.spec),
                captures,
            });
        }

        if !allowed.is_empty() {
            warn!(method = %method, path = %path, allowed = ?allowed, "Method not allowed");
            return RouteResolution::MethodNotAllowed { allowed };
        }
        warn!(method = %method, path = %path, "No route matched");
        RouteResolution::NotFound
    }

    /// Registered `METHOD template` pairs in precedence order.
    #[must_use]
    pub fn route_summaries(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("{} {}", e.method, e.template))
            .collect()
    }

    /// Route specs in precedence order.
    pub(crate) fn specs(&self) -> impl Iterator<Item = &Arc<RouteSpec>> {
        self.entries.iter().map(|e| &e.spec)
    }
}

impl CompiledRoute {
    /// Regex plus converter acceptance in one step.
    fn try_captures(&self, path: &str) -> Option<CaptureVec> {
        let found = self.regex.captures(path)?;
        let mut out = CaptureVec::new();
        for (idx, (name, converter)) in self.captures.iter().enumerate() {
            let raw = found.get(idx + 1)?.as_str();
            let decoded = percent_decode(raw);
            let value = converter.convert(&decoded)?;
            out.push((Arc::clone(name), value));
        }
        Some(out)
    }
}

/// Decode percent escapes in a captured segment. Escapes that do not form
/// valid UTF-8 leave the raw text untouched.
fn percent_decode(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn compile_route(spec: Arc<RouteSpec>) -> Result<CompiledRoute, BuildError> {
    let template = spec.template.clone();
    let parts = parse_template(&template)?;

    let mut pattern = String::with_capacity(template.len() + 8);
    pattern.push('^');
    let mut captures = Vec::new();
    let mut rank = Vec::with_capacity(parts.len());
    let mut shape = String::with_capacity(template.len());

    for part in &parts {
        pattern.push('/');
        shape.push('/');
        match part {
            TemplatePart::Literal(text) => {
                pattern.push_str(&regex::escape(text));
                rank.push(0);
                shape.push_str(text);
            }
            TemplatePart::Capture { name, converter } => {
                pattern.push('(');
                pattern.push_str(converter.regex_fragment());
                pattern.push(')');
                rank.push(converter.rank());
                shape.push('{');
                shape.push_str(converter.regex_fragment());
                shape.push('}');
                captures.push((Arc::clone(name), *converter));
            }
        }
    }
    if parts.is_empty() {
        // Root template.
        pattern.push('/');
        shape.push('/');
    }
    pattern.push('$');

    let regex = Regex::new(&pattern).map_err(|err| BuildError::InvalidTemplate {
        template: template.clone(),
        reason: format!("regex compilation failed: {err}"),
    })?;

    Ok(CompiledRoute {
        method: spec.method.clone(),
        template,
        regex,
        captures,
        rank,
        shape,
        spec,
    })
}

/// Parse a template into literal and placeholder segments.
///
/// Each segment is either literal text or a whole placeholder; mixing text
/// and a placeholder inside one segment is rejected. The `path` converter
/// may only appear on the final segment because it swallows slashes.
fn parse_template(template: &str) -> Result<Vec<TemplatePart>, BuildError> {
    let invalid = |reason: &str| BuildError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    };

    if !template.starts_with('/') {
        return Err(invalid("template must start with '/'"));
    }
    if template == "/" {
        return Ok(Vec::new());
    }

    let segments: Vec<&str> = template[1..].split('/').collect();
    let mut parts = Vec::with_capacity(segments.len());
    let mut seen_names: Vec<&str> = Vec::new();

    for (idx, segment) in segments.iter().enumerate() {
        let is_last = idx == segments.len() - 1;
        if segment.is_empty() {
            if is_last {
                // Trailing slash is a literal empty segment; "/pets/" and
                // "/pets" stay distinct paths.
                parts.push(TemplatePart::Literal(String::new()));
                continue;
            }
            return Err(invalid("empty path segment"));
        }

        if segment.starts_with('{') && segment.ends_with('}') {
            let inner = &segment[1..segment.len() - 1];
            let (name, converter) = match inner.split_once(':') {
                Some((name, token)) => {
                    let converter = Converter::from_token(token)
                        .ok_or_else(|| invalid(&format!("unknown converter '{token}'")))?;
                    (name, converter)
                }
                None => (inner, Converter::Str),
            };
            if !PARAM_NAME_RE.is_match(name) {
                return Err(invalid(&format!("invalid parameter name '{name}'")));
            }
            if seen_names.contains(&name) {
                return Err(invalid(&format!("duplicated parameter name '{name}'")));
            }
            if converter == Converter::Path && !is_last {
                return Err(invalid(
                    "'path' converter is only valid on the final segment",
                ));
            }
            seen_names.push(name);
            parts.push(TemplatePart::Capture {
                name: Arc::from(name),
                converter,
            });
        } else if segment.contains('{') || segment.contains('}') {
            return Err(invalid(&format!(
                "segment '{segment}' mixes literal text and a placeholder"
            )));
        } else {
            parts.push(TemplatePart::Literal((*segment).to_string()));
        }
    }

    Ok(parts)
}
