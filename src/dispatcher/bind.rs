//! Parameter binding: extracting and validating every declared value from
//! the request before any dependency provider runs.
//!
//! Binding covers the route's own parameter specs *and* the literal
//! (non-dependency) specs of every dependency reachable from the route, so
//! a provider never executes while a sibling's parameters are invalid.
//! Issues accumulate; the handler sees either a complete argument set or
//! nothing.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::di::{Dependency, DependencyRef, Registry};
use crate::errors::ApiError;
use crate::handler::Args;
use crate::params::{ParamSource, ParamSpec};
use crate::request::Request;
use crate::validation::{coerce_json, coerce_text, ErrorAccumulator, Loc, TypeSchema};

use crate::app::RouteSpec;

/// Everything the resolution stage needs: the handler's literal arguments
/// plus per-dependency literal arguments keyed by dependency name.
#[derive(Debug)]
pub(crate) struct BoundArgs {
    pub args: Args,
    pub dep_args: HashMap<String, Args>,
}

enum BodyState {
    Absent,
    /// Present but not parseable; the parse issue is already recorded.
    Invalid,
    Parsed(Value),
}

/// How body parameters bind for this invocation.
#[derive(Clone, Copy, PartialEq)]
enum BodyMode {
    /// A single body parameter takes the whole JSON document.
    Whole,
    /// Each body parameter binds its top-level key.
    Embedded,
}

pub(crate) fn bind(
    req: &Request,
    route: &RouteSpec,
    registry: &Registry,
) -> Result<BoundArgs, ApiError> {
    let mut acc = ErrorAccumulator::new();

    let deps = reachable_dependencies(route, registry);

    // The implicit single-body convention is decided over the whole tree:
    // the route's body parameters plus every dependency's.
    let mut body_count = 0usize;
    let mut any_forced_embed = false;
    for spec in route
        .params
        .iter()
        .chain(deps.iter().flat_map(|d| d.params().iter()))
    {
        if let ParamSource::Body { embed } = spec.source {
            body_count += 1;
            any_forced_embed |= embed;
        }
    }
    let body_mode = if body_count == 1 && !any_forced_embed {
        BodyMode::Whole
    } else {
        BodyMode::Embedded
    };

    let wants_body = body_count > 0 || route.request_schema.is_some();
    let body = if wants_body { parse_body(req, &mut acc) } else { BodyState::Absent };

    if let (Some(schema), BodyState::Parsed(ref value)) = (&route.request_schema, &body) {
        schema.validate_into(value, "body", &mut acc);
    }

    let mut args = Args::default();
    for spec in &route.params {
        if let Some(value) = bind_literal(spec, req, &body, body_mode, &mut acc) {
            args.0.insert(spec.name.clone(), value);
        }
    }

    let mut dep_args: HashMap<String, Args> = HashMap::new();
    for dep in &deps {
        let mut bound = Args::default();
        for spec in dep.params() {
            if let Some(value) = bind_literal(spec, req, &body, body_mode, &mut acc) {
                bound.0.insert(spec.name.clone(), value);
            }
        }
        dep_args.insert(dep.name().to_string(), bound);
    }

    if acc.is_empty() {
        Ok(BoundArgs { args, dep_args })
    } else {
        Err(ApiError::validation(acc.into_issues()))
    }
}

/// Collect every dependency reachable from the route, discovery order,
/// unique by name. The graph was verified acyclic at build time.
pub(crate) fn reachable_dependencies(
    route: &RouteSpec,
    registry: &Registry,
) -> Vec<Arc<Dependency>> {
    let mut out: Vec<Arc<Dependency>> = Vec::new();

    fn visit(dep_ref: &DependencyRef, registry: &Registry, out: &mut Vec<Arc<Dependency>>) {
        let dep = match dep_ref {
            DependencyRef::Inline(dep) => Arc::clone(dep),
            DependencyRef::Named(name) => match registry.get(name) {
                Some(dep) => Arc::clone(dep),
                None => return,
            },
        };
        if out.iter().any(|seen| seen.name() == dep.name()) {
            return;
        }
        out.push(Arc::clone(&dep));
        for spec in dep.params() {
            if let ParamSource::Dependency(inner) = &spec.source {
                visit(inner, registry, out);
            }
        }
    }

    for dep_ref in &route.dependencies {
        visit(dep_ref, registry, &mut out);
    }
    for spec in &route.params {
        if let ParamSource::Dependency(inner) = &spec.source {
            visit(inner, registry, &mut out);
        }
    }
    out
}

fn parse_body(req: &Request, acc: &mut ErrorAccumulator) -> BodyState {
    match req.body.as_deref() {
        None => BodyState::Absent,
        Some(text) if text.trim().is_empty() => BodyState::Absent,
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => BodyState::Parsed(value),
            Err(err) => {
                acc.push_parts(
                    &vec![json!("body")],
                    "json_invalid",
                    format!("Invalid JSON: {err}"),
                );
                BodyState::Invalid
            }
        },
    }
}

/// Bind one literal parameter, recording any issues. Dependency-like specs
/// return `None` without recording; the resolution stage fills them.
fn bind_literal(
    spec: &ParamSpec,
    req: &Request,
    body: &BodyState,
    body_mode: BodyMode,
    acc: &mut ErrorAccumulator,
) -> Option<Value> {
    let lookup = spec.lookup_name();
    match &spec.source {
        ParamSource::Path => {
            let loc = vec![json!("path"), json!(lookup.clone())];
            match req.path_param(&lookup) {
                Some(value) => coerce_json(&spec.schema, value, &loc, acc),
                None => resolve_missing(spec, &loc, acc),
            }
        }
        ParamSource::Query => bind_multi_text(
            spec,
            "query",
            &lookup,
            req.query_all(&lookup),
            acc,
        ),
        ParamSource::Header { .. } => bind_multi_text(
            spec,
            "header",
            &lookup,
            req.header_all(&lookup),
            acc,
        ),
        ParamSource::Cookie => {
            let loc = vec![json!("cookie"), json!(lookup.clone())];
            match req.cookie(&lookup) {
                Some(raw) => coerce_text(&spec.schema, raw, &loc, acc),
                None => resolve_missing(spec, &loc, acc),
            }
        }
        ParamSource::Body { .. } => bind_body(spec, &lookup, body, body_mode, acc),
        ParamSource::Dependency(_) | ParamSource::Security(_) | ParamSource::RawEvent => None,
    }
}

/// Query and header values can repeat; a declared array takes every
/// occurrence, a scalar takes the first.
fn bind_multi_text(
    spec: &ParamSpec,
    source: &str,
    lookup: &str,
    occurrences: Vec<&str>,
    acc: &mut ErrorAccumulator,
) -> Option<Value> {
    let loc = vec![json!(source), json!(lookup)];
    if occurrences.is_empty() {
        return resolve_missing(spec, &loc, acc);
    }
    if let TypeSchema::Array { items } = &spec.schema {
        let before = acc.len();
        let mut out = Vec::with_capacity(occurrences.len());
        for (idx, raw) in occurrences.iter().enumerate() {
            let item_loc = vec![json!(source), json!(lookup), json!(idx)];
            if let Some(value) = coerce_text(items, raw, &item_loc, acc) {
                out.push(value);
            }
        }
        if acc.len() > before {
            return None;
        }
        return Some(Value::Array(out));
    }
    coerce_text(&spec.schema, occurrences[0], &loc, acc)
}

fn bind_body(
    spec: &ParamSpec,
    lookup: &str,
    body: &BodyState,
    body_mode: BodyMode,
    acc: &mut ErrorAccumulator,
) -> Option<Value> {
    match body_mode {
        BodyMode::Whole => {
            let loc = vec![json!("body")];
            match body {
                BodyState::Parsed(value) => coerce_json(&spec.schema, value, &loc, acc),
                BodyState::Absent => resolve_missing(spec, &loc, acc),
                BodyState::Invalid => None,
            }
        }
        BodyMode::Embedded => {
            let loc = vec![json!("body"), json!(lookup)];
            match body {
                BodyState::Parsed(Value::Object(map)) => match map.get(lookup) {
                    Some(value) => coerce_json(&spec.schema, value, &loc, acc),
                    None => resolve_missing(spec, &loc, acc),
                },
                BodyState::Parsed(_) => {
                    // One shape issue for the document, not one per key.
                    let doc_loc: Loc = vec![json!("body")];
                    if !acc.issues().iter().any(|issue| {
                        issue.kind == "dict_type" && issue.loc == doc_loc
                    }) {
                        acc.push_parts(
                            &doc_loc,
                            "dict_type",
                            "Input should be a valid dictionary",
                        );
                    }
                    None
                }
                BodyState::Absent => resolve_missing(spec, &loc, acc),
                BodyState::Invalid => None,
            }
        }
    }
}

/// Missing value: default if declared, null if optional, an issue if
/// required. Defaults bind verbatim, with no coercion pass.
fn resolve_missing(spec: &ParamSpec, loc: &Loc, acc: &mut ErrorAccumulator) -> Option<Value> {
    if let Some(default) = &spec.default {
        return Some(default.clone());
    }
    if spec.required {
        acc.push_parts(loc, "missing", "Field required");
        return None;
    }
    Some(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Route, RouteKind};
    use crate::validation::TypeSchema;
    use serde_json::json;

    fn spec_query(name: &str, schema: TypeSchema) -> ParamSpec {
        ParamSpec::query(name, schema)
    }

    fn http_route(params: Vec<ParamSpec>) -> RouteSpec {
        let mut route = Route::get("/probe").handler(crate::handler::handler_fn(|_req, _args| {
            Ok(crate::handler::Outcome::Json(json!(null)))
        }));
        for p in params {
            route = route.param(p);
        }
        route.into_spec(RouteKind::Http)
    }

    fn request_with_query(pairs: &[(&str, &str)]) -> Request {
        let mut req = crate::request::test_support::blank_request();
        for (k, v) in pairs {
            req.query.push(((*k).to_string(), (*v).to_string()));
        }
        req
    }

    #[test]
    fn test_two_bad_params_accumulate_two_issues() {
        let route = http_route(vec![
            spec_query("limit", TypeSchema::integer()),
            spec_query("active", TypeSchema::boolean()).optional(),
        ]);
        let req = request_with_query(&[("active", "maybe")]);
        let err = bind(&req, &route, &Registry::new()).unwrap_err();
        match err {
            ApiError::Validation { issues } => {
                assert_eq!(issues.len(), 2);
                let kinds: Vec<&str> = issues.iter().map(|i| i.kind.as_str()).collect();
                assert!(kinds.contains(&"missing"));
                assert!(kinds.contains(&"bool_parsing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_scalar_takes_first_occurrence_array_takes_all() {
        let route = http_route(vec![
            spec_query("limit", TypeSchema::integer()),
            spec_query("tag", TypeSchema::array(TypeSchema::string())).optional(),
        ]);
        let req = request_with_query(&[("limit", "1"), ("limit", "2"), ("tag", "a"), ("tag", "b")]);
        let bound = bind(&req, &route, &Registry::new()).unwrap();
        assert_eq!(bound.args.get("limit"), Some(&json!(1)));
        assert_eq!(bound.args.get("tag"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_single_body_param_takes_whole_document() {
        let route = http_route(vec![ParamSpec::body(
            "pet",
            TypeSchema::object([crate::validation::FieldSpec::required(
                "name",
                TypeSchema::string(),
            )]),
        )]);
        let mut req = crate::request::test_support::blank_request();
        req.body = Some(r#"{"name": "rex"}"#.to_string());
        let bound = bind(&req, &route, &Registry::new()).unwrap();
        assert_eq!(bound.args.get("pet"), Some(&json!({"name": "rex"})));
    }

    #[test]
    fn test_two_body_params_bind_top_level_keys() {
        let route = http_route(vec![
            ParamSpec::body("pet", TypeSchema::any()),
            ParamSpec::body("owner", TypeSchema::any()),
        ]);
        let mut req = crate::request::test_support::blank_request();
        req.body = Some(r#"{"pet": {"name": "rex"}, "owner": "sam"}"#.to_string());
        let bound = bind(&req, &route, &Registry::new()).unwrap();
        assert_eq!(bound.args.get("pet"), Some(&json!({"name": "rex"})));
        assert_eq!(bound.args.get("owner"), Some(&json!("sam")));
    }

    #[test]
    fn test_embedded_flag_forces_key_binding() {
        let route = http_route(vec![ParamSpec::body("pet", TypeSchema::any()).embedded()]);
        let mut req = crate::request::test_support::blank_request();
        req.body = Some(r#"{"pet": "rex"}"#.to_string());
        let bound = bind(&req, &route, &Registry::new()).unwrap();
        assert_eq!(bound.args.get("pet"), Some(&json!("rex")));
    }

    #[test]
    fn test_invalid_json_is_one_issue() {
        let route = http_route(vec![ParamSpec::body("pet", TypeSchema::any())]);
        let mut req = crate::request::test_support::blank_request();
        req.body = Some("{not json".to_string());
        let err = bind(&req, &route, &Registry::new()).unwrap_err();
        match err {
            ApiError::Validation { issues } => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].kind, "json_invalid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_dependency_literal_params_bind_before_resolution() {
        use crate::di::provide_fn;

        let dep = Dependency::new(
            "pager",
            provide_fn(|_req, args| Ok(json!(args.get("page").cloned()))),
        )
        .param(ParamSpec::query("page", TypeSchema::integer()).default_value(1));

        let mut route = Route::get("/probe").handler(crate::handler::handler_fn(|_req, _args| {
            Ok(crate::handler::Outcome::Json(json!(null)))
        }));
        route = route.param(ParamSpec::dependency(
            "pager",
            DependencyRef::inline(dep),
        ));
        let route = route.into_spec(RouteKind::Http);

        let req = request_with_query(&[("page", "3")]);
        let bound = bind(&req, &route, &Registry::new()).unwrap();
        let pager_args = bound.dep_args.get("pager").unwrap();
        assert_eq!(pager_args.get("page"), Some(&json!(3)));
    }

    #[test]
    fn test_header_underscores_convert_to_hyphens() {
        let route = http_route(vec![ParamSpec::header("x_token", TypeSchema::string())]);
        let mut req = crate::request::test_support::blank_request();
        req.headers.push(("x-token".to_string(), "abc".to_string()));
        let bound = bind(&req, &route, &Registry::new()).unwrap();
        assert_eq!(bound.args.get("x_token"), Some(&json!("abc")));
    }
}
