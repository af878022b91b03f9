//! Route metadata export.
//!
//! [`App::metadata`] serializes everything an external document generator
//! needs: per-route method, gateway-style template, the client-visible
//! parameter surface (the route's own literal parameters plus those of every
//! reachable dependency), declared schemas, security requirements, and the
//! scheme catalog. Generators consume this instead of re-deriving anything
//! from handler declarations.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::app::{App, CacheKeys, RouteKind, RouteSpec};
use crate::di::Registry;
use crate::dispatcher::reachable_dependencies;
use crate::params::{ParamSource, ParamSpec};
use crate::security::{CredentialRule, SecurityScheme};

/// The full export: routes plus the security schemes they reference.
#[derive(Debug, Clone, Serialize)]
pub struct AppMetadata {
    pub routes: Vec<RouteMetadata>,
    pub security_schemes: Vec<SchemeMetadata>,
}

/// One route, flattened for external consumption.
#[derive(Debug, Clone, Serialize)]
pub struct RouteMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub method: String,
    /// Template with converter suffixes stripped: `/pets/{pet_id}`.
    pub template: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    pub status: u16,
    pub params: Vec<ParamMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirementMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheKeys>,
}

/// One client-visible parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ParamMetadata {
    pub name: String,
    /// Wire name when it differs from `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub source: &'static str,
    pub required: bool,
    pub schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityRequirementMetadata {
    pub scheme: String,
    pub scopes: Vec<String>,
}

/// A security scheme in OpenAPI `securitySchemes` terms.
#[derive(Debug, Clone, Serialize)]
pub struct SchemeMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Credential location for `apiKey` schemes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<&'static str>,
    /// Wire name of the key for `apiKey` schemes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    /// Authorization scheme for `http` schemes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<&'static str>,
    pub optional: bool,
}

impl App {
    /// Export the registered surface for external generators.
    #[must_use]
    pub fn metadata(&self) -> AppMetadata {
        let registry = self.registry();
        let mut schemes: Vec<Arc<SecurityScheme>> = Vec::new();
        let routes = self
            .routes()
            .map(|spec| route_metadata(spec, registry, &mut schemes))
            .collect();
        AppMetadata {
            routes,
            security_schemes: schemes.iter().map(scheme_metadata).collect(),
        }
    }
}

fn route_metadata(
    spec: &Arc<RouteSpec>,
    registry: &Registry,
    schemes: &mut Vec<Arc<SecurityScheme>>,
) -> RouteMetadata {
    let mut params: Vec<ParamMetadata> = Vec::new();
    collect_params(&spec.params, &mut params, schemes);
    for dep in reachable_dependencies(spec, registry) {
        collect_params(dep.params(), &mut params, schemes);
    }
    for requirement in &spec.security {
        note_scheme(schemes, &requirement.scheme);
    }

    let (kind, batch_size, schedule) = match &spec.kind {
        RouteKind::Http => ("http", None, None),
        RouteKind::Queue { batch_size } => ("queue", Some(*batch_size), None),
        RouteKind::Job { schedule } => ("job", None, Some(schedule.clone())),
    };

    RouteMetadata {
        name: spec.name.clone(),
        method: spec.method.to_string(),
        template: gateway_template(&spec.template),
        kind,
        batch_size,
        schedule,
        status: spec.status,
        params,
        request_schema: spec.request_schema.as_ref().map(|s| s.source().clone()),
        response_schema: spec.response_schema.as_ref().map(|s| s.source().clone()),
        security: spec
            .security
            .iter()
            .map(|r| SecurityRequirementMetadata {
                scheme: r.scheme.name().to_string(),
                scopes: r.scopes.clone(),
            })
            .collect(),
        cache: spec.cache.clone(),
    }
}

/// Literal parameters become export entries; injected sources only
/// contribute the schemes they reference.
fn collect_params(
    specs: &[ParamSpec],
    out: &mut Vec<ParamMetadata>,
    schemes: &mut Vec<Arc<SecurityScheme>>,
) {
    for spec in specs {
        match &spec.source {
            ParamSource::Dependency(_) | ParamSource::RawEvent => {}
            ParamSource::Security(scheme) => note_scheme(schemes, scheme),
            _ => {
                if out.iter().any(|seen| seen.name == spec.name) {
                    continue;
                }
                out.push(ParamMetadata {
                    name: spec.name.clone(),
                    alias: spec.alias.clone(),
                    source: spec.source_label(),
                    required: spec.required,
                    schema: spec.schema.to_json_schema(),
                    default: spec.default.clone(),
                });
            }
        }
    }
}

fn note_scheme(schemes: &mut Vec<Arc<SecurityScheme>>, scheme: &Arc<SecurityScheme>) {
    if !schemes.iter().any(|seen| seen.name() == scheme.name()) {
        schemes.push(Arc::clone(scheme));
    }
}

fn scheme_metadata(scheme: &Arc<SecurityScheme>) -> SchemeMetadata {
    let (kind, location, key_name, auth_scheme) = match scheme.rule() {
        CredentialRule::ApiKeyHeader(name) => ("apiKey", Some("header"), Some(name.clone()), None),
        CredentialRule::ApiKeyQuery(name) => ("apiKey", Some("query"), Some(name.clone()), None),
        CredentialRule::ApiKeyCookie(name) => ("apiKey", Some("cookie"), Some(name.clone()), None),
        CredentialRule::Bearer => ("http", None, None, Some("bearer")),
    };
    SchemeMetadata {
        name: scheme.name().to_string(),
        kind,
        location,
        key_name,
        scheme: auth_scheme,
        optional: scheme.is_optional(),
    }
}

/// Strip converter suffixes from placeholders: `{pet_id:int}` to `{pet_id}`.
#[allow(clippy::expect_used)]
static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*):[a-z]+\}").expect("valid placeholder regex")
});

fn gateway_template(template: &str) -> String {
    PLACEHOLDER_RE.replace_all(template, "{$1}").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Route;
    use crate::di::{provide_fn, Dependency, DependencyRef};
    use crate::handler::handler_fn;
    use crate::security::authenticate_fn;
    use crate::validation::TypeSchema;
    use serde_json::json;

    #[test]
    fn test_gateway_template_strips_converters() {
        assert_eq!(
            gateway_template("/pets/{pet_id:int}/files/{rest:path}"),
            "/pets/{pet_id}/files/{rest}"
        );
        assert_eq!(gateway_template("/pets/{name}"), "/pets/{name}");
    }

    #[test]
    fn test_metadata_includes_dependency_parameters() {
        let pager = Dependency::new("pager", provide_fn(|_req, _args| Ok(json!(null))))
            .param(ParamSpec::query("page", TypeSchema::integer()).default_value(1));
        let app = App::builder()
            .route(
                Route::get("/pets/{pet_id:int}")
                    .param(ParamSpec::path("pet_id", TypeSchema::integer()))
                    .param(ParamSpec::dependency("pager", DependencyRef::inline(pager)))
                    .handler(handler_fn(|_req, _args| Ok(json!(null).into()))),
            )
            .build()
            .unwrap();

        let export = app.metadata();
        assert_eq!(export.routes.len(), 1);
        let route = &export.routes[0];
        assert_eq!(route.template, "/pets/{pet_id}");
        let names: Vec<&str> = route.params.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"pet_id"));
        assert!(names.contains(&"page"));
        let page = route.params.iter().find(|p| p.name == "page").unwrap();
        assert!(!page.required);
        assert_eq!(page.default, Some(json!(1)));
    }

    #[test]
    fn test_metadata_catalogs_security_schemes() {
        let scheme = Arc::new(SecurityScheme::api_key_header(
            "api_key",
            "x-api-key",
            authenticate_fn(|_req, _cred| Ok(json!({}))),
        ));
        let app = App::builder()
            .route(
                Route::get("/secure")
                    .security_scoped(Arc::clone(&scheme), ["pets:read"])
                    .handler(handler_fn(|_req, _args| Ok(json!(null).into()))),
            )
            .build()
            .unwrap();

        let export = app.metadata();
        assert_eq!(export.security_schemes.len(), 1);
        let entry = &export.security_schemes[0];
        assert_eq!(entry.name, "api_key");
        assert_eq!(entry.kind, "apiKey");
        assert_eq!(entry.location, Some("header"));
        assert_eq!(entry.key_name.as_deref(), Some("x-api-key"));
        assert_eq!(
            export.routes[0].security[0].scopes,
            vec!["pets:read".to_string()]
        );
    }

    #[test]
    fn test_queue_metadata_carries_batch_size_and_schema() {
        let app = App::builder()
            .route(
                Route::queue("orders")
                    .batch_size(25)
                    .request_schema(json!({"type": "object"}))
                    .handler(handler_fn(|_req, _args| Ok(json!(null).into()))),
            )
            .build()
            .unwrap();

        let export = app.metadata();
        let route = &export.routes[0];
        assert_eq!(route.kind, "queue");
        assert_eq!(route.batch_size, Some(25));
        assert_eq!(route.request_schema, Some(json!({"type": "object"})));
    }
}
