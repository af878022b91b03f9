//! Application assembly.
//!
//! Routes, dependencies, middleware, and exception handlers are declared on
//! an [`AppBuilder`]; [`AppBuilder::build`] validates the whole declaration
//! in one step and produces an immutable [`App`]. Everything that can be
//! rejected statically is rejected there: template syntax, ambiguous route
//! pairs, missing handlers, unknown or cyclic dependency references, and
//! schema documents that do not compile. After `build` succeeds the app is
//! read-only and every invocation flows through [`App::handle`].

use std::sync::Arc;

use http::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::config::RuntimeConfig;
use crate::di::{verify_graph, Dependency, DependencyRef, Registry};
use crate::dispatcher::{Dispatcher, ExceptionHandler, ExceptionTable, HandlerKey};
use crate::errors::{BuildError, ErrorKind};
use crate::event;
use crate::handler::SharedHandler;
use crate::middleware::Middleware;
use crate::params::{ParamSource, ParamSpec};
use crate::router::Router;
use crate::security::SecurityScheme;
use crate::validation::CompiledSchema;

/// Batch size exported for queue routes that never set one.
pub const DEFAULT_BATCH_SIZE: u16 = 10;

/// What triggers a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    /// An HTTP proxy event.
    Http,
    /// A queue consumer; each record runs the pipeline once.
    Queue { batch_size: u16 },
    /// A scheduled trigger firing on `schedule`.
    Job { schedule: String },
}

/// Gateway cache-key declarations, carried as route metadata for the
/// deployment tooling; the dispatch pipeline never reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[must_use]
pub struct CacheKeys {
    pub path: Vec<String>,
    pub query: Vec<String>,
    pub header: Vec<String>,
}

impl CacheKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path_key(mut self, name: impl Into<String>) -> Self {
        self.path.push(name.into());
        self
    }

    pub fn query_key(mut self, name: impl Into<String>) -> Self {
        self.query.push(name.into());
        self
    }

    pub fn header_key(mut self, name: impl Into<String>) -> Self {
        self.header.push(name.into());
        self
    }
}

/// One security scheme a route demands, plus the scopes the resolved claims
/// must grant.
#[derive(Debug, Clone)]
pub struct SecurityRequirement {
    pub scheme: Arc<SecurityScheme>,
    pub scopes: Vec<String>,
}

/// A fully validated route, immutable and `Arc`-shared for the process
/// lifetime. Produced from a [`Route`] during [`AppBuilder::build`].
pub struct RouteSpec {
    /// Registration name; queue and job routes carry theirs, HTTP routes
    /// only when set explicitly.
    pub name: Option<String>,
    pub method: Method,
    pub template: String,
    pub kind: RouteKind,
    pub handler: SharedHandler,
    /// Parameter specs in declaration order.
    pub params: Vec<ParamSpec>,
    /// Route-level dependencies, resolved before handler parameters.
    pub dependencies: Vec<DependencyRef>,
    pub security: Vec<SecurityRequirement>,
    /// Status for handler outcomes that are plain values.
    pub status: u16,
    pub request_schema: Option<CompiledSchema>,
    pub response_schema: Option<CompiledSchema>,
    pub cache: Option<CacheKeys>,
}

impl std::fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSpec")
            .field("method", &self.method)
            .field("template", &self.template)
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("params", &self.params.len())
            .finish_non_exhaustive()
    }
}

/// A route under declaration.
///
/// ```
/// use portico::{handler_fn, Route, ParamSpec, TypeSchema};
/// use serde_json::json;
///
/// let route = Route::get("/pets/{pet_id:int}")
///     .param(ParamSpec::path("pet_id", TypeSchema::integer()))
///     .handler(handler_fn(|req, _args| {
///         Ok(json!({"pet_id": req.path_param("pet_id")}).into())
///     }));
/// ```
#[must_use]
pub struct Route {
    name: Option<String>,
    method: Method,
    template: String,
    kind: RouteKind,
    handler: Option<SharedHandler>,
    params: Vec<ParamSpec>,
    dependencies: Vec<DependencyRef>,
    security: Vec<SecurityRequirement>,
    status: u16,
    request_schema: Option<Value>,
    response_schema: Option<Value>,
    cache: Option<CacheKeys>,
}

impl Route {
    fn with_kind(method: Method, template: String, kind: RouteKind) -> Self {
        Route {
            name: None,
            method,
            template,
            kind,
            handler: None,
            params: Vec::new(),
            dependencies: Vec::new(),
            security: Vec::new(),
            status: 200,
            request_schema: None,
            response_schema: None,
            cache: None,
        }
    }

    pub fn get(template: impl Into<String>) -> Self {
        Self::with_kind(Method::GET, template.into(), RouteKind::Http)
    }

    pub fn post(template: impl Into<String>) -> Self {
        Self::with_kind(Method::POST, template.into(), RouteKind::Http)
    }

    pub fn put(template: impl Into<String>) -> Self {
        Self::with_kind(Method::PUT, template.into(), RouteKind::Http)
    }

    pub fn patch(template: impl Into<String>) -> Self {
        Self::with_kind(Method::PATCH, template.into(), RouteKind::Http)
    }

    pub fn delete(template: impl Into<String>) -> Self {
        Self::with_kind(Method::DELETE, template.into(), RouteKind::Http)
    }

    pub fn head(template: impl Into<String>) -> Self {
        Self::with_kind(Method::HEAD, template.into(), RouteKind::Http)
    }

    pub fn options(template: impl Into<String>) -> Self {
        Self::with_kind(Method::OPTIONS, template.into(), RouteKind::Http)
    }

    /// A queue consumer, addressable as `POST /queue_/{queue-name}`. The
    /// record body binds the same way an HTTP request body does.
    pub fn queue(queue_name: impl Into<String>) -> Self {
        let name = queue_name.into();
        let mut route = Self::with_kind(
            Method::POST,
            format!("/queue_/{name}"),
            RouteKind::Queue {
                batch_size: DEFAULT_BATCH_SIZE,
            },
        );
        route.name = Some(name);
        route
    }

    /// A scheduled job firing on `schedule`, addressable as
    /// `POST /job_/{job-name}` with no body.
    pub fn job(job_name: impl Into<String>, schedule: impl Into<String>) -> Self {
        let name = job_name.into();
        let mut route = Self::with_kind(
            Method::POST,
            format!("/job_/{name}"),
            RouteKind::Job {
                schedule: schedule.into(),
            },
        );
        route.name = Some(name);
        route
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn handler(mut self, handler: SharedHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Declare a parameter. Order is preserved and significant for error
    /// reporting.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Status used when the handler returns a plain value.
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// A route-level dependency: resolved every invocation, result discarded.
    pub fn dependency(mut self, dep_ref: DependencyRef) -> Self {
        self.dependencies.push(dep_ref);
        self
    }

    /// Require a credential from `scheme` with no scope demands.
    pub fn security(self, scheme: Arc<SecurityScheme>) -> Self {
        self.security_scoped(scheme, Vec::<String>::new())
    }

    /// Require a credential from `scheme` whose claims grant every scope.
    pub fn security_scoped(
        mut self,
        scheme: Arc<SecurityScheme>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.security.push(SecurityRequirement {
            scheme,
            scopes: scopes.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Records per pipeline batch; meaningful for queue routes only.
    pub fn batch_size(mut self, size: u16) -> Self {
        if let RouteKind::Queue { batch_size } = &mut self.kind {
            *batch_size = size;
        }
        self
    }

    /// JSON Schema the whole request body must satisfy, on top of per
    /// parameter coercion. For queue routes this is the per-message schema.
    pub fn request_schema(mut self, schema: Value) -> Self {
        self.request_schema = Some(schema);
        self
    }

    /// JSON Schema plain handler return values must satisfy.
    pub fn response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Gateway cache key metadata; carried through to [`App::metadata`],
    /// never consulted during dispatch.
    pub fn cache_keys(mut self, keys: CacheKeys) -> Self {
        self.cache = Some(keys);
        self
    }

    pub(crate) fn build_spec(self) -> Result<RouteSpec, BuildError> {
        let label = format!("{} {}", self.method, self.template);
        let handler = self
            .handler
            .ok_or_else(|| BuildError::MissingHandler {
                route: label.clone(),
            })?;
        let request_schema = compile_schema(self.request_schema, &label)?;
        let response_schema = compile_schema(self.response_schema, &label)?;
        Ok(RouteSpec {
            name: self.name,
            method: self.method,
            template: self.template,
            kind: self.kind,
            handler,
            params: self.params,
            dependencies: self.dependencies,
            security: self.security,
            status: self.status,
            request_schema,
            response_schema,
            cache: self.cache,
        })
    }

    #[cfg(test)]
    pub(crate) fn into_spec(mut self, kind: RouteKind) -> RouteSpec {
        self.kind = kind;
        match self.build_spec() {
            Ok(spec) => spec,
            Err(err) => panic!("route failed to build: {err}"),
        }
    }
}

fn compile_schema(
    schema: Option<Value>,
    route: &str,
) -> Result<Option<CompiledSchema>, BuildError> {
    match schema {
        Some(doc) => CompiledSchema::compile(doc)
            .map(Some)
            .map_err(|reason| BuildError::InvalidSchema {
                route: route.to_string(),
                reason,
            }),
        None => Ok(None),
    }
}

/// Collects the application declaration, then validates and freezes it.
#[derive(Default)]
#[must_use]
pub struct AppBuilder {
    routes: Vec<Route>,
    dependencies: Vec<Arc<Dependency>>,
    middleware: Vec<Arc<dyn Middleware>>,
    exceptions: ExceptionTable,
    config: Option<RuntimeConfig>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Register a named dependency that routes and other dependencies may
    /// reference with [`DependencyRef::named`].
    pub fn dependency(mut self, dep: Dependency) -> Self {
        self.dependencies.push(Arc::new(dep));
        self
    }

    /// Middleware run in registration order, outermost first.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Handle every error of one kind.
    pub fn exception_kind(mut self, kind: ErrorKind, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.exceptions.insert(HandlerKey::Kind(kind), handler);
        self
    }

    /// Handle HTTP-status errors with one specific status.
    pub fn exception_status(mut self, status: u16, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.exceptions.insert(HandlerKey::Status(status), handler);
        self
    }

    /// Handle application errors carrying one specific code.
    pub fn exception_code(
        mut self,
        code: impl Into<String>,
        handler: Arc<dyn ExceptionHandler>,
    ) -> Self {
        self.exceptions.insert(HandlerKey::Code(code.into()), handler);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Validate the declaration and freeze it into an [`App`].
    pub fn build(self) -> Result<App, BuildError> {
        let mut registry = Registry::new();
        for dep in self.dependencies {
            match registry.get(dep.name()) {
                Some(existing) if Arc::ptr_eq(existing, &dep) => {}
                Some(_) => {
                    return Err(BuildError::DuplicateDependency(dep.name().to_string()));
                }
                None => {
                    registry.insert(dep.name().to_string(), dep);
                }
            }
        }

        let mut specs = Vec::with_capacity(self.routes.len());
        for route in self.routes {
            specs.push(Arc::new(route.build_spec()?));
        }
        let route_count = specs.len();

        let roots = specs.iter().flat_map(|spec| dependency_refs(spec));
        verify_graph(roots, &registry)?;

        let router = Router::build(specs)?;
        let config = self.config.unwrap_or_default();

        info!(
            routes_count = route_count,
            dependencies_count = registry.len(),
            middleware_count = self.middleware.len(),
            debug = config.debug,
            "Application built"
        );

        Ok(App {
            dispatcher: Dispatcher {
                router,
                registry,
                middleware: self.middleware,
                exceptions: self.exceptions,
                config,
            },
        })
    }
}

/// Every dependency reference a route declares, route-level and parameter
/// sourced alike. Transitive references are the graph walk's business.
fn dependency_refs(spec: &RouteSpec) -> impl Iterator<Item = &DependencyRef> {
    spec.dependencies
        .iter()
        .chain(spec.params.iter().filter_map(|p| match &p.source {
            ParamSource::Dependency(dep_ref) => Some(dep_ref),
            _ => None,
        }))
}

/// The built application. Read-only; safe to share across warm invocations.
pub struct App {
    dispatcher: Dispatcher,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.dispatcher.router.route_summaries())
            .finish_non_exhaustive()
    }
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Run one platform event end to end. Exactly one reply per event,
    /// whatever happened inside.
    #[must_use]
    pub fn handle(&self, event: Value) -> Value {
        event::handle(&self.dispatcher, event)
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.dispatcher.config
    }

    /// Route specs in matching-precedence order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<RouteSpec>> {
        self.dispatcher.router.specs()
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.dispatcher.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::validation::TypeSchema;
    use serde_json::json;

    fn ok_handler() -> SharedHandler {
        handler_fn(|_req, _args| Ok(json!({"ok": true}).into()))
    }

    #[test]
    fn test_build_flags_missing_handler() {
        let err = App::builder()
            .route(Route::get("/pets"))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingHandler { route } if route == "GET /pets"));
    }

    #[test]
    fn test_build_flags_duplicate_dependency_names() {
        let provider = || crate::di::provide_fn(|_req, _args| Ok(json!(null)));
        let err = App::builder()
            .dependency(Dependency::new("db", provider()))
            .dependency(Dependency::new("db", provider()))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateDependency(name) if name == "db"));
    }

    #[test]
    fn test_build_flags_bad_schema_document() {
        let err = App::builder()
            .route(
                Route::post("/pets")
                    .handler(ok_handler())
                    .request_schema(json!({"type": 12})),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidSchema { .. }));
    }

    #[test]
    fn test_build_flags_unknown_named_dependency() {
        let err = App::builder()
            .route(
                Route::get("/pets")
                    .handler(ok_handler())
                    .dependency(DependencyRef::named("missing")),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownDependency(name) if name == "missing"));
    }

    #[test]
    fn test_queue_route_registers_synthetic_template() {
        let app = App::builder()
            .route(Route::queue("orders").handler(ok_handler()))
            .build()
            .unwrap();
        let spec = app.routes().next().unwrap();
        assert_eq!(spec.template, "/queue_/orders");
        assert_eq!(spec.method, Method::POST);
        assert_eq!(
            spec.kind,
            RouteKind::Queue {
                batch_size: DEFAULT_BATCH_SIZE
            }
        );
        assert_eq!(spec.name.as_deref(), Some("orders"));
    }

    #[test]
    fn test_http_event_round_trips_through_app() {
        let app = App::builder()
            .route(
                Route::get("/pets/{pet_id:int}")
                    .param(ParamSpec::path("pet_id", TypeSchema::integer()))
                    .handler(handler_fn(|_req, args| {
                        Ok(json!({"pet_id": args.get("pet_id")}).into())
                    })),
            )
            .build()
            .unwrap();

        let event = crate::event::HttpEventBuilder::get("/pets/41").build();
        let reply = app.handle(event);
        assert_eq!(reply["statusCode"], 200);
        let body: Value =
            serde_json::from_str(reply["body"].as_str().unwrap()).unwrap();
        assert_eq!(body, json!({"pet_id": 41}));
    }
}
