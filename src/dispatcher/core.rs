//! Dispatcher core module: the per-invocation pipeline.
//!
//! One normalized request goes in, exactly one response comes out. The
//! pipeline advances through the invocation stages in order; any failure
//! moves it to the error stage and hands the error to the exception table.
//! Handler panics are contained here so a misbehaving route cannot take
//! down the process serving it.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use super::bind::bind;
use super::exceptions::ExceptionTable;
use crate::app::RouteSpec;
use crate::config::RuntimeConfig;
use crate::di::{Registry, Resolver};
use crate::errors::ApiError;
use crate::handler::Outcome;
use crate::middleware::{Middleware, Next};
use crate::params::ParamSource;
use crate::request::Request;
use crate::response::Response;
use crate::router::{RouteResolution, Router};
use crate::security::scopes_satisfied;

/// Stages an invocation moves through, in order. The error stage absorbs
/// a failure from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NotStarted,
    Matching,
    Binding,
    DependencyResolution,
    HandlerExecution,
    ResponseBuilt,
    Error,
}

impl Stage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::NotStarted => "not_started",
            Stage::Matching => "matching",
            Stage::Binding => "binding",
            Stage::DependencyResolution => "dependency_resolution",
            Stage::HandlerExecution => "handler_execution",
            Stage::ResponseBuilt => "response_built",
            Stage::Error => "error",
        }
    }
}

/// Stage marker for one invocation. Interior mutability because the
/// middleware chain only hands out shared references.
struct StageTracker {
    current: Cell<Stage>,
}

impl StageTracker {
    fn new() -> Self {
        StageTracker {
            current: Cell::new(Stage::NotStarted),
        }
    }

    fn advance(&self, stage: Stage) {
        self.current.set(stage);
    }

    fn get(&self) -> Stage {
        self.current.get()
    }
}

/// Immutable dispatch machinery shared by all invocations.
pub(crate) struct Dispatcher {
    pub(crate) router: Router,
    pub(crate) registry: Registry,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
    pub(crate) exceptions: ExceptionTable,
    pub(crate) config: RuntimeConfig,
}

impl Dispatcher {
    /// Run one request through middleware, matching, binding, dependency
    /// resolution, and the handler. Never panics outward; never returns
    /// more or less than one response.
    pub(crate) fn dispatch(&self, req: &Request) -> Response {
        let tracker = StageTracker::new();

        let endpoint = |request: &Request| self.run_endpoint(request, &tracker);
        let catch = |request: &Request, err: ApiError| {
            tracker.advance(Stage::Error);
            self.render(request, &err)
        };

        let attempt = catch_unwind(AssertUnwindSafe(|| {
            Next::new(&self.middleware, &endpoint, &catch).run(req)
        }));

        match attempt {
            Ok(response) => {
                tracker.advance(Stage::ResponseBuilt);
                response
            }
            Err(panic) => {
                let message = panic_message(&panic);
                error!(
                    invocation_id = %req.invocation_id,
                    stage = tracker.get().as_str(),
                    panic = %message,
                    "Invocation panicked"
                );
                self.render(req, &ApiError::unhandled(format!("panic: {message}")))
            }
        }
    }

    /// The innermost pipeline: everything inside the middleware chain.
    fn run_endpoint(&self, req: &Request, tracker: &StageTracker) -> Response {
        tracker.advance(Stage::Matching);
        let matched = match self.router.resolve(&req.method, &req.path) {
            RouteResolution::Matched(matched) => matched,
            RouteResolution::NotFound => {
                tracker.advance(Stage::Error);
                return self.render(
                    req,
                    &ApiError::RouteNotFound {
                        method: req.method.clone(),
                        path: req.path.clone(),
                    },
                );
            }
            RouteResolution::MethodNotAllowed { allowed } => {
                tracker.advance(Stage::Error);
                return self.render(
                    req,
                    &ApiError::MethodNotAllowed {
                        method: req.method.clone(),
                        path: req.path.clone(),
                        allowed,
                    },
                );
            }
        };

        // Attach the typed captures so handlers and providers can read them.
        let mut scoped = req.clone();
        scoped.path_params = matched.captures;

        match self.run_matched(&scoped, &matched.route, tracker) {
            Ok(response) => response,
            Err(err) => {
                tracker.advance(Stage::Error);
                self.render(&scoped, &err)
            }
        }
    }

    fn run_matched(
        &self,
        req: &Request,
        route: &Arc<RouteSpec>,
        tracker: &StageTracker,
    ) -> Result<Response, ApiError> {
        tracker.advance(Stage::Binding);
        let bound = bind(req, route, &self.registry)?;

        tracker.advance(Stage::DependencyResolution);
        let mut resolver = Resolver::new(&self.registry, bound.dep_args);

        // Security requirements come first so nothing else runs
        // unauthenticated.
        for requirement in &route.security {
            let claims = resolver.resolve_scheme(req, &requirement.scheme)?;
            // An optional scheme with no credential binds null and skips
            // the scope check.
            if !claims.is_null() && !scopes_satisfied(&claims, &requirement.scopes) {
                return Err(ApiError::Authorization {
                    scheme: requirement.scheme.name().to_string(),
                    detail: "Insufficient permissions".to_string(),
                });
            }
        }

        // Route-level dependencies run for their effects, declaration order.
        for dep_ref in &route.dependencies {
            resolver.resolve(req, dep_ref)?;
        }

        let mut args = bound.args;
        for spec in &route.params {
            match &spec.source {
                ParamSource::Dependency(dep_ref) => {
                    let value = resolver.resolve(req, dep_ref)?;
                    args.0.insert(spec.name.clone(), value);
                }
                ParamSource::Security(scheme) => {
                    let value = resolver.resolve_scheme(req, scheme)?;
                    args.0.insert(spec.name.clone(), value);
                }
                ParamSource::RawEvent => {
                    args.0.insert(spec.name.clone(), (*req.envelope).clone());
                }
                _ => {}
            }
        }

        tracker.advance(Stage::HandlerExecution);
        debug!(
            invocation_id = %req.invocation_id,
            template = %route.template,
            "Invoking handler"
        );
        let outcome = route.handler.call(req, args).map_err(ApiError::from)?;

        let response = match outcome {
            Outcome::Response(response) => response,
            Outcome::Json(value) => {
                if let Some(schema) = &route.response_schema {
                    if let Some(violation) = schema.first_violation(&value) {
                        return Err(ApiError::unhandled(format!(
                            "response body does not match the declared schema: {violation}"
                        )));
                    }
                }
                Response::json(route.status, value)
            }
        };
        Ok(response)
    }

    /// Render an error via the exception table, logging it at the right
    /// severity first.
    fn render(&self, req: &Request, err: &ApiError) -> Response {
        match err.kind() {
            crate::errors::ErrorKind::Unhandled | crate::errors::ErrorKind::DependencyCycle => {
                error!(invocation_id = %req.invocation_id, kind = %err.kind(), error = %err, "Invocation failed");
            }
            _ => {
                debug!(invocation_id = %req.invocation_id, kind = %err.kind(), error = %err, "Invocation rejected");
            }
        }
        self.exceptions.render(req, err, self.config.debug)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
