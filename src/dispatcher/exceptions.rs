//! Exception dispatch: turning an [`ApiError`] into the one response the
//! invocation owes its caller.
//!
//! Registered handlers are keyed three ways, checked most specific first:
//! application error code, then HTTP status, then error kind. Anything
//! without a match falls to the built-in rendering. Route-resolution
//! failures (404/405) are fixed responses and never consult the table.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::json;
use tracing::{error, warn};

use crate::errors::{ApiError, ErrorKind, HandlerError};
use crate::request::Request;
use crate::response::Response;

/// Lookup key for a registered exception handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum HandlerKey {
    /// Application error code from [`HandlerError::Custom`].
    Code(String),
    /// HTTP status from [`HandlerError::Http`].
    Status(u16),
    Kind(ErrorKind),
}

/// Produces the response for an error. The default rendering is always
/// available as a fallback, so implementations may be partial.
pub trait ExceptionHandler: Send + Sync + 'static {
    fn handle(&self, req: &Request, err: &ApiError) -> Response;
}

struct FnExceptionHandler<F>(F);

impl<F> ExceptionHandler for FnExceptionHandler<F>
where
    F: Fn(&Request, &ApiError) -> Response + Send + Sync + 'static,
{
    fn handle(&self, req: &Request, err: &ApiError) -> Response {
        (self.0)(req, err)
    }
}

/// Wrap a closure as an exception handler.
pub fn exception_fn<F>(f: F) -> Arc<dyn ExceptionHandler>
where
    F: Fn(&Request, &ApiError) -> Response + Send + Sync + 'static,
{
    Arc::new(FnExceptionHandler(f))
}

#[derive(Default)]
pub(crate) struct ExceptionTable {
    handlers: HashMap<HandlerKey, Arc<dyn ExceptionHandler>>,
}

impl ExceptionTable {
    pub(crate) fn insert(&mut self, key: HandlerKey, handler: Arc<dyn ExceptionHandler>) {
        self.handlers.insert(key, handler);
    }

    /// Candidate keys for an error, most specific first.
    fn candidates(err: &ApiError) -> Vec<HandlerKey> {
        match err {
            ApiError::Handler(HandlerError::Custom { code, .. }) => vec![
                HandlerKey::Code(code.clone()),
                HandlerKey::Kind(ErrorKind::Handler),
                HandlerKey::Kind(ErrorKind::Unhandled),
            ],
            ApiError::Handler(HandlerError::Http { status, .. }) => vec![
                HandlerKey::Status(*status),
                HandlerKey::Kind(ErrorKind::Handler),
            ],
            ApiError::Handler(HandlerError::Internal(_)) | ApiError::Unhandled { .. } => {
                vec![HandlerKey::Kind(ErrorKind::Unhandled)]
            }
            ApiError::Validation { .. } => vec![HandlerKey::Kind(ErrorKind::Validation)],
            ApiError::Authentication { .. } => vec![HandlerKey::Kind(ErrorKind::Authentication)],
            ApiError::Authorization { .. } => vec![HandlerKey::Kind(ErrorKind::Authorization)],
            ApiError::DependencyCycle { .. } => vec![
                HandlerKey::Kind(ErrorKind::DependencyCycle),
                HandlerKey::Kind(ErrorKind::Unhandled),
            ],
            // Fixed responses; the table is never consulted.
            ApiError::RouteNotFound { .. } | ApiError::MethodNotAllowed { .. } => Vec::new(),
        }
    }

    /// Render an error through the most specific registered handler, or the
    /// built-in rendering when none matches. A panicking handler logs and
    /// falls back to the built-in rendering.
    pub(crate) fn render(&self, req: &Request, err: &ApiError, debug: bool) -> Response {
        for key in Self::candidates(err) {
            if let Some(handler) = self.handlers.get(&key) {
                let attempt = catch_unwind(AssertUnwindSafe(|| handler.handle(req, err)));
                match attempt {
                    Ok(response) => return response,
                    Err(_) => {
                        error!(
                            kind = %err.kind(),
                            key = ?key,
                            "Exception handler panicked; using built-in rendering"
                        );
                        break;
                    }
                }
            }
        }
        default_response(err, debug)
    }
}

/// Built-in rendering for every error kind.
pub(crate) fn default_response(err: &ApiError, debug: bool) -> Response {
    match err {
        ApiError::RouteNotFound { .. } => Response::json(404, json!({ "detail": "Not Found" })),
        ApiError::MethodNotAllowed { allowed, .. } => {
            let joined = allowed
                .iter()
                .map(http::Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            Response::json(405, json!({ "detail": "Method Not Allowed" }))
                .with_header("allow", joined)
        }
        ApiError::Validation { issues } => Response::json(422, json!({ "detail": issues })),
        ApiError::Authentication {
            status,
            detail,
            www_authenticate,
            ..
        } => {
            let mut response = Response::json(*status, json!({ "detail": detail }));
            if let Some(challenge) = www_authenticate {
                response = response.with_header("www-authenticate", challenge.clone());
            }
            response
        }
        ApiError::Authorization { detail, .. } => {
            Response::json(403, json!({ "detail": detail }))
        }
        ApiError::Handler(HandlerError::Http {
            status,
            detail,
            headers,
        }) => {
            let mut response = Response::json(*status, json!({ "detail": detail }));
            for (name, value) in headers {
                response = response.with_header(name.clone(), value.clone());
            }
            response
        }
        ApiError::Handler(HandlerError::Custom { code, detail }) => {
            warn!(code = %code, "Application error with no registered handler");
            if debug {
                Response::json(500, json!({ "detail": detail, "code": code }))
            } else {
                Response::json(500, json!({ "detail": "Internal Server Error" }))
            }
        }
        ApiError::Handler(HandlerError::Internal(inner)) => {
            if debug {
                Response::json(500, json!({ "detail": format!("{inner:#}") }))
            } else {
                Response::json(500, json!({ "detail": "Internal Server Error" }))
            }
        }
        ApiError::DependencyCycle { chain } => {
            if debug {
                Response::json(
                    500,
                    json!({ "detail": format!("dependency cycle: {}", chain.join(" -> ")) }),
                )
            } else {
                Response::json(500, json!({ "detail": "Internal Server Error" }))
            }
        }
        ApiError::Unhandled { message } => {
            if debug {
                Response::json(500, json!({ "detail": message }))
            } else {
                Response::json(500, json!({ "detail": "Internal Server Error" }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::test_support::blank_request;

    #[test]
    fn test_code_handler_beats_kind_handler() {
        let mut table = ExceptionTable::default();
        table.insert(
            HandlerKey::Kind(ErrorKind::Handler),
            exception_fn(|_req, _err| Response::text(500, "kind")),
        );
        table.insert(
            HandlerKey::Code("OutOfStock".to_string()),
            exception_fn(|_req, _err| Response::text(409, "code")),
        );

        let err = ApiError::Handler(HandlerError::custom("OutOfStock", json!("none left")));
        let response = table.render(&blank_request(), &err, false);
        assert_eq!(response.status, 409);
    }

    #[test]
    fn test_unmatched_custom_code_renders_generic_500() {
        let table = ExceptionTable::default();
        let err = ApiError::Handler(HandlerError::custom("Mystery", json!(1)));
        let response = table.render(&blank_request(), &err, false);
        assert_eq!(response.status, 500);
        match &response.body {
            crate::response::Body::Json(value) => {
                assert_eq!(value["detail"], "Internal Server Error");
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_http_error_renders_its_status_and_headers() {
        let table = ExceptionTable::default();
        let err = ApiError::Handler(HandlerError::http_with_headers(
            404,
            json!("no such pet"),
            vec![("x-reason".to_string(), "gone".to_string())],
        ));
        let response = table.render(&blank_request(), &err, false);
        assert_eq!(response.status, 404);
        assert_eq!(response.headers.get("x-reason"), Some("gone"));
    }

    #[test]
    fn test_panicking_handler_falls_back_to_builtin() {
        let mut table = ExceptionTable::default();
        table.insert(
            HandlerKey::Kind(ErrorKind::Validation),
            exception_fn(|_req, _err| panic!("broken handler")),
        );
        let err = ApiError::validation(vec![]);
        let response = table.render(&blank_request(), &err, false);
        assert_eq!(response.status, 422);
    }

    #[test]
    fn test_method_not_allowed_carries_allow_header() {
        let err = ApiError::MethodNotAllowed {
            method: http::Method::DELETE,
            path: "/pets".to_string(),
            allowed: vec![http::Method::GET, http::Method::POST],
        };
        let response = default_response(&err, false);
        assert_eq!(response.status, 405);
        assert_eq!(response.headers.get("allow"), Some("GET, POST"));
    }
}
