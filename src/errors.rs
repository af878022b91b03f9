//! # Error Module
//!
//! Two error surfaces meet here. [`HandlerError`] is what application code
//! (handlers, dependency providers, middleware) returns: an explicit HTTP
//! status error, a registrable domain error, or an opaque internal failure.
//! [`ApiError`] is the pipeline's own tagged error model: every failure an
//! invocation can produce is one of its variants, and the exception
//! dispatcher maps each to exactly one response.
//!
//! [`BuildError`] is separate on purpose: it can only occur while the
//! application is being assembled, never during an invocation.

use http::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::validation::ValidationIssue;

/// Closed set of invocation error kinds, usable as exception-handler keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RouteNotFound,
    MethodNotAllowed,
    Validation,
    Authentication,
    Authorization,
    Handler,
    Unhandled,
    DependencyCycle,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RouteNotFound => "route_not_found",
            ErrorKind::MethodNotAllowed => "method_not_allowed",
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Handler => "handler_error",
            ErrorKind::Unhandled => "unhandled",
            ErrorKind::DependencyCycle => "dependency_cycle",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by application code during an invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Explicit HTTP-status error; rendered as `{"detail": ...}` with the
    /// given status and extra headers unless a status-keyed handler overrides.
    #[error("http error {status}")]
    Http {
        status: u16,
        detail: Value,
        headers: Vec<(String, String)>,
    },
    /// Domain error addressable by code through a registered exception
    /// handler. Without one it is treated as unhandled.
    #[error("domain error '{code}'")]
    Custom { code: String, detail: Value },
    /// Anything else that escaped the handler.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    /// HTTP error with an explicit detail payload.
    #[must_use]
    pub fn http(status: u16, detail: impl Into<Value>) -> Self {
        HandlerError::Http {
            status,
            detail: detail.into(),
            headers: Vec::new(),
        }
    }

    /// HTTP error with the canonical reason phrase as detail.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        let detail = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Error");
        HandlerError::http(status, detail)
    }

    /// HTTP error carrying response headers (e.g. `WWW-Authenticate`).
    #[must_use]
    pub fn http_with_headers(
        status: u16,
        detail: impl Into<Value>,
        headers: Vec<(String, String)>,
    ) -> Self {
        HandlerError::Http {
            status,
            detail: detail.into(),
            headers,
        }
    }

    /// Domain error identified by `code`.
    #[must_use]
    pub fn custom(code: impl Into<String>, detail: impl Into<Value>) -> Self {
        HandlerError::Custom {
            code: code.into(),
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        HandlerError::Internal(err.into())
    }
}

/// Every failure one invocation can produce. The dispatcher guarantees each
/// variant maps to exactly one response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no route matches {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    #[error("request validation failed with {} issue(s)", issues.len())]
    Validation { issues: Vec<ValidationIssue> },

    #[error("authentication failed for scheme '{scheme}': {detail}")]
    Authentication {
        scheme: String,
        status: u16,
        detail: String,
        www_authenticate: Option<String>,
    },

    #[error("insufficient permissions for scheme '{scheme}': {detail}")]
    Authorization { scheme: String, detail: String },

    #[error(transparent)]
    Handler(HandlerError),

    #[error("dependency cycle detected: {}", chain.join(" -> "))]
    DependencyCycle { chain: Vec<String> },

    #[error("unhandled error: {message}")]
    Unhandled { message: String },
}

impl ApiError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::RouteNotFound { .. } => ErrorKind::RouteNotFound,
            ApiError::MethodNotAllowed { .. } => ErrorKind::MethodNotAllowed,
            ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::Authentication { .. } => ErrorKind::Authentication,
            ApiError::Authorization { .. } => ErrorKind::Authorization,
            ApiError::Handler(_) => ErrorKind::Handler,
            ApiError::Unhandled { .. } => ErrorKind::Unhandled,
            ApiError::DependencyCycle { .. } => ErrorKind::DependencyCycle,
        }
    }

    #[must_use]
    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        ApiError::Validation { issues }
    }

    #[must_use]
    pub fn unhandled(message: impl Into<String>) -> Self {
        ApiError::Unhandled {
            message: message.into(),
        }
    }
}

impl From<HandlerError> for ApiError {
    fn from(err: HandlerError) -> Self {
        match err {
            // Declared application errors keep their kind; everything else
            // that escaped is unhandled by definition.
            HandlerError::Http { .. } | HandlerError::Custom { .. } => ApiError::Handler(err),
            HandlerError::Internal(inner) => ApiError::Unhandled {
                message: format!("{inner:#}"),
            },
        }
    }
}

/// Structural error raised while assembling an application. These surface
/// from `AppBuilder::build()` and never at invocation time.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid route template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("ambiguous route templates for {method}: '{first}' and '{second}'")]
    AmbiguousRoute {
        method: Method,
        first: String,
        second: String,
    },

    #[error("route '{route}' has no handler")]
    MissingHandler { route: String },

    #[error("duplicate dependency name '{0}'")]
    DuplicateDependency(String),

    #[error("unknown dependency reference '{0}'")]
    UnknownDependency(String),

    #[error("dependency cycle: {}", chain.join(" -> "))]
    DependencyCycle { chain: Vec<String> },

    #[error("invalid JSON schema on route '{route}': {reason}")]
    InvalidSchema { route: String, reason: String },
}
