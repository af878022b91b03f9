//! # Portico
//!
//! **Portico** is a serverless request-dispatch framework for Rust. One app
//! definition serves API Gateway HTTP proxy events, SQS queue batches, and
//! scheduled triggers through a single typed routing core.
//!
//! ## Overview
//!
//! Portico normalizes every platform event into an internal [`Request`],
//! resolves it against compiled route templates, binds and validates declared
//! parameters, resolves named dependencies with per-invocation memoization,
//! and runs the handler inside an onion of middleware. Errors are rendered by
//! a most-specific-first exception table, and the reply is shaped back into
//! whatever envelope the triggering event expects.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`app`]** - Route registration and the validated one-step build
//! - **[`router`]** - Template compilation, typed converters, precedence-ordered matching
//! - **[`dispatcher`]** - Staged dispatch: authenticate, bind, resolve, handle, render
//! - **[`di`]** - Named dependency providers with memoization and cycle detection
//! - **[`params`]** - Parameter declarations (path, query, header, cookie, body, dependency)
//! - **[`validation`]** - Declared-shape checks with accumulated issue lists
//! - **[`security`]** - Header-credential schemes, claims, and scope enforcement
//! - **[`middleware`]** - Onion-style wrappers around the dispatch core
//! - **[`event`]** - Platform event detection and the three adapters
//! - **[`metadata`]** - Serializable description of a built app
//! - **[`runtime`]** - `lambda_runtime` event loop (behind the `lambda` feature)
//!
//! ### Invocation Flow
//!
//! Every event an app receives flows through the same layers:
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Platform
//!     participant Adapter as Event Adapter
//!     participant Middleware as Middleware Chain
//!     participant Router
//!     participant Binder as Parameter Binder
//!     participant Resolver as Dependency Resolver
//!     participant Handler
//!     participant Exceptions as Exception Table
//!
//!     Platform->>Adapter: raw JSON event
//!     Adapter->>Adapter: classify (http / queue / scheduled)
//!     Adapter->>Middleware: normalized Request
//!     Middleware->>Router: resolve(method, path)
//!
//!     alt No template matches
//!         Router-->>Platform: 404 {"detail": "Not Found"}
//!     end
//!
//!     Router->>Binder: captures + declared params
//!     Binder->>Binder: bind literals, accumulate issues
//!
//!     alt Validation issues
//!         Binder-->>Platform: 422 with per-parameter detail
//!     end
//!
//!     Binder->>Resolver: dependency roots
//!     Resolver->>Resolver: run providers once per name
//!     Resolver->>Handler: bound arguments
//!
//!     alt Handler errors or panics
//!         Handler-->>Exceptions: lookup by code, status, kind
//!         Exceptions-->>Platform: rendered error response
//!     end
//!
//!     Handler-->>Middleware: outcome
//!     Middleware-->>Adapter: Response
//!     Adapter-->>Platform: envelope JSON
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use portico::{handler_fn, App, HttpEventBuilder, ParamSpec, Route, TypeSchema};
//! use serde_json::json;
//!
//! let app = App::builder()
//!     .route(
//!         Route::get("/pets/{pet_id:int}")
//!             .param(ParamSpec::path("pet_id", TypeSchema::integer()))
//!             .handler(handler_fn(|_req, args| {
//!                 Ok(json!({ "pet_id": args.get("pet_id") }).into())
//!             })),
//!     )
//!     .build()?;
//!
//! let reply = app.handle(HttpEventBuilder::get("/pets/41").build());
//! assert_eq!(reply["statusCode"], 200);
//! # Ok::<(), portico::BuildError>(())
//! ```
//!
//! ## Features
//!
//! - **Typed path templates** - `{pet_id:int}` style converters with overlap-aware precedence
//! - **Accumulating validation** - every binding failure in one 422 reply, not just the first
//! - **Dependency injection** - named providers resolved at most once per invocation
//! - **Security schemes** - API keys and bearer credentials with scope checks
//! - **Partial batch replies** - queue records dispatch independently; only failures retry
//! - **Exception dispatch** - handlers registered by error code, status, or kind
//! - **Metadata export** - gateway-ready templates and schemes from the built app
//!
//! ## Runtime Considerations
//!
//! The dispatch core is synchronous: an invocation runs to completion on the
//! polling task, and handlers are plain `Fn` values behind [`Arc`]. The
//! `lambda` feature (on by default) adds [`runtime::run`], which drives the
//! app from the `lambda_runtime` event loop; with the feature off, the crate
//! is a pure library and [`App::handle`] can be called from any harness that
//! produces event JSON.
//!
//! [`Arc`]: std::sync::Arc

pub mod app;
pub mod config;
pub mod di;
pub mod dispatcher;
pub mod errors;
pub mod event;
pub mod handler;
pub mod ids;
pub mod metadata;
pub mod middleware;
pub mod params;
pub mod request;
pub mod response;
pub mod router;
#[cfg(feature = "lambda")]
pub mod runtime;
pub mod security;
pub mod telemetry;
pub mod validation;

pub use app::{
    App, AppBuilder, CacheKeys, Route, RouteKind, RouteSpec, SecurityRequirement,
    DEFAULT_BATCH_SIZE,
};
pub use config::RuntimeConfig;
pub use di::{provide_fn, Dependency, DependencyRef, Provide};
pub use dispatcher::{exception_fn, ExceptionHandler, Stage};
pub use errors::{ApiError, BuildError, ErrorKind, HandlerError};
pub use event::HttpEventBuilder;
pub use handler::{handler_fn, typed, Args, Handler, Outcome, SharedHandler};
pub use ids::InvocationId;
pub use middleware::{Middleware, Next, RequestLogMiddleware};
pub use params::{ParamSource, ParamSpec};
pub use request::Request;
pub use response::{Body, Headers, Response};
pub use security::{authenticate_fn, Authenticate, AuthRejection, CredentialRule, SecurityScheme};
pub use validation::{CompiledSchema, ErrorAccumulator, FieldSpec, TypeSchema, ValidationIssue};
