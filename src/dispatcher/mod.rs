//! # Dispatcher Module
//!
//! The per-invocation pipeline: middleware chain, route matching, parameter
//! binding, dependency resolution, handler execution, and exception dispatch.
//!
//! ## Invocation Flow
//!
//! 1. The event adapter hands the dispatcher a normalized request
//! 2. Middleware wrap the rest of the pipeline, outermost first
//! 3. The router resolves the route (or 404/405, which skip the rest)
//! 4. Every declared parameter (the route's and its dependencies') is
//!    extracted and validated; issues accumulate into one 422
//! 5. Security schemes, then route-level dependencies, then parameter
//!    dependencies resolve, memoized by name
//! 6. The handler runs; its outcome becomes the response
//!
//! A failure at any stage moves the invocation to the error stage, and the
//! exception table produces the response instead. Panics anywhere inside
//! are caught; every invocation yields exactly one response.

mod bind;
mod core;
mod exceptions;

pub use core::Stage;
pub use exceptions::{exception_fn, ExceptionHandler};

pub(crate) use bind::reachable_dependencies;
pub(crate) use core::Dispatcher;
pub(crate) use exceptions::{ExceptionTable, HandlerKey};
