use std::time::Instant;

use tracing::info;

use super::{Middleware, Next};
use crate::errors::ApiError;
use crate::request::Request;
use crate::response::Response;

/// Logs one structured line per invocation with method, path, status, and
/// elapsed time. Runs outermost so the duration covers the whole pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLogMiddleware;

impl RequestLogMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for RequestLogMiddleware {
    fn handle(&self, req: &Request, next: Next<'_>) -> Result<Response, ApiError> {
        let started = Instant::now();
        let response = next.run(req);
        info!(
            invocation_id = %req.invocation_id,
            method = %req.method,
            path = %req.path,
            status = response.status,
            duration_us = started.elapsed().as_micros() as u64,
            "Request completed"
        );
        Ok(response)
    }
}
