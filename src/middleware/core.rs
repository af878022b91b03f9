use std::sync::Arc;

use crate::errors::ApiError;
use crate::request::Request;
use crate::response::Response;

/// Onion-style middleware around request dispatch.
///
/// A middleware sees the request on the way in and the response on the way
/// out of a single `next.run(req)` call. Returning without calling `next`
/// short-circuits everything further in, route handling included. Errors
/// returned here are rendered through the app's exception table, the same
/// as errors from handlers.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: &Request, next: Next<'_>) -> Result<Response, ApiError>;
}

/// The rest of the pipeline from one middleware's point of view.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    endpoint: &'a (dyn Fn(&Request) -> Response + 'a),
    catch: &'a (dyn Fn(&Request, ApiError) -> Response + 'a),
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        chain: &'a [Arc<dyn Middleware>],
        endpoint: &'a (dyn Fn(&Request) -> Response + 'a),
        catch: &'a (dyn Fn(&Request, ApiError) -> Response + 'a),
    ) -> Self {
        Next {
            chain,
            endpoint,
            catch,
        }
    }

    /// Run the remaining chain and the endpoint. Always yields a response;
    /// errors from inner middlewares are already rendered.
    #[must_use]
    pub fn run(self, req: &Request) -> Response {
        match self.chain.split_first() {
            Some((first, rest)) => {
                let catch = self.catch;
                let next = Next {
                    chain: rest,
                    endpoint: self.endpoint,
                    catch,
                };
                match first.handle(req, next) {
                    Ok(response) => response,
                    Err(err) => (catch)(req, err),
                }
            }
            None => (self.endpoint)(req),
        }
    }
}
