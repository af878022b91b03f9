//! Handler abstraction.
//!
//! A handler receives the normalized [`Request`] plus its bound arguments
//! and produces either a JSON value (wrapped in the route's declared status)
//! or a full [`Response`]. Handlers never see the platform envelope unless
//! they declared a raw-event parameter.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::HandlerError;
use crate::request::Request;
use crate::response::Response;

/// Arguments bound for one invocation, keyed by parameter name.
#[derive(Debug, Clone, Default)]
pub struct Args(pub Map<String, Value>);

impl Args {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Deserialize the whole argument map into a typed struct.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, HandlerError> {
        serde_json::from_value(Value::Object(self.0))
            .map_err(|err| HandlerError::internal(anyhow::anyhow!("argument decode: {err}")))
    }
}

/// What a handler hands back.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Serialized with the route's status code and JSON content type.
    Json(Value),
    /// Full control over status, headers, and body.
    Response(Response),
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Json(value)
    }
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Outcome::Response(response)
    }
}

pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: &Request, args: Args) -> Result<Outcome, HandlerError>;
}

/// Shared trait object stored on a route.
pub type SharedHandler = Arc<dyn Handler>;

struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Request, Args) -> Result<Outcome, HandlerError> + Send + Sync + 'static,
{
    fn call(&self, req: &Request, args: Args) -> Result<Outcome, HandlerError> {
        (self.0)(req, args)
    }
}

/// Wrap a closure taking the request and raw arguments.
pub fn handler_fn<F>(f: F) -> SharedHandler
where
    F: Fn(&Request, Args) -> Result<Outcome, HandlerError> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

struct TypedHandler<T, R, F> {
    f: F,
    _marker: PhantomData<fn(T) -> R>,
}

impl<T, R, F> Handler for TypedHandler<T, R, F>
where
    T: DeserializeOwned + Send + Sync + 'static,
    R: Serialize + Send + Sync + 'static,
    F: Fn(T) -> Result<R, HandlerError> + Send + Sync + 'static,
{
    fn call(&self, _req: &Request, args: Args) -> Result<Outcome, HandlerError> {
        let data: T = args.deserialize()?;
        let out = (self.f)(data)?;
        let value = serde_json::to_value(out)
            .map_err(|err| HandlerError::internal(anyhow::anyhow!("response encode: {err}")))?;
        Ok(Outcome::Json(value))
    }
}

/// Wrap a closure over a deserializable argument struct. The bound argument
/// map is decoded into `T` before the closure runs; the closure's return
/// value is serialized back to JSON.
pub fn typed<T, R, F>(f: F) -> SharedHandler
where
    T: DeserializeOwned + Send + Sync + 'static,
    R: Serialize + Send + Sync + 'static,
    F: Fn(T) -> Result<R, HandlerError> + Send + Sync + 'static,
{
    Arc::new(TypedHandler {
        f,
        _marker: PhantomData,
    })
}
