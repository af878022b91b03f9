//! Platform invocation loop.
//!
//! Bridges the synchronous dispatch core onto the `lambda_runtime` event
//! loop. The core never suspends mid-invocation, so each event is handled
//! to completion before the next poll.

use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::info;

use crate::app::App;
use crate::telemetry;

/// Serve the app until the platform shuts the process down.
///
/// Initializes tracing from the app's config, then polls for events. Every
/// event yields exactly one reply value; errors never escape to the runtime
/// as invocation failures except when the event loop itself breaks.
pub async fn run(app: App) -> Result<(), Error> {
    telemetry::init(app.config());
    info!(routes = app.routes().count(), "Runtime starting");

    let app = Arc::new(app);
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let app = Arc::clone(&app);
        async move { Ok::<Value, Error>(app.handle(event.payload)) }
    }))
    .await
}
