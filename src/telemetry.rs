//! Tracing initialization.
//!
//! Configures JSON-formatted output suitable for CloudWatch Logs, or the
//! compact human-readable format when `PORTICO_LOG_PLAIN` is set. The log
//! level comes from `RUST_LOG`, defaulting to `info`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::RuntimeConfig;

/// Initialize the global subscriber once, before serving events.
///
/// Safe to call more than once; later calls are no-ops, which keeps tests
/// that share a process from fighting over the global.
pub fn init(config: &RuntimeConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.log_plain {
        let fmt_layer = fmt::layer().compact().with_target(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    } else {
        let fmt_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .flatten_event(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    }
}
