mod core;
mod request_log;

pub use core::{Middleware, Next};
pub use request_log::RequestLogMiddleware;
