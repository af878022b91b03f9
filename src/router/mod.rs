//! # Router Module
//!
//! Path matching and route resolution. Templates like `/pets/{pet_id:int}`
//! are compiled into anchored regexes at build time; incoming paths are
//! resolved with a linear scan over a precedence-sorted table.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Compiling route templates (literals plus typed placeholders) to regexes
//! - Ordering routes so literals match before placeholders and narrow
//!   converters before the generic string converter
//! - Rejecting ambiguous template pairs at build time
//! - Extracting converter-typed path parameters from matched paths
//! - Distinguishing an unknown path from a known path with the wrong method
//!
//! ## Matching
//!
//! A route matches only when its regex accepts the path *and* every
//! converter accepts its capture. A converter rejection (for example an
//! integer segment that overflows) makes the route transparent: the scan
//! moves on, and the request 404s rather than 422s if nothing else accepts
//! the path.

mod core;

pub use core::{Converter, RouteMatch, RouteResolution, Router};
