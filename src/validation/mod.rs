//! # Validation Module
//!
//! Type coercion and validation for every value the pipeline extracts:
//! path captures, query/header/cookie strings, and JSON body fragments.
//!
//! The module is accumulator-driven. Nothing in here aborts on the first
//! problem; issues collect in an [`ErrorAccumulator`] and the dispatcher turns
//! a non-empty accumulator into a single 422 response listing every issue.
//! Issue entries follow the `{loc, msg, type}` wire shape, with `loc` rooted
//! at the parameter source (`path`, `query`, `header`, `cookie`, `body`).

mod coerce;
mod declared;
mod schema;

pub use coerce::{coerce_json, coerce_text};
pub use declared::CompiledSchema;
pub use schema::{Bounds, FieldSpec, TypeSchema};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Path of an issue inside the request, e.g. `["body", "items", 2, "price"]`.
/// Elements are strings or integers, matching the wire format.
pub type Loc = Vec<Value>;

/// One validation failure, serialized as `{loc, msg, type}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub loc: Loc,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ValidationIssue {
    pub fn new(loc: Loc, kind: impl Into<String>, msg: impl Into<String>) -> Self {
        ValidationIssue {
            loc,
            msg: msg.into(),
            kind: kind.into(),
        }
    }
}

/// Collects every validation failure across one invocation before reporting,
/// so a client receives the complete set of correctable issues in one round
/// trip.
#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    issues: Vec<ValidationIssue>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn push_parts(&mut self, loc: &Loc, kind: impl Into<String>, msg: impl Into<String>) {
        self.issues.push(ValidationIssue::new(loc.clone(), kind, msg));
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }
}
