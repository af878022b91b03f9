//! Route-level declared JSON Schemas, compiled once at build time.

use std::sync::Arc;

use serde_json::{json, Value};

use super::{ErrorAccumulator, Loc};

/// A JSON Schema compiled at registration time and shared for the process
/// lifetime. Compiling per request is measurably expensive; the registry is
/// read-only after build, so a plain `Arc` suffices.
#[derive(Clone)]
pub struct CompiledSchema {
    source: Value,
    validator: Arc<jsonschema::Validator>,
}

impl std::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("source", &self.source)
            .finish()
    }
}

impl CompiledSchema {
    /// Compile `schema`; returns the compiler's message on invalid schemas.
    pub fn compile(schema: Value) -> Result<Self, String> {
        let validator = jsonschema::validator_for(&schema).map_err(|e| e.to_string())?;
        Ok(Self {
            source: schema,
            validator: Arc::new(validator),
        })
    }

    /// The schema document as declared, for the metadata export.
    pub fn source(&self) -> &Value {
        &self.source
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// Validate `instance`, recording one issue per violation with `loc`
    /// rooted at `root` plus the instance path inside the document.
    pub fn validate_into(&self, instance: &Value, root: &str, acc: &mut ErrorAccumulator) {
        for error in self.validator.iter_errors(instance) {
            let mut loc: Loc = vec![json!(root)];
            let pointer = error.instance_path().to_string();
            for segment in pointer.split('/') {
                if segment.is_empty() {
                    continue;
                }
                match segment.parse::<usize>() {
                    Ok(idx) => loc.push(json!(idx)),
                    Err(_) => loc.push(json!(segment)),
                }
            }
            acc.push_parts(&loc, "schema", error.to_string());
        }
    }

    /// First violation message, if any. Used for response-schema checks where
    /// the full accumulator shape is not needed.
    pub fn first_violation(&self, instance: &Value) -> Option<String> {
        self.validator
            .iter_errors(instance)
            .next()
            .map(|e| e.to_string())
    }
}
