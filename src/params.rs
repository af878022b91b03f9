//! # Parameter Specs
//!
//! Declarative descriptions of where each handler argument comes from and
//! what shape it must have. Specs are built once per route at registration
//! time through the constructors below and are immutable afterwards; the
//! binder in the dispatcher walks them per invocation.

use std::sync::Arc;

use serde_json::Value;

use crate::di::DependencyRef;
use crate::security::SecurityScheme;
use crate::validation::TypeSchema;

/// Where a parameter's value comes from.
#[derive(Debug, Clone)]
pub enum ParamSource {
    /// Extracted by the route matcher, already converter-typed.
    Path,
    Query,
    Header {
        /// Translate `snake_case` names to `kebab-case` header names.
        /// Ignored when an explicit alias is set.
        convert_underscores: bool,
    },
    Cookie,
    Body {
        /// Bind `body[name]` even when this is the only body parameter.
        embed: bool,
    },
    /// Resolved through the dependency graph.
    Dependency(DependencyRef),
    /// Security scheme; binds the authenticated claims.
    Security(Arc<SecurityScheme>),
    /// The original platform envelope, untouched. Escape hatch.
    RawEvent,
}

/// One declared handler parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub alias: Option<String>,
    pub schema: TypeSchema,
    pub required: bool,
    pub default: Option<Value>,
    pub source: ParamSource,
}

impl ParamSpec {
    fn new(name: impl Into<String>, schema: TypeSchema, source: ParamSource) -> Self {
        ParamSpec {
            name: name.into(),
            alias: None,
            schema,
            required: true,
            default: None,
            source,
        }
    }

    /// Path parameter. Always present on a matched route; the declared
    /// schema re-validates the converter-typed capture for consistency.
    #[must_use]
    pub fn path(name: impl Into<String>, schema: TypeSchema) -> Self {
        Self::new(name, schema, ParamSource::Path)
    }

    #[must_use]
    pub fn query(name: impl Into<String>, schema: TypeSchema) -> Self {
        Self::new(name, schema, ParamSource::Query)
    }

    #[must_use]
    pub fn header(name: impl Into<String>, schema: TypeSchema) -> Self {
        Self::new(
            name,
            schema,
            ParamSource::Header {
                convert_underscores: true,
            },
        )
    }

    #[must_use]
    pub fn cookie(name: impl Into<String>, schema: TypeSchema) -> Self {
        Self::new(name, schema, ParamSource::Cookie)
    }

    #[must_use]
    pub fn body(name: impl Into<String>, schema: TypeSchema) -> Self {
        Self::new(name, schema, ParamSource::Body { embed: false })
    }

    /// Bind a dependency's resolved value.
    #[must_use]
    pub fn dependency(name: impl Into<String>, dep: DependencyRef) -> Self {
        Self::new(name, TypeSchema::any(), ParamSource::Dependency(dep))
    }

    /// Bind the claims produced by a security scheme.
    #[must_use]
    pub fn security(name: impl Into<String>, scheme: Arc<SecurityScheme>) -> Self {
        Self::new(name, TypeSchema::any(), ParamSource::Security(scheme))
    }

    /// Bind the raw platform event.
    #[must_use]
    pub fn raw_event(name: impl Into<String>) -> Self {
        Self::new(name, TypeSchema::any(), ParamSource::RawEvent)
    }

    /// Look the value up under a different wire name.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Missing value binds `null` instead of recording an issue.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Missing value binds `default`; implies optional.
    #[must_use]
    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.required = false;
        self.default = Some(default.into());
        self
    }

    /// Force top-level key embedding for a body parameter even when it is
    /// the only one on the route.
    #[must_use]
    pub fn embedded(mut self) -> Self {
        if let ParamSource::Body { embed } = &mut self.source {
            *embed = true;
        }
        self
    }

    /// Keep underscores verbatim when deriving the header name.
    #[must_use]
    pub fn raw_header_name(mut self) -> Self {
        if let ParamSource::Header {
            convert_underscores,
        } = &mut self.source
        {
            *convert_underscores = false;
        }
        self
    }

    /// Name used to look the value up in its source.
    #[must_use]
    pub fn lookup_name(&self) -> String {
        match &self.source {
            ParamSource::Header {
                convert_underscores,
            } => match &self.alias {
                Some(alias) => alias.to_ascii_lowercase(),
                None => {
                    let lowered = self.name.to_ascii_lowercase();
                    if *convert_underscores {
                        lowered.replace('_', "-")
                    } else {
                        lowered
                    }
                }
            },
            _ => self.alias.clone().unwrap_or_else(|| self.name.clone()),
        }
    }

    /// First `loc` element for issues on this parameter.
    #[must_use]
    pub fn source_label(&self) -> &'static str {
        match self.source {
            ParamSource::Path => "path",
            ParamSource::Query => "query",
            ParamSource::Header { .. } => "header",
            ParamSource::Cookie => "cookie",
            ParamSource::Body { .. } => "body",
            ParamSource::Dependency(_) | ParamSource::Security(_) | ParamSource::RawEvent => {
                "dependency"
            }
        }
    }

}
