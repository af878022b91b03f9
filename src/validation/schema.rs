use regex::Regex;
use serde_json::{json, Value};

/// Declared shape of a parameter or body field.
///
/// Built once at registration time through the constructor/builder methods and
/// never mutated afterwards. The same schema drives string coercion for
/// path/query/header/cookie sources, JSON coercion for body fragments, and the
/// JSON Schema rendering used by the metadata export.
#[derive(Debug, Clone)]
pub enum TypeSchema {
    String {
        min_length: Option<usize>,
        max_length: Option<usize>,
        pattern: Option<Regex>,
    },
    Integer {
        bounds: Bounds,
    },
    Float {
        bounds: Bounds,
    },
    Boolean,
    Uuid,
    Array {
        items: Box<TypeSchema>,
    },
    Object {
        fields: Vec<FieldSpec>,
    },
    /// Accepts any JSON value unchanged.
    Any,
}

/// Numeric bounds. Stored as `f64` for both integer and float schemas; the
/// comparison happens after coercion.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub gt: Option<f64>,
    pub ge: Option<f64>,
    pub lt: Option<f64>,
    pub le: Option<f64>,
}

impl Bounds {
    pub fn is_empty(&self) -> bool {
        self.gt.is_none() && self.ge.is_none() && self.lt.is_none() && self.le.is_none()
    }
}

/// One declared field of an object schema.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub schema: TypeSchema,
    pub required: bool,
    pub default: Option<Value>,
}

impl FieldSpec {
    #[must_use]
    pub fn required(name: impl Into<String>, schema: TypeSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: true,
            default: None,
        }
    }

    #[must_use]
    pub fn optional(name: impl Into<String>, schema: TypeSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: false,
            default: None,
        }
    }

    /// Optional field that falls back to `default` when absent.
    #[must_use]
    pub fn with_default(name: impl Into<String>, schema: TypeSchema, default: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            required: false,
            default: Some(default),
        }
    }
}

impl TypeSchema {
    #[must_use]
    pub fn string() -> Self {
        TypeSchema::String {
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    #[must_use]
    pub fn integer() -> Self {
        TypeSchema::Integer {
            bounds: Bounds::default(),
        }
    }

    #[must_use]
    pub fn float() -> Self {
        TypeSchema::Float {
            bounds: Bounds::default(),
        }
    }

    #[must_use]
    pub fn boolean() -> Self {
        TypeSchema::Boolean
    }

    #[must_use]
    pub fn uuid() -> Self {
        TypeSchema::Uuid
    }

    #[must_use]
    pub fn any() -> Self {
        TypeSchema::Any
    }

    #[must_use]
    pub fn array(items: TypeSchema) -> Self {
        TypeSchema::Array {
            items: Box::new(items),
        }
    }

    #[must_use]
    pub fn object(fields: impl IntoIterator<Item = FieldSpec>) -> Self {
        TypeSchema::Object {
            fields: fields.into_iter().collect(),
        }
    }

    /// Minimum string length. No effect on non-string schemas.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        if let TypeSchema::String { min_length, .. } = &mut self {
            *min_length = Some(len);
        }
        self
    }

    /// Maximum string length. No effect on non-string schemas.
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        if let TypeSchema::String { max_length, .. } = &mut self {
            *max_length = Some(len);
        }
        self
    }

    /// Regex the full string value must match. No effect on non-string schemas.
    #[must_use]
    pub fn pattern(mut self, regex: Regex) -> Self {
        if let TypeSchema::String { pattern, .. } = &mut self {
            *pattern = Some(regex);
        }
        self
    }

    /// Exclusive lower bound. No effect on non-numeric schemas.
    #[must_use]
    pub fn gt(mut self, value: impl Into<f64>) -> Self {
        if let Some(bounds) = self.bounds_mut() {
            bounds.gt = Some(value.into());
        }
        self
    }

    /// Inclusive lower bound. No effect on non-numeric schemas.
    #[must_use]
    pub fn ge(mut self, value: impl Into<f64>) -> Self {
        if let Some(bounds) = self.bounds_mut() {
            bounds.ge = Some(value.into());
        }
        self
    }

    /// Exclusive upper bound. No effect on non-numeric schemas.
    #[must_use]
    pub fn lt(mut self, value: impl Into<f64>) -> Self {
        if let Some(bounds) = self.bounds_mut() {
            bounds.lt = Some(value.into());
        }
        self
    }

    /// Inclusive upper bound. No effect on non-numeric schemas.
    #[must_use]
    pub fn le(mut self, value: impl Into<f64>) -> Self {
        if let Some(bounds) = self.bounds_mut() {
            bounds.le = Some(value.into());
        }
        self
    }

    fn bounds_mut(&mut self) -> Option<&mut Bounds> {
        match self {
            TypeSchema::Integer { bounds } | TypeSchema::Float { bounds } => Some(bounds),
            _ => None,
        }
    }

    /// Whether values of this schema live in the JSON body by default
    /// (structured/collection types, as opposed to bare scalars).
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            TypeSchema::Array { .. } | TypeSchema::Object { .. } | TypeSchema::Any
        )
    }

    /// Short name used in log fields and issue messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            TypeSchema::String { .. } => "string",
            TypeSchema::Integer { .. } => "integer",
            TypeSchema::Float { .. } => "number",
            TypeSchema::Boolean => "boolean",
            TypeSchema::Uuid => "uuid",
            TypeSchema::Array { .. } => "array",
            TypeSchema::Object { .. } => "object",
            TypeSchema::Any => "any",
        }
    }

    /// Render as a JSON Schema fragment for the metadata export.
    pub fn to_json_schema(&self) -> Value {
        match self {
            TypeSchema::String {
                min_length,
                max_length,
                pattern,
            } => {
                let mut out = json!({ "type": "string" });
                if let Some(min) = min_length {
                    out["minLength"] = json!(min);
                }
                if let Some(max) = max_length {
                    out["maxLength"] = json!(max);
                }
                if let Some(re) = pattern {
                    out["pattern"] = json!(re.as_str());
                }
                out
            }
            TypeSchema::Integer { bounds } => {
                let mut out = json!({ "type": "integer" });
                render_bounds(&mut out, bounds);
                out
            }
            TypeSchema::Float { bounds } => {
                let mut out = json!({ "type": "number" });
                render_bounds(&mut out, bounds);
                out
            }
            TypeSchema::Boolean => json!({ "type": "boolean" }),
            TypeSchema::Uuid => json!({ "type": "string", "format": "uuid" }),
            TypeSchema::Array { items } => {
                json!({ "type": "array", "items": items.to_json_schema() })
            }
            TypeSchema::Object { fields } => {
                let mut properties = serde_json::Map::new();
                let mut required = Vec::new();
                for field in fields {
                    let mut prop = field.schema.to_json_schema();
                    if let Some(default) = &field.default {
                        prop["default"] = default.clone();
                    }
                    properties.insert(field.name.clone(), prop);
                    if field.required {
                        required.push(Value::String(field.name.clone()));
                    }
                }
                let mut out = json!({ "type": "object", "properties": properties });
                if !required.is_empty() {
                    out["required"] = Value::Array(required);
                }
                out
            }
            TypeSchema::Any => json!({}),
        }
    }
}

fn render_bounds(target: &mut Value, bounds: &Bounds) {
    if let Some(gt) = bounds.gt {
        target["exclusiveMinimum"] = json!(gt);
    }
    if let Some(ge) = bounds.ge {
        target["minimum"] = json!(ge);
    }
    if let Some(lt) = bounds.lt {
        target["exclusiveMaximum"] = json!(lt);
    }
    if let Some(le) = bounds.le {
        target["maximum"] = json!(le);
    }
}
