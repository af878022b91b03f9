//! Coercion of raw event fragments into declared types.
//!
//! String sources (path, query, header, cookie) arrive as text; the body
//! arrives as parsed JSON. Both funnel through the same [`TypeSchema`] so a
//! query parameter declared `integer` and a body field declared `integer`
//! report identical issues. Failures never short-circuit: every problem is
//! recorded on the accumulator and the caller decides what a non-empty
//! accumulator means.

use serde_json::{json, Number, Value};

use super::schema::{Bounds, TypeSchema};
use super::{ErrorAccumulator, Loc};

const TRUE_WORDS: [&str; 4] = ["true", "1", "yes", "on"];
const FALSE_WORDS: [&str; 4] = ["false", "0", "no", "off"];

/// Coerce a textual value (path/query/header/cookie source) into `schema`.
///
/// Returns `None` when one or more issues were recorded.
pub fn coerce_text(
    schema: &TypeSchema,
    raw: &str,
    loc: &Loc,
    acc: &mut ErrorAccumulator,
) -> Option<Value> {
    match schema {
        TypeSchema::String {
            min_length,
            max_length,
            pattern,
        } => check_string(raw, *min_length, *max_length, pattern.as_ref(), loc, acc),
        TypeSchema::Integer { bounds } => match raw.trim().parse::<i64>() {
            Ok(n) => check_int_bounds(n, bounds, loc, acc),
            Err(_) => {
                acc.push_parts(loc, "int_parsing", "Input should be a valid integer");
                None
            }
        },
        TypeSchema::Float { bounds } => match raw.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => check_float_bounds(f, bounds, loc, acc),
            _ => {
                acc.push_parts(loc, "float_parsing", "Input should be a valid number");
                None
            }
        },
        TypeSchema::Boolean => {
            let lowered = raw.trim().to_ascii_lowercase();
            if TRUE_WORDS.contains(&lowered.as_str()) {
                Some(Value::Bool(true))
            } else if FALSE_WORDS.contains(&lowered.as_str()) {
                Some(Value::Bool(false))
            } else {
                acc.push_parts(loc, "bool_parsing", "Input should be a valid boolean");
                None
            }
        }
        TypeSchema::Uuid => check_uuid(raw, loc, acc),
        // A lone textual value can still satisfy a collection schema as its
        // only element; multi-value fan-out happens in the binder.
        TypeSchema::Array { items } => {
            let element = coerce_text(items, raw, &child_loc(loc, json!(0)), acc)?;
            Some(Value::Array(vec![element]))
        }
        TypeSchema::Object { .. } => {
            acc.push_parts(loc, "dict_type", "Input should be a valid dictionary");
            None
        }
        TypeSchema::Any => Some(Value::String(raw.to_string())),
    }
}

/// Coerce a JSON fragment (body source) into `schema`.
pub fn coerce_json(
    schema: &TypeSchema,
    value: &Value,
    loc: &Loc,
    acc: &mut ErrorAccumulator,
) -> Option<Value> {
    match schema {
        TypeSchema::Any => Some(value.clone()),
        TypeSchema::String {
            min_length,
            max_length,
            pattern,
        } => match value {
            Value::String(s) => {
                check_string(s, *min_length, *max_length, pattern.as_ref(), loc, acc)
            }
            _ => {
                acc.push_parts(loc, "string_type", "Input should be a valid string");
                None
            }
        },
        TypeSchema::Integer { bounds } => match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    check_int_bounds(i, bounds, loc, acc)
                } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0) {
                    check_int_bounds(f as i64, bounds, loc, acc)
                } else {
                    acc.push_parts(loc, "int_parsing", "Input should be a valid integer");
                    None
                }
            }
            Value::String(s) => coerce_text(schema, s, loc, acc),
            _ => {
                acc.push_parts(loc, "int_type", "Input should be a valid integer");
                None
            }
        },
        TypeSchema::Float { bounds } => match value {
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.is_finite() => check_float_bounds(f, bounds, loc, acc),
                _ => {
                    acc.push_parts(loc, "float_parsing", "Input should be a valid number");
                    None
                }
            },
            Value::String(s) => coerce_text(schema, s, loc, acc),
            _ => {
                acc.push_parts(loc, "float_type", "Input should be a valid number");
                None
            }
        },
        TypeSchema::Boolean => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) => coerce_text(schema, s, loc, acc),
            _ => {
                acc.push_parts(loc, "bool_type", "Input should be a valid boolean");
                None
            }
        },
        TypeSchema::Uuid => match value {
            Value::String(s) => check_uuid(s, loc, acc),
            _ => {
                acc.push_parts(loc, "uuid_type", "UUID input should be a string");
                None
            }
        },
        TypeSchema::Array { items } => match value {
            Value::Array(elements) => {
                let mut out = Vec::with_capacity(elements.len());
                let mut ok = true;
                for (idx, element) in elements.iter().enumerate() {
                    match coerce_json(items, element, &child_loc(loc, json!(idx)), acc) {
                        Some(v) => out.push(v),
                        None => ok = false,
                    }
                }
                ok.then(|| Value::Array(out))
            }
            _ => {
                acc.push_parts(loc, "list_type", "Input should be a valid list");
                None
            }
        },
        TypeSchema::Object { fields } => match value {
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(fields.len());
                let mut ok = true;
                for field in fields {
                    let field_loc = child_loc(loc, json!(field.name));
                    match map.get(&field.name) {
                        Some(present) => {
                            match coerce_json(&field.schema, present, &field_loc, acc) {
                                Some(v) => {
                                    out.insert(field.name.clone(), v);
                                }
                                None => ok = false,
                            }
                        }
                        None if field.required => {
                            acc.push_parts(&field_loc, "missing", "Field required");
                            ok = false;
                        }
                        None => {
                            if let Some(default) = &field.default {
                                out.insert(field.name.clone(), default.clone());
                            }
                        }
                    }
                }
                // Undeclared keys pass through untouched rather than erroring.
                ok.then(|| Value::Object(out))
            }
            _ => {
                acc.push_parts(loc, "dict_type", "Input should be a valid dictionary");
                None
            }
        },
    }
}

fn check_string(
    raw: &str,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<&regex::Regex>,
    loc: &Loc,
    acc: &mut ErrorAccumulator,
) -> Option<Value> {
    let chars = raw.chars().count();
    let mut ok = true;
    if let Some(min) = min_length {
        if chars < min {
            acc.push_parts(
                loc,
                "string_too_short",
                format!("String should have at least {min} characters"),
            );
            ok = false;
        }
    }
    if let Some(max) = max_length {
        if chars > max {
            acc.push_parts(
                loc,
                "string_too_long",
                format!("String should have at most {max} characters"),
            );
            ok = false;
        }
    }
    if let Some(re) = pattern {
        if !re.is_match(raw) {
            acc.push_parts(
                loc,
                "string_pattern_mismatch",
                format!("String should match pattern '{}'", re.as_str()),
            );
            ok = false;
        }
    }
    ok.then(|| Value::String(raw.to_string()))
}

fn check_int_bounds(
    value: i64,
    bounds: &Bounds,
    loc: &Loc,
    acc: &mut ErrorAccumulator,
) -> Option<Value> {
    check_bounds(value as f64, bounds, loc, acc).then(|| Value::Number(Number::from(value)))
}

fn check_float_bounds(
    value: f64,
    bounds: &Bounds,
    loc: &Loc,
    acc: &mut ErrorAccumulator,
) -> Option<Value> {
    if !check_bounds(value, bounds, loc, acc) {
        return None;
    }
    Number::from_f64(value).map(Value::Number)
}

fn check_bounds(value: f64, bounds: &Bounds, loc: &Loc, acc: &mut ErrorAccumulator) -> bool {
    let mut ok = true;
    if let Some(gt) = bounds.gt {
        if value <= gt {
            acc.push_parts(
                loc,
                "greater_than",
                format!("Input should be greater than {gt}"),
            );
            ok = false;
        }
    }
    if let Some(ge) = bounds.ge {
        if value < ge {
            acc.push_parts(
                loc,
                "greater_than_equal",
                format!("Input should be greater than or equal to {ge}"),
            );
            ok = false;
        }
    }
    if let Some(lt) = bounds.lt {
        if value >= lt {
            acc.push_parts(loc, "less_than", format!("Input should be less than {lt}"));
            ok = false;
        }
    }
    if let Some(le) = bounds.le {
        if value > le {
            acc.push_parts(
                loc,
                "less_than_equal",
                format!("Input should be less than or equal to {le}"),
            );
            ok = false;
        }
    }
    ok
}

fn check_uuid(raw: &str, loc: &Loc, acc: &mut ErrorAccumulator) -> Option<Value> {
    if is_uuid(raw) {
        Some(Value::String(raw.to_ascii_lowercase()))
    } else {
        acc.push_parts(loc, "uuid_parsing", "Input should be a valid UUID");
        None
    }
}

// 8-4-4-4-12 hex, case-insensitive here; the route converter applies its own
// stricter lowercase grammar during matching.
fn is_uuid(raw: &str) -> bool {
    let groups: Vec<&str> = raw.split('-').collect();
    if groups.len() != 5 {
        return false;
    }
    let lens = [8usize, 4, 4, 4, 12];
    groups
        .iter()
        .zip(lens)
        .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()))
}

fn child_loc(loc: &Loc, part: Value) -> Loc {
    let mut child = loc.clone();
    child.push(part);
    child
}
