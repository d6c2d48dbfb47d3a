//! Typed tool parameter schemas and best-effort argument coercion.
//!
//! A tool declares its parameters as a JSON-Schema-like object with
//! `properties` and `required`. [`ToolSchema::from_json`] reads the subset
//! used here into a typed descriptor, and [`coerce_args`] converts model
//! supplied arguments towards the declared kinds. Coercion never fails:
//! problems become warnings and the original value is kept.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Affirmative tokens for string-typed booleans (compared lowercase).
const TRUTHY_TOKENS: [&str; 5] = ["true", "1", "yes", "y", "on"];

/// Declared kind of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `"integer"`
    Integer,
    /// `"number"`
    Number,
    /// `"boolean"`
    Boolean,
    /// `"string"`
    String,
    /// `"object"`
    Object,
    /// `"array"`
    Array,
    /// Any other or missing type; values pass through untouched.
    Other,
}

impl ValueKind {
    /// Maps a JSON-Schema type name to a kind.
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "string" => Self::String,
            "object" => Self::Object,
            "array" => Self::Array,
            _ => Self::Other,
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySchema {
    /// Declared kind.
    pub kind: ValueKind,
    /// Human-readable description, if any.
    pub description: Option<String>,
    /// Documented default, if any.
    pub default: Option<Value>,
}

/// Typed view of a tool's parameter schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSchema {
    /// Declared parameters by name.
    pub properties: BTreeMap<String, PropertySchema>,
    /// Names of required parameters, in declaration order.
    pub required: Vec<String>,
}

impl ToolSchema {
    /// Reads `properties` and `required` from a JSON schema object.
    ///
    /// Missing or malformed sections are treated as empty.
    #[must_use]
    pub fn from_json(schema: &Value) -> Self {
        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, spec)| {
                        let kind = spec
                            .get("type")
                            .and_then(Value::as_str)
                            .map_or(ValueKind::Other, ValueKind::from_type_name);
                        let property = PropertySchema {
                            kind,
                            description: spec
                                .get("description")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            default: spec.get("default").cloned(),
                        };
                        (name.clone(), property)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let required = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            properties,
            required,
        }
    }

    /// Whether `name` is listed as required.
    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

/// Result of [`coerce_args`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoercedArgs {
    /// Arguments after coercion, including unknown pass-through keys.
    pub args: Map<String, Value>,
    /// One entry per problem found, in schema order then input order.
    pub warnings: Vec<String>,
}

/// Coerces `args` towards the kinds declared in `schema`.
///
/// Missing required parameters, failed conversions, non-object values for
/// object parameters and undeclared arguments each add a warning. Nothing
/// is dropped.
#[must_use]
pub fn coerce_args(schema: &ToolSchema, args: &Map<String, Value>) -> CoercedArgs {
    let mut out = CoercedArgs::default();

    for (name, property) in &schema.properties {
        let Some(value) = args.get(name) else {
            if schema.is_required(name) {
                out.warnings.push(format!("missing required: {name}"));
            }
            continue;
        };

        let coerced = match property.kind {
            ValueKind::Integer => to_integer(value).unwrap_or_else(|| {
                out.warnings.push(format!("could not coerce {name} to int"));
                value.clone()
            }),
            ValueKind::Number => to_number(value).unwrap_or_else(|| {
                out.warnings
                    .push(format!("could not coerce {name} to float"));
                value.clone()
            }),
            ValueKind::Boolean => Value::Bool(to_boolean(value)),
            ValueKind::String => Value::String(to_text(value)),
            ValueKind::Object => {
                if value.is_object() {
                    value.clone()
                } else {
                    out.warnings.push(format!("{name} expected object"));
                    let mut wrapped = Map::new();
                    wrapped.insert("_raw".to_string(), value.clone());
                    Value::Object(wrapped)
                }
            }
            ValueKind::Array | ValueKind::Other => value.clone(),
        };
        out.args.insert(name.clone(), coerced);
    }

    for (name, value) in args {
        if !schema.properties.contains_key(name) {
            out.args.insert(name.clone(), value.clone());
            out.warnings.push(format!("unknown arg: {name}"));
        }
    }

    out
}

#[allow(clippy::cast_possible_truncation)]
fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.abs() < 9.0e18)
                    .map(|f| f.trunc() as i64)
            })
            .map(Value::from),
        Value::Bool(b) => Some(Value::from(i64::from(*b))),
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn to_number(value: &Value) -> Option<Value> {
    let f = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    serde_json::Number::from_f64(f).map(Value::Number)
}

fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => TRUTHY_TOKENS.contains(&s.to_lowercase().as_str()),
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// String form of any value.
///
/// Strings are taken as-is, null is empty, booleans and numbers use their
/// plain spelling, and arrays and objects become JSON text.
pub(crate) fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
