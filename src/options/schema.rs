//! Syntactic checks for the `output_schema` turn option.
//!
//! Only the shape of the schema is checked here: that it is a JSON object,
//! that well-known keywords carry values of the right JSON type, and that
//! `required` names declared properties. Whether the agent's final answer
//! conforms to the schema is enforced by the agent itself.

use serde_json::{Map, Value};

use crate::{Result, SdkError};

/// JSON type names accepted by the `type` keyword.
const JSON_TYPES: &[&str] = &[
    "object", "array", "string", "number", "integer", "boolean", "null",
];

/// Keywords whose value must be a non-empty array of subschemas.
const COMBINATORS: &[&str] = &["anyOf", "oneOf", "allOf"];

/// Keywords whose value must be an object mapping names to subschemas.
const SCHEMA_MAPS: &[&str] = &["properties", "$defs", "definitions"];

/// Validate that `schema` is a well-formed JSON Schema object.
///
/// # Errors
///
/// Returns [`SdkError::InvalidOptions`] naming the offending location
/// (e.g. `$.properties.status.enum`) on the first violation found.
pub fn validate_output_schema(schema: &Value) -> Result<()> {
    check_schema(schema, "$")
}

fn check_schema(schema: &Value, path: &str) -> Result<()> {
    let Value::Object(map) = schema else {
        return Err(invalid(path, "schema must be a JSON object"));
    };

    if let Some(ty) = map.get("type") {
        check_type(ty, &format!("{path}.type"))?;
    }

    for &keyword in SCHEMA_MAPS {
        if let Some(value) = map.get(keyword) {
            let Value::Object(children) = value else {
                return Err(invalid(&format!("{path}.{keyword}"), "must be an object"));
            };
            for (name, child) in children {
                check_schema(child, &format!("{path}.{keyword}.{name}"))?;
            }
        }
    }

    if let Some(required) = map.get("required") {
        check_required(required, map, &format!("{path}.required"))?;
    }

    if let Some(values) = map.get("enum") {
        match values {
            Value::Array(list) if !list.is_empty() => {}
            _ => return Err(invalid(&format!("{path}.enum"), "must be a non-empty array")),
        }
    }

    if let Some(items) = map.get("items") {
        let items_path = format!("{path}.items");
        match items {
            Value::Array(list) => {
                for (i, child) in list.iter().enumerate() {
                    check_schema(child, &format!("{items_path}[{i}]"))?;
                }
            }
            other => check_schema(other, &items_path)?,
        }
    }

    if let Some(additional) = map.get("additionalProperties") {
        if !additional.is_boolean() {
            check_schema(additional, &format!("{path}.additionalProperties"))?;
        }
    }

    for &keyword in COMBINATORS {
        if let Some(value) = map.get(keyword) {
            let sub_path = format!("{path}.{keyword}");
            let Value::Array(list) = value else {
                return Err(invalid(&sub_path, "must be a non-empty array"));
            };
            if list.is_empty() {
                return Err(invalid(&sub_path, "must be a non-empty array"));
            }
            for (i, child) in list.iter().enumerate() {
                check_schema(child, &format!("{sub_path}[{i}]"))?;
            }
        }
    }

    Ok(())
}

fn check_type(ty: &Value, path: &str) -> Result<()> {
    match ty {
        Value::String(name) => check_type_name(name, path),
        Value::Array(names) if !names.is_empty() => {
            for name in names {
                let Some(name) = name.as_str() else {
                    return Err(invalid(path, "type names must be strings"));
                };
                check_type_name(name, path)?;
            }
            Ok(())
        }
        _ => Err(invalid(path, "must be a type name or a non-empty array of them")),
    }
}

fn check_type_name(name: &str, path: &str) -> Result<()> {
    if JSON_TYPES.contains(&name) {
        Ok(())
    } else {
        Err(invalid(path, &format!("unknown type `{name}`")))
    }
}

fn check_required(required: &Value, schema: &Map<String, Value>, path: &str) -> Result<()> {
    let Value::Array(names) = required else {
        return Err(invalid(path, "must be an array of property names"));
    };
    let properties = schema.get("properties").and_then(Value::as_object);

    for name in names {
        let Some(name) = name.as_str() else {
            return Err(invalid(path, "must be an array of property names"));
        };
        if let Some(props) = properties {
            if !props.contains_key(name) {
                return Err(invalid(path, &format!("`{name}` is not a declared property")));
            }
        }
    }
    Ok(())
}

fn invalid(path: &str, reason: &str) -> SdkError {
    SdkError::InvalidOptions(format!("output_schema {path}: {reason}"))
}
