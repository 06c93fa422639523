//! Checks on the JSON schemas tools declare and on the arguments models send.
//!
//! Only the subset of JSON schema that tool definitions use in practice is understood:
//! `type` (a name or a list of names), `properties`, `required`, `enum` and
//! `additionalProperties: false`. Nested property schemas are checked for their own `type`
//! and `enum` but not descended into further. An `integer` accepts any whole number, `5.0`
//! included.
use serde_json::{Map, Value};

const KNOWN_TYPES: &[&str] = &[
    "object", "string", "number", "integer", "boolean", "array", "null",
];

/// Check that a parameter schema is something a model and the dispatcher can both use
pub fn validate_schema(schema: &Value) -> Result<(), String> {
    let object = schema
        .as_object()
        .ok_or_else(|| "schema must be a JSON object".to_string())?;

    let types = declared_types(object)?.ok_or_else(|| "schema must declare a type".to_string())?;

    if types.contains(&"object") {
        let properties = object
            .get("properties")
            .ok_or_else(|| "object schemas must declare properties".to_string())?
            .as_object()
            .ok_or_else(|| "properties must be a JSON object".to_string())?;

        for (name, property) in properties {
            let property = property
                .as_object()
                .ok_or_else(|| format!("property '{}' must be a JSON object", name))?;
            declared_types(property).map_err(|e| format!("property '{}': {}", name, e))?;
        }

        if let Some(required) = object.get("required") {
            let required = required
                .as_array()
                .ok_or_else(|| "required must be an array".to_string())?;
            for entry in required {
                let name = entry
                    .as_str()
                    .ok_or_else(|| "required entries must be strings".to_string())?;
                if !properties.contains_key(name) {
                    return Err(format!("required property '{}' is not declared", name));
                }
            }
        }
    }

    Ok(())
}

/// Check a model supplied payload against a schema that passed `validate_schema`.
///
/// Returns the arguments to hand to the tool. A missing payload (`null`) stands for an empty
/// object when the schema describes an object.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> Result<Value, String> {
    let Some(object) = schema.as_object() else {
        return Ok(arguments.clone());
    };

    let arguments = match arguments {
        Value::Null if accepts_object(object) => Value::Object(Map::new()),
        other => other.clone(),
    };

    check_value("arguments", object, &arguments)?;

    if let (Some(properties), Value::Object(supplied)) = (object.get("properties"), &arguments) {
        let properties = properties.as_object().cloned().unwrap_or_default();

        if let Some(required) = object.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !supplied.contains_key(name) {
                    return Err(format!("missing required property '{}'", name));
                }
            }
        }

        let closed = object.get("additionalProperties") == Some(&Value::Bool(false));
        for (name, value) in supplied {
            match properties.get(name).and_then(Value::as_object) {
                Some(property) => check_value(name, property, value)?,
                None if closed => return Err(format!("unexpected property '{}'", name)),
                None => {}
            }
        }
    }

    Ok(arguments)
}

fn declared_types(schema: &Map<String, Value>) -> Result<Option<Vec<&str>>, String> {
    let types = match schema.get("type") {
        None => return Ok(None),
        Some(Value::String(name)) => vec![name.as_str()],
        Some(Value::Array(names)) => names
            .iter()
            .map(|name| {
                name.as_str()
                    .ok_or_else(|| "type names must be strings".to_string())
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err("type must be a string or an array of strings".to_string()),
    };

    if let Some(unknown) = types.iter().find(|name| !KNOWN_TYPES.contains(name)) {
        return Err(format!("unknown type '{}'", unknown));
    }
    Ok(Some(types))
}

fn accepts_object(schema: &Map<String, Value>) -> bool {
    matches!(declared_types(schema), Ok(Some(types)) if types.contains(&"object"))
}

fn check_value(name: &str, schema: &Map<String, Value>, value: &Value) -> Result<(), String> {
    if let Ok(Some(types)) = declared_types(schema) {
        if !types.iter().any(|expected| matches_type(expected, value)) {
            return Err(format!(
                "'{}' should be {} but got {}",
                name,
                types.join(" or "),
                type_name(value)
            ));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(format!("'{}' must be one of {}", name, Value::from(allowed.clone())));
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
