//! Typed extraction helpers for the dynamic `params` object.

use serde_json::Value;

use crate::proto::protocol::CoreError;

/// Extract a required string argument from a JSON object.
pub fn required_str(params: &Value, key: &str) -> Result<String, CoreError> {
    match params.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(CoreError::usage(format!(
            "Missing or invalid required argument: '{}'",
            key
        ))),
    }
}

/// Extract an optional string argument. Present-but-wrong-type is an error.
pub fn optional_str(params: &Value, key: &str) -> Result<Option<String>, CoreError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s.to_string()))
            }
        }
        Some(_) => Err(CoreError::usage(format!(
            "Argument '{}' must be a string",
            key
        ))),
    }
}

/// Extract a value that may be a string or a number (chain aliases, amounts).
pub fn optional_str_or_number(params: &Value, key: &str) -> Result<Option<String>, CoreError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(CoreError::usage(format!(
            "Argument '{}' must be a string or number",
            key
        ))),
    }
}

/// Required variant of [`optional_str_or_number`].
pub fn required_str_or_number(params: &Value, key: &str) -> Result<String, CoreError> {
    optional_str_or_number(params, key)?.ok_or_else(|| {
        CoreError::usage(format!("Missing or invalid required argument: '{}'", key))
    })
}

/// Extract an optional boolean flag, defaulting to `false`.
pub fn flag(params: &Value, key: &str) -> Result<bool, CoreError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(CoreError::usage(format!(
            "Argument '{}' must be a boolean",
            key
        ))),
    }
}

/// Extract an optional array of strings.
pub fn optional_str_array(params: &Value, key: &str) -> Result<Option<Vec<String>>, CoreError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(s.trim().to_string()),
                    _ => {
                        return Err(CoreError::usage(format!(
                            "Argument '{}' must be an array of strings",
                            key
                        )))
                    }
                }
            }
            Ok(Some(out))
        }
        Some(_) => Err(CoreError::usage(format!(
            "Argument '{}' must be an array of strings",
            key
        ))),
    }
}

/// Extract an optional non-negative integer (JSON number or numeric string).
pub fn optional_u64(params: &Value, key: &str) -> Result<Option<u64>, CoreError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
            CoreError::usage(format!("Argument '{}' must be a non-negative integer", key))
        }),
        Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| {
            CoreError::usage(format!("Argument '{}' must be a non-negative integer", key))
        }),
        Some(_) => Err(CoreError::usage(format!(
            "Argument '{}' must be a non-negative integer",
            key
        ))),
    }
}
