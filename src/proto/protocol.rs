// src/proto/protocol.rs

use serde_json::{json, Map, Value};
use thiserror::Error;

// Stable wire error codes, shared across every subsystem
pub mod error_codes {
    /// Internal/provider execution error
    pub const INTERNAL_ERROR: i64 = 1;
    /// Usage/input error (missing/invalid params)
    pub const USAGE_ERROR: i64 = 2;
    /// Upstream asked us to slow down
    pub const RATE_LIMITED: i64 = 11;
    /// Upstream/provider unavailable
    pub const UNAVAILABLE: i64 = 12;
    /// Unsupported action or policy-blocked action
    pub const UNSUPPORTED: i64 = 13;
}

/// Error type every handler returns; maps one-to-one onto wire codes.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Unsupported(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl CoreError {
    pub fn usage(msg: impl Into<String>) -> Self {
        CoreError::Usage(msg.into())
    }

    pub fn code(&self) -> i64 {
        match self {
            CoreError::Usage(_) => error_codes::USAGE_ERROR,
            CoreError::Unsupported(_) => error_codes::UNSUPPORTED,
            CoreError::RateLimited(_) => error_codes::RATE_LIMITED,
            CoreError::Unavailable(_) => error_codes::UNAVAILABLE,
            CoreError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }
}

/// Success envelope: `status` first, then the handler's fields. When the
/// caller asked for `resultsOnly`, the fields nest under `results` instead.
pub fn success(fields: Value, results_only: bool) -> Value {
    let mut out = Map::new();
    out.insert("status".to_string(), json!("ok"));
    if results_only {
        out.insert("results".to_string(), fields);
    } else if let Value::Object(map) = fields {
        for (k, v) in map {
            out.insert(k, v);
        }
    } else {
        out.insert("result".to_string(), fields);
    }
    Value::Object(out)
}

/// Error envelope: `{"status":"error","code":N,"error":"..."}`.
pub fn failure(code: i64, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "error": message,
    })
}

impl From<&CoreError> for Value {
    fn from(err: &CoreError) -> Value {
        failure(err.code(), &err.to_string())
    }
}
