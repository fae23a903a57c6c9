//! Event and user property payloads accepted by the façade.

use serde_json::{Map, Value};

/// Property payload supplied by the host.
///
/// Hosts either hand over JSON text they serialized themselves or a
/// structured value. Structured values are serialized here, before anything
/// crosses the backend boundary. Text is passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Properties {
    Text(String),
    Json(Value),
}

impl Properties {
    pub fn empty() -> Self {
        Properties::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Properties::Text(text) => text.trim().is_empty(),
            Properties::Json(Value::Object(map)) => map.is_empty(),
            Properties::Json(Value::Null) => true,
            Properties::Json(_) => false,
        }
    }

    pub fn into_json_string(self) -> String {
        match self {
            Properties::Text(text) => text,
            Properties::Json(Value::Null) => String::new(),
            Properties::Json(value) => value.to_string(),
        }
    }
}

impl Default for Properties {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<String> for Properties {
    fn from(text: String) -> Self {
        Properties::Text(text)
    }
}

impl From<&str> for Properties {
    fn from(text: &str) -> Self {
        Properties::Text(text.to_string())
    }
}

impl From<&String> for Properties {
    fn from(text: &String) -> Self {
        Properties::Text(text.clone())
    }
}

impl From<Value> for Properties {
    fn from(value: Value) -> Self {
        Properties::Json(value)
    }
}

impl From<Map<String, Value>> for Properties {
    fn from(map: Map<String, Value>) -> Self {
        Properties::Json(Value::Object(map))
    }
}

impl<T: Into<Properties>> From<Option<T>> for Properties {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}
