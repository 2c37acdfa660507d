use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Property bag supplied by the caller for a single evaluation.
pub type Properties = HashMap<String, PropertyValue>;

/// A dynamically typed property value.
///
/// Used both for the caller's properties and for the expected values of targeting conditions
/// received from the server.
#[derive(Debug, Serialize, Deserialize, PartialEq, From, Clone)]
#[serde(untagged)]
pub enum PropertyValue {
    /// A JSON boolean.
    Boolean(bool),
    /// Any JSON number. Integers are widened to `f64`.
    Number(f64),
    /// A JSON string.
    String(String),
    /// A JSON array.
    List(Vec<PropertyValue>),
    /// JSON `null`.
    Null,
}

impl PropertyValue {
    /// Returns the string slice if the value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number if the value is numeric. Strings are not coerced.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean if the value is a boolean.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<Vec<&str>> for PropertyValue {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}
