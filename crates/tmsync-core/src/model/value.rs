// ── Property values ──
//
// Schema-less property bag values. Maps keep insertion order; whether a
// map is compared as a keyed set or structurally is decided by the
// differ's per-command strategy table, never by the value itself.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single property value inside a [`ConfigObject`](super::ConfigObject).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this value is a scalar (not a list or map).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Interpret tmsh-style switches (`yes`/`enabled`/`true`) as booleans.
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(n) => Some(*n != 0),
            Self::String(s) => match s.as_str() {
                "yes" | "enabled" | "true" => Some(true),
                "no" | "disabled" | "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Collect every string leaf reachable from this value, keys included.
    ///
    /// Used to discover reference edges between objects.
    pub fn collect_strings<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::String(s) => out.push(s),
            Self::List(items) => items.iter().for_each(|v| v.collect_strings(out)),
            Self::Map(map) => {
                for (k, v) in map {
                    out.push(k);
                    v.collect_strings(out);
                }
            }
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::Float(_) => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "none"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::List(_) | Self::Map(_) => {
                let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                write!(f, "{text}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Self::Map(m)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Self::List(l)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or_default()), Self::Int),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_json_shapes() {
        let v: Value = serde_json::from_value(json!({
            "a": 1, "b": "x", "c": [true, null], "d": 1.5
        }))
        .unwrap();
        let map = v.as_map().unwrap();
        assert_eq!(map["a"], Value::Int(1));
        assert_eq!(map["b"], Value::from("x"));
        assert_eq!(map["c"], Value::List(vec![Value::Bool(true), Value::Null]));
        assert_eq!(map["d"], Value::Float(1.5));
    }

    #[test]
    fn map_keeps_insertion_order() {
        let v = Value::from(json!({"z": 1, "a": 2}));
        let keys: Vec<&String> = v.as_map().unwrap().keys().collect();
        assert_eq!(keys, ["z", "a"]);
    }

    #[test]
    fn truthy_understands_tmsh_switches() {
        assert_eq!(Value::from("yes").truthy(), Some(true));
        assert_eq!(Value::from("disabled").truthy(), Some(false));
        assert_eq!(Value::from("maybe").truthy(), None);
    }

    #[test]
    fn collect_strings_includes_keys() {
        let v = Value::from(json!({"/Common/n1:80": {"address": "10.0.0.1"}}));
        let mut out = Vec::new();
        v.collect_strings(&mut out);
        assert_eq!(out, ["/Common/n1:80", "10.0.0.1"]);
    }
}
