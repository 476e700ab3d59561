//! Response bodies.
//!
//! A body is built as a [`Value`] and rendered in one of two [`Format`]s. The compat format is
//! what existing clients parse: keys are bare words, strings are quoted without escaping, and
//! items are separated by `", "`.
//!
//! ```
//! use cgroups_rest::response::{Format, Value};
//!
//! let body = Value::object(vec![
//!     ("controllers", Value::strings(["cpu", "cpuacct"])),
//!     ("groups", Value::strings(["/", "/a"])),
//! ]);
//! assert_eq!(
//!     body.render(Format::Compat),
//!     r#"{controllers: ["cpu", "cpuacct"], groups: ["/", "/a"]}"#
//! );
//! assert_eq!(
//!     body.render(Format::Json),
//!     r#"{"controllers":["cpu","cpuacct"],"groups":["/","/a"]}"#
//! );
//! ```
//!
//! [`Value`]: enum.Value.html
//! [`Format`]: enum.Format.html

use std::fmt::{self, Write};

use serde::{
    ser::{SerializeMap, SerializeSeq},
    Deserialize, Serialize, Serializer,
};

/// Content type of every response body.
pub const CONTENT_TYPE: &str = "application/json";

/// Output format of response bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Bare keys, unescaped strings.
    #[default]
    Compat,
    /// Strict JSON.
    Json,
}

/// A response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Ordered key/value pairs.
    Object(Vec<(String, Value)>),
    /// Ordered items.
    Array(Vec<Value>),
    /// A string.
    String(String),
    /// A non-negative integer, e.g. a pid.
    Number(u64),
}

impl Value {
    /// Creates an object from ordered pairs.
    pub fn object<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Creates an array.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }

    /// Creates an array of strings.
    pub fn strings<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Self {
        Value::array(items.into_iter().map(|s| Value::String(s.into())))
    }

    /// `{}`
    pub fn empty_object() -> Self {
        Value::Object(Vec::new())
    }

    /// `{error: "<message>"}`
    pub fn error(message: impl fmt::Display) -> Self {
        Value::object(vec![("error", Value::String(message.to_string()))])
    }

    /// Renders the body in `format`.
    pub fn render(&self, format: Format) -> String {
        match format {
            Format::Compat => {
                let mut out = String::new();
                // Writing to a String does not fail.
                let _ = write_compat(&mut out, self);
                out
            }
            Format::Json => serde_json::to_string(self).unwrap_or_else(|_| String::from("{}")),
        }
    }
}

fn write_compat(out: &mut String, value: &Value) -> fmt::Result {
    match value {
        Value::Object(pairs) => {
            out.push('{');
            for (i, (key, value)) in pairs.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write!(out, "{}: ", key)?;
                write_compat(out, value)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_compat(out, item)?;
            }
            out.push(']');
        }
        Value::String(s) => write!(out, "\"{}\"", s)?,
        Value::Number(n) => write!(out, "{}", n)?,
    }
    Ok(())
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Object(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (key, value) in pairs {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Number(n) => serializer.serialize_u64(*n),
        }
    }
}
