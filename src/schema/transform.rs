//! Typed unary transforms used as pre/post formatters and list formatters
//!
//! Library callers construct transforms from closures. Job files name one of
//! the built-ins below, which are resolved once when the file is loaded.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type TransformFn = dyn Fn(Value) -> Result<Value, String> + Send + Sync;
type ListFormatterFn = dyn Fn(&[Value]) -> Value + Send + Sync;

/// A value-to-value transform stored by reference inside a [`FieldSpec`]
///
/// [`FieldSpec`]: crate::schema::FieldSpec
#[derive(Clone)]
pub struct Transform(Arc<TransformFn>);

impl Transform {
    /// Wraps an infallible closure
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(move |value| Ok(f(value))))
    }

    /// Wraps a closure that may reject its input
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Wraps a closure over strings; non-string values pass through untouched
    pub fn on_str<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self::new(move |value| match value {
            Value::String(s) => Value::String(f(&s)),
            other => other,
        })
    }

    pub fn apply(&self, value: Value) -> Result<Value, String> {
        (self.0)(value)
    }

    /// Runs `self`, then `next` on its output
    pub fn then(self, next: Transform) -> Transform {
        Self(Arc::new(move |value| {
            let value = self.apply(value)?;
            next.apply(value)
        }))
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform(..)")
    }
}

/// Collapses every node matched by a list field into one value
#[derive(Clone)]
pub struct ListFormatter(Arc<ListFormatterFn>);

impl ListFormatter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, values: &[Value]) -> Value {
        (self.0)(values)
    }
}

impl fmt::Debug for ListFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ListFormatter(..)")
    }
}

/// Truthiness: null, false, "", 0, [] and {} are false
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Looks up a built-in transform by name
pub fn builtin(name: &str) -> Option<Transform> {
    let transform = match name {
        "trim" => Transform::on_str(|s| s.trim().to_string()),
        "lowercase" => Transform::on_str(|s| s.to_lowercase()),
        "uppercase" => Transform::on_str(|s| s.to_uppercase()),
        "collapse-whitespace" => {
            Transform::on_str(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        }
        // Keeps what a number parser needs: "$1,299.00" -> "1299.00"
        "digits" => Transform::on_str(|s| {
            s.chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect()
        }),
        "bool" => Transform::new(|value| Value::Bool(truthy(&value))),
        _ => return None,
    };
    Some(transform)
}

/// Looks up a built-in list formatter by name
pub fn builtin_list_formatter(name: &str) -> Option<ListFormatter> {
    let formatter = match name {
        "count" => ListFormatter::new(|values| Value::from(values.len())),
        "join" => ListFormatter::new(|values| {
            let parts: Vec<String> = values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            Value::String(parts.join(", "))
        }),
        "first" => ListFormatter::new(|values| values.first().cloned().unwrap_or(Value::Null)),
        "last" => ListFormatter::new(|values| values.last().cloned().unwrap_or(Value::Null)),
        _ => return None,
    };
    Some(formatter)
}
