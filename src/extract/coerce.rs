//! Type coercion for scalar fields

use crate::schema::{truthy, FieldSpec, FieldType};
use crate::ExtractionError;
use serde_json::{Number, Value};

/// Coerces a (pre-formatted) value to the field's declared type
///
/// List fields never reach this point; they are assembled by the field
/// evaluator.
pub fn coerce(value: Value, field: &FieldSpec) -> Result<Value, ExtractionError> {
    match field.field_type {
        FieldType::Text | FieldType::List => Ok(as_text(value)),
        FieldType::Number => as_number(value, field),
        FieldType::Json => as_json(value, field),
        FieldType::Undefined => {
            if field.boolean {
                Ok(Value::Bool(truthy(&value)))
            } else {
                Ok(value)
            }
        }
    }
}

fn as_text(value: Value) -> Value {
    match value {
        Value::String(_) | Value::Null => value,
        other => Value::String(other.to_string()),
    }
}

fn as_number(value: Value, field: &FieldSpec) -> Result<Value, ExtractionError> {
    match value {
        Value::Number(_) => Ok(value),
        Value::String(s) => parse_number(&s)
            .map(Value::Number)
            .ok_or_else(|| coercion_error(field, "number", &Value::String(s))),
        other => Err(coercion_error(field, "number", &other)),
    }
}

fn as_json(value: Value, field: &FieldSpec) -> Result<Value, ExtractionError> {
    match value {
        Value::String(s) => {
            serde_json::from_str(&s).map_err(|_| coercion_error(field, "json", &Value::String(s)))
        }
        // Already structured (produced by a preformatter)
        other => Ok(other),
    }
}

/// Parses decimal text; integral values become integers
///
/// `"39"` and `"39.0"` give `39`, `"9.99"` gives `9.99`. Non-finite values
/// and empty input are rejected.
pub fn parse_number(text: &str) -> Option<Number> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(int) = text.parse::<i64>() {
        return Some(Number::from(int));
    }

    let float = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        return Some(Number::from(float as i64));
    }
    Number::from_f64(float)
}

fn coercion_error(field: &FieldSpec, expected: &'static str, value: &Value) -> ExtractionError {
    let mut shown = value.to_string();
    if shown.len() > 80 {
        let cut = (0..=80).rev().find(|i| shown.is_char_boundary(*i)).unwrap_or(0);
        shown.truncate(cut);
        shown.push_str("...");
    }

    ExtractionError::Coercion {
        field: field.name.clone(),
        expected,
        value: shown,
    }
}
