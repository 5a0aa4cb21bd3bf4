//! Validation and normalization of raw transform output.

use serde_json::{Map, Value};
use skein_action::SpawnRequest;

use crate::error::TransformOutputError;

/// Sanitized transform output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
  pub items: Vec<Map<String, Value>>,
  pub operations: Vec<SpawnRequest>,
  pub has_next_page: bool,
  /// Continuation data merged into the action's `state.data`.
  pub data: Option<Map<String, Value>>,
}

/// Normalize raw transform output.
///
/// - `null` is treated as an empty object
/// - missing `items` / `operations` become empty sequences
/// - present but non-array `items` / `operations` are a [`TransformOutputError::TypeMismatch`]
/// - string fields of items are trimmed, then falsy fields (`null`, `false`,
///   `0`, `""`) are dropped
/// - `hasNextPage` (or `has_next_page`) defaults to `false`
pub fn sanitize(raw: Value) -> Result<Extraction, TransformOutputError> {
  let mut output = match raw {
    Value::Object(map) => map,
    Value::Null => Map::new(),
    other => {
      return Err(TransformOutputError::NotAnObject {
        found: kind(&other),
      });
    }
  };

  let items = match take_array(&mut output, "items")? {
    Some(values) => values
      .into_iter()
      .enumerate()
      .map(|(index, value)| sanitize_item(index, value))
      .collect::<Result<Vec<_>, _>>()?,
    None => Vec::new(),
  };

  let operations = match take_array(&mut output, "operations")? {
    Some(values) => values
      .into_iter()
      .enumerate()
      .map(|(index, value)| {
        serde_json::from_value::<SpawnRequest>(value).map_err(|e| {
          TransformOutputError::InvalidOperation {
            index,
            message: e.to_string(),
          }
        })
      })
      .collect::<Result<Vec<_>, _>>()?,
    None => Vec::new(),
  };

  let next_page_field = if output.contains_key("hasNextPage") {
    "hasNextPage"
  } else {
    "has_next_page"
  };
  let has_next_page = match output.remove(next_page_field) {
    None | Some(Value::Null) => false,
    Some(Value::Bool(flag)) => flag,
    Some(other) => {
      return Err(TransformOutputError::TypeMismatch {
        field: next_page_field.to_string(),
        expected: "a boolean",
        found: kind(&other),
      });
    }
  };

  let data = match output.remove("data") {
    None | Some(Value::Null) => None,
    Some(Value::Object(map)) => Some(map),
    Some(other) => {
      return Err(TransformOutputError::TypeMismatch {
        field: "data".to_string(),
        expected: "an object",
        found: kind(&other),
      });
    }
  };

  Ok(Extraction {
    items,
    operations,
    has_next_page,
    data,
  })
}

fn take_array(
  output: &mut Map<String, Value>,
  field: &str,
) -> Result<Option<Vec<Value>>, TransformOutputError> {
  match output.remove(field) {
    None | Some(Value::Null) => Ok(None),
    Some(Value::Array(values)) => Ok(Some(values)),
    Some(other) => Err(TransformOutputError::TypeMismatch {
      field: field.to_string(),
      expected: "an array",
      found: kind(&other),
    }),
  }
}

fn sanitize_item(index: usize, value: Value) -> Result<Map<String, Value>, TransformOutputError> {
  let Value::Object(fields) = value else {
    return Err(TransformOutputError::TypeMismatch {
      field: format!("items[{}]", index),
      expected: "an object",
      found: kind(&value),
    });
  };

  Ok(
    fields
      .into_iter()
      .map(|(name, value)| match value {
        Value::String(s) => (name, Value::String(s.trim().to_string())),
        other => (name, other),
      })
      .filter(|(_, value)| is_truthy(value))
      .collect(),
  )
}

fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}

fn kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
