use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An extracted record, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
  pub provider: String,
  /// Route that last produced the item.
  pub route: String,
  /// Identity within the provider.
  pub key: String,
  pub data: serde_json::Map<String, serde_json::Value>,
  pub scraped_at: DateTime<Utc>,
}

impl Item {
  /// Build an item from sanitized fields. The `key` field, when it is a
  /// string, becomes the identity; otherwise a fresh key is generated and the
  /// item will always be created.
  pub fn from_fields(
    provider: impl Into<String>,
    route: impl Into<String>,
    data: serde_json::Map<String, serde_json::Value>,
  ) -> Self {
    Self::from_fields_or(provider, route, data, || uuid::Uuid::new_v4().to_string())
  }

  /// Like [`Item::from_fields`], with `fallback` supplying the key of an
  /// item that has none.
  pub fn from_fields_or(
    provider: impl Into<String>,
    route: impl Into<String>,
    data: serde_json::Map<String, serde_json::Value>,
    fallback: impl FnOnce() -> String,
  ) -> Self {
    let key = match data.get("key") {
      Some(serde_json::Value::String(key)) if !key.is_empty() => key.clone(),
      Some(serde_json::Value::Number(key)) => key.to_string(),
      _ => fallback(),
    };

    Self {
      provider: provider.into(),
      route: route.into(),
      key,
      data,
      scraped_at: Utc::now(),
    }
  }
}

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
  Created,
  Updated,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn fields(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap()
  }

  #[test]
  fn test_key_field_becomes_identity() {
    let item = Item::from_fields(
      "sinembargo",
      "post",
      fields(json!({ "key": "20-03-2015/1288239", "name": "Nota" })),
    );
    assert_eq!(item.key, "20-03-2015/1288239");
  }

  #[test]
  fn test_missing_key_generates_unique_identity() {
    let a = Item::from_fields("github", "search", fields(json!({ "name": "a" })));
    let b = Item::from_fields("github", "search", fields(json!({ "name": "a" })));
    assert_ne!(a.key, b.key);
  }

  #[test]
  fn test_fallback_key_only_for_keyless_items() {
    let keyless = Item::from_fields_or("github", "search", fields(json!({ "name": "a" })), || {
      "page-1/item-0".to_string()
    });
    assert_eq!(keyless.key, "page-1/item-0");

    let keyed = Item::from_fields_or("github", "search", fields(json!({ "key": "/ada" })), || {
      "page-1/item-0".to_string()
    });
    assert_eq!(keyed.key, "/ada");
  }
}
