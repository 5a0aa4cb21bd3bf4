use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque unique identifier of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(Uuid);

impl ActionId {
  pub fn new() -> Self {
    Self(Uuid::new_v4())
  }

  /// A stable id derived from this one and `name`. The same inputs always
  /// give the same id.
  pub fn derive(&self, name: &str) -> Self {
    Self(Uuid::new_v5(&self.0, name.as_bytes()))
  }

  pub fn as_uuid(&self) -> &Uuid {
    &self.0
  }
}

impl Default for ActionId {
  fn default() -> Self {
    Self::new()
  }
}

impl From<Uuid> for ActionId {
  fn from(id: Uuid) -> Self {
    Self(id)
  }
}

impl FromStr for ActionId {
  type Err = uuid::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Uuid::parse_str(s).map(Self)
  }
}

impl fmt::Display for ActionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// Registry key of a route: `provider:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteId {
  pub provider: String,
  pub name: String,
}

impl RouteId {
  pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      provider: provider.into(),
      name: name.into(),
    }
  }

  /// Parse a `provider:name` key.
  pub fn parse(key: &str) -> Option<Self> {
    let (provider, name) = key.split_once(':')?;
    if provider.is_empty() || name.is_empty() {
      return None;
    }
    Some(Self::new(provider, name))
  }
}

impl fmt::Display for RouteId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.provider, self.name)
  }
}
