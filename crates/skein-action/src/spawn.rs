//! Follow-on work reported by a route transform.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::id::RouteId;

/// A child action requested by an extraction.
///
/// `route` may be a bare route name (resolved against `provider`, or the
/// parent's provider when absent) or a full `provider:name` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
  #[serde(default)]
  pub provider: Option<String>,
  pub route: String,
  #[serde(default)]
  pub query: String,
  #[serde(default)]
  pub priority: Option<i64>,
}

impl SpawnRequest {
  /// Resolve the registry key, inheriting the parent's provider.
  pub fn route_id(&self, parent_provider: &str) -> RouteId {
    match &self.provider {
      Some(provider) => RouteId::new(provider.clone(), self.route.clone()),
      None => RouteId::parse(&self.route)
        .unwrap_or_else(|| RouteId::new(parent_provider, self.route.clone())),
    }
  }

  /// Build the pending action. `default_priority` applies when the request
  /// does not declare one.
  pub fn into_action(self, parent_provider: &str, default_priority: i64) -> Action {
    let route = self.route_id(parent_provider);
    Action::for_route(&route, self.query).with_priority(self.priority.unwrap_or(default_priority))
  }
}
