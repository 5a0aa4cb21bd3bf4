use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ActionId, RouteId};

/// Priority given to actions that do not declare one.
pub const DEFAULT_PRIORITY: i64 = 50;

/// A unit of crawl work bound to a route and a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
  pub id: ActionId,
  pub provider: String,
  pub route: String,
  /// Free-form route parameter (a username, a path fragment, ...).
  #[serde(default)]
  pub query: String,
  /// Higher runs first.
  pub priority: i64,
  pub created: DateTime<Utc>,
  #[serde(default)]
  pub stats: ActionStats,
  #[serde(default)]
  pub state: ActionState,
}

/// Counters accumulated while an action runs. Never decremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStats {
  /// Pages fetched.
  pub pages: u64,
  /// Items extracted, before persistence.
  pub results: u64,
  /// Items created in the item store.
  pub items: u64,
  /// Items that already existed and were updated.
  pub updated: u64,
  /// Child actions spawned.
  pub spawned: u64,
}

/// Progress and bookkeeping for an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionState {
  pub current_page: u32,
  pub finished: bool,
  pub finished_date: Option<DateTime<Utc>>,
  pub started_date: Option<DateTime<Utc>>,
  /// Last resolved URL, kept for diagnostics.
  pub last_link: Option<String>,
  /// Route-specific continuation state (cursors, tokens).
  pub data: serde_json::Map<String, serde_json::Value>,
  /// Failed execution attempts so far.
  pub attempts: u32,
  pub failed: bool,
  pub last_error: Option<String>,
}

impl Default for ActionState {
  fn default() -> Self {
    Self {
      current_page: 1,
      finished: false,
      finished_date: None,
      started_date: None,
      last_link: None,
      data: serde_json::Map::new(),
      attempts: 0,
      failed: false,
      last_error: None,
    }
  }
}

impl Action {
  /// Create a pending action at the default priority.
  pub fn new(provider: impl Into<String>, route: impl Into<String>, query: impl Into<String>) -> Self {
    Self {
      id: ActionId::new(),
      provider: provider.into(),
      route: route.into(),
      query: query.into(),
      priority: DEFAULT_PRIORITY,
      created: Utc::now(),
      stats: ActionStats::default(),
      state: ActionState::default(),
    }
  }

  /// Create a pending action for a registry key.
  pub fn for_route(route: &RouteId, query: impl Into<String>) -> Self {
    Self::new(route.provider.clone(), route.name.clone(), query)
  }

  pub fn with_priority(mut self, priority: i64) -> Self {
    self.priority = priority;
    self
  }

  pub fn with_id(mut self, id: ActionId) -> Self {
    self.id = id;
    self
  }

  pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
    self.created = created;
    self
  }

  pub fn route_id(&self) -> RouteId {
    RouteId::new(self.provider.clone(), self.route.clone())
  }

  pub fn is_finished(&self) -> bool {
    self.state.finished
  }

  pub fn is_failed(&self) -> bool {
    self.state.failed
  }
}
