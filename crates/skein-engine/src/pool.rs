//! Worker pool accounting.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use skein_action::{Action, ActionId, RouteId};
use skein_route::{Route, RouteRegistry};

/// An action bound to a worker, together with its route.
#[derive(Clone)]
pub struct Assignment {
  pub action: Action,
  pub route: Arc<dyn Route>,
}

impl std::fmt::Debug for Assignment {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Assignment")
      .field("action", &self.action.id)
      .field("route", &self.route.descriptor().id)
      .finish()
  }
}

/// A worker's current binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
  pub worker_id: String,
  pub action_id: ActionId,
  pub route: RouteId,
}

/// Which worker holds which action.
#[derive(Debug, Default)]
pub(crate) struct WorkerPool {
  bindings: HashMap<String, Binding>,
}

impl WorkerPool {
  pub fn bind(&mut self, worker_id: &str, action: &Action) {
    self.bindings.insert(
      worker_id.to_string(),
      Binding {
        worker_id: worker_id.to_string(),
        action_id: action.id,
        route: action.route_id(),
      },
    );
  }

  pub fn release(&mut self, worker_id: &str) -> Option<Binding> {
    self.bindings.remove(worker_id)
  }

  pub fn clear(&mut self) {
    self.bindings.clear();
  }

  pub fn running_ids(&self) -> BTreeSet<ActionId> {
    self.bindings.values().map(|b| b.action_id).collect()
  }

  pub fn route_counts(&self) -> BTreeMap<RouteId, usize> {
    let mut counts = BTreeMap::new();
    for binding in self.bindings.values() {
      *counts.entry(binding.route.clone()).or_insert(0) += 1;
    }
    counts
  }

  /// Routes whose bound-worker count reached their cap.
  pub fn disabled_routes(&self, routes: &RouteRegistry) -> BTreeSet<RouteId> {
    self
      .route_counts()
      .into_iter()
      .filter(|(route, count)| routes.concurrency(route).is_some_and(|cap| *count >= cap))
      .map(|(route, _)| route)
      .collect()
  }

  pub fn snapshot(&self) -> Vec<Binding> {
    let mut bindings: Vec<Binding> = self.bindings.values().cloned().collect();
    bindings.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
    bindings
  }
}
