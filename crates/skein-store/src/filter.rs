//! Eligibility filters.
//!
//! An [`ActionFilter`] is the conjunction the scheduler hands to
//! [`ActionStore::find_one`](crate::ActionStore::find_one): the base
//! eligibility condition, the routes and ids to exclude, and any number of
//! [`FilterFragment`]s contributed by worker refinements.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use skein_action::{Action, ActionId, RouteId};

/// A conjunctive action filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionFilter {
  /// Match on `state.finished` when set.
  pub finished: Option<bool>,
  /// Include actions that exhausted their attempts.
  pub include_failed: bool,
  /// Routes whose actions must not match.
  pub exclude_routes: BTreeSet<RouteId>,
  /// Actions that must not match.
  pub exclude_ids: BTreeSet<ActionId>,
  /// Additional conditions, all of which must hold.
  pub fragments: Vec<FilterFragment>,
}

/// A refinement merged into an [`ActionFilter`].
///
/// Empty lists and absent bounds do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterFragment {
  /// Only actions of these providers.
  pub providers: Vec<String>,
  /// Only actions of these routes, as `provider:name` keys.
  pub routes: Vec<String>,
  pub min_priority: Option<i64>,
  pub max_priority: Option<i64>,
}

impl ActionFilter {
  /// The base eligibility filter: unfinished and not failed.
  pub fn unfinished() -> Self {
    Self {
      finished: Some(false),
      ..Self::default()
    }
  }

  pub fn excluding_routes(mut self, routes: impl IntoIterator<Item = RouteId>) -> Self {
    self.exclude_routes.extend(routes);
    self
  }

  pub fn excluding_ids(mut self, ids: impl IntoIterator<Item = ActionId>) -> Self {
    self.exclude_ids.extend(ids);
    self
  }

  pub fn refine(mut self, fragment: FilterFragment) -> Self {
    if !fragment.is_empty() {
      self.fragments.push(fragment);
    }
    self
  }

  /// Evaluate the filter against an action in memory.
  pub fn matches(&self, action: &Action) -> bool {
    if let Some(finished) = self.finished
      && action.state.finished != finished
    {
      return false;
    }
    if !self.include_failed && action.state.failed {
      return false;
    }
    if self.exclude_ids.contains(&action.id) {
      return false;
    }
    if !self.exclude_routes.is_empty() && self.exclude_routes.contains(&action.route_id()) {
      return false;
    }
    self.fragments.iter().all(|f| f.matches(action))
  }
}

impl FilterFragment {
  pub fn is_empty(&self) -> bool {
    self.providers.is_empty()
      && self.routes.is_empty()
      && self.min_priority.is_none()
      && self.max_priority.is_none()
  }

  pub fn matches(&self, action: &Action) -> bool {
    if !self.providers.is_empty() && !self.providers.contains(&action.provider) {
      return false;
    }
    if !self.routes.is_empty() {
      let key = action.route_id().to_string();
      if !self.routes.contains(&key) {
        return false;
      }
    }
    if let Some(min) = self.min_priority
      && action.priority < min
    {
      return false;
    }
    if let Some(max) = self.max_priority
      && action.priority > max
    {
      return false;
    }
    true
  }
}

/// Scheduling order: priority descending, then oldest first, then by id.
pub fn scheduling_order(a: &Action, b: &Action) -> Ordering {
  b.priority
    .cmp(&a.priority)
    .then_with(|| a.created.cmp(&b.created))
    .then_with(|| a.id.cmp(&b.id))
}
