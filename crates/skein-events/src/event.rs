//! Engine events.

use serde::{Deserialize, Serialize};
use skein_action::{ActionId, ActionStats, RouteId};

/// Category of a surfaced error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// The page could not be retrieved or rendered.
  Fetch,
  /// The route transform returned malformed output.
  TransformOutput,
  /// The route failed to build a URL or run its transform.
  Route,
  /// Reading or writing the store failed.
  Store,
  /// A worker's query refinement misbehaved.
  Refinement,
  /// The action was already finished or failed.
  Lifecycle,
}

/// Events emitted by the engine and its workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
  /// A worker entered its loop.
  WorkerStarted { worker_id: String },

  /// A worker left its loop.
  WorkerStopped { worker_id: String },

  /// An action was bound to a worker.
  ActionAssigned {
    worker_id: String,
    action_id: ActionId,
    route: RouteId,
    query: String,
    page: u32,
  },

  /// No action matched the eligibility filter.
  NoEligibleWork { worker_id: String },

  /// A page was fetched, extracted and persisted.
  PageScraped {
    worker_id: String,
    action_id: ActionId,
    page: u32,
    link: String,
    results: u64,
    created: u64,
    updated: u64,
    spawned: u64,
    has_next_page: bool,
  },

  /// An action reached its terminal finished state.
  ActionFinished {
    worker_id: String,
    action_id: ActionId,
    stats: ActionStats,
  },

  /// Processing failed. The action, if any, was released.
  Error {
    worker_id: String,
    action_id: Option<ActionId>,
    kind: ErrorKind,
    error: String,
    /// Whether the action exhausted its attempts and is now failed.
    exhausted: bool,
  },
}

impl EngineEvent {
  /// Short name of the event, as used in log lines.
  pub fn name(&self) -> &'static str {
    match self {
      EngineEvent::WorkerStarted { .. } => "worker_started",
      EngineEvent::WorkerStopped { .. } => "worker_stopped",
      EngineEvent::ActionAssigned { .. } => "action_assigned",
      EngineEvent::NoEligibleWork { .. } => "no_eligible_work",
      EngineEvent::PageScraped { .. } => "page_scraped",
      EngineEvent::ActionFinished { .. } => "action_finished",
      EngineEvent::Error { .. } => "error",
    }
  }

  /// The worker the event originated from.
  pub fn worker_id(&self) -> &str {
    match self {
      EngineEvent::WorkerStarted { worker_id }
      | EngineEvent::WorkerStopped { worker_id }
      | EngineEvent::ActionAssigned { worker_id, .. }
      | EngineEvent::NoEligibleWork { worker_id }
      | EngineEvent::PageScraped { worker_id, .. }
      | EngineEvent::ActionFinished { worker_id, .. }
      | EngineEvent::Error { worker_id, .. } => worker_id,
    }
  }

  /// The action the event concerns, if any.
  pub fn action_id(&self) -> Option<ActionId> {
    match self {
      EngineEvent::ActionAssigned { action_id, .. }
      | EngineEvent::PageScraped { action_id, .. }
      | EngineEvent::ActionFinished { action_id, .. } => Some(*action_id),
      EngineEvent::Error { action_id, .. } => *action_id,
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_event_serializes_with_tag() {
    let event = EngineEvent::NoEligibleWork {
      worker_id: "worker-0".into(),
    };
    let value = serde_json::to_value(&event).unwrap();

    assert_eq!(value["event"], "no_eligible_work");
    assert_eq!(value["worker_id"], "worker-0");
    assert_eq!(event.name(), "no_eligible_work");
  }
}
