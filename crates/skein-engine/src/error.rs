use skein_action::{LifecycleError, RouteId};
use skein_events::ErrorKind;
use skein_fetch::FetchError;
use skein_route::{RouteError, TransformOutputError};
use skein_store::StoreError;

/// Errors raised while assigning or executing an action.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  #[error("store error: {0}")]
  Store(#[from] StoreError),

  #[error("route error: {0}")]
  Route(#[from] RouteError),

  #[error("fetch error: {0}")]
  Fetch(#[from] FetchError),

  #[error("malformed transform output: {0}")]
  TransformOutput(#[from] TransformOutputError),

  /// A spawned operation or seed named a route that is not registered.
  #[error("unknown route '{route}'")]
  UnknownRoute { route: RouteId },

  #[error(transparent)]
  Lifecycle(#[from] LifecycleError),
}

impl EngineError {
  /// Event category for this error.
  pub fn kind(&self) -> ErrorKind {
    match self {
      EngineError::Store(_) => ErrorKind::Store,
      EngineError::Lifecycle(_) => ErrorKind::Lifecycle,
      EngineError::Route(_) | EngineError::UnknownRoute { .. } => ErrorKind::Route,
      EngineError::Fetch(_) => ErrorKind::Fetch,
      EngineError::TransformOutput(_) => ErrorKind::TransformOutput,
    }
  }
}

/// A worker refinement misbehaved. Assignment continues without it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefinementError {
  #[error("refinement rejected: {message}")]
  Rejected { message: String },

  #[error("refinement panicked: {message}")]
  Panicked { message: String },
}

impl RefinementError {
  pub fn rejected(message: impl Into<String>) -> Self {
    RefinementError::Rejected {
      message: message.into(),
    }
  }
}

#[cfg(test)]
mod tests {
  use skein_action::ActionId;

  use super::*;

  #[test]
  fn test_error_kinds() {
    let finished = EngineError::from(LifecycleError::AlreadyFinished {
      action_id: ActionId::new(),
    });
    assert_eq!(finished.kind(), ErrorKind::Lifecycle);

    let missing = EngineError::from(StoreError::NotFound("action".into()));
    assert_eq!(missing.kind(), ErrorKind::Store);

    let unknown = EngineError::UnknownRoute {
      route: RouteId::new("github", "gists"),
    };
    assert_eq!(unknown.kind(), ErrorKind::Route);
  }
}
