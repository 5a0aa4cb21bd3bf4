//! Lifecycle errors.

use crate::id::ActionId;

/// Errors raised by invalid lifecycle transitions.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
  /// The action already reached its terminal finished state.
  #[error("action '{action_id}' is already finished")]
  AlreadyFinished { action_id: ActionId },

  /// The action was marked failed after exhausting its attempts.
  #[error("action '{action_id}' has failed and cannot be resumed")]
  AlreadyFailed { action_id: ActionId },
}
