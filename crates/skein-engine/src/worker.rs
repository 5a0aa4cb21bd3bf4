use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use skein_events::{EngineEvent, EventNode};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::engine::Engine;
use crate::execute::StepOutcome;
use crate::refinement::ActionRefinement;

/// A worker's identity as seen by the engine.
///
/// Handles are created by [`Engine::worker`](crate::Engine::worker), which
/// attaches the handle's event node to the engine's.
#[derive(Clone)]
pub struct WorkerHandle {
  id: String,
  blueprint: Option<String>,
  node: EventNode,
  refinement: Option<Arc<dyn ActionRefinement>>,
}

impl WorkerHandle {
  pub(crate) fn new(id: String, node: EventNode) -> Self {
    Self {
      id,
      blueprint: None,
      node,
      refinement: None,
    }
  }

  pub(crate) fn for_blueprint(mut self, name: &str) -> Self {
    self.blueprint = Some(name.to_string());
    self
  }

  pub fn with_refinement(mut self, refinement: Arc<dyn ActionRefinement>) -> Self {
    self.refinement = Some(refinement);
    self
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn blueprint(&self) -> Option<&str> {
    self.blueprint.as_deref()
  }

  /// The worker's event node. Events emitted here reach the engine.
  pub fn events(&self) -> &EventNode {
    &self.node
  }

  pub(crate) fn refinement(&self) -> Option<&dyn ActionRefinement> {
    self.refinement.as_deref()
  }
}

impl std::fmt::Debug for WorkerHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WorkerHandle")
      .field("id", &self.id)
      .field("blueprint", &self.blueprint)
      .finish_non_exhaustive()
  }
}

/// A worker's loop: assign, execute, back off when idle or after a failure.
/// Exits between iterations once `cancel` fires.
pub(crate) async fn run(
  engine: Engine,
  worker: WorkerHandle,
  cancel: CancellationToken,
  ready: oneshot::Sender<()>,
) {
  info!(worker_id = %worker.id(), blueprint = ?worker.blueprint(), "worker started");
  worker.events().emit(EngineEvent::WorkerStarted {
    worker_id: worker.id().to_string(),
  });

  let backoff = engine.settings().idle_backoff;
  let mut ready = Some(ready);

  while !cancel.is_cancelled() {
    let assignment = engine.assign_action(&worker).await;
    if let Some(ready) = ready.take() {
      let _ = ready.send(());
    }

    let pause = match assignment {
      Ok(Some(assignment)) => {
        let action_id = assignment.action.id;
        match AssertUnwindSafe(engine.execute(&worker, assignment))
          .catch_unwind()
          .await
        {
          Ok(outcome) => matches!(outcome, StepOutcome::Released { .. }),
          Err(_) => {
            // A panic inside execute skips its release.
            error!(worker_id = %worker.id(), action_id = %action_id, "action execution panicked");
            engine.release(&worker);
            true
          }
        }
      }
      Ok(None) => true,
      Err(e) => {
        error!(worker_id = %worker.id(), error = %e, "assignment failed");
        worker.events().emit(EngineEvent::Error {
          worker_id: worker.id().to_string(),
          action_id: None,
          kind: e.kind(),
          error: e.to_string(),
          exhausted: false,
        });
        true
      }
    };

    if pause {
      tokio::select! {
        _ = cancel.cancelled() => break,
        _ = tokio::time::sleep(backoff) => {}
      }
    }
  }

  worker.events().emit(EngineEvent::WorkerStopped {
    worker_id: worker.id().to_string(),
  });
  info!(worker_id = %worker.id(), "worker stopped");
}
