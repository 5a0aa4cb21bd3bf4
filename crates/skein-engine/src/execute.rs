//! Running a bound action to completion.

use std::panic::{AssertUnwindSafe, catch_unwind};

use chrono::Utc;
use skein_action::{Action, ActionId, Failure, PageTally};
use skein_events::EngineEvent;
use skein_route::{Extraction, Route, RouteError, sanitize};
use skein_store::{Item, StoreError, Upsert};
use tracing::{debug, error, info, instrument, warn};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::pool::Assignment;
use crate::refinement::panic_message;
use crate::worker::WorkerHandle;

/// What one assignment-and-execution round produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
  /// No eligible action.
  Idle,
  /// The action ran through its last page.
  Finished { action_id: ActionId, pages: u64 },
  /// A step failed and the action was released. `exhausted` means it is now
  /// failed for good.
  Released { action_id: ActionId, exhausted: bool },
}

impl Engine {
  /// Assign one action to `worker` and run it.
  pub async fn step(&self, worker: &WorkerHandle) -> Result<StepOutcome, EngineError> {
    match self.assign_action(worker).await? {
      Some(assignment) => Ok(self.execute(worker, assignment).await),
      None => Ok(StepOutcome::Idle),
    }
  }

  /// Run an assigned action page by page, then release the worker.
  ///
  /// Failures never escape: they are recorded on the action, logged and
  /// emitted as [`EngineEvent::Error`].
  #[instrument(
    name = "execute_action",
    skip_all,
    fields(
      worker_id = %worker.id(),
      action_id = %assignment.action.id,
      route = %assignment.route.descriptor().id,
    )
  )]
  pub async fn execute(&self, worker: &WorkerHandle, assignment: Assignment) -> StepOutcome {
    let Assignment { mut action, route } = assignment;

    let outcome = match self.run_pages(worker, &mut action, route.as_ref()).await {
      Ok(()) => StepOutcome::Finished {
        action_id: action.id,
        pages: action.stats.pages,
      },
      Err(err) => self.record_failure(worker, &mut action, err).await,
    };

    self.release(worker);
    outcome
  }

  async fn run_pages(
    &self,
    worker: &WorkerHandle,
    action: &mut Action,
    route: &dyn Route,
  ) -> Result<(), EngineError> {
    let inner = self.inner();
    action.mark_started(Utc::now())?;
    let render = route.descriptor().render_dynamically;

    loop {
      let url = guarded(route, || route.url(&action.query, &action.state))?;
      debug!(url = %url, page = action.state.current_page, "fetching page");

      let page = inner.fetcher.open(&url, render).await?;
      let Extraction {
        items,
        operations,
        has_next_page,
        data,
      } = sanitize(guarded(route, || route.transform(&page))?)?;
      let page_number = action.state.current_page;

      // Resolve every spawn before writing anything for this page.
      let children = operations
        .into_iter()
        .enumerate()
        .map(|(index, request)| -> Result<Action, EngineError> {
          let target = request.route_id(&action.provider);
          let default_priority = inner
            .routes
            .get(&target)
            .ok_or(EngineError::UnknownRoute { route: target })?
            .descriptor()
            .priority;
          let id = action.id.derive(&format!("page-{}/spawn-{}", page_number, index));
          Ok(request.into_action(&action.provider, default_priority).with_id(id))
        })
        .collect::<Result<Vec<_>, _>>()?;

      let mut tally = PageTally {
        results: items.len() as u64,
        ..PageTally::default()
      };

      for (index, fields) in items.into_iter().enumerate() {
        let item = Item::from_fields_or(&action.provider, &action.route, fields, || {
          action.id.derive(&format!("page-{}/item-{}", page_number, index)).to_string()
        });
        match inner.items.upsert_item(&item).await? {
          Upsert::Created => tally.created += 1,
          Upsert::Updated => tally.updated += 1,
        }
      }

      // Children of a page written by an earlier failed attempt keep their ids.
      for child in &children {
        match inner.actions.insert(child).await {
          Ok(()) => {}
          Err(StoreError::AlreadyExists(id)) => debug!(child = %id, "child action already spawned"),
          Err(e) => return Err(e.into()),
        }
        tally.spawned += 1;
      }

      // `action` stays at its last saved state until this page is saved.
      let mut next = action.clone();
      next.record_page(page.location.clone(), tally);
      if let Some(data) = data {
        next.merge_data(data);
      }

      info!(
        page = page_number,
        results = tally.results,
        created = tally.created,
        updated = tally.updated,
        spawned = tally.spawned,
        has_next_page,
        "page scraped"
      );
      worker.events().emit(EngineEvent::PageScraped {
        worker_id: worker.id().to_string(),
        action_id: action.id,
        page: page_number,
        link: page.location,
        results: tally.results,
        created: tally.created,
        updated: tally.updated,
        spawned: tally.spawned,
        has_next_page,
      });

      if has_next_page {
        next.advance_page()?;
        inner.actions.save(&next).await?;
        *action = next;
        continue;
      }

      next.mark_finished(Utc::now())?;
      inner.actions.save(&next).await?;
      *action = next;
      info!(pages = action.stats.pages, "action finished");
      worker.events().emit(EngineEvent::ActionFinished {
        worker_id: worker.id().to_string(),
        action_id: action.id,
        stats: action.stats,
      });
      return Ok(());
    }
  }

  async fn record_failure(
    &self,
    worker: &WorkerHandle,
    action: &mut Action,
    err: EngineError,
  ) -> StepOutcome {
    let message = err.to_string();
    let failure = action.record_failure(message.clone(), self.settings().max_attempts);

    let exhausted = match failure {
      Failure::Retry { attempts } => {
        warn!(attempts, error = %message, "action failed, released for retry");
        false
      }
      Failure::Exhausted { attempts } => {
        error!(attempts, error = %message, "action failed, no attempts left");
        true
      }
    };

    if let Err(e) = self.inner().actions.save(action).await {
      error!(error = %e, "failed to record action failure");
    }

    worker.events().emit(EngineEvent::Error {
      worker_id: worker.id().to_string(),
      action_id: Some(action.id),
      kind: err.kind(),
      error: message,
      exhausted,
    });

    StepOutcome::Released {
      action_id: action.id,
      exhausted,
    }
  }
}

/// Run route code, turning a panic into [`RouteError::Transform`] so the
/// failure is recorded on the action like any other.
fn guarded<T>(
  route: &dyn Route,
  call: impl FnOnce() -> Result<T, RouteError>,
) -> Result<T, RouteError> {
  match catch_unwind(AssertUnwindSafe(call)) {
    Ok(result) => result,
    Err(payload) => Err(RouteError::Transform {
      route: route.descriptor().id.clone(),
      message: format!("panicked: {}", panic_message(payload.as_ref())),
    }),
  }
}
