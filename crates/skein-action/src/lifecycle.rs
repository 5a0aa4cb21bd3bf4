//! Lifecycle transitions.
//!
//! Every mutation the engine makes to an action while running it goes through
//! these methods, so the monotonic invariants live in one place: `finished`
//! flips once, `current_page` only grows, stats only accumulate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::LifecycleError;

/// Observable state of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
  /// Unfinished and unclaimed; eligible for assignment.
  Pending,
  /// Bound to a worker. Only the engine can report this.
  Running,
  Finished,
  /// Exhausted its attempts; never assigned again.
  Failed,
}

/// What a single scraped page contributed to an action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTally {
  pub results: u64,
  pub created: u64,
  pub updated: u64,
  pub spawned: u64,
}

/// Outcome of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
  /// The action goes back to pending and may be retried.
  Retry { attempts: u32 },
  /// The attempt budget is spent; the action is now failed.
  Exhausted { attempts: u32 },
}

impl Action {
  /// Status as persisted. A bound action still reports `Pending` here.
  pub fn status(&self) -> ActionStatus {
    if self.state.finished {
      ActionStatus::Finished
    } else if self.state.failed {
      ActionStatus::Failed
    } else {
      ActionStatus::Pending
    }
  }

  /// Whether the scheduler may hand this action to a worker.
  pub fn is_eligible(&self) -> bool {
    self.status() == ActionStatus::Pending
  }

  /// Record that a worker picked the action up. Only the first start sticks.
  pub fn mark_started(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
    self.ensure_open()?;
    if self.state.started_date.is_none() {
      self.state.started_date = Some(now);
    }
    Ok(())
  }

  /// Account for a fetched and extracted page.
  pub fn record_page(&mut self, link: impl Into<String>, tally: PageTally) {
    let stats = &mut self.stats;
    stats.pages += 1;
    stats.results += tally.results;
    stats.items += tally.created;
    stats.updated += tally.updated;
    stats.spawned += tally.spawned;
    self.state.last_link = Some(link.into());
  }

  /// Merge continuation data reported by the route.
  pub fn merge_data(&mut self, data: serde_json::Map<String, serde_json::Value>) {
    self.state.data.extend(data);
  }

  /// Move on to the next page of the same action.
  pub fn advance_page(&mut self) -> Result<u32, LifecycleError> {
    self.ensure_open()?;
    self.state.current_page += 1;
    Ok(self.state.current_page)
  }

  /// Terminal transition. Fails if the action was already finished.
  pub fn mark_finished(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
    self.ensure_open()?;
    self.state.finished = true;
    self.state.finished_date = Some(now);
    Ok(())
  }

  /// Count a failed attempt. `max_attempts == 0` retries forever.
  pub fn record_failure(&mut self, error: impl Into<String>, max_attempts: u32) -> Failure {
    self.state.attempts += 1;
    self.state.last_error = Some(error.into());

    if max_attempts > 0 && self.state.attempts >= max_attempts {
      self.state.failed = true;
      Failure::Exhausted {
        attempts: self.state.attempts,
      }
    } else {
      Failure::Retry {
        attempts: self.state.attempts,
      }
    }
  }

  fn ensure_open(&self) -> Result<(), LifecycleError> {
    if self.state.finished {
      return Err(LifecycleError::AlreadyFinished { action_id: self.id });
    }
    if self.state.failed {
      return Err(LifecycleError::AlreadyFailed { action_id: self.id });
    }
    Ok(())
  }
}
