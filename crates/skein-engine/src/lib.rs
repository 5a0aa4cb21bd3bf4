//! Skein Engine
//!
//! The scheduling core of the crawler. An [`Engine`] owns a pool of workers
//! that repeatedly draw the highest-priority eligible action from the
//! [`ActionStore`](skein_store::ActionStore), run its route against the
//! fetched page and write results and follow-on work back.
//!
//! # Assignment
//!
//! [`Engine::assign_action`] is the only way a worker obtains work. Calls are
//! serialized through a fair async mutex, so the eligibility computation and
//! the binding of the chosen action happen without overlap:
//!
//! 1. base filter: not finished, not failed
//! 2. exclude routes whose bound-worker count reached their concurrency cap
//! 3. exclude actions already bound to a worker
//! 4. merge the worker's refinement, if any (failures are logged and skipped)
//! 5. pick one action: priority descending, then oldest, then lowest id
//!
//! # Execution
//!
//! A bound action is fetched, transformed and sanitized page by page until
//! the route reports no next page, then marked finished. A failing step
//! releases the action back to pending (or to failed, once its attempts are
//! spent) and is surfaced as an [`EngineEvent::Error`](skein_events::EngineEvent).
//!
//! # Events
//!
//! Each worker has its own [`EventNode`](skein_events::EventNode) attached to
//! the engine's node; listeners on [`Engine::events`] see everything.

mod blueprint;
mod engine;
mod error;
mod execute;
mod pool;
mod refinement;
mod seed;
mod worker;

pub use blueprint::WorkerBlueprint;
pub use engine::{Engine, EngineBuilder, EngineSettings};
pub use error::{EngineError, RefinementError};
pub use execute::StepOutcome;
pub use pool::{Assignment, Binding};
pub use refinement::{ActionRefinement, FnRefinement};
pub use seed::seed_actions;
pub use worker::WorkerHandle;
