//! Skein Action
//!
//! This crate contains the crawl action model: the persisted unit of work a
//! worker claims, fetches and extracts. It also owns the lifecycle transitions
//! an action goes through while the engine runs it:
//!
//! ```text
//! Pending ──assign──▶ Running ──has_next_page──▶ Running (page + 1)
//!    ▲                   │
//!    └──── error ────────┤
//!                        ├──── last page ──▶ Finished
//!                        └──── error, attempts exhausted ──▶ Failed
//! ```
//!
//! `Running` is never persisted; it is the engine's binding of an action to a
//! worker. The other states are derived from [`ActionState`].

mod action;
mod error;
mod id;
mod lifecycle;
mod spawn;

pub use action::{Action, ActionState, ActionStats, DEFAULT_PRIORITY};
pub use error::LifecycleError;
pub use id::{ActionId, RouteId};
pub use lifecycle::{ActionStatus, Failure, PageTally};
pub use spawn::SpawnRequest;
