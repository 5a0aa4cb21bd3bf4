//! Skein Store
//!
//! This crate provides the storage traits and implementations for crawl
//! actions and the items they extract.
//!
//! The [`ActionStore`] trait is the durable queue the engine draws from:
//! - `find_one` returns the highest-priority action matching an
//!   [`ActionFilter`], ties broken by creation time then id
//! - `insert` adds seed and spawned actions
//! - `save` writes back the mutable part of an action (stats and state)
//!
//! The [`ItemStore`] trait persists extracted items, keyed by provider and
//! item key so re-scraping a page updates instead of duplicating.
//!
//! Two implementations ship: [`MemoryStore`] and [`SqliteStore`].

mod error;
mod filter;
mod item;
mod memory;
mod sqlite;

pub use error::StoreError;
pub use filter::{ActionFilter, FilterFragment, scheduling_order};
pub use item::{Item, Upsert};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use skein_action::{Action, ActionId};

/// Storage for crawl actions.
#[async_trait]
pub trait ActionStore: Send + Sync {
  /// Return the first action matching `filter` in scheduling order
  /// (priority descending, then creation time, then id).
  async fn find_one(&self, filter: &ActionFilter) -> Result<Option<Action>, StoreError>;

  /// Insert a new action.
  async fn insert(&self, action: &Action) -> Result<(), StoreError>;

  /// Persist the mutable fields (priority, stats, state) of an existing action.
  async fn save(&self, action: &Action) -> Result<(), StoreError>;

  /// Get an action by id.
  async fn get(&self, id: ActionId) -> Result<Option<Action>, StoreError>;

  /// Count the actions matching `filter`.
  async fn count(&self, filter: &ActionFilter) -> Result<u64, StoreError>;
}

/// Storage for extracted items.
#[async_trait]
pub trait ItemStore: Send + Sync {
  /// Insert the item, or update it if one with the same provider and key exists.
  async fn upsert_item(&self, item: &Item) -> Result<Upsert, StoreError>;

  /// Get an item by provider and key.
  async fn get_item(&self, provider: &str, key: &str) -> Result<Option<Item>, StoreError>;
}
