use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use skein_action::{Action, ActionId};

use crate::error::StoreError;
use crate::filter::{ActionFilter, scheduling_order};
use crate::item::{Item, Upsert};
use crate::{ActionStore, ItemStore};

/// In-memory store.
///
/// Suitable for tests and one-off crawls that do not need durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
  actions: RwLock<HashMap<ActionId, Action>>,
  items: RwLock<HashMap<(String, String), Item>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Snapshot of every stored action, in scheduling order.
  pub fn actions(&self) -> Vec<Action> {
    let mut actions: Vec<Action> = self
      .actions
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .values()
      .cloned()
      .collect();
    actions.sort_by(scheduling_order);
    actions
  }

  /// Snapshot of every stored item.
  pub fn items(&self) -> Vec<Item> {
    self
      .items
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .values()
      .cloned()
      .collect()
  }
}

#[async_trait]
impl ActionStore for MemoryStore {
  async fn find_one(&self, filter: &ActionFilter) -> Result<Option<Action>, StoreError> {
    let actions = self.actions.read().unwrap_or_else(PoisonError::into_inner);
    Ok(
      actions
        .values()
        .filter(|a| filter.matches(a))
        .min_by(|a, b| scheduling_order(a, b))
        .cloned(),
    )
  }

  async fn insert(&self, action: &Action) -> Result<(), StoreError> {
    let mut actions = self.actions.write().unwrap_or_else(PoisonError::into_inner);
    if actions.contains_key(&action.id) {
      return Err(StoreError::AlreadyExists(action.id.to_string()));
    }
    actions.insert(action.id, action.clone());
    Ok(())
  }

  async fn save(&self, action: &Action) -> Result<(), StoreError> {
    let mut actions = self.actions.write().unwrap_or_else(PoisonError::into_inner);
    let stored = actions
      .get_mut(&action.id)
      .ok_or_else(|| StoreError::NotFound(action.id.to_string()))?;

    stored.priority = action.priority;
    stored.stats = action.stats;
    stored.state = action.state.clone();
    Ok(())
  }

  async fn get(&self, id: ActionId) -> Result<Option<Action>, StoreError> {
    let actions = self.actions.read().unwrap_or_else(PoisonError::into_inner);
    Ok(actions.get(&id).cloned())
  }

  async fn count(&self, filter: &ActionFilter) -> Result<u64, StoreError> {
    let actions = self.actions.read().unwrap_or_else(PoisonError::into_inner);
    Ok(actions.values().filter(|a| filter.matches(a)).count() as u64)
  }
}

#[async_trait]
impl ItemStore for MemoryStore {
  async fn upsert_item(&self, item: &Item) -> Result<Upsert, StoreError> {
    let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
    let key = (item.provider.clone(), item.key.clone());
    let outcome = if items.contains_key(&key) {
      Upsert::Updated
    } else {
      Upsert::Created
    };
    items.insert(key, item.clone());
    Ok(outcome)
  }

  async fn get_item(&self, provider: &str, key: &str) -> Result<Option<Item>, StoreError> {
    let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
    Ok(items.get(&(provider.to_string(), key.to_string())).cloned())
  }
}
