use std::sync::Arc;

use skein_config::{BlueprintConfig, EngineConfig};

use crate::refinement::ActionRefinement;

/// A named group of workers sharing a refinement.
#[derive(Clone)]
pub struct WorkerBlueprint {
  pub name: String,
  /// Workers to spawn. `None` uses the engine's worker count.
  pub concurrency: Option<usize>,
  pub refinement: Option<Arc<dyn ActionRefinement>>,
}

impl WorkerBlueprint {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      concurrency: None,
      refinement: None,
    }
  }

  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = Some(concurrency);
    self
  }

  pub fn with_refinement(mut self, refinement: impl ActionRefinement + 'static) -> Self {
    self.refinement = Some(Arc::new(refinement));
    self
  }

  /// Build from configuration, applying the config's concurrency override.
  pub fn from_config(config: &EngineConfig, blueprint: &BlueprintConfig) -> Self {
    let mut built = Self::new(blueprint.name.clone()).with_concurrency(config.blueprint_workers(blueprint));
    if !blueprint.filter.is_empty() {
      built = built.with_refinement(blueprint.filter.clone());
    }
    built
  }
}

impl std::fmt::Debug for WorkerBlueprint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WorkerBlueprint")
      .field("name", &self.name)
      .field("concurrency", &self.concurrency)
      .field("refinement", &self.refinement.is_some())
      .finish()
  }
}
