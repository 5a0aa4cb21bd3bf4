use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skein_store::FilterFragment;

use crate::error::ConfigError;

/// Environment variable that forces dynamic rendering for every route.
pub const FORCE_DYNAMIC_ENV: &str = "SKEIN_FORCE_DYNAMIC";

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Number of generic workers.
  pub workers: usize,
  pub blueprints: Vec<BlueprintConfig>,
  /// Worker count overrides keyed by blueprint name.
  pub blueprint_concurrency: BTreeMap<String, usize>,
  /// Render every page dynamically.
  pub force_dynamic: bool,
  pub verbose: bool,
  /// Pause after a worker finds no eligible work, or after a failed step.
  pub idle_backoff_ms: u64,
  /// Failed executions before an action is marked failed. `0` retries forever.
  pub max_attempts: u32,
  pub fetch: FetchConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      workers: 4,
      blueprints: Vec::new(),
      blueprint_concurrency: BTreeMap::new(),
      force_dynamic: false,
      verbose: false,
      idle_backoff_ms: 1000,
      max_attempts: 3,
      fetch: FetchConfig::default(),
    }
  }
}

/// A named group of workers whose assignments are narrowed by a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintConfig {
  pub name: String,
  /// Workers spawned for this blueprint. Defaults to the global worker count.
  #[serde(default)]
  pub concurrency: Option<usize>,
  #[serde(default)]
  pub filter: FilterFragment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
  pub timeout_ms: u64,
  pub user_agent: Option<String>,
  /// Rendering service used for dynamic pages.
  pub render_endpoint: Option<String>,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      timeout_ms: 30_000,
      user_agent: None,
      render_endpoint: None,
    }
  }
}

impl FetchConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }
}

impl EngineConfig {
  /// Read and validate a JSON configuration file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let config: EngineConfig =
      serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
      })?;
    config.validate()?;
    Ok(config)
  }

  /// Apply environment overrides.
  pub fn with_env(mut self) -> Self {
    if let Ok(value) = std::env::var(FORCE_DYNAMIC_ENV) {
      self.force_dynamic = parse_flag(&value);
    }
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for blueprint in &self.blueprints {
      if !names.insert(blueprint.name.as_str()) {
        return Err(invalid(format!("blueprint '{}' is defined twice", blueprint.name)));
      }
    }

    for name in self.blueprint_concurrency.keys() {
      if !names.contains(name.as_str()) {
        return Err(invalid(format!(
          "concurrency override for unknown blueprint '{}'",
          name
        )));
      }
    }

    if self.workers == 0 && self.blueprints.is_empty() {
      return Err(invalid("no workers configured".to_string()));
    }

    Ok(())
  }

  /// Workers to spawn for a blueprint: override, then declared, then global count.
  pub fn blueprint_workers(&self, blueprint: &BlueprintConfig) -> usize {
    self
      .blueprint_concurrency
      .get(&blueprint.name)
      .copied()
      .or(blueprint.concurrency)
      .unwrap_or(self.workers)
  }

  pub fn idle_backoff(&self) -> Duration {
    Duration::from_millis(self.idle_backoff_ms)
  }
}

fn parse_flag(value: &str) -> bool {
  matches!(
    value.trim().to_ascii_lowercase().as_str(),
    "1" | "true" | "yes" | "on"
  )
}

fn invalid(message: String) -> ConfigError {
  ConfigError::Invalid { message }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use serde_json::json;

  use super::*;

  #[test]
  fn test_empty_object_uses_defaults() {
    let config: EngineConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.workers, 4);
    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.fetch.timeout(), Duration::from_secs(30));
  }

  #[test]
  fn test_blueprint_worker_count() {
    let config: EngineConfig = serde_json::from_value(json!({
      "workers": 3,
      "blueprints": [
        { "name": "profiles", "filter": { "routes": ["github:profile"] } },
        { "name": "search", "concurrency": 1 },
        { "name": "followers", "concurrency": 1 }
      ],
      "blueprint_concurrency": { "followers": 5 }
    }))
    .unwrap();
    config.validate().unwrap();

    assert_eq!(config.blueprint_workers(&config.blueprints[0]), 3);
    assert_eq!(config.blueprint_workers(&config.blueprints[1]), 1);
    assert_eq!(config.blueprint_workers(&config.blueprints[2]), 5);
  }

  #[test]
  fn test_override_for_unknown_blueprint_rejected() {
    let config: EngineConfig = serde_json::from_value(json!({
      "blueprint_concurrency": { "missing": 2 }
    }))
    .unwrap();

    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
  }

  #[test]
  fn test_duplicate_blueprint_rejected() {
    let config: EngineConfig = serde_json::from_value(json!({
      "blueprints": [{ "name": "a" }, { "name": "a" }]
    }))
    .unwrap();

    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
  }

  #[test]
  fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "workers": 2, "force_dynamic": true, "fetch": {{ "timeout_ms": 500 }} }}"#).unwrap();

    let config = EngineConfig::load(file.path()).unwrap();
    assert_eq!(config.workers, 2);
    assert!(config.force_dynamic);
    assert_eq!(config.fetch.timeout(), Duration::from_millis(500));
    assert_eq!(config.idle_backoff_ms, 1000);
  }

  #[test]
  fn test_load_reports_parse_errors() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ workers: ").unwrap();

    let err = EngineConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
  }

  #[test]
  fn test_parse_flag() {
    assert!(parse_flag("1"));
    assert!(parse_flag(" TRUE "));
    assert!(!parse_flag("0"));
    assert!(!parse_flag(""));
  }
}
