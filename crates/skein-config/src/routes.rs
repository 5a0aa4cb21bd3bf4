use std::path::Path;

use serde::{Deserialize, Serialize};
use skein_route::RouteDef;

use crate::error::ConfigError;

/// A route file: either a bare array of definitions or `{ "routes": [...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoutesFile {
  List(Vec<RouteDef>),
  Wrapped { routes: Vec<RouteDef> },
}

impl RoutesFile {
  pub fn into_routes(self) -> Vec<RouteDef> {
    match self {
      RoutesFile::List(routes) | RoutesFile::Wrapped { routes } => routes,
    }
  }
}

/// Read route definitions from a JSON file.
pub fn load_routes(path: &Path) -> Result<Vec<RouteDef>, ConfigError> {
  let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  let file: RoutesFile = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(file.into_routes())
}
