use std::collections::HashMap;
use std::sync::Arc;

use skein_action::RouteId;

use crate::error::RouteError;
use crate::route::Route;

/// Immutable lookup of routes by `(provider, name)`.
#[derive(Clone, Default)]
pub struct RouteRegistry {
  routes: HashMap<RouteId, Arc<dyn Route>>,
}

impl RouteRegistry {
  pub fn builder() -> RouteRegistryBuilder {
    RouteRegistryBuilder::default()
  }

  pub fn get(&self, id: &RouteId) -> Option<Arc<dyn Route>> {
    self.routes.get(id).cloned()
  }

  /// Like [`RouteRegistry::get`], failing with `UnknownRoute`.
  pub fn require(&self, id: &RouteId) -> Result<Arc<dyn Route>, RouteError> {
    self
      .get(id)
      .ok_or_else(|| RouteError::UnknownRoute { route: id.clone() })
  }

  pub fn contains(&self, id: &RouteId) -> bool {
    self.routes.contains_key(id)
  }

  /// Concurrency cap for a route. `None` when unbounded or unknown.
  pub fn concurrency(&self, id: &RouteId) -> Option<usize> {
    self.routes.get(id).and_then(|r| r.descriptor().concurrency)
  }

  pub fn ids(&self) -> impl Iterator<Item = &RouteId> {
    self.routes.keys()
  }

  pub fn len(&self) -> usize {
    self.routes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.routes.is_empty()
  }
}

impl std::fmt::Debug for RouteRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut ids: Vec<String> = self.routes.keys().map(|id| id.to_string()).collect();
    ids.sort();
    f.debug_struct("RouteRegistry").field("routes", &ids).finish()
  }
}

#[derive(Default)]
pub struct RouteRegistryBuilder {
  routes: HashMap<RouteId, Arc<dyn Route>>,
}

impl RouteRegistryBuilder {
  pub fn register(mut self, route: impl Route + 'static) -> Result<Self, RouteError> {
    self.insert(Arc::new(route))?;
    Ok(self)
  }

  pub fn register_arc(mut self, route: Arc<dyn Route>) -> Result<Self, RouteError> {
    self.insert(route)?;
    Ok(self)
  }

  fn insert(&mut self, route: Arc<dyn Route>) -> Result<(), RouteError> {
    let id = route.descriptor().id.clone();
    if self.routes.contains_key(&id) {
      return Err(RouteError::DuplicateRoute { route: id });
    }
    if route.descriptor().concurrency == Some(0) {
      return Err(RouteError::ZeroConcurrency { route: id });
    }
    self.routes.insert(id, route);
    Ok(())
  }

  pub fn build(self) -> RouteRegistry {
    RouteRegistry {
      routes: self.routes,
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::route::{FnRoute, RouteDescriptor};
  use crate::template::UrlTemplate;

  fn route(provider: &str, name: &str, concurrency: Option<usize>) -> FnRoute {
    let mut descriptor = RouteDescriptor::new(
      RouteId::new(provider, name),
      UrlTemplate::new("https://example.com/{{ query }}").unwrap(),
    );
    descriptor.concurrency = concurrency;
    FnRoute::new(descriptor, |_| Ok(json!({})))
  }

  #[test]
  fn test_lookup_by_provider_and_name() {
    let registry = RouteRegistry::builder()
      .register(route("github", "followers", Some(2)))
      .unwrap()
      .register(route("gitlab", "followers", None))
      .unwrap()
      .build();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.concurrency(&RouteId::new("github", "followers")), Some(2));
    assert_eq!(registry.concurrency(&RouteId::new("gitlab", "followers")), None);
    assert!(registry.get(&RouteId::new("github", "profile")).is_none());
  }

  #[test]
  fn test_duplicate_route_rejected() {
    let result = RouteRegistry::builder()
      .register(route("github", "followers", None))
      .unwrap()
      .register(route("github", "followers", Some(1)));

    assert!(matches!(result, Err(RouteError::DuplicateRoute { .. })));
  }

  #[test]
  fn test_zero_concurrency_rejected() {
    let result = RouteRegistry::builder().register(route("github", "followers", Some(0)));
    assert!(matches!(result, Err(RouteError::ZeroConcurrency { .. })));
  }

  #[test]
  fn test_require_unknown_route() {
    let registry = RouteRegistry::default();
    let err = registry.require(&RouteId::new("github", "profile")).err().unwrap();
    assert!(matches!(err, RouteError::UnknownRoute { .. }));
  }
}
