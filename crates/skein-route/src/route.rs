use std::fmt;

use skein_action::{ActionState, DEFAULT_PRIORITY, RouteId};
use skein_fetch::Page;

use crate::error::RouteError;
use crate::template::UrlTemplate;

/// Static facts about a route.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
  pub id: RouteId,
  pub url: UrlTemplate,
  /// Priority given to actions spawned for this route without an explicit one.
  pub priority: i64,
  /// Maximum number of workers bound to this route at once. `None` is
  /// unbounded; `Some(0)` is rejected at registration.
  pub concurrency: Option<usize>,
  pub render_dynamically: bool,
}

impl RouteDescriptor {
  pub fn new(id: RouteId, url: UrlTemplate) -> Self {
    Self {
      id,
      url,
      priority: DEFAULT_PRIORITY,
      concurrency: None,
      render_dynamically: false,
    }
  }

  pub fn with_priority(mut self, priority: i64) -> Self {
    self.priority = priority;
    self
  }

  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = Some(concurrency);
    self
  }

  pub fn render_dynamically(mut self, dynamic: bool) -> Self {
    self.render_dynamically = dynamic;
    self
  }
}

/// A crawl step kind.
///
/// Transforms are synchronous and return raw JSON shaped like
/// `{ items: [...], operations: [...], hasNextPage: bool, data: {...} }`.
/// Shape validation happens afterwards in [`crate::sanitize`].
pub trait Route: Send + Sync {
  fn descriptor(&self) -> &RouteDescriptor;

  fn transform(&self, page: &Page) -> Result<serde_json::Value, RouteError>;

  fn url(&self, query: &str, state: &ActionState) -> Result<String, RouteError> {
    self.descriptor().url.render(query, state)
  }
}

type TransformFn = dyn Fn(&Page) -> Result<serde_json::Value, RouteError> + Send + Sync;

/// A route whose transform is a closure.
pub struct FnRoute {
  descriptor: RouteDescriptor,
  transform: Box<TransformFn>,
}

impl FnRoute {
  pub fn new<F>(descriptor: RouteDescriptor, transform: F) -> Self
  where
    F: Fn(&Page) -> Result<serde_json::Value, RouteError> + Send + Sync + 'static,
  {
    Self {
      descriptor,
      transform: Box::new(transform),
    }
  }
}

impl Route for FnRoute {
  fn descriptor(&self) -> &RouteDescriptor {
    &self.descriptor
  }

  fn transform(&self, page: &Page) -> Result<serde_json::Value, RouteError> {
    (self.transform)(page)
  }
}

impl fmt::Debug for FnRoute {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FnRoute")
      .field("descriptor", &self.descriptor)
      .finish_non_exhaustive()
  }
}
