use skein_action::RouteId;

/// Errors raised by route definitions and transforms.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
  #[error("unknown route '{route}'")]
  UnknownRoute { route: RouteId },

  #[error("route '{route}' is registered twice")]
  DuplicateRoute { route: RouteId },

  /// No worker could ever bind the route.
  #[error("route '{route}' has a concurrency cap of 0")]
  ZeroConcurrency { route: RouteId },

  /// The URL template failed to compile or render.
  #[error("url template error: {message}")]
  Template { message: String },

  /// The transform could not process the page.
  #[error("transform failed for route '{route}': {message}")]
  Transform { route: RouteId, message: String },

  /// A CSS selector in a route definition is invalid.
  #[error("invalid selector '{selector}' in route '{route}': {message}")]
  Selector {
    route: RouteId,
    selector: String,
    message: String,
  },
}

/// Transform output that does not have the required shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformOutputError {
  #[error("transform output must be an object, found {found}")]
  NotAnObject { found: &'static str },

  #[error("transform output field '{field}' must be {expected}, found {found}")]
  TypeMismatch {
    field: String,
    expected: &'static str,
    found: &'static str,
  },

  #[error("transform output operation {index} is invalid: {message}")]
  InvalidOperation { index: usize, message: String },
}
