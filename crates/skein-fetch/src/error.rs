//! Fetch errors.

/// Errors raised while retrieving a page.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
  /// The URL could not be parsed.
  #[error("invalid url '{url}': {message}")]
  InvalidUrl { url: String, message: String },

  /// The request failed before a response arrived (DNS, connect, timeout).
  #[error("could not open url '{url}'")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  /// The server answered with a non-success status.
  #[error("url '{url}' answered with status {status}")]
  Status { url: String, status: u16 },

  /// The rendering service failed to produce the page.
  #[error("could not render url '{url}': {message}")]
  Render { url: String, message: String },

  /// Rendering was requested but no renderer is configured.
  #[error("dynamic rendering requested for '{url}' but no renderer is configured")]
  RendererUnavailable { url: String },
}

impl FetchError {
  pub fn url(&self) -> &str {
    match self {
      FetchError::InvalidUrl { url, .. }
      | FetchError::Request { url, .. }
      | FetchError::Status { url, .. }
      | FetchError::Render { url, .. }
      | FetchError::RendererUnavailable { url } => url,
    }
  }
}
