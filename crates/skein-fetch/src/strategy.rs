use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::FetchError;
use crate::page::Page;

/// A single retrieval mode.
#[async_trait]
pub trait Retrieval: Send + Sync {
  async fn retrieve(&self, url: &str) -> Result<Page, FetchError>;
}

/// The fetch strategy consumed by workers.
#[async_trait]
pub trait Fetcher: Send + Sync {
  /// Open `url`, rendering it first when `render_dynamically` is set.
  async fn open(&self, url: &str, render_dynamically: bool) -> Result<Page, FetchError>;
}

/// Chooses between static and rendered retrieval.
#[derive(Clone)]
pub struct StrategyFetcher {
  static_retrieval: Arc<dyn Retrieval>,
  dynamic_retrieval: Option<Arc<dyn Retrieval>>,
  force_dynamic: bool,
}

impl StrategyFetcher {
  pub fn new(static_retrieval: Arc<dyn Retrieval>) -> Self {
    Self {
      static_retrieval,
      dynamic_retrieval: None,
      force_dynamic: false,
    }
  }

  pub fn with_renderer(mut self, renderer: Arc<dyn Retrieval>) -> Self {
    self.dynamic_retrieval = Some(renderer);
    self
  }

  /// Render every page, regardless of what the route asks for.
  pub fn force_dynamic(mut self, force: bool) -> Self {
    self.force_dynamic = force;
    self
  }
}

#[async_trait]
impl Fetcher for StrategyFetcher {
  async fn open(&self, url: &str, render_dynamically: bool) -> Result<Page, FetchError> {
    if render_dynamically || self.force_dynamic {
      let renderer = self
        .dynamic_retrieval
        .as_ref()
        .ok_or_else(|| FetchError::RendererUnavailable {
          url: url.to_string(),
        })?;
      renderer.retrieve(url).await
    } else {
      self.static_retrieval.retrieve(url).await
    }
  }
}

pub(crate) fn parse_url(url: &str) -> Result<Url, FetchError> {
  Url::parse(url).map_err(|e| FetchError::InvalidUrl {
    url: url.to_string(),
    message: e.to_string(),
  })
}
