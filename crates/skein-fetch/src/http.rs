use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::FetchError;
use crate::page::Page;
use crate::strategy::{Retrieval, parse_url};

pub const DEFAULT_USER_AGENT: &str = concat!("skein/", env!("CARGO_PKG_VERSION"));

/// Static retrieval: a plain GET.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
  client: Client,
}

impl HttpFetcher {
  /// Create a fetcher with a per-request timeout.
  pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
    let client = Client::builder()
      .timeout(timeout)
      .user_agent(user_agent)
      .build()?;
    Ok(Self { client })
  }

  pub fn with_client(client: Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl Retrieval for HttpFetcher {
  async fn retrieve(&self, url: &str) -> Result<Page, FetchError> {
    let parsed = parse_url(url)?;
    debug!(url = %parsed, "opening url");

    let response = self
      .client
      .get(parsed)
      .send()
      .await
      .map_err(|source| FetchError::Request {
        url: url.to_string(),
        source,
      })?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }

    let location = response.url().to_string();
    let html = response.text().await.map_err(|source| FetchError::Request {
      url: url.to_string(),
      source,
    })?;

    Ok(Page::new(location, html))
  }
}
