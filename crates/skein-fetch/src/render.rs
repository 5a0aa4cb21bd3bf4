use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::FetchError;
use crate::page::Page;
use crate::strategy::{Retrieval, parse_url};

/// Rendered retrieval through an HTTP rendering service.
///
/// The service is called as `GET {endpoint}?url={page url}` and must answer
/// with the page's HTML after scripts ran (Splash `render.html`, browserless
/// `/content` behind a GET shim, and similar).
#[derive(Debug, Clone)]
pub struct RenderServiceFetcher {
  client: Client,
  endpoint: Url,
}

impl RenderServiceFetcher {
  pub fn new(endpoint: &str, timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
    let endpoint = parse_url(endpoint)?;
    let client = Client::builder()
      .timeout(timeout)
      .user_agent(user_agent)
      .build()
      .map_err(|e| FetchError::Render {
        url: endpoint.to_string(),
        message: format!("failed to build client: {}", e),
      })?;
    Ok(Self { client, endpoint })
  }

  pub fn endpoint(&self) -> &Url {
    &self.endpoint
  }
}

#[async_trait]
impl Retrieval for RenderServiceFetcher {
  async fn retrieve(&self, url: &str) -> Result<Page, FetchError> {
    let target = parse_url(url)?;
    debug!(url = %target, endpoint = %self.endpoint, "rendering url");

    let render_error = |message: String| FetchError::Render {
      url: url.to_string(),
      message,
    };

    let response = self
      .client
      .get(self.endpoint.clone())
      .query(&[("url", target.as_str())])
      .send()
      .await
      .map_err(|e| render_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      return Err(render_error(format!("renderer answered with status {}", status.as_u16())));
    }

    let html = response
      .text()
      .await
      .map_err(|e| render_error(e.to_string()))?;

    Ok(Page::new(target.to_string(), html))
  }
}
