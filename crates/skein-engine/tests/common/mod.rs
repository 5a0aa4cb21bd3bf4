#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use skein_action::RouteId;
use skein_engine::{Engine, EngineSettings};
use skein_events::{ChannelListener, EngineEvent};
use skein_fetch::{FetchError, Fetcher, Page};
use skein_route::{FnRoute, RouteDescriptor, RouteError, RouteRegistry, UrlTemplate};
use skein_store::MemoryStore;
use tokio::sync::mpsc::UnboundedReceiver;

/// Serves canned pages by URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct ScriptedFetcher {
  pages: Mutex<HashMap<String, String>>,
  opened: Mutex<Vec<(String, bool)>>,
  delay: Option<Duration>,
}

impl ScriptedFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_delay(delay: Duration) -> Self {
    Self {
      delay: Some(delay),
      ..Self::default()
    }
  }

  pub fn page(&self, url: &str, body: serde_json::Value) {
    self
      .pages
      .lock()
      .unwrap()
      .insert(url.to_string(), body.to_string());
  }

  /// Every `(url, render_dynamically)` opened so far.
  pub fn opened(&self) -> Vec<(String, bool)> {
    self.opened.lock().unwrap().clone()
  }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
  async fn open(&self, url: &str, render_dynamically: bool) -> Result<Page, FetchError> {
    self
      .opened
      .lock()
      .unwrap()
      .push((url.to_string(), render_dynamically));

    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }

    let body = self.pages.lock().unwrap().get(url).cloned();
    match body {
      Some(html) => Ok(Page::new(url, html)),
      None => Err(FetchError::Status {
        url: url.to_string(),
        status: 404,
      }),
    }
  }
}

/// A route whose "page" is a JSON document returned verbatim by the transform.
pub fn json_route(descriptor: RouteDescriptor) -> FnRoute {
  let id = descriptor.id.clone();
  FnRoute::new(descriptor, move |page| {
    serde_json::from_str(&page.html).map_err(|e| RouteError::Transform {
      route: id.clone(),
      message: e.to_string(),
    })
  })
}

pub fn followers() -> RouteId {
  RouteId::new("github", "followers")
}

pub fn profile() -> RouteId {
  RouteId::new("github", "profile")
}

pub fn search() -> RouteId {
  RouteId::new("github", "search")
}

/// github:followers (priority 80, at most 2 workers),
/// github:profile (priority 50, unbounded),
/// github:search (priority 90, unbounded).
pub fn github_routes() -> RouteRegistry {
  github_routes_with_cap(2)
}

pub fn github_routes_with_cap(followers_cap: usize) -> RouteRegistry {
  let followers = RouteDescriptor::new(
    followers(),
    UrlTemplate::new("https://github.com/{{ query }}/followers?page={{ page }}").unwrap(),
  )
  .with_priority(80)
  .with_concurrency(followers_cap);

  let profile = RouteDescriptor::new(
    profile(),
    UrlTemplate::new("https://github.com/{{ query }}").unwrap(),
  );

  let search = RouteDescriptor::new(
    search(),
    UrlTemplate::new("https://github.com/search?q={{ query | urlencode }}&cursor={{ state.data.cursor }}")
      .unwrap(),
  )
  .with_priority(90)
  .render_dynamically(true);

  RouteRegistry::builder()
    .register(json_route(followers))
    .unwrap()
    .register(json_route(profile))
    .unwrap()
    .register(json_route(search))
    .unwrap()
    .build()
}

pub fn test_settings(workers: usize) -> EngineSettings {
  EngineSettings {
    workers,
    idle_backoff: Duration::from_millis(10),
    ..EngineSettings::default()
  }
}

pub struct Harness {
  pub engine: Engine,
  pub store: Arc<MemoryStore>,
  pub fetcher: Arc<ScriptedFetcher>,
  pub events: UnboundedReceiver<EngineEvent>,
}

pub fn harness(routes: RouteRegistry, fetcher: ScriptedFetcher, settings: EngineSettings) -> Harness {
  let store = Arc::new(MemoryStore::new());
  let fetcher = Arc::new(fetcher);
  let (listener, events) = ChannelListener::channel();

  let engine = Engine::builder(routes, store.clone(), fetcher.clone())
    .settings(settings)
    .listener(Arc::new(listener))
    .build();

  Harness {
    engine,
    store,
    fetcher,
    events,
  }
}

/// Drain events already delivered.
pub fn drain(events: &mut UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
  let mut drained = Vec::new();
  while let Ok(event) = events.try_recv() {
    drained.push(event);
  }
  drained
}

/// Receive events until `count` of them satisfy `pred`.
pub async fn wait_for<F>(events: &mut UnboundedReceiver<EngineEvent>, count: usize, pred: F) -> Vec<EngineEvent>
where
  F: Fn(&EngineEvent) -> bool,
{
  let mut seen = Vec::new();
  let mut matched = 0;
  tokio::time::timeout(Duration::from_secs(10), async {
    while matched < count {
      let event = events.recv().await.expect("event channel closed");
      if pred(&event) {
        matched += 1;
      }
      seen.push(event);
    }
  })
  .await
  .expect("timed out waiting for events");
  seen
}
