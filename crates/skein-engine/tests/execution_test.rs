mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::*;
use serde_json::json;
use skein_action::{Action, ActionId, ActionStatus, RouteId};
use skein_engine::{Engine, EngineSettings, StepOutcome};
use skein_events::{ChannelListener, EngineEvent, ErrorKind};
use skein_route::{FnRoute, RouteDescriptor, RouteRegistry, UrlTemplate};
use skein_store::{ActionFilter, ActionStore, Item, ItemStore, MemoryStore, StoreError, Upsert};

fn page_url(user: &str, page: u32) -> String {
  format!("https://github.com/{}/followers?page={}", user, page)
}

#[tokio::test]
async fn test_pages_until_no_next_page_then_finishes() {
  let fetcher = ScriptedFetcher::new();
  fetcher.page(
    &page_url("isaacs", 1),
    json!({
      "items": [{ "key": "/ada", "name": "  Ada  ", "location": "" }],
      "operations": [{ "route": "profile", "query": "ada" }],
      "hasNextPage": true
    }),
  );
  fetcher.page(
    &page_url("isaacs", 2),
    json!({
      "items": [{ "key": "/ada", "name": "Ada Lovelace" }, { "key": "/bob", "name": "Bob" }],
      "hasNextPage": false
    }),
  );
  let mut h = harness(github_routes(), fetcher, test_settings(1));
  let seeded = h.engine.seed(&followers(), ["isaacs"], None).await.unwrap();
  assert_eq!(seeded[0].priority, 80);

  let outcome = h.engine.step(&h.engine.worker("w1")).await.unwrap();
  assert_eq!(
    outcome,
    StepOutcome::Finished {
      action_id: seeded[0].id,
      pages: 2
    }
  );

  let action = h.store.get(seeded[0].id).await.unwrap().unwrap();
  assert_eq!(action.status(), ActionStatus::Finished);
  assert!(action.state.finished);
  assert!(action.state.finished_date.is_some());
  assert!(action.state.started_date.is_some());
  assert_eq!(action.state.current_page, 2);
  assert_eq!(action.state.last_link.as_deref(), Some(page_url("isaacs", 2).as_str()));
  assert_eq!(action.stats.pages, 2);
  assert_eq!(action.stats.results, 3);
  assert_eq!(action.stats.items, 2);
  assert_eq!(action.stats.updated, 1);
  assert_eq!(action.stats.spawned, 1);

  let ada = h.store.get_item("github", "/ada").await.unwrap().unwrap();
  assert_eq!(ada.data.get("name"), Some(&json!("Ada Lovelace")));

  // The spawned profile action inherits the provider and the route's default priority.
  let pending = h.store.find_one(&ActionFilter::unfinished()).await.unwrap().unwrap();
  assert_eq!(pending.route_id(), profile());
  assert_eq!(pending.query, "ada");
  assert_eq!(pending.priority, 50);

  let scraped: Vec<_> = drain(&mut h.events)
    .into_iter()
    .filter_map(|e| match e {
      EngineEvent::PageScraped {
        page, has_next_page, ..
      } => Some((page, has_next_page)),
      _ => None,
    })
    .collect();
  assert_eq!(scraped, vec![(1, true), (2, false)]);
  assert!(h.engine.bindings().is_empty());
}

#[tokio::test]
async fn test_next_page_leaves_action_unfinished() {
  let fetcher = ScriptedFetcher::new();
  fetcher.page(&page_url("isaacs", 1), json!({ "hasNextPage": true }));
  // Page 2 is missing, so the second fetch fails.
  let h = harness(github_routes(), fetcher, test_settings(1));
  let seeded = h.engine.seed(&followers(), ["isaacs"], None).await.unwrap();

  let outcome = h.engine.step(&h.engine.worker("w1")).await.unwrap();
  assert_eq!(
    outcome,
    StepOutcome::Released {
      action_id: seeded[0].id,
      exhausted: false
    }
  );

  let action = h.store.get(seeded[0].id).await.unwrap().unwrap();
  assert_eq!(action.status(), ActionStatus::Pending);
  assert!(!action.state.finished);
  assert_eq!(action.state.current_page, 2);
  assert_eq!(action.stats.pages, 1);
  assert_eq!(action.state.attempts, 1);
  assert!(action.state.last_error.unwrap().contains("404"));
}

#[tokio::test]
async fn test_resumes_from_saved_page() {
  let fetcher = ScriptedFetcher::new();
  fetcher.page(&page_url("isaacs", 1), json!({ "hasNextPage": true }));
  let h = harness(github_routes(), fetcher, test_settings(1));
  h.engine.seed(&followers(), ["isaacs"], None).await.unwrap();

  let worker = h.engine.worker("w1");
  h.engine.step(&worker).await.unwrap();

  h.fetcher.page(&page_url("isaacs", 2), json!({}));
  let outcome = h.engine.step(&worker).await.unwrap();
  assert!(matches!(outcome, StepOutcome::Finished { pages: 2, .. }));

  let urls: Vec<String> = h.fetcher.opened().into_iter().map(|(url, _)| url).collect();
  assert_eq!(
    urls,
    vec![page_url("isaacs", 1), page_url("isaacs", 2), page_url("isaacs", 2)]
  );
}

#[tokio::test]
async fn test_type_mismatch_leaves_action_pending() {
  let fetcher = ScriptedFetcher::new();
  fetcher.page("https://github.com/ada", json!({ "items": "not-an-array" }));
  let mut h = harness(github_routes(), fetcher, test_settings(1));
  let seeded = h.engine.seed(&profile(), ["ada"], None).await.unwrap();

  let outcome = h.engine.step(&h.engine.worker("w1")).await.unwrap();
  assert!(matches!(outcome, StepOutcome::Released { exhausted: false, .. }));

  let action = h.store.get(seeded[0].id).await.unwrap().unwrap();
  assert_eq!(action.status(), ActionStatus::Pending);
  assert_eq!(action.stats.pages, 0);

  let errors: Vec<_> = drain(&mut h.events)
    .into_iter()
    .filter_map(|e| match e {
      EngineEvent::Error { kind, error, .. } => Some((kind, error)),
      _ => None,
    })
    .collect();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].0, ErrorKind::TransformOutput);
  assert!(errors[0].1.contains("items"));
  assert!(h.engine.bindings().is_empty());
}

#[tokio::test]
async fn test_missing_keys_default_to_empty() {
  let fetcher = ScriptedFetcher::new();
  fetcher.page("https://github.com/ada", json!({}));
  let h = harness(github_routes(), fetcher, test_settings(1));
  let seeded = h.engine.seed(&profile(), ["ada"], None).await.unwrap();

  let outcome = h.engine.step(&h.engine.worker("w1")).await.unwrap();
  assert!(matches!(outcome, StepOutcome::Finished { pages: 1, .. }));

  let action = h.store.get(seeded[0].id).await.unwrap().unwrap();
  assert!(action.state.finished);
  assert_eq!(action.stats.results, 0);
  assert_eq!(action.stats.spawned, 0);
}

#[tokio::test]
async fn test_attempts_exhaust_into_failed() {
  let settings = EngineSettings {
    max_attempts: 2,
    ..test_settings(1)
  };
  let mut h = harness(github_routes(), ScriptedFetcher::new(), settings);
  let seeded = h.engine.seed(&profile(), ["ghost"], None).await.unwrap();
  let worker = h.engine.worker("w1");

  assert!(matches!(
    h.engine.step(&worker).await.unwrap(),
    StepOutcome::Released { exhausted: false, .. }
  ));
  assert!(matches!(
    h.engine.step(&worker).await.unwrap(),
    StepOutcome::Released { exhausted: true, .. }
  ));
  assert_eq!(h.engine.step(&worker).await.unwrap(), StepOutcome::Idle);

  let action = h.store.get(seeded[0].id).await.unwrap().unwrap();
  assert_eq!(action.status(), ActionStatus::Failed);
  assert_eq!(action.state.attempts, 2);

  let fetch_errors = drain(&mut h.events)
    .into_iter()
    .filter(|e| matches!(e, EngineEvent::Error { kind: ErrorKind::Fetch, .. }))
    .count();
  assert_eq!(fetch_errors, 2);
}

#[tokio::test]
async fn test_unknown_spawn_route_fails_step_before_writing() {
  let fetcher = ScriptedFetcher::new();
  fetcher.page(
    "https://github.com/ada",
    json!({
      "items": [{ "key": "/ada" }],
      "operations": [{ "route": "gists", "query": "ada" }]
    }),
  );
  let mut h = harness(github_routes(), fetcher, test_settings(1));
  h.engine.seed(&profile(), ["ada"], None).await.unwrap();

  let outcome = h.engine.step(&h.engine.worker("w1")).await.unwrap();
  assert!(matches!(outcome, StepOutcome::Released { .. }));

  assert!(h.store.items().is_empty());
  assert_eq!(h.store.actions().len(), 1);
  assert!(drain(&mut h.events).iter().any(|e| matches!(
    e,
    EngineEvent::Error { kind: ErrorKind::Route, error, .. } if error.contains("github:gists")
  )));
}

#[tokio::test]
async fn test_spawn_with_explicit_provider_and_priority() {
  let fetcher = ScriptedFetcher::new();
  fetcher.page(
    "https://github.com/ada",
    json!({
      "operations": [{ "provider": "github", "route": "followers", "query": "ada", "priority": 10 }]
    }),
  );
  let h = harness(github_routes(), fetcher, test_settings(1));
  h.engine.seed(&profile(), ["ada"], None).await.unwrap();

  h.engine.step(&h.engine.worker("w1")).await.unwrap();

  let child = h.store.find_one(&ActionFilter::unfinished()).await.unwrap().unwrap();
  assert_eq!(child.route_id(), followers());
  assert_eq!(child.priority, 10);
}

#[tokio::test]
async fn test_continuation_data_feeds_next_url() {
  let fetcher = ScriptedFetcher::new();
  fetcher.page(
    "https://github.com/search?q=rust%20lang&cursor=",
    json!({ "hasNextPage": true, "data": { "cursor": "c2" } }),
  );
  fetcher.page("https://github.com/search?q=rust%20lang&cursor=c2", json!({}));
  let h = harness(github_routes(), fetcher, test_settings(1));
  let seeded = h.engine.seed(&search(), ["rust lang"], None).await.unwrap();

  let outcome = h.engine.step(&h.engine.worker("w1")).await.unwrap();
  assert!(matches!(outcome, StepOutcome::Finished { pages: 2, .. }));

  let action = h.store.get(seeded[0].id).await.unwrap().unwrap();
  assert_eq!(action.state.data.get("cursor"), Some(&json!("c2")));

  // The search route asks for rendered pages.
  assert!(h.fetcher.opened().iter().all(|(_, rendered)| *rendered));
}

#[tokio::test]
async fn test_seed_rejects_unknown_route() {
  let h = harness(github_routes(), ScriptedFetcher::new(), test_settings(1));
  let err = h
    .engine
    .seed(&skein_action::RouteId::new("github", "gists"), ["ada"], None)
    .await
    .unwrap_err();

  assert!(matches!(err, skein_engine::EngineError::UnknownRoute { .. }));
  assert!(h.store.actions().is_empty());
}

#[tokio::test]
async fn test_seed_with_explicit_priority() {
  let h = harness(github_routes(), ScriptedFetcher::new(), test_settings(1));
  let seeded = h.engine.seed(&profile(), ["a", "b"], Some(95)).await.unwrap();

  assert_eq!(seeded.len(), 2);
  assert!(seeded.iter().all(|a: &Action| a.priority == 95));
  assert_eq!(h.store.count(&ActionFilter::unfinished()).await.unwrap(), 2);
}

fn broken_routes() -> RouteRegistry {
  let broken = RouteDescriptor::new(
    RouteId::new("github", "broken"),
    UrlTemplate::new("https://github.com/broken/{{ query }}").unwrap(),
  )
  .with_priority(90);
  let profile = RouteDescriptor::new(profile(), UrlTemplate::new("https://github.com/{{ query }}").unwrap());

  RouteRegistry::builder()
    .register(FnRoute::new(broken, |_| panic!("transform bug")))
    .unwrap()
    .register(json_route(profile))
    .unwrap()
    .build()
}

#[tokio::test]
async fn test_panicking_transform_is_recorded_as_failure() {
  let fetcher = ScriptedFetcher::new();
  fetcher.page("https://github.com/broken/ada", json!({}));
  let mut h = harness(broken_routes(), fetcher, test_settings(1));
  let seeded = h
    .engine
    .seed(&RouteId::new("github", "broken"), ["ada"], None)
    .await
    .unwrap();

  let outcome = h.engine.step(&h.engine.worker("w1")).await.unwrap();
  assert_eq!(
    outcome,
    StepOutcome::Released {
      action_id: seeded[0].id,
      exhausted: false
    }
  );
  assert!(h.engine.bindings().is_empty());

  let action = h.store.get(seeded[0].id).await.unwrap().unwrap();
  assert_eq!(action.state.attempts, 1);
  assert!(action.state.last_error.as_deref().unwrap().contains("transform bug"));
  assert!(drain(&mut h.events).iter().any(|e| matches!(
    e,
    EngineEvent::Error { kind: ErrorKind::Route, error, .. } if error.contains("panicked")
  )));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_transform_does_not_stall_pool() {
  let fetcher = ScriptedFetcher::new();
  fetcher.page("https://github.com/broken/ada", json!({}));
  fetcher.page("https://github.com/bob", json!({}));
  let settings = EngineSettings {
    max_attempts: 1,
    ..test_settings(1)
  };
  let mut h = harness(broken_routes(), fetcher, settings);
  let broken = h
    .engine
    .seed(&RouteId::new("github", "broken"), ["ada"], None)
    .await
    .unwrap();
  let healthy = h.engine.seed(&profile(), ["bob"], None).await.unwrap();

  h.engine.start().await;
  wait_for(&mut h.events, 1, |e| matches!(e, EngineEvent::ActionFinished { .. })).await;
  h.engine.stop().await;

  assert!(h.engine.bindings().is_empty());
  let broken = h.store.get(broken[0].id).await.unwrap().unwrap();
  assert_eq!(broken.status(), ActionStatus::Failed);
  let healthy = h.store.get(healthy[0].id).await.unwrap().unwrap();
  assert_eq!(healthy.status(), ActionStatus::Finished);
}

/// A memory store whose first `save` fails.
struct FlakyStore {
  inner: MemoryStore,
  fail_save: AtomicBool,
}

#[async_trait]
impl ActionStore for FlakyStore {
  async fn find_one(&self, filter: &ActionFilter) -> Result<Option<Action>, StoreError> {
    self.inner.find_one(filter).await
  }

  async fn insert(&self, action: &Action) -> Result<(), StoreError> {
    self.inner.insert(action).await
  }

  async fn save(&self, action: &Action) -> Result<(), StoreError> {
    if self.fail_save.swap(false, Ordering::SeqCst) {
      return Err(StoreError::Corrupt {
        message: "disk full".into(),
      });
    }
    self.inner.save(action).await
  }

  async fn get(&self, id: ActionId) -> Result<Option<Action>, StoreError> {
    self.inner.get(id).await
  }

  async fn count(&self, filter: &ActionFilter) -> Result<u64, StoreError> {
    self.inner.count(filter).await
  }
}

#[async_trait]
impl ItemStore for FlakyStore {
  async fn upsert_item(&self, item: &Item) -> Result<Upsert, StoreError> {
    self.inner.upsert_item(item).await
  }

  async fn get_item(&self, provider: &str, key: &str) -> Result<Option<Item>, StoreError> {
    self.inner.get_item(provider, key).await
  }
}

#[tokio::test]
async fn test_retried_page_does_not_duplicate_writes() {
  let fetcher = ScriptedFetcher::new();
  fetcher.page(
    "https://github.com/ada",
    json!({
      "items": [{ "name": "keyless" }, { "key": "/ada", "name": "Ada" }],
      "operations": [{ "route": "followers", "query": "ada" }]
    }),
  );
  let store = Arc::new(FlakyStore {
    inner: MemoryStore::new(),
    fail_save: AtomicBool::new(true),
  });
  let (listener, _events) = ChannelListener::channel();
  let engine = Engine::builder(github_routes(), store.clone(), Arc::new(fetcher))
    .settings(test_settings(1))
    .listener(Arc::new(listener))
    .build();
  let seeded = engine.seed(&profile(), ["ada"], None).await.unwrap();
  let worker = engine.worker("w1");

  // Items and the child are written, then saving the page fails.
  assert!(matches!(
    engine.step(&worker).await.unwrap(),
    StepOutcome::Released { exhausted: false, .. }
  ));
  assert_eq!(store.inner.items().len(), 2);
  assert_eq!(store.inner.actions().len(), 2);

  assert!(matches!(
    engine.step(&worker).await.unwrap(),
    StepOutcome::Finished { pages: 1, .. }
  ));
  assert_eq!(store.inner.items().len(), 2);
  assert_eq!(store.inner.actions().len(), 2);

  let parent = store.get(seeded[0].id).await.unwrap().unwrap();
  assert_eq!(parent.stats.spawned, 1);
  assert_eq!(parent.stats.items, 0);
  assert_eq!(parent.stats.updated, 2);
}
