use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use skein_action::{Action, RouteId};
use skein_config::EngineConfig;
use skein_events::{EngineEvent, ErrorKind, EventListener, EventNode};
use skein_fetch::Fetcher;
use skein_route::RouteRegistry;
use skein_store::{ActionFilter, ActionStore, ItemStore};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::blueprint::WorkerBlueprint;
use crate::error::EngineError;
use crate::pool::{Assignment, Binding, WorkerPool};
use crate::refinement::run_refinement;
use crate::seed::seed_actions;
use crate::worker::{self, WorkerHandle};

/// Runtime knobs of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
  /// Number of generic workers started by [`Engine::start`].
  pub workers: usize,
  /// Pause after an empty assignment or a failed step.
  pub idle_backoff: Duration,
  /// Failed executions before an action is marked failed. `0` retries forever.
  pub max_attempts: u32,
}

impl Default for EngineSettings {
  fn default() -> Self {
    Self {
      workers: 4,
      idle_backoff: Duration::from_secs(1),
      max_attempts: 3,
    }
  }
}

impl From<&EngineConfig> for EngineSettings {
  fn from(config: &EngineConfig) -> Self {
    Self {
      workers: config.workers,
      idle_backoff: config.idle_backoff(),
      max_attempts: config.max_attempts,
    }
  }
}

/// The crawl orchestrator.
///
/// Cloning is cheap; clones share the same pool.
///
/// # Usage
///
/// ```ignore
/// let engine = Engine::builder(routes, store, fetcher)
///   .settings(EngineSettings::default())
///   .build();
///
/// engine.seed(&RouteId::new("github", "followers"), ["isaacs"], None).await?;
/// engine.start().await;
/// // ...
/// engine.stop().await;
/// ```
#[derive(Clone)]
pub struct Engine {
  inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
  pub(crate) routes: RouteRegistry,
  pub(crate) actions: Arc<dyn ActionStore>,
  pub(crate) items: Arc<dyn ItemStore>,
  pub(crate) fetcher: Arc<dyn Fetcher>,
  pub(crate) settings: EngineSettings,
  blueprints: Vec<WorkerBlueprint>,
  node: EventNode,
  /// Serializes assignment. Tokio's mutex queues waiters in FIFO order.
  gate: Mutex<()>,
  pool: std::sync::Mutex<WorkerPool>,
  lifecycle: Mutex<Option<RunningPool>>,
  running: AtomicBool,
}

struct RunningPool {
  cancel: CancellationToken,
  workers: Vec<WorkerHandle>,
  tasks: Vec<JoinHandle<()>>,
}

pub struct EngineBuilder {
  routes: RouteRegistry,
  actions: Arc<dyn ActionStore>,
  items: Arc<dyn ItemStore>,
  fetcher: Arc<dyn Fetcher>,
  settings: EngineSettings,
  blueprints: Vec<WorkerBlueprint>,
  listeners: Vec<Arc<dyn EventListener>>,
}

impl EngineBuilder {
  pub fn new(
    routes: RouteRegistry,
    actions: Arc<dyn ActionStore>,
    items: Arc<dyn ItemStore>,
    fetcher: Arc<dyn Fetcher>,
  ) -> Self {
    Self {
      routes,
      actions,
      items,
      fetcher,
      settings: EngineSettings::default(),
      blueprints: Vec::new(),
      listeners: Vec::new(),
    }
  }

  pub fn settings(mut self, settings: EngineSettings) -> Self {
    self.settings = settings;
    self
  }

  pub fn blueprint(mut self, blueprint: WorkerBlueprint) -> Self {
    self.blueprints.push(blueprint);
    self
  }

  /// Subscribe a listener to the engine's event node.
  pub fn listener(mut self, listener: Arc<dyn EventListener>) -> Self {
    self.listeners.push(listener);
    self
  }

  pub fn build(self) -> Engine {
    let node = EventNode::new("engine");
    for listener in self.listeners {
      node.subscribe(listener);
    }

    Engine {
      inner: Arc::new(EngineInner {
        routes: self.routes,
        actions: self.actions,
        items: self.items,
        fetcher: self.fetcher,
        settings: self.settings,
        blueprints: self.blueprints,
        node,
        gate: Mutex::new(()),
        pool: std::sync::Mutex::new(WorkerPool::default()),
        lifecycle: Mutex::new(None),
        running: AtomicBool::new(false),
      }),
    }
  }
}

impl Engine {
  /// Start building an engine over a store that holds both actions and items.
  pub fn builder<S>(routes: RouteRegistry, store: Arc<S>, fetcher: Arc<dyn Fetcher>) -> EngineBuilder
  where
    S: ActionStore + ItemStore + 'static,
  {
    EngineBuilder::new(routes, store.clone(), store, fetcher)
  }

  pub(crate) fn inner(&self) -> &EngineInner {
    &self.inner
  }

  pub fn routes(&self) -> &RouteRegistry {
    &self.inner.routes
  }

  pub fn settings(&self) -> &EngineSettings {
    &self.inner.settings
  }

  /// The engine's event node. Every worker's events propagate here.
  pub fn events(&self) -> &EventNode {
    &self.inner.node
  }

  pub fn is_running(&self) -> bool {
    self.inner.running.load(Ordering::SeqCst)
  }

  /// Current worker to action bindings, ordered by worker id.
  pub fn bindings(&self) -> Vec<Binding> {
    self.pool().snapshot()
  }

  /// Create a worker handle whose events propagate to the engine.
  pub fn worker(&self, id: impl Into<String>) -> WorkerHandle {
    let id = id.into();
    let node = EventNode::new(format!("worker:{}", id));
    node.add_emitter(&self.inner.node);
    WorkerHandle::new(id, node)
  }

  /// Insert pending actions for `route`, one per query. Without an explicit
  /// priority the route's default applies.
  pub async fn seed<I, Q>(
    &self,
    route: &RouteId,
    queries: I,
    priority: Option<i64>,
  ) -> Result<Vec<Action>, EngineError>
  where
    I: IntoIterator<Item = Q>,
    Q: Into<String>,
  {
    seed_actions(
      self.inner.actions.as_ref(),
      &self.inner.routes,
      route,
      queries,
      priority,
    )
    .await
  }

  /// Start the worker pool. Resolves once every worker attempted its first
  /// assignment. Calling it on a running engine does nothing.
  pub async fn start(&self) {
    let mut lifecycle = self.inner.lifecycle.lock().await;
    if lifecycle.is_some() {
      debug!("engine already running");
      return;
    }

    let workers = self.create_workers();
    info!(workers = workers.len(), "starting engine");

    let cancel = CancellationToken::new();
    let mut tasks = Vec::with_capacity(workers.len());
    let mut ready = Vec::with_capacity(workers.len());
    for handle in &workers {
      let (ready_tx, ready_rx) = oneshot::channel();
      ready.push(ready_rx);
      tasks.push(tokio::spawn(worker::run(
        self.clone(),
        handle.clone(),
        cancel.child_token(),
        ready_tx,
      )));
    }

    self.inner.running.store(true, Ordering::SeqCst);
    *lifecycle = Some(RunningPool {
      cancel,
      workers,
      tasks,
    });

    // A worker that exits before its first attempt drops its sender.
    join_all(ready).await;
    info!("engine started");
  }

  /// Stop the worker pool, letting in-flight actions run to completion.
  /// Calling it on a stopped engine does nothing.
  pub async fn stop(&self) {
    let mut lifecycle = self.inner.lifecycle.lock().await;
    let Some(running) = lifecycle.take() else {
      debug!("engine not running");
      return;
    };

    info!(workers = running.workers.len(), "stopping engine");
    running.cancel.cancel();

    for result in join_all(running.tasks).await {
      if let Err(e) = result {
        error!(error = %e, "worker task failed");
      }
    }

    for handle in &running.workers {
      handle.events().remove_emitter(&self.inner.node);
    }
    self.pool().clear();
    self.inner.running.store(false, Ordering::SeqCst);
    info!("engine stopped");
  }

  /// Bind the best eligible action to `worker`.
  ///
  /// Returns `None` when nothing is eligible. A worker holds at most one
  /// action, so any previous binding of this worker is released first.
  #[instrument(name = "assign_action", skip(self, worker), fields(worker_id = %worker.id()))]
  pub async fn assign_action(&self, worker: &WorkerHandle) -> Result<Option<Assignment>, EngineError> {
    let _gate = self.inner.gate.lock().await;

    let (disabled, running) = {
      let mut pool = self.pool();
      pool.release(worker.id());
      (pool.disabled_routes(&self.inner.routes), pool.running_ids())
    };

    let mut filter = ActionFilter::unfinished()
      .excluding_routes(disabled)
      .excluding_ids(running);

    if let Some(refinement) = worker.refinement() {
      match run_refinement(refinement) {
        Ok(fragment) => filter = filter.refine(fragment),
        Err(e) => {
          warn!(worker_id = %worker.id(), error = %e, "ignoring worker refinement");
          worker.events().emit(EngineEvent::Error {
            worker_id: worker.id().to_string(),
            action_id: None,
            kind: ErrorKind::Refinement,
            error: e.to_string(),
            exhausted: false,
          });
        }
      }
    }

    loop {
      let Some(mut action) = self.inner.actions.find_one(&filter).await? else {
        debug!(worker_id = %worker.id(), "no eligible action");
        worker.events().emit(EngineEvent::NoEligibleWork {
          worker_id: worker.id().to_string(),
        });
        return Ok(None);
      };

      let route_id = action.route_id();
      let Some(route) = self.inner.routes.get(&route_id) else {
        // Nothing can ever run this action.
        let err = EngineError::UnknownRoute {
          route: route_id.clone(),
        };
        warn!(action_id = %action.id, route = %route_id, "action references an unknown route");
        action.record_failure(err.to_string(), 1);
        self.inner.actions.save(&action).await?;
        worker.events().emit(EngineEvent::Error {
          worker_id: worker.id().to_string(),
          action_id: Some(action.id),
          kind: err.kind(),
          error: err.to_string(),
          exhausted: true,
        });
        filter = filter.excluding_ids([action.id]);
        continue;
      };

      self.pool().bind(worker.id(), &action);
      info!(
        worker_id = %worker.id(),
        action_id = %action.id,
        route = %route_id,
        priority = action.priority,
        "action assigned"
      );
      worker.events().emit(EngineEvent::ActionAssigned {
        worker_id: worker.id().to_string(),
        action_id: action.id,
        route: route_id,
        query: action.query.clone(),
        page: action.state.current_page,
      });

      return Ok(Some(Assignment { action, route }));
    }
  }

  /// Release whatever `worker` holds.
  pub fn release(&self, worker: &WorkerHandle) -> Option<Binding> {
    self.pool().release(worker.id())
  }

  fn pool(&self) -> MutexGuard<'_, WorkerPool> {
    self
      .inner
      .pool
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  fn create_workers(&self) -> Vec<WorkerHandle> {
    let settings = &self.inner.settings;
    let mut workers: Vec<WorkerHandle> = (1..=settings.workers)
      .map(|n| self.worker(format!("worker-{}", n)))
      .collect();

    for blueprint in &self.inner.blueprints {
      let count = blueprint.concurrency.unwrap_or(settings.workers);
      for n in 1..=count {
        let mut handle = self
          .worker(format!("{}-{}", blueprint.name, n))
          .for_blueprint(&blueprint.name);
        if let Some(refinement) = &blueprint.refinement {
          handle = handle.with_refinement(refinement.clone());
        }
        workers.push(handle);
      }
    }

    workers
  }
}

impl std::fmt::Debug for Engine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Engine")
      .field("routes", &self.inner.routes)
      .field("settings", &self.inner.settings)
      .field("blueprints", &self.inner.blueprints)
      .field("running", &self.is_running())
      .finish()
  }
}
