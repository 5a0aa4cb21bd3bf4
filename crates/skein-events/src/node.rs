use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::event::EngineEvent;
use crate::listener::EventListener;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// A vertex of the event graph.
///
/// Cloning an `EventNode` yields another handle to the same vertex.
#[derive(Clone)]
pub struct EventNode {
  inner: Arc<NodeInner>,
}

struct NodeInner {
  id: u64,
  label: String,
  listeners: RwLock<Vec<Arc<dyn EventListener>>>,
  emitters: RwLock<Vec<EventNode>>,
}

impl EventNode {
  pub fn new(label: impl Into<String>) -> Self {
    Self {
      inner: Arc::new(NodeInner {
        id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
        label: label.into(),
        listeners: RwLock::new(Vec::new()),
        emitters: RwLock::new(Vec::new()),
      }),
    }
  }

  pub fn label(&self) -> &str {
    &self.inner.label
  }

  /// Register a listener on this node.
  pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
    self
      .inner
      .listeners
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .push(listener);
  }

  /// Attach `emitter` so that every event emitted on this node is re-emitted
  /// through it (and through everything attached to it).
  ///
  /// Attaching the same node twice is a no-op.
  pub fn add_emitter(&self, emitter: &EventNode) {
    let mut emitters = self
      .inner
      .emitters
      .write()
      .unwrap_or_else(PoisonError::into_inner);
    if !emitters.iter().any(|e| e.same_node(emitter)) {
      emitters.push(emitter.clone());
    }
  }

  /// Detach a previously attached node. Returns whether it was attached.
  pub fn remove_emitter(&self, emitter: &EventNode) -> bool {
    let mut emitters = self
      .inner
      .emitters
      .write()
      .unwrap_or_else(PoisonError::into_inner);
    let before = emitters.len();
    emitters.retain(|e| !e.same_node(emitter));
    emitters.len() != before
  }

  /// Number of directly attached nodes.
  pub fn emitter_count(&self) -> usize {
    self
      .inner
      .emitters
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }

  /// Deliver `event` to this node's listeners, then depth-first through
  /// every attached node. Each node receives the event at most once, so
  /// diamonds and cycles in the graph are harmless.
  pub fn emit(&self, event: EngineEvent) {
    let mut visited = HashSet::new();
    self.propagate(&event, &mut visited);
  }

  fn propagate(&self, event: &EngineEvent, visited: &mut HashSet<u64>) {
    if !visited.insert(self.inner.id) {
      return;
    }

    // Snapshot before calling out so listeners can rewire the graph.
    let listeners = self
      .inner
      .listeners
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();
    for listener in &listeners {
      listener.notify(event);
    }

    let emitters = self
      .inner
      .emitters
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();
    for emitter in &emitters {
      emitter.propagate(event, visited);
    }
  }

  fn same_node(&self, other: &EventNode) -> bool {
    self.inner.id == other.inner.id
  }
}

impl std::fmt::Debug for EventNode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EventNode")
      .field("id", &self.inner.id)
      .field("label", &self.inner.label)
      .field("emitters", &self.emitter_count())
      .finish()
  }
}
