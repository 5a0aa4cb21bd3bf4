//! Event listeners.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::EngineEvent;

/// Receives events delivered to an [`EventNode`](crate::EventNode).
///
/// Listeners run synchronously on the emitting task, so implementations
/// should hand work off instead of blocking.
pub trait EventListener: Send + Sync {
  /// Called for every event that reaches the node the listener is on.
  fn notify(&self, event: &EngineEvent);
}

impl<F> EventListener for F
where
  F: Fn(&EngineEvent) + Send + Sync,
{
  fn notify(&self, event: &EngineEvent) {
    self(event)
  }
}

/// Forwards events to an unbounded channel.
///
/// Use this to consume events asynchronously (persist, stream to a UI, assert
/// on them in tests).
#[derive(Debug, Clone)]
pub struct ChannelListener {
  // NOTE: unbounded so a slow consumer never stalls a worker. Event volume is
  // a handful per page.
  sender: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelListener {
  pub fn new(sender: mpsc::UnboundedSender<EngineEvent>) -> Self {
    Self { sender }
  }

  /// Create a listener together with its receiving end.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl EventListener for ChannelListener {
  fn notify(&self, event: &EngineEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event.clone());
  }
}

/// Logs every event. Attached to the engine when verbose mode is on.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl EventListener for TracingListener {
  fn notify(&self, event: &EngineEvent) {
    match event {
      EngineEvent::Error {
        worker_id,
        action_id,
        kind,
        error,
        exhausted,
      } => {
        warn!(
          worker_id = %worker_id,
          action_id = ?action_id,
          kind = ?kind,
          exhausted,
          error = %error,
          "action error"
        );
      }
      EngineEvent::PageScraped {
        worker_id,
        action_id,
        page,
        link,
        results,
        spawned,
        ..
      } => {
        debug!(
          worker_id = %worker_id,
          action_id = %action_id,
          page,
          link = %link,
          results,
          spawned,
          "page_scraped"
        );
      }
      other => {
        debug!(
          worker_id = %other.worker_id(),
          action_id = ?other.action_id(),
          "{}",
          other.name()
        );
      }
    }
  }
}
