//! Skein Events
//!
//! Events emitted while the engine schedules and runs actions, and the event
//! graph that carries them.
//!
//! Every component that emits (the engine, each worker) owns an
//! [`EventNode`]. A node can be attached to other nodes with
//! [`EventNode::add_emitter`]; an event emitted on a node is delivered to the
//! node's own listeners first and then re-emitted, depth-first, through every
//! attached node. Workers attach the engine's node, so a listener on the
//! engine observes the whole pool without polling any worker.
//!
//! ```text
//!            engine node ◀── listeners (tracing, channel, tests)
//!           ▲     ▲     ▲
//!    worker-0  worker-1  worker-2
//! ```

mod event;
mod listener;
mod node;

pub use event::{EngineEvent, ErrorKind};
pub use listener::{ChannelListener, EventListener, TracingListener};
pub use node::EventNode;
