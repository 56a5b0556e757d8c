//! Event queue and streaming bridge
//!
//! The turn loop produces lifecycle events; a separate consumer task persists
//! and forwards them. The two sides share nothing but the channel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐ enqueue  ┌─────────────┐  recv   ┌───────────────┐
//! │  Turn loop  │─────────>│ EventQueue  │────────>│ EventConsumer │
//! │ (producer)  │ (no wait)│ (unbounded) │  FIFO   │    (task)     │
//! └─────────────┘          └─────────────┘         └───────┬───────┘
//!                                                          │
//!                                      ┌───────────────────┼──────────────────┐
//!                                      ▼                                      ▼
//!                               ┌─────────────┐                      ┌─────────────────┐
//!                               │ EventStore  │                      │ EventTransport  │
//!                               │ (JSONL)     │                      │ (WebSocket)     │
//!                               └─────────────┘                      └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use agentharness::events::{EventConsumer, EventQueue, EventSink, MemoryEventStore, RealtimeEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (queue, rx) = EventQueue::channel();
//!     let store = MemoryEventStore::new();
//!     let consumer = EventConsumer::new().with_store(Box::new(store.clone())).spawn(rx);
//!
//!     queue.enqueue(RealtimeEvent::user_message("s1", "hello"));
//!     drop(queue);
//!
//!     let stats = consumer.await.unwrap();
//!     assert_eq!(stats.persisted, 1);
//!     assert_eq!(store.events().len(), 1);
//! }
//! ```

pub mod consumer;
pub mod store;
pub mod transport;
mod types;

pub use consumer::{ConsumerStats, EventConsumer};
pub use store::{EventStore, JsonlEventStore, MemoryEventStore, SessionSummary};
pub use transport::{ChannelTransport, EventTransport, WebSocketTransport};
pub use types::{EventType, RealtimeEvent};

use tokio::sync::mpsc;
use tracing::debug;

/// Non-blocking, fire-and-forget event destination.
pub trait EventSink: Send + Sync {
    fn enqueue(&self, event: RealtimeEvent);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn enqueue(&self, _event: RealtimeEvent) {}
}

/// Producer side of the event channel. Cheap to clone; every clone feeds the
/// same consumer.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<RealtimeEvent>,
}

impl EventQueue {
    /// Create a queue and the receiver its consumer drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RealtimeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl EventSink for EventQueue {
    fn enqueue(&self, event: RealtimeEvent) {
        // the loop must not depend on a live consumer
        if self.tx.send(event).is_err() {
            debug!("Event consumer gone, dropping event");
        }
    }
}
