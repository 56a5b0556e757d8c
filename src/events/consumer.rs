//! The consumer task that drains the event queue.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::{EventStore, EventTransport, EventType, RealtimeEvent};

/// Counters reported when the consumer finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStats {
    pub received: usize,
    pub persisted: usize,
    pub forwarded: usize,
    /// The transport failed and the session fell back to log-only mode
    pub transport_detached: bool,
}

/// Persists every event and forwards all but USER_MESSAGE to a transport.
///
/// Store and transport failures are logged and isolated; they never reach
/// the producer.
#[derive(Default)]
pub struct EventConsumer {
    store: Option<Box<dyn EventStore>>,
    transport: Option<Box<dyn EventTransport>>,
}

impl EventConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, store: Box<dyn EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_transport(mut self, transport: Box<dyn EventTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Drain `rx` until every producer is dropped.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RealtimeEvent>) -> ConsumerStats {
        let mut stats = ConsumerStats::default();

        while let Some(event) = rx.recv().await {
            stats.received += 1;
            debug!(
                session_id = %event.session_id,
                event_type = %event.event_type,
                "Consuming event"
            );

            if let Some(store) = &self.store {
                match store.append(&event).await {
                    Ok(()) => stats.persisted += 1,
                    Err(e) => error!(
                        session_id = %event.session_id,
                        error = %e,
                        "Failed to persist event"
                    ),
                }
            }

            if event.event_type == EventType::UserMessage {
                continue;
            }
            let Some(transport) = self.transport.as_mut() else {
                continue;
            };
            match transport.send(&event).await {
                Ok(()) => stats.forwarded += 1,
                Err(e) => {
                    warn!(
                        session_id = %event.session_id,
                        transport = transport.name(),
                        error = %e,
                        "Transport failed, continuing in log-only mode"
                    );
                    self.transport = None;
                    stats.transport_detached = true;
                }
            }
        }

        debug!(?stats, "Event consumer finished");
        stats
    }

    /// Run on a tokio task.
    pub fn spawn(self, rx: mpsc::UnboundedReceiver<RealtimeEvent>) -> JoinHandle<ConsumerStats> {
        tokio::spawn(self.run(rx))
    }
}
