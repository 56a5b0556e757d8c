//! Shared CLI helpers used across multiple command handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::info;

use agentharness::agent::Agent;
use agentharness::config::Config;
use agentharness::events::{
    ConsumerStats, EventConsumer, EventQueue, EventSink, JsonlEventStore, WebSocketTransport,
};
use agentharness::log_component;
use agentharness::providers::build_client;
use agentharness::tools::builtin_tools;

/// Event queue producer plus the consumer task draining it.
pub(crate) struct EventPipeline {
    pub queue: EventQueue,
    pub consumer: JoinHandle<ConsumerStats>,
}

/// Start the event consumer described by `config.events`.
///
/// A WebSocket that cannot be reached is logged and skipped; the run
/// proceeds with persistence only.
pub(crate) async fn start_events(config: &Config) -> Result<EventPipeline> {
    let (queue, rx) = EventQueue::channel();
    let mut consumer = EventConsumer::new();

    if config.events.persist {
        let dir = config.store_dir();
        let store = JsonlEventStore::new(&dir)
            .with_context(|| format!("Failed to open event store at {}", dir.display()))?;
        consumer = consumer.with_store(Box::new(store));
    }

    if let Some(url) = &config.events.websocket_url {
        match WebSocketTransport::connect(url).await {
            Ok(transport) => consumer = consumer.with_transport(Box::new(transport)),
            Err(e) => log_component!(
                warn,
                "events",
                "Event WebSocket unavailable, log-only mode",
                url = url.as_str(),
                error = tracing::field::display(&e)
            ),
        }
    }

    Ok(EventPipeline {
        queue,
        consumer: consumer.spawn(rx),
    })
}

/// Build an agent with the configured client and built-in tools.
pub(crate) fn create_agent(config: &Config, events: &EventQueue) -> Result<Agent> {
    let client = build_client(config).with_context(|| "Failed to create LLM client")?;
    let sink: Arc<dyn EventSink> = Arc::new(events.clone());
    let agent = Agent::builder(client)
        .config(config)
        .tools(builtin_tools(config))
        .event_sink(sink)
        .build();
    info!(
        agent = %agent.name(),
        session_id = %agent.session_id(),
        tools = agent.tools().len(),
        "Agent ready"
    );
    Ok(agent)
}
