//! Live event transports.

use async_trait::async_trait;
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::info;

use crate::error::{HarnessError, Result};

use super::RealtimeEvent;

/// A live destination for events. A failed `send` detaches the transport.
#[async_trait]
pub trait EventTransport: Send {
    async fn send(&mut self, event: &RealtimeEvent) -> Result<()>;

    /// Short label for logs
    fn name(&self) -> &str;
}

/// Forwards events into an mpsc channel (embedding, tests).
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<RealtimeEvent>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::UnboundedSender<RealtimeEvent>) -> Self {
        Self { tx }
    }

    /// A transport and the receiving end it feeds.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RealtimeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl EventTransport for ChannelTransport {
    async fn send(&mut self, event: &RealtimeEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| HarnessError::EventQueueClosed)
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Sends each event as a JSON text frame over a WebSocket client connection.
pub struct WebSocketTransport {
    url: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketTransport {
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| HarnessError::WebSocket(format!("connect {}: {}", url, e)))?;
        info!(url = %url, "Event WebSocket connected");
        Ok(Self {
            url: url.to_string(),
            stream,
        })
    }
}

#[async_trait]
impl EventTransport for WebSocketTransport {
    async fn send(&mut self, event: &RealtimeEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        self.stream
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|e| HarnessError::WebSocket(format!("send to {}: {}", self.url, e)))
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_transport_forwards() {
        let (mut transport, mut rx) = ChannelTransport::channel();
        let ev = RealtimeEvent::user_message("s", "hi");
        transport.send(&ev).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), ev);
    }

    #[tokio::test]
    async fn test_channel_transport_fails_when_receiver_gone() {
        let (mut transport, rx) = ChannelTransport::channel();
        drop(rx);
        let err = transport
            .send(&RealtimeEvent::user_message("s", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::EventQueueClosed));
    }

    #[tokio::test]
    async fn test_websocket_connect_failure_is_typed() {
        // nothing listens on port 9 locally
        let err = WebSocketTransport::connect("ws://127.0.0.1:9/events")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, HarnessError::WebSocket(_)));
    }
}
