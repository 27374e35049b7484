//! Streaming transport seam and its WebSocket implementation

use crate::error::{FeedError, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info};

/// Bidirectional text transport the client drives
#[async_trait]
pub trait FeedTransport: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Next text payload, `None` once the peer closed the connection.
    async fn next_text(&mut self) -> Option<Result<String>>;

    async fn close(&mut self) -> Result<()>;
}

/// TLS WebSocket connection (the TLS handshake is done by tungstenite)
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self> {
        let (stream, _) = timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| FeedError::Connection("Connection timeout".to_string()))?
            .map_err(|e| FeedError::Connection(format!("Could not create connection: {}", e)))?;

        info!(url = %url, "WebSocket connected");
        Ok(Self { stream })
    }
}

#[async_trait]
impl FeedTransport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| FeedError::Connection(format!("send failed: {}", e)))
    }

    async fn next_text(&mut self) -> Option<Result<String>> {
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Ping(data)) => {
                    if let Err(e) = self.stream.send(Message::Pong(data)).await {
                        return Some(Err(FeedError::Connection(e.to_string())));
                    }
                }
                Ok(Message::Close(frame)) => {
                    info!(?frame, "Server closed connection");
                    return None;
                }
                Ok(other) => debug!(len = other.len(), "Ignoring non-text frame"),
                Err(e) => return Some(Err(FeedError::Connection(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| FeedError::Connection(e.to_string()))
    }
}
