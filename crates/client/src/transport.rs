//! Event stream transport seam and its WebSocket implementation.

use async_trait::async_trait;
use cohort_protocol::{ClientCommand, ServerFrame};
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Opens connections to the community event stream
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self) -> ClientResult<Box<dyn Link>>;
}

/// One established connection
#[async_trait]
pub trait Link: Send {
    async fn send(&mut self, command: ClientCommand) -> ClientResult<()>;

    /// Next frame; `None` once the connection is gone. Must be cancel safe.
    async fn recv(&mut self) -> Option<ClientResult<ServerFrame>>;

    async fn close(&mut self);
}

/// `/ws/community` over tokio-tungstenite
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: Url,
}

impl WebSocketTransport {
    /// Derive the socket URL from the server's HTTP base URL
    pub fn new(base_url: &str, token: &str) -> ClientResult<Self> {
        let mut url = Url::parse(base_url)
            .and_then(|base| base.join("/ws/community"))
            .map_err(|e| ClientError::Protocol(format!("invalid server url {base_url}: {e}")))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(ClientError::Protocol(format!("unsupported url scheme: {other}"))),
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::Protocol(format!("cannot switch {base_url} to {scheme}")))?;
        url.query_pairs_mut().append_pair("token", token);

        Ok(Self { url })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> ClientResult<Box<dyn Link>> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ClientError::TransportLost(format!("failed to connect websocket: {e}")))?;
        debug!(host = ?self.url.host_str(), "websocket connected");
        Ok(Box::new(WebSocketLink { stream }))
    }
}

struct WebSocketLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Link for WebSocketLink {
    async fn send(&mut self, command: ClientCommand) -> ClientResult<()> {
        let text = serde_json::to_string(&command)?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| ClientError::TransportLost(e.to_string()))
    }

    async fn recv(&mut self) -> Option<ClientResult<ServerFrame>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(serde_json::from_str(&text).map_err(ClientError::from)),
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Some(Err(ClientError::TransportLost(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
