//! Community channel WebSocket handler.
//!
//! Each connection runs a reader loop (commands in) and a writer task
//! (frames out) joined by an mpsc queue. Every joined channel gets a
//! forwarder task draining that channel's broadcast receiver into the queue.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use cohort_community::{ConnectionId, Identity};
use cohort_protocol::{ChannelEvent, ClientCommand, ControlFrame, ParticipantId, ServerFrame};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::TokenQuery;
use crate::state::GatewayState;

/// Upgrade handler for `/ws/community?token=...`
pub async fn community_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<TokenQuery>,
) -> GatewayResult<Response> {
    let token = query
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| GatewayError::AuthenticationFailed("Missing token".to_string()))?;
    let identity = state.identity.resolve(&token).await?;

    Ok(ws.on_upgrade(move |socket| handle_community_websocket(socket, state, identity)))
}

/// Per-connection bookkeeping owned by the reader loop
struct Connection {
    id: ConnectionId,
    identity: Identity,
    out_tx: mpsc::Sender<ServerFrame>,
    forwarders: HashMap<String, JoinHandle<()>>,
}

impl Connection {
    async fn send(&self, frame: impl Into<ServerFrame>) {
        // a closed queue means the writer is gone; the reader loop ends on its own
        let _ = self.out_tx.send(frame.into()).await;
    }

    async fn send_error(&self, error: GatewayError, channel_key: Option<&str>) {
        self.send(ControlFrame::Error {
            code: error.code(),
            message: error.to_string(),
            channel_key: channel_key.map(str::to_string),
        })
        .await;
    }

    fn stop_forwarder(&mut self, channel_key: &str) {
        if let Some(forwarder) = self.forwarders.remove(channel_key) {
            forwarder.abort();
        }
    }
}

async fn handle_community_websocket(socket: WebSocket, state: Arc<GatewayState>, identity: Identity) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerFrame>(state.outbound_queue);

    let mut connection = Connection {
        id: Uuid::new_v4(),
        identity,
        out_tx,
        forwarders: HashMap::new(),
    };
    info!(
        connection_id = %connection.id,
        participant_id = connection.identity.participant_id,
        "community connection opened"
    );

    let writer_id = connection.id;
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!(connection_id = %writer_id, error = %e, "failed to encode frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    connection
        .send(ControlFrame::Hello {
            connection_id: connection.id.to_string(),
            participant_id: connection.identity.participant_id,
        })
        .await;

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(command) => handle_command(command, &state, &mut connection).await,
                Err(e) => connection.send_error(GatewayError::from(e), None).await,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection_id = %connection.id, error = %e, "websocket read failed");
                break;
            }
        }

        if writer.is_finished() {
            break;
        }
    }

    // Clean up connection
    for (_, forwarder) in connection.forwarders.drain() {
        forwarder.abort();
    }
    state.community.disconnect(connection.id).await;
    let connection_id = connection.id;
    drop(connection);
    let _ = writer.await;

    info!(connection_id = %connection_id, "community connection closed");
}

async fn handle_command(command: ClientCommand, state: &GatewayState, connection: &mut Connection) {
    match command {
        ClientCommand::Ping => connection.send(ControlFrame::Pong).await,
        ClientCommand::Join { channel_key } => {
            // a repeated join replaces the previous subscription
            connection.stop_forwarder(&channel_key);

            match state.community.join(&connection.identity, connection.id, &channel_key).await {
                Ok(joined) => {
                    let forwarder = spawn_forwarder(
                        connection.id,
                        connection.identity.participant_id,
                        joined.channel_key.clone(),
                        joined.events,
                        connection.out_tx.clone(),
                    );
                    connection.forwarders.insert(joined.channel_key.clone(), forwarder);
                    connection
                        .send(ControlFrame::Joined {
                            channel_key: joined.channel_key,
                            last_seq: joined.last_seq,
                            online: joined.online,
                        })
                        .await;
                }
                Err(e) => connection.send_error(e.into(), Some(&channel_key)).await,
            }
        }
        ClientCommand::Leave { channel_key } => {
            connection.stop_forwarder(&channel_key);
            state.community.leave(connection.id, &channel_key).await;
            connection.send(ControlFrame::Left { channel_key }).await;
        }
        ClientCommand::Typing { channel_key } => {
            if let Err(e) = state.community.typing(&connection.identity, connection.id, &channel_key).await {
                connection.send_error(e.into(), Some(&channel_key)).await;
            }
        }
        ClientCommand::StopTyping { channel_key } => {
            if let Err(e) = state.community.stop_typing(&connection.identity, connection.id, &channel_key).await {
                connection.send_error(e.into(), Some(&channel_key)).await;
            }
        }
    }
}

/// Drain one channel's broadcast into the connection queue.
///
/// Stops after forwarding a `MemberRemoved` that names this connection's participant.
fn spawn_forwarder(
    connection_id: ConnectionId,
    participant_id: ParticipantId,
    channel_key: String,
    mut events: broadcast::Receiver<ChannelEvent>,
    out_tx: mpsc::Sender<ServerFrame>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let removed = event.removes(participant_id);
                    if out_tx.send(event.into()).await.is_err() {
                        break;
                    }
                    if removed {
                        info!(%connection_id, channel_key = %channel_key, "participant removed; stopped forwarding");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%connection_id, channel_key = %channel_key, skipped, "slow connection dropped channel frames");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

