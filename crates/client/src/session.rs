//! Client connection session: connect, join, lose the transport, reconnect,
//! rejoin and heal the gap from history.
//!
//! The session runs as one task that owns the link. [`SessionHandle`] talks to
//! it over a command queue and observers receive [`SessionEvent`]s.

use cohort_config::ClientConfig;
use cohort_protocol::{ChannelEvent, ClientCommand, ControlFrame, ErrorCode, Message, ParticipantId, ServerFrame};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::error::{ClientError, ClientResult};
use crate::history::HistorySource;
use crate::timeline::Timeline;
use crate::transport::{Link, Transport};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const COMMAND_QUEUE: usize = 64;
const EVENT_QUEUE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Terminal: closed by its owner or out of reconnection attempts
    Disconnected,
    /// `attempt` is 0 for the initial connection and counts reconnections after that
    Connecting { attempt: u32 },
    /// Handshake done; `joined` lists the acknowledged channels
    Connected { joined: BTreeSet<String> },
}

#[derive(Debug)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// A live channel event; duplicate `MessageAppended` frames are filtered
    Channel(ChannelEvent),
    /// Messages fetched after a rejoin that the timeline had not seen, ascending
    HistoryRecovered { channel_key: String, messages: Vec<Message> },
    /// A channel held before the outage refused the rejoin
    RejoinFailed { channel_key: String, code: ErrorCode, message: String },
    Fatal(ClientError),
}

/// Join acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAck {
    pub channel_key: String,
    pub last_seq: i64,
    pub online: Vec<ParticipantId>,
}

enum Command {
    Join { channel_key: String, reply: oneshot::Sender<ClientResult<JoinAck>> },
    Leave { channel_key: String },
    Typing { channel_key: String },
    StopTyping { channel_key: String },
    Close,
}

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Join a channel and wait for the server's acknowledgement
    pub async fn join(&self, channel_key: impl Into<String>) -> ClientResult<JoinAck> {
        let (reply, ack) = oneshot::channel();
        self.command(Command::Join { channel_key: channel_key.into(), reply }).await?;
        ack.await.map_err(|_| ClientError::SessionClosed)?
    }

    pub async fn leave(&self, channel_key: impl Into<String>) -> ClientResult<()> {
        self.command(Command::Leave { channel_key: channel_key.into() }).await
    }

    pub async fn typing(&self, channel_key: impl Into<String>) -> ClientResult<()> {
        self.command(Command::Typing { channel_key: channel_key.into() }).await
    }

    pub async fn stop_typing(&self, channel_key: impl Into<String>) -> ClientResult<()> {
        self.command(Command::StopTyping { channel_key: channel_key.into() }).await
    }

    /// Stop the session, cancelling any pending reconnection
    pub async fn close(&self) -> ClientResult<()> {
        self.command(Command::Close).await
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Wait until the session reaches a state matching `predicate`
    pub async fn wait_for(&self, predicate: impl Fn(&SessionState) -> bool) -> ClientResult<SessionState> {
        let mut state = self.state.clone();
        let reached = state.wait_for(|current| predicate(current)).await.map_err(|_| ClientError::SessionClosed)?;
        Ok(reached.clone())
    }

    async fn command(&self, command: Command) -> ClientResult<()> {
        self.commands.send(command).await.map_err(|_| ClientError::SessionClosed)
    }
}

pub struct ConnectionSession;

impl ConnectionSession {
    /// Spawn the session task and start connecting
    pub fn start(
        transport: Arc<dyn Transport>,
        history: Arc<dyn HistorySource>,
        config: ClientConfig,
    ) -> (SessionHandle, mpsc::Receiver<SessionEvent>) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let (events, events_rx) = mpsc::channel(EVENT_QUEUE);
        let initial = SessionState::Connecting { attempt: 0 };
        let (state_tx, state_rx) = watch::channel(initial.clone());

        let worker = SessionWorker {
            backoff: Backoff::new(config.backoff_base(), config.backoff_max()),
            transport,
            history,
            config,
            commands,
            events,
            state: state_tx,
            current: initial,
            participant_id: None,
            joined: BTreeSet::new(),
            timelines: HashMap::new(),
            pending_joins: HashMap::new(),
            rejoining: BTreeSet::new(),
            resume_from: HashMap::new(),
        };
        tokio::spawn(worker.run());

        (SessionHandle { commands: commands_tx, state: state_rx }, events_rx)
    }
}

/// Why the connected phase ended
enum Exit {
    Lost(String),
    Closed,
}

struct SessionWorker {
    transport: Arc<dyn Transport>,
    history: Arc<dyn HistorySource>,
    config: ClientConfig,
    backoff: Backoff,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<SessionEvent>,
    state: watch::Sender<SessionState>,
    current: SessionState,
    participant_id: Option<ParticipantId>,
    /// Channels this session holds; survives outages and drives rejoin
    joined: BTreeSet<String>,
    timelines: HashMap<String, Timeline>,
    pending_joins: HashMap<String, Vec<oneshot::Sender<ClientResult<JoinAck>>>>,
    /// Channels re-requested after a reconnect and not yet acknowledged
    rejoining: BTreeSet<String>,
    /// Per rejoining channel, the last sequence number synced before the outage
    resume_from: HashMap<String, i64>,
}

impl SessionWorker {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        let mut first = true;

        loop {
            if !first {
                attempt += 1;
                if attempt > self.config.max_reconnect_attempts {
                    let attempts = self.config.max_reconnect_attempts;
                    warn!(attempts, "reconnection attempts exhausted");
                    self.emit(SessionEvent::Fatal(ClientError::ConnectivityExhausted { attempts })).await;
                    self.set_state(SessionState::Disconnected).await;
                    return;
                }

                self.set_state(SessionState::Connecting { attempt }).await;
                let delay = self.backoff.next_delay();
                info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
                if self.offline(tokio::time::sleep(delay)).await.is_none() {
                    return self.shut_down(None).await;
                }
            }
            first = false;

            let transport = self.transport.clone();
            let link = match self.offline(async move { connect_and_handshake(transport).await }).await {
                None => return self.shut_down(None).await,
                Some(Err(e)) => {
                    warn!(attempt, error = %e, "connection attempt failed");
                    continue;
                }
                Some(Ok(connected)) => connected,
            };

            let (mut link, participant_id) = link;
            self.participant_id = Some(participant_id);
            attempt = 0;
            self.backoff.reset();
            info!(participant_id, "session connected");

            match self.connected(&mut link).await {
                Exit::Closed => return self.shut_down(Some(link)).await,
                Exit::Lost(reason) => {
                    warn!(reason = %reason, held = self.joined.len(), "transport lost");
                    self.fail_pending_joins(|| ClientError::TransportLost(reason.clone()));
                    self.rejoining.clear();
                    self.resume_from.clear();
                }
            }
        }
    }

    /// Connected phase: rejoin whatever was held, then pump frames and commands
    async fn connected(&mut self, link: &mut Box<dyn Link>) -> Exit {
        self.rejoining = self.joined.clone();
        // taken before any frame of the new link is applied to the timelines
        self.resume_from = self
            .rejoining
            .iter()
            .map(|key| (key.clone(), self.timelines.get(key).map_or(0, Timeline::synced_through)))
            .collect();
        let acknowledged = BTreeSet::new();
        self.set_state(SessionState::Connected { joined: acknowledged }).await;

        for channel_key in self.rejoining.clone() {
            info!(channel_key = %channel_key, "rejoining channel");
            if let Err(e) = link.send(ClientCommand::Join { channel_key }).await {
                return Exit::Lost(e.to_string());
            }
        }

        loop {
            tokio::select! {
                frame = link.recv() => match frame {
                    Some(Ok(frame)) => self.handle_frame(frame).await,
                    Some(Err(ClientError::Protocol(e))) => warn!(error = %e, "ignoring undecodable frame"),
                    Some(Err(e)) => return Exit::Lost(e.to_string()),
                    None => return Exit::Lost("connection closed by server".to_string()),
                },
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        return Exit::Closed;
                    };
                    if let Err(e) = self.handle_command(command, link).await {
                        return match e {
                            ClientError::SessionClosed => Exit::Closed,
                            other => Exit::Lost(other.to_string()),
                        };
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command, link: &mut Box<dyn Link>) -> ClientResult<()> {
        match command {
            Command::Join { channel_key, reply } => {
                self.pending_joins.entry(channel_key.clone()).or_default().push(reply);
                link.send(ClientCommand::Join { channel_key }).await
            }
            Command::Leave { channel_key } => {
                self.forget(&channel_key).await;
                link.send(ClientCommand::Leave { channel_key }).await
            }
            Command::Typing { channel_key } => link.send(ClientCommand::Typing { channel_key }).await,
            Command::StopTyping { channel_key } => link.send(ClientCommand::StopTyping { channel_key }).await,
            Command::Close => Err(ClientError::SessionClosed),
        }
    }

    async fn handle_frame(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::Control(ControlFrame::Joined { channel_key, last_seq, online }) => {
                let rejoined = self.rejoining.remove(&channel_key);
                self.joined.insert(channel_key.clone());
                let timeline = self.timeline(&channel_key);
                if !rejoined {
                    timeline.acknowledge(last_seq);
                }
                self.publish_joined().await;

                if let Some(waiters) = self.pending_joins.remove(&channel_key) {
                    let ack = JoinAck { channel_key: channel_key.clone(), last_seq, online };
                    for waiter in waiters {
                        let _ = waiter.send(Ok(ack.clone()));
                    }
                }
                if rejoined {
                    self.recover_history(&channel_key).await;
                }
            }
            ServerFrame::Control(ControlFrame::Error { code, message, channel_key: Some(channel_key) }) => {
                let waiters = self.pending_joins.remove(&channel_key);
                let answered = waiters.is_some();
                for waiter in waiters.into_iter().flatten() {
                    let _ = waiter.send(Err(ClientError::Rejected { code, message: message.clone() }));
                }

                if self.rejoining.contains(&channel_key) {
                    warn!(channel_key = %channel_key, %code, "rejoin refused");
                    self.forget(&channel_key).await;
                    self.emit(SessionEvent::RejoinFailed { channel_key, code, message }).await;
                } else if !answered {
                    debug!(channel_key = %channel_key, %code, message = %message, "command refused");
                }
            }
            ServerFrame::Control(ControlFrame::Error { code, message, channel_key: None }) => {
                debug!(%code, message = %message, "command refused");
            }
            ServerFrame::Control(ControlFrame::Hello { .. } | ControlFrame::Pong | ControlFrame::Left { .. }) => {}
            ServerFrame::Channel(event) => self.handle_channel_event(event).await,
        }
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        if let ChannelEvent::MessageAppended { message } = &event {
            if !self.timeline(&message.channel_key).insert(message.clone()) {
                debug!(channel_key = %message.channel_key, seq = message.seq, "dropping duplicate message");
                return;
            }
        }

        let removed_self = self.participant_id.is_some_and(|me| event.removes(me));
        let channel_key = event.channel_key().to_string();
        self.emit(SessionEvent::Channel(event)).await;

        if removed_self {
            info!(channel_key = %channel_key, "removed from channel");
            self.forget(&channel_key).await;
        }
    }

    /// Page backwards through history until it reaches what was synced before the outage.
    ///
    /// Live frames that raced ahead of the rejoin ack are already in the
    /// timeline, so the stopping point is the snapshot, never the timeline's
    /// current head.
    async fn recover_history(&mut self, channel_key: &str) {
        let limit = self.config.history_page_size.max(1);
        let resume_from = self.resume_from.remove(channel_key).unwrap_or(0);
        let mut fetched = Vec::new();
        let mut offset = 0;

        loop {
            let page = match self.history.read_page(channel_key, limit, offset).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(channel_key, error = %e, "history recovery failed");
                    break;
                }
            };
            let exhausted = (page.messages.len() as i64) < limit;
            let reached = page.messages.iter().any(|m| m.seq <= resume_from);
            fetched.extend(page.messages.into_iter().filter(|m| m.seq > resume_from));
            if exhausted || reached {
                break;
            }
            offset += limit;
        }

        let messages = self.timeline(channel_key).merge(fetched);
        info!(channel_key, resume_from, recovered = messages.len(), "history recovered after rejoin");
        self.emit(SessionEvent::HistoryRecovered { channel_key: channel_key.to_string(), messages }).await;
    }

    fn timeline(&mut self, channel_key: &str) -> &mut Timeline {
        let capacity = self.config.timeline_capacity;
        self.timelines
            .entry(channel_key.to_string())
            .or_insert_with(|| Timeline::with_capacity(capacity))
    }

    async fn forget(&mut self, channel_key: &str) {
        self.joined.remove(channel_key);
        self.timelines.remove(channel_key);
        self.rejoining.remove(channel_key);
        self.resume_from.remove(channel_key);
        if matches!(self.current, SessionState::Connected { .. }) {
            self.publish_joined().await;
        }
    }

    async fn publish_joined(&mut self) {
        let joined = self.joined.iter().filter(|key| !self.rejoining.contains(*key)).cloned().collect();
        self.set_state(SessionState::Connected { joined }).await;
    }

    /// Await `work` while serving commands that need no connection.
    /// Returns `None` when the owner closed the session.
    async fn offline<F: Future>(&mut self, work: F) -> Option<F::Output> {
        tokio::pin!(work);
        loop {
            tokio::select! {
                output = &mut work => return Some(output),
                command = self.commands.recv() => match command {
                    None | Some(Command::Close) => return None,
                    Some(Command::Join { reply, .. }) => {
                        let _ = reply.send(Err(ClientError::NotConnected));
                    }
                    Some(Command::Leave { channel_key }) => self.forget(&channel_key).await,
                    Some(Command::Typing { .. } | Command::StopTyping { .. }) => {}
                },
            }
        }
    }

    async fn shut_down(mut self, link: Option<Box<dyn Link>>) {
        if let Some(mut link) = link {
            link.close().await;
        }
        self.fail_pending_joins(|| ClientError::SessionClosed);
        info!("session closed");
        self.set_state(SessionState::Disconnected).await;
    }

    fn fail_pending_joins(&mut self, error: impl Fn() -> ClientError) {
        for (_, waiters) in self.pending_joins.drain() {
            for waiter in waiters {
                let _ = waiter.send(Err(error()));
            }
        }
    }

    async fn set_state(&mut self, state: SessionState) {
        if self.current == state {
            return;
        }
        self.current = state.clone();
        self.state.send_replace(state.clone());
        self.emit(SessionEvent::StateChanged(state)).await;
    }

    async fn emit(&self, event: SessionEvent) {
        // an owner that dropped its receiver no longer cares
        let _ = self.events.send(event).await;
    }
}

async fn connect_and_handshake(transport: Arc<dyn Transport>) -> ClientResult<(Box<dyn Link>, ParticipantId)> {
    let mut link = transport.connect().await?;

    match tokio::time::timeout(HANDSHAKE_TIMEOUT, link.recv()).await {
        Ok(Some(Ok(ServerFrame::Control(ControlFrame::Hello { participant_id, .. })))) => Ok((link, participant_id)),
        Ok(Some(Ok(other))) => Err(ClientError::Protocol(format!("expected hello, got {other:?}"))),
        Ok(Some(Err(e))) => Err(e),
        Ok(None) => Err(ClientError::TransportLost("closed during handshake".to_string())),
        Err(_) => Err(ClientError::TransportLost("handshake timed out".to_string())),
    }
}
