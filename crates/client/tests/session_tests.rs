//! Connection session behaviour against a scripted in-memory transport.

use async_trait::async_trait;
use cohort_client::{
    ClientError, ClientResult, ConnectionSession, HistorySource, Link, SessionEvent, SessionHandle, SessionState,
    Transport,
};
use cohort_config::ClientConfig;
use cohort_protocol::{ChannelEvent, ClientCommand, ControlFrame, ErrorCode, Message, MessagePage, ServerFrame};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const ME: i64 = 7;

/// The server end of one accepted mock connection
struct ServerSide {
    frames: mpsc::UnboundedSender<ServerFrame>,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
}

impl ServerSide {
    fn send(&self, frame: impl Into<ServerFrame>) {
        self.frames.send(frame.into()).unwrap();
    }

    async fn expect_command(&mut self) -> ClientCommand {
        self.commands.recv().await.expect("client command")
    }
}

/// Accepts or refuses connections in script order; refuses once the script runs out
struct MockTransport {
    script: Mutex<VecDeque<bool>>,
    connects: AtomicUsize,
    accepted: mpsc::UnboundedSender<ServerSide>,
}

impl MockTransport {
    fn new(script: &[bool]) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>) {
        let (accepted, servers) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            script: Mutex::new(script.iter().copied().collect()),
            connects: AtomicUsize::new(0),
            accepted,
        });
        (transport, servers)
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> ClientResult<Box<dyn Link>> {
        let n = self.connects.fetch_add(1, Ordering::SeqCst);
        let accept = self.script.lock().unwrap().pop_front().unwrap_or(false);
        if !accept {
            return Err(ClientError::TransportLost("connection refused".into()));
        }

        let (frames_tx, frames) = mpsc::unbounded_channel();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        frames_tx
            .send(ControlFrame::Hello { connection_id: format!("conn-{n}"), participant_id: ME }.into())
            .unwrap();
        self.accepted.send(ServerSide { frames: frames_tx, commands: commands_rx }).unwrap();
        Ok(Box::new(MockLink { frames, commands }))
    }
}

struct MockLink {
    frames: mpsc::UnboundedReceiver<ServerFrame>,
    commands: mpsc::UnboundedSender<ClientCommand>,
}

#[async_trait]
impl Link for MockLink {
    async fn send(&mut self, command: ClientCommand) -> ClientResult<()> {
        self.commands.send(command).map_err(|_| ClientError::TransportLost("server gone".into()))
    }

    async fn recv(&mut self) -> Option<ClientResult<ServerFrame>> {
        self.frames.recv().await.map(Ok)
    }

    async fn close(&mut self) {}
}

/// Serves pages from an ascending message log
#[derive(Default)]
struct MockHistory {
    log: Mutex<Vec<Message>>,
    reads: AtomicUsize,
}

impl MockHistory {
    fn with_log(log: Vec<Message>) -> Arc<Self> {
        Arc::new(Self { log: Mutex::new(log), reads: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl HistorySource for MockHistory {
    async fn read_page(&self, channel_key: &str, limit: i64, offset: i64) -> ClientResult<MessagePage> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let messages = self
            .log
            .lock()
            .unwrap()
            .iter()
            .rev()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(MessagePage { channel_key: channel_key.to_string(), limit, offset, messages })
    }
}

fn message(seq: i64) -> Message {
    Message {
        channel_key: "cohort-1".into(),
        seq,
        sender_id: 1,
        text: format!("m{seq}"),
        created_at: "2024-06-01T00:00:00Z".into(),
    }
}

fn joined(channel_key: &str, last_seq: i64) -> ControlFrame {
    ControlFrame::Joined { channel_key: channel_key.into(), last_seq, online: vec![ME] }
}

/// Next event that is not a state transition
async fn next_non_state(events: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
    loop {
        match events.recv().await.expect("session event") {
            SessionEvent::StateChanged(_) => continue,
            other => return other,
        }
    }
}

async fn connected(session: &SessionHandle) {
    session
        .wait_for(|state| matches!(state, SessionState::Connected { .. }))
        .await
        .unwrap();
}

async fn join(session: &SessionHandle, server: &mut ServerSide, channel_key: &str, last_seq: i64) {
    let pending = {
        let session = session.clone();
        let channel_key = channel_key.to_string();
        tokio::spawn(async move { session.join(channel_key).await })
    };
    assert_eq!(server.expect_command().await, ClientCommand::Join { channel_key: channel_key.into() });
    server.send(joined(channel_key, last_seq));
    let ack = pending.await.unwrap().unwrap();
    assert_eq!(ack.channel_key, channel_key);
    assert_eq!(ack.last_seq, last_seq);
}

#[tokio::test(start_paused = true)]
async fn test_exhausts_after_five_reconnection_attempts() {
    let (transport, _servers) = MockTransport::new(&[]);
    let started = Instant::now();
    let (session, mut events) =
        ConnectionSession::start(transport.clone(), MockHistory::with_log(vec![]), ClientConfig::default());

    let mut attempts = Vec::new();
    loop {
        match events.recv().await.expect("session event") {
            SessionEvent::StateChanged(SessionState::Connecting { attempt }) => attempts.push(attempt),
            SessionEvent::Fatal(ClientError::ConnectivityExhausted { attempts }) => {
                assert_eq!(attempts, 5);
                break;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    assert_eq!(attempts, vec![1, 2, 3, 4, 5]);
    assert_eq!(transport.connects(), 6, "initial attempt plus five reconnections");
    assert!(started.elapsed() >= Duration::from_secs(17), "1 + 2 + 4 + 5 + 5 seconds of backoff");

    assert!(matches!(events.recv().await, Some(SessionEvent::StateChanged(SessionState::Disconnected))));
    assert!(events.recv().await.is_none());
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_join_ack_and_live_duplicates() {
    let (transport, mut servers) = MockTransport::new(&[true]);
    let (session, mut events) =
        ConnectionSession::start(transport, MockHistory::with_log(vec![]), ClientConfig::default());
    let mut server = servers.recv().await.unwrap();
    connected(&session).await;

    join(&session, &mut server, "cohort-1", 0).await;
    let state = session.state();
    assert!(matches!(&state, SessionState::Connected { joined } if joined.contains("cohort-1")));

    server.send(ChannelEvent::MessageAppended { message: message(1) });
    server.send(ChannelEvent::MessageAppended { message: message(1) });
    server.send(ChannelEvent::MessageAppended { message: message(2) });

    let first = next_non_state(&mut events).await;
    assert!(matches!(first, SessionEvent::Channel(ChannelEvent::MessageAppended { message }) if message.seq == 1));
    let second = next_non_state(&mut events).await;
    assert!(matches!(second, SessionEvent::Channel(ChannelEvent::MessageAppended { message }) if message.seq == 2));

    session.typing("cohort-1").await.unwrap();
    assert_eq!(server.expect_command().await, ClientCommand::Typing { channel_key: "cohort-1".into() });
}

#[tokio::test(start_paused = true)]
async fn test_join_rejected_by_server() {
    let (transport, mut servers) = MockTransport::new(&[true]);
    let (session, _events) =
        ConnectionSession::start(transport, MockHistory::with_log(vec![]), ClientConfig::default());
    let mut server = servers.recv().await.unwrap();
    connected(&session).await;

    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.join("cohort-9").await })
    };
    server.expect_command().await;
    server.send(ControlFrame::Error {
        code: ErrorCode::ChannelNotFound,
        message: "no channel cohort-9".into(),
        channel_key: Some("cohort-9".into()),
    });

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::ChannelNotFound));
    assert_eq!(session.state(), SessionState::Connected { joined: Default::default() });
}

#[tokio::test(start_paused = true)]
async fn test_join_while_reconnecting_is_not_connected() {
    let (transport, _servers) = MockTransport::new(&[]);
    let (session, _events) =
        ConnectionSession::start(transport, MockHistory::with_log(vec![]), ClientConfig::default());

    session
        .wait_for(|state| matches!(state, SessionState::Connecting { attempt: 1 }))
        .await
        .unwrap();
    assert!(matches!(session.join("cohort-1").await, Err(ClientError::NotConnected)));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_rejoins_and_recovers_gap() {
    let (transport, mut servers) = MockTransport::new(&[true, true]);
    let history = MockHistory::with_log((1..=4).map(message).collect());
    let config = ClientConfig { history_page_size: 2, ..ClientConfig::default() };
    let (session, mut events) = ConnectionSession::start(transport.clone(), history.clone(), config);

    let mut server = servers.recv().await.unwrap();
    connected(&session).await;
    join(&session, &mut server, "cohort-1", 0).await;
    server.send(ChannelEvent::MessageAppended { message: message(1) });
    server.send(ChannelEvent::MessageAppended { message: message(2) });
    next_non_state(&mut events).await;
    next_non_state(&mut events).await;

    // messages 3 and 4 are committed while the transport is down
    drop(server);
    let mut server = servers.recv().await.unwrap();
    assert_eq!(transport.connects(), 2);

    assert_eq!(server.expect_command().await, ClientCommand::Join { channel_key: "cohort-1".into() });
    server.send(joined("cohort-1", 4));

    match next_non_state(&mut events).await {
        SessionEvent::HistoryRecovered { channel_key, messages } => {
            assert_eq!(channel_key, "cohort-1");
            assert_eq!(messages.iter().map(|m| m.seq).collect::<Vec<_>>(), vec![3, 4]);
        }
        other => panic!("expected history recovery, got {other:?}"),
    }
    assert_eq!(history.reads.load(Ordering::SeqCst), 2, "paged back until it overlapped seq 2");

    // a late live copy of a recovered message is not re-emitted
    server.send(ChannelEvent::MessageAppended { message: message(4) });
    server.send(ChannelEvent::MessageAppended { message: message(5) });
    let live = next_non_state(&mut events).await;
    assert!(matches!(live, SessionEvent::Channel(ChannelEvent::MessageAppended { message }) if message.seq == 5));

    let state = session.state();
    assert!(matches!(&state, SessionState::Connected { joined } if joined.contains("cohort-1")));
}

#[tokio::test(start_paused = true)]
async fn test_recovery_reaches_back_past_live_frames_that_beat_the_ack() {
    let (transport, mut servers) = MockTransport::new(&[true, true]);
    let history = MockHistory::with_log((1..=11).map(message).collect());
    let config = ClientConfig { history_page_size: 2, ..ClientConfig::default() };
    let (session, mut events) = ConnectionSession::start(transport, history.clone(), config);

    let mut server = servers.recv().await.unwrap();
    connected(&session).await;
    join(&session, &mut server, "cohort-1", 0).await;
    server.send(ChannelEvent::MessageAppended { message: message(1) });
    server.send(ChannelEvent::MessageAppended { message: message(2) });
    next_non_state(&mut events).await;
    next_non_state(&mut events).await;

    // 3..=10 land during the outage; 11 is forwarded before the rejoin ack
    drop(server);
    let mut server = servers.recv().await.unwrap();
    assert_eq!(server.expect_command().await, ClientCommand::Join { channel_key: "cohort-1".into() });
    server.send(ChannelEvent::MessageAppended { message: message(11) });
    server.send(joined("cohort-1", 11));

    let mut seen = Vec::new();
    match next_non_state(&mut events).await {
        SessionEvent::Channel(ChannelEvent::MessageAppended { message }) => seen.push(message.seq),
        other => panic!("expected the live frame first, got {other:?}"),
    }
    match next_non_state(&mut events).await {
        SessionEvent::HistoryRecovered { messages, .. } => seen.extend(messages.iter().map(|m| m.seq)),
        other => panic!("expected history recovery, got {other:?}"),
    }
    seen.sort_unstable();
    assert_eq!(seen, (3..=11).collect::<Vec<_>>());
    assert_eq!(history.reads.load(Ordering::SeqCst), 5, "paged back to seq 2");
}

#[tokio::test(start_paused = true)]
async fn test_recovery_after_join_with_no_messages_reads_every_page() {
    let (transport, mut servers) = MockTransport::new(&[true, true]);
    let history = MockHistory::with_log((1..=5).map(message).collect());
    let config = ClientConfig { history_page_size: 2, ..ClientConfig::default() };
    let (session, mut events) = ConnectionSession::start(transport, history.clone(), config);

    let mut server = servers.recv().await.unwrap();
    connected(&session).await;
    join(&session, &mut server, "cohort-1", 0).await;

    drop(server);
    let mut server = servers.recv().await.unwrap();
    server.expect_command().await;
    server.send(joined("cohort-1", 5));

    match next_non_state(&mut events).await {
        SessionEvent::HistoryRecovered { messages, .. } => {
            assert_eq!(messages.iter().map(|m| m.seq).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        }
        other => panic!("expected history recovery, got {other:?}"),
    }
    assert_eq!(history.reads.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_refused_rejoin_also_answers_explicit_join() {
    let (transport, mut servers) = MockTransport::new(&[true, true]);
    let (session, mut events) =
        ConnectionSession::start(transport, MockHistory::with_log(vec![]), ClientConfig::default());

    let mut server = servers.recv().await.unwrap();
    connected(&session).await;
    join(&session, &mut server, "cohort-1", 0).await;
    drop(server);

    let mut server = servers.recv().await.unwrap();
    assert_eq!(server.expect_command().await, ClientCommand::Join { channel_key: "cohort-1".into() });
    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.join("cohort-1").await })
    };
    assert_eq!(server.expect_command().await, ClientCommand::Join { channel_key: "cohort-1".into() });
    server.send(ControlFrame::Error {
        code: ErrorCode::Forbidden,
        message: "not a member".into(),
        channel_key: Some("cohort-1".into()),
    });

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Forbidden));
    assert!(matches!(next_non_state(&mut events).await, SessionEvent::RejoinFailed { code: ErrorCode::Forbidden, .. }));
    assert_eq!(session.state(), SessionState::Connected { joined: Default::default() });

    // nothing is left waiting on a rejoin: a later ack for the channel is a plain join
    let again = {
        let session = session.clone();
        tokio::spawn(async move { session.join("cohort-1").await })
    };
    server.expect_command().await;
    server.send(joined("cohort-1", 0));
    again.await.unwrap().unwrap();
    session
        .wait_for(|state| matches!(state, SessionState::Connected { joined } if joined.contains("cohort-1")))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_refused_rejoin_drops_channel() {
    let (transport, mut servers) = MockTransport::new(&[true, true]);
    let (session, mut events) =
        ConnectionSession::start(transport, MockHistory::with_log(vec![]), ClientConfig::default());

    let mut server = servers.recv().await.unwrap();
    connected(&session).await;
    join(&session, &mut server, "cohort-1", 0).await;
    drop(server);

    let mut server = servers.recv().await.unwrap();
    server.expect_command().await;
    server.send(ControlFrame::Error {
        code: ErrorCode::Forbidden,
        message: "not a member".into(),
        channel_key: Some("cohort-1".into()),
    });

    match next_non_state(&mut events).await {
        SessionEvent::RejoinFailed { channel_key, code, .. } => {
            assert_eq!(channel_key, "cohort-1");
            assert_eq!(code, ErrorCode::Forbidden);
        }
        other => panic!("expected rejoin failure, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Connected { joined: Default::default() });
}

#[tokio::test(start_paused = true)]
async fn test_removal_of_self_drops_channel() {
    let (transport, mut servers) = MockTransport::new(&[true]);
    let (session, mut events) =
        ConnectionSession::start(transport, MockHistory::with_log(vec![]), ClientConfig::default());
    let mut server = servers.recv().await.unwrap();
    connected(&session).await;
    join(&session, &mut server, "cohort-1", 0).await;

    server.send(ChannelEvent::MemberRemoved { channel_key: "cohort-1".into(), participant_id: ME });
    let event = next_non_state(&mut events).await;
    assert!(matches!(event, SessionEvent::Channel(ChannelEvent::MemberRemoved { participant_id: ME, .. })));

    session
        .wait_for(|state| matches!(state, SessionState::Connected { joined } if joined.is_empty()))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_close_cancels_pending_reconnection() {
    let (transport, _servers) = MockTransport::new(&[]);
    let (session, mut events) =
        ConnectionSession::start(transport.clone(), MockHistory::with_log(vec![]), ClientConfig::default());

    assert!(matches!(
        events.recv().await,
        Some(SessionEvent::StateChanged(SessionState::Connecting { attempt: 1 }))
    ));
    session.close().await.unwrap();

    assert!(matches!(events.recv().await, Some(SessionEvent::StateChanged(SessionState::Disconnected))));
    assert!(events.recv().await.is_none(), "no fatal error after a deliberate close");
    assert_eq!(transport.connects(), 1);
    assert!(matches!(session.join("cohort-1").await, Err(ClientError::SessionClosed)));
}
