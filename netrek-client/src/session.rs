//! Session Protocol, client side (§4.6): handshake, ping loop, read loop,
//! and disconnect/reconnect. Mirrors `netrek-server`'s session module but
//! drives the handshake instead of answering it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use protocol::{
    ChatMessageOut, ConnectRequest, ConnectResponse, GameStateUpdate, MessageType, PingPayload,
};

use crate::config::ClientConfig;
use crate::error::{HandshakeError, TransportError};
use crate::frame_io::{read_frame, write_frame};

/// Credentials retained across reconnects (spec.md design note (b): the
/// client reuses the name/team it first connected with).
#[derive(Debug, Clone)]
pub struct Credentials {
    pub player_name: String,
    pub team_id: i64,
}

pub struct ClientSession {
    pub player_id: u64,
    pub client_id: u64,
    pub connected: AtomicBool,
    pub latency: Mutex<Option<Duration>>,
    writer: Mutex<WriteHalf<TcpStream>>,
    pub cancel: CancellationToken,
}

impl ClientSession {
    pub async fn send(&self, message_type: MessageType, payload: &[u8], write_timeout: Duration) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, message_type, payload, write_timeout).await
    }
}

/// Dials `address` and runs the client side of the handshake (§4.6). On a
/// `success:false` response, surfaces the server's message; on transport
/// failure, surfaces the transport error.
pub async fn connect(
    address: &str,
    credentials: &Credentials,
    config: &ClientConfig,
) -> Result<(Arc<ClientSession>, ReadHalf<TcpStream>), HandshakeError> {
    let stream = tokio::time::timeout(config.connection_timeout, TcpStream::connect(address))
        .await
        .map_err(|_| TransportError::DeadlineExceeded(config.connection_timeout))?
        .map_err(TransportError::Io)?;

    let (mut read_half, mut write_half) = tokio::io::split(stream);

    let request = ConnectRequest {
        player_name: credentials.player_name.clone(),
        team_id: credentials.team_id,
    };
    let body = serde_json::to_vec(&request).expect("ConnectRequest always serializes");
    write_frame(&mut write_half, MessageType::ConnectRequest, &body, config.connection_timeout).await?;

    let (message_type, payload) = read_frame(&mut read_half, config.connection_timeout).await?;
    if message_type != MessageType::ConnectResponse {
        return Err(HandshakeError::UnexpectedResponse);
    }
    let response: ConnectResponse = serde_json::from_slice(&payload).map_err(|_| HandshakeError::UnexpectedResponse)?;

    let (player_id, client_id) = match response {
        ConnectResponse::Success { player_id, client_id, .. } => (player_id, client_id),
        ConnectResponse::Failure { error, .. } => return Err(HandshakeError::Rejected(error)),
    };

    let session = Arc::new(ClientSession {
        player_id,
        client_id,
        connected: AtomicBool::new(true),
        latency: Mutex::new(None),
        writer: Mutex::new(write_half),
        cancel: CancellationToken::new(),
    });

    Ok((session, read_half))
}

/// Per-`pingInterval`, sends a `PingRequest` carrying the current wall time.
/// The matching `PingResponse` is observed and timed by the read loop, not
/// here, since both travel over the same read half.
pub async fn run_ping_loop(session: Arc<ClientSession>, ping_interval: Duration, write_timeout: Duration) {
    let mut ticker = tokio::time::interval(ping_interval);
    loop {
        tokio::select! {
            _ = session.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if !session.connected.load(Ordering::SeqCst) {
            break;
        }
        let payload = serde_json::to_vec(&PingPayload::now()).expect("PingPayload always serializes");
        if let Err(err) = session.send(MessageType::PingRequest, &payload, write_timeout).await {
            tracing::debug!(%err, "ping send failed");
        }
    }
}

/// Reads frames until disconnect, dispatching snapshots to `snapshots`
/// (drop-newest on a full channel, §4.10), chat to `chat`, and timing
/// `PingResponse` frames against the session's latency field.
pub async fn run_read_loop(
    session: Arc<ClientSession>,
    mut read_half: ReadHalf<TcpStream>,
    read_timeout: Duration,
    snapshots: mpsc::Sender<GameStateUpdate>,
    chat: mpsc::Sender<ChatMessageOut>,
) {
    loop {
        if !session.connected.load(Ordering::SeqCst) {
            break;
        }

        let frame = tokio::select! {
            _ = session.cancel.cancelled() => break,
            frame = read_frame(&mut read_half, read_timeout) => frame,
        };

        let (message_type, payload) = match frame {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(%err, "client read loop ended");
                break;
            }
        };

        match message_type {
            MessageType::GameStateUpdate => {
                if let Ok(snapshot) = serde_json::from_slice::<GameStateUpdate>(&payload) {
                    // Non-blocking by design: a full channel means no reader
                    // has consumed the previous snapshot yet, and it is
                    // already stale, so the new one is dropped instead.
                    let _ = snapshots.try_send(snapshot);
                }
            }
            MessageType::ChatMessage => {
                if let Ok(msg) = serde_json::from_slice::<ChatMessageOut>(&payload) {
                    let _ = chat.try_send(msg);
                }
            }
            MessageType::PingResponse => {
                if let Ok(sent) = serde_json::from_slice::<PingPayload>(&payload) {
                    let now = chrono::Utc::now();
                    if let Ok(delta) = (now - sent.0).to_std() {
                        *session.latency.lock().await = Some(delta);
                    }
                }
            }
            other => {
                tracing::debug!(message_type = %other, "ignoring unexpected message type");
            }
        }
    }

    session.connected.store(false, Ordering::SeqCst);
}

/// Attempts up to `maxReconnectAttempts` reconnections spaced by
/// `reconnectDelay`, reusing the credentials from the initial connect.
/// Returns the reconnected session and its read half on success.
pub async fn run_reconnect(
    address: String,
    credentials: Credentials,
    config: ClientConfig,
) -> Option<(Arc<ClientSession>, ReadHalf<TcpStream>)> {
    for attempt in 1..=config.max_reconnect_attempts {
        match connect(&address, &credentials, &config).await {
            Ok(pair) => {
                tracing::info!(attempt, "reconnected");
                return Some(pair);
            }
            Err(err) => {
                tracing::warn!(attempt, %err, "reconnect attempt failed");
                tokio::time::sleep(config.reconnect_delay).await;
            }
        }
    }
    tracing::warn!(attempts = config.max_reconnect_attempts, "reconnect exhausted");
    None
}
