//! Client Runtime (§4.10): the public surface embedders use. Owns the ping
//! loop, read loop, and reconnect supervisor as background tasks, and routes
//! every outbound call through the Circuit Breaker.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use protocol::{ChatMessageIn, ChatMessageOut, GameStateUpdate, MessageType, PlayerInput, RequestShipClass};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::ClientConfig;
use crate::error::{CircuitError, HandshakeError};
use crate::session::{self, ClientSession, Credentials};

const SNAPSHOT_CHANNEL_CAPACITY: usize = 10;
const CHAT_CHANNEL_CAPACITY: usize = 32;

/// A connected, supervised client. Reconnects transparently on disconnect;
/// callers only see outbound calls fail while a reconnect is in flight.
pub struct ClientRuntime {
    config: ClientConfig,
    session: Arc<RwLock<Arc<ClientSession>>>,
    breaker: CircuitBreaker,
    snapshots: mpsc::Receiver<GameStateUpdate>,
    chat: mpsc::Receiver<ChatMessageOut>,
    supervisor_cancel: CancellationToken,
}

impl ClientRuntime {
    /// Connects to `address` with `credentials` and spawns the ping loop,
    /// read loop, and reconnect supervisor. Returns `Err` only if the initial
    /// handshake fails; once connected, transient disconnects are retried
    /// in the background per `config.max_reconnect_attempts`.
    pub async fn connect(address: String, credentials: Credentials, config: ClientConfig) -> Result<Self, HandshakeError> {
        let (session, read_half) = session::connect(&address, &credentials, &config).await?;

        let (snapshot_tx, snapshot_rx) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let (chat_tx, chat_rx) = mpsc::channel(CHAT_CHANNEL_CAPACITY);

        let supervisor_cancel = CancellationToken::new();

        tokio::spawn(session::run_ping_loop(session.clone(), config.ping_interval, config.write_timeout));
        tokio::spawn(session::run_read_loop(session.clone(), read_half, config.read_timeout, snapshot_tx.clone(), chat_tx.clone()));

        let session_slot = Arc::new(RwLock::new(session.clone()));

        spawn_reconnect_supervisor(
            address,
            config.clone(),
            session_slot.clone(),
            session,
            credentials,
            snapshot_tx,
            chat_tx,
            supervisor_cancel.clone(),
        );

        Ok(ClientRuntime {
            config: config.clone(),
            session: session_slot,
            breaker: CircuitBreaker::new(config.circuit_breaker),
            snapshots: snapshot_rx,
            chat: chat_rx,
            supervisor_cancel,
        })
    }

    /// Sends player control input. Dropped input is recoverable next tick,
    /// so a circuit-open failure here is not retried.
    pub async fn send_input(&self, input: PlayerInput) -> Result<(), CircuitError> {
        let session = self.session.read().await.clone();
        self.breaker
            .call(|| async {
                let payload = serde_json::to_vec(&input).expect("PlayerInput always serializes");
                session.send(MessageType::PlayerInput, &payload, self.config.write_timeout).await
            })
            .await
    }

    pub async fn send_chat_message(&self, message: String) -> Result<(), CircuitError> {
        let session = self.session.read().await.clone();
        self.breaker
            .call(|| async {
                let payload = serde_json::to_vec(&ChatMessageIn { message }).expect("ChatMessageIn always serializes");
                session.send(MessageType::ChatMessage, &payload, self.config.write_timeout).await
            })
            .await
    }

    pub async fn request_ship_class(&self, ship_class: i32) -> Result<(), CircuitError> {
        let session = self.session.read().await.clone();
        self.breaker
            .call(|| async {
                let payload = serde_json::to_vec(&RequestShipClass { ship_class }).expect("RequestShipClass always serializes");
                session.send(MessageType::RequestShipClass, &payload, self.config.write_timeout).await
            })
            .await
    }

    pub async fn get_latency(&self) -> Option<Duration> {
        let session = self.session.read().await.clone();
        *session.latency.lock().await
    }

    /// Receives the next world snapshot, or `None` once the runtime has shut
    /// down and every sender has been dropped.
    pub async fn next_snapshot(&mut self) -> Option<GameStateUpdate> {
        self.snapshots.recv().await
    }

    /// Receives the next chat broadcast or rejection.
    pub async fn next_chat_message(&mut self) -> Option<ChatMessageOut> {
        self.chat.recv().await
    }

    /// Stops the ping loop, read loop, and reconnect supervisor for the
    /// current session and any future reconnected session.
    pub async fn shutdown(&self) {
        self.supervisor_cancel.cancel();
        self.session.read().await.cancel.cancel();
    }
}

/// Watches the active session for disconnect and, when it drops, drives
/// `run_reconnect` and re-spawns the ping/read loops against the new one.
/// Exits quietly once reconnection is exhausted, leaving the runtime's
/// outbound calls failing against the last-known session.
fn spawn_reconnect_supervisor(
    address: String,
    config: ClientConfig,
    session_slot: Arc<RwLock<Arc<ClientSession>>>,
    initial_session: Arc<ClientSession>,
    credentials: Credentials,
    snapshot_tx: mpsc::Sender<GameStateUpdate>,
    chat_tx: mpsc::Sender<ChatMessageOut>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut current = initial_session;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = wait_for_disconnect(current.clone()) => {}
            }
            if cancel.is_cancelled() {
                break;
            }

            tracing::warn!(address = %address, "client session disconnected, attempting reconnect");
            match session::run_reconnect(address.clone(), credentials.clone(), config.clone()).await {
                Some((new_session, read_half)) => {
                    *session_slot.write().await = new_session.clone();
                    tokio::spawn(session::run_ping_loop(new_session.clone(), config.ping_interval, config.write_timeout));
                    tokio::spawn(session::run_read_loop(
                        new_session.clone(),
                        read_half,
                        config.read_timeout,
                        snapshot_tx.clone(),
                        chat_tx.clone(),
                    ));
                    current = new_session;
                }
                None => {
                    tracing::error!(address = %address, "reconnect exhausted, giving up");
                    break;
                }
            }
        }
    });
}

async fn wait_for_disconnect(session: Arc<ClientSession>) {
    while session.connected.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
