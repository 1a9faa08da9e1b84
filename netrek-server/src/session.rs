//! Session Protocol, server side (§4.6): the handshake and the per-session
//! read loop. Mirrors the teacher's `hand_shake`/`processing_module` split
//! of "establish the connection" from "run its steady-state traffic", but
//! over a length-prefixed TCP frame instead of a WebSocket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use netrek_sim::{BeamDirection, SimError, Simulation};
use protocol::{
    ChatMessageIn, ChatMessageOut, ConnectRequest, ConnectResponse, MessageType, PlayerInput, RequestShipClass,
};

use crate::config::ServerConfig;
use crate::error::TransportError;
use crate::frame_io::{read_frame, write_frame};
use crate::validation::{self, RateLimiter};

/// Server-side state for one connected client (§3 "Client Session").
pub struct ServerSession {
    pub session_id: u64,
    pub player_id: u64,
    pub client_id: u64,
    pub player_name: Mutex<String>,
    pub team_id: AtomicI64,
    pub connected: AtomicBool,
    pub last_input_at: Mutex<std::time::Instant>,
    pub latency: Mutex<Option<Duration>>,
    writer: Mutex<WriteHalf<TcpStream>>,
    pub cancel: CancellationToken,
}

impl ServerSession {
    /// Sends one frame. Writes to a single session are serialized by
    /// `writer`'s mutex; writes to different sessions proceed in parallel.
    pub async fn send(&self, message_type: MessageType, payload: &[u8], write_timeout: Duration) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, message_type, payload, write_timeout).await
    }
}

/// Everything the read loop and the broadcaster need that isn't specific
/// to one session.
pub struct SessionContext {
    pub config: Arc<ServerConfig>,
    pub sim: Arc<RwLock<Simulation>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub sessions: Arc<RwLock<std::collections::HashMap<u64, Arc<ServerSession>>>>,
    pub next_session_id: Arc<AtomicU64>,
    pub next_client_id: Arc<AtomicU64>,
}

/// Performs the server side of the handshake (§4.6). On success, returns
/// the registered session and the read half left to hand off to the read
/// loop. On any failure, writes a failure `ConnectResponse` (where
/// possible) and closes the stream itself; the caller has nothing further
/// to clean up.
pub async fn perform_handshake(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: &SessionContext,
    root_cancel: &CancellationToken,
) -> Option<(Arc<ServerSession>, ReadHalf<TcpStream>)> {
    let connection_timeout = Duration::from_secs_f64(ctx.config.network.connection_timeout_secs);
    let (mut read_half, mut write_half) = tokio::io::split(stream);

    let (message_type, payload) = match read_frame(&mut read_half, connection_timeout).await {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(?peer, ?err, "handshake read failed");
            return None;
        }
    };

    if message_type != MessageType::ConnectRequest {
        tracing::warn!(?peer, got = %message_type, "expected ConnectRequest as first frame");
        let _ = write_connect_failure(&mut write_half, "expected ConnectRequest", connection_timeout).await;
        return None;
    }

    let session_id = ctx.next_session_id.fetch_add(1, Ordering::SeqCst);
    if let Err(err) = validation::validate_message(&payload, session_id, &ctx.rate_limiter, std::time::Instant::now()) {
        tracing::warn!(?peer, %err, "handshake message failed validation");
        let _ = write_connect_failure(&mut write_half, &err.to_string(), connection_timeout).await;
        return None;
    }

    let request: ConnectRequest = match serde_json::from_slice(&payload) {
        Ok(req) => req,
        Err(err) => {
            tracing::warn!(?peer, %err, "malformed ConnectRequest");
            let _ = write_connect_failure(&mut write_half, "malformed ConnectRequest", connection_timeout).await;
            return None;
        }
    };

    let sanitized_name = match validation::validate_player_name(&request.player_name) {
        Ok(name) => name,
        Err(err) => {
            tracing::info!(?peer, %err, "rejected ConnectRequest: invalid player name");
            let _ = write_connect_failure(&mut write_half, "invalid player name", connection_timeout).await;
            return None;
        }
    };

    let max_team_id = {
        let sim = ctx.sim.read().await;
        sim.team_ids().max().unwrap_or(0)
    };
    if validation::validate_team_id(request.team_id, max_team_id).is_err() {
        tracing::info!(?peer, team_id = request.team_id, "rejected ConnectRequest: invalid team");
        let _ = write_connect_failure(&mut write_half, "invalid team", connection_timeout).await;
        return None;
    }

    let player_id = {
        let mut sim = ctx.sim.write().await;
        match sim.add_player(sanitized_name.clone(), request.team_id) {
            Ok(id) => id,
            Err(SimError::UnknownTeam(team_id)) => {
                tracing::info!(?peer, team_id, "rejected ConnectRequest: invalid team");
                let _ = write_connect_failure(&mut write_half, "invalid team", connection_timeout).await;
                return None;
            }
            Err(err) => {
                tracing::error!(?peer, %err, "add_player failed unexpectedly");
                let _ = write_connect_failure(&mut write_half, "internal error", connection_timeout).await;
                return None;
            }
        }
    };

    let client_id = ctx.next_client_id.fetch_add(1, Ordering::SeqCst);
    let response = ConnectResponse::success(player_id, client_id);
    let body = serde_json::to_vec(&response).expect("ConnectResponse always serializes");
    if write_frame(&mut write_half, MessageType::ConnectResponse, &body, connection_timeout)
        .await
        .is_err()
    {
        tracing::warn!(?peer, "failed to write ConnectResponse; rolling back player");
        let mut sim = ctx.sim.write().await;
        let _ = sim.remove_player(player_id);
        return None;
    }

    let session = Arc::new(ServerSession {
        session_id,
        player_id,
        client_id,
        player_name: Mutex::new(sanitized_name),
        team_id: AtomicI64::new(request.team_id),
        connected: AtomicBool::new(true),
        last_input_at: Mutex::new(std::time::Instant::now()),
        latency: Mutex::new(None),
        writer: Mutex::new(write_half),
        cancel: root_cancel.child_token(),
    });

    tracing::info!(?peer, session_id, player_id, "handshake complete");
    Some((session, read_half))
}

async fn write_connect_failure(
    write_half: &mut WriteHalf<TcpStream>,
    error: &str,
    deadline: Duration,
) -> Result<(), TransportError> {
    let response = ConnectResponse::failure(error);
    let body = serde_json::to_vec(&response).expect("ConnectResponse always serializes");
    write_frame(write_half, MessageType::ConnectResponse, &body, deadline).await
}

/// Steady-state per-session read loop (§4.6). Runs until the client
/// disconnects, a transport error occurs, or the session's cancellation
/// token fires.
pub async fn run_read_loop(session: Arc<ServerSession>, mut read_half: ReadHalf<TcpStream>, ctx: Arc<SessionContext>) {
    let read_timeout = Duration::from_secs_f64(ctx.config.network.read_timeout_secs);
    let write_timeout = Duration::from_secs_f64(ctx.config.network.write_timeout_secs);

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
                tracing::debug!(session_id = session.session_id, ?err, "session read ended");
                break;
            }
        };

        if message_type == MessageType::DisconnectNotification {
            session.connected.store(false, Ordering::SeqCst);
            break;
        }

        if let Err(err) = validation::validate_message(&payload, session.session_id, &ctx.rate_limiter, std::time::Instant::now()) {
            tracing::debug!(session_id = session.session_id, %err, "skipping message that failed validation");
            continue;
        }

        match message_type {
            MessageType::PlayerInput => handle_player_input(&session, &payload, &ctx).await,
            MessageType::PingRequest => handle_ping(&session, &payload, write_timeout).await,
            MessageType::ChatMessage => handle_chat(&session, &payload, &ctx, write_timeout).await,
            MessageType::RequestShipClass => handle_request_ship_class(&session, &payload, &ctx).await,
            other => {
                tracing::debug!(session_id = session.session_id, message_type = %other, "ignoring unexpected message type");
            }
        }

        *session.last_input_at.lock().await = std::time::Instant::now();
    }

    session.connected.store(false, Ordering::SeqCst);
}

async fn handle_player_input(session: &ServerSession, payload: &[u8], ctx: &SessionContext) {
    let Ok(input) = serde_json::from_slice::<PlayerInput>(payload) else {
        tracing::debug!(session_id = session.session_id, "malformed PlayerInput, skipping");
        return;
    };
    if validation::validate_weapon_index(input.fire_weapon).is_err() {
        tracing::debug!(session_id = session.session_id, idx = input.fire_weapon, "PlayerInput weapon index out of range, skipping");
        return;
    }
    if validation::validate_beam_amount(input.beam_amount).is_err() {
        tracing::debug!(session_id = session.session_id, amount = input.beam_amount, "PlayerInput beam amount out of range, skipping");
        return;
    }

    let mut sim = ctx.sim.write().await;
    let Some(ship_id) = sim.player_ship_id(session.player_id) else {
        return;
    };

    if let Err(err) = sim.set_ship_controls(ship_id, input.thrust, input.turn_right, input.turn_left) {
        tracing::debug!(session_id = session.session_id, %err, "set_ship_controls failed");
        return;
    }
    if let Err(err) = sim.fire_weapon(ship_id, input.fire_weapon) {
        tracing::debug!(session_id = session.session_id, %err, "fire_weapon failed");
    }
    if input.beam_down {
        if let Err(err) = sim.beam_armies(ship_id, input.target_id, BeamDirection::Down, input.beam_amount) {
            tracing::debug!(session_id = session.session_id, %err, "beam_down failed");
        }
    }
    if input.beam_up {
        if let Err(err) = sim.beam_armies(ship_id, input.target_id, BeamDirection::Up, input.beam_amount) {
            tracing::debug!(session_id = session.session_id, %err, "beam_up failed");
        }
    }
}

async fn handle_ping(session: &ServerSession, payload: &[u8], write_timeout: Duration) {
    if let Err(err) = session.send(MessageType::PingResponse, payload, write_timeout).await {
        tracing::debug!(session_id = session.session_id, %err, "failed to echo PingResponse");
    }
}

async fn handle_request_ship_class(session: &ServerSession, payload: &[u8], ctx: &SessionContext) {
    let Ok(request) = serde_json::from_slice::<RequestShipClass>(payload) else {
        return;
    };
    let Some(class) = netrek_sim::ShipClass::from_index(request.ship_class) else {
        tracing::debug!(session_id = session.session_id, class = request.ship_class, "unknown ship class requested");
        return;
    };
    ctx.sim.write().await.set_preferred_ship_class(session.player_id, class);
}

async fn handle_chat(session: &ServerSession, payload: &[u8], ctx: &SessionContext, write_timeout: Duration) {
    let Ok(chat) = serde_json::from_slice::<ChatMessageIn>(payload) else {
        return;
    };

    let sanitized = match validation::validate_chat_message(&chat.message) {
        Ok(text) => text,
        Err(err) => {
            let rejection = ChatMessageOut::Rejected { error: err.to_string() };
            let body = serde_json::to_vec(&rejection).expect("ChatMessageOut always serializes");
            let _ = session.send(MessageType::ChatMessage, &body, write_timeout).await;
            return;
        }
    };

    let team_id = session.team_id.load(Ordering::SeqCst);
    let sender_name = session.player_name.lock().await.clone();
    let broadcast = ChatMessageOut::Broadcast {
        sender_id: session.player_id,
        sender_name,
        team_id,
        message: sanitized,
    };
    let body = serde_json::to_vec(&broadcast).expect("ChatMessageOut always serializes");

    let sessions: Vec<Arc<ServerSession>> = ctx.sessions.read().await.values().cloned().collect();
    for other in sessions {
        let body = body.clone();
        let write_timeout = write_timeout;
        tokio::spawn(async move {
            if let Err(err) = other.send(MessageType::ChatMessage, &body, write_timeout).await {
                tracing::debug!(session_id = other.session_id, %err, "chat broadcast write failed");
            }
        });
    }
}
