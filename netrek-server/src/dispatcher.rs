//! Server Dispatcher (§4.7): owns the listener, the live-session map, the
//! simulation, the rate limiter and the resource governor. Wires together
//! admission, the read loops spawned per session, the tick task, and the
//! broadcast/AOI-filtered snapshot distribution.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use netrek_sim::{EventKind, Simulation};
use protocol::{GameStateUpdate, MessageType, PlanetState, ProjectileState, ShipState, TeamState};

use crate::config::ServerConfig;
use crate::governor::ResourceGovernor;
use crate::session::{perform_handshake, run_read_loop, ServerSession, SessionContext};
use crate::validation::RateLimiter;

/// Fixed per spec.md's AOI filter description; not configurable.
pub const VIEW_RADIUS: f64 = 3000.0;

pub struct Dispatcher {
    config: Arc<ServerConfig>,
    sim: Arc<RwLock<Simulation>>,
    ctx: Arc<SessionContext>,
    governor: ResourceGovernor,
    running: Arc<AtomicBool>,
    root_cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(config: ServerConfig, sim: Simulation, governor: ResourceGovernor) -> Self {
        let config = Arc::new(config);
        let ctx = Arc::new(SessionContext {
            config: config.clone(),
            sim: Arc::new(RwLock::new(sim)),
            rate_limiter: Arc::new(RateLimiter::new()),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_session_id: Arc::new(AtomicU64::new(1)),
            next_client_id: Arc::new(AtomicU64::new(1)),
        });
        let sim_handle = ctx.sim.clone();

        Dispatcher {
            config,
            sim: sim_handle,
            ctx,
            governor,
            running: Arc::new(AtomicBool::new(false)),
            root_cancel: CancellationToken::new(),
        }
    }

    pub fn simulation(&self) -> Arc<RwLock<Simulation>> {
        self.sim.clone()
    }

    pub fn session_count_handle(&self) -> Arc<RwLock<HashMap<u64, Arc<ServerSession>>>> {
        self.ctx.sessions.clone()
    }

    /// Binds the listener, starts the simulation, and spawns the accept
    /// loop, the tick task, and the rate-limiter garbage collector.
    pub async fn start(&self, address: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(address).await?;
        tracing::info!(address, "dispatcher bound");

        self.running.store(true, Ordering::SeqCst);
        self.sim.write().await.start_game();

        self.spawn_respawn_scheduler().await;
        self.spawn_accept_loop(listener);
        self.spawn_tick_task();
        self.spawn_rate_limiter_gc();

        Ok(())
    }

    /// Clears `running`, cancels every session's token (closing its
    /// transport), and stops the simulation.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.root_cancel.cancel();
        let sessions = self.ctx.sessions.write().await;
        for session in sessions.values() {
            session.connected.store(false, Ordering::SeqCst);
        }
        drop(sessions);
        self.sim.write().await.end_game(None);
    }

    fn spawn_accept_loop(&self, listener: TcpListener) {
        let ctx = self.ctx.clone();
        let governor = self.governor.clone();
        let running = self.running.clone();
        let root_cancel = self.root_cancel.clone();
        let max_players = self.config.max_players;

        tokio::spawn(async move {
            loop {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let accepted = tokio::select! {
                    _ = root_cancel.cancelled() => break,
                    accepted = listener.accept() => accepted,
                };
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        tracing::warn!(?err, "accept failed");
                        continue;
                    }
                };

                let current = ctx.sessions.read().await.len();
                if current >= max_players {
                    tracing::info!(?peer, current, max_players, "admission denied: at capacity");
                    drop(stream);
                    continue;
                }

                let guard = match governor.start_task() {
                    Ok(guard) => guard,
                    Err(err) => {
                        tracing::warn!(?peer, %err, "admission denied: task ceiling reached");
                        drop(stream);
                        continue;
                    }
                };

                let ctx = ctx.clone();
                let root_cancel = root_cancel.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    if let Some((session, read_half)) = perform_handshake(stream, peer, &ctx, &root_cancel).await {
                        let session_id = session.session_id;
                        let player_id = session.player_id;
                        ctx.sessions.write().await.insert(session_id, session.clone());
                        run_read_loop(session, read_half, ctx.clone()).await;
                        ctx.sessions.write().await.remove(&session_id);
                        if let Err(err) = ctx.sim.write().await.remove_player(player_id) {
                            tracing::debug!(session_id, %err, "remove_player on disconnect");
                        }
                    }
                });
            }
        });
    }

    fn spawn_tick_task(&self) {
        let ctx = self.ctx.clone();
        let running = self.running.clone();
        let root_cancel = self.root_cancel.clone();
        let period = Duration::from_secs_f64(1.0 / self.config.network.update_rate_hz);
        let ticks_per_state = self.config.network.ticks_per_state as u64;
        let use_partial_state = self.config.network.use_partial_state;
        let write_timeout = Duration::from_secs_f64(self.config.network.write_timeout_secs);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = root_cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let tick = {
                    let mut sim = ctx.sim.write().await;
                    sim.tick();
                    sim.tick_count()
                };

                let sessions: Vec<Arc<ServerSession>> = ctx.sessions.read().await.values().cloned().collect();
                if tick % ticks_per_state == 0 {
                    let snapshot = build_full_snapshot(&ctx.sim.read().await);
                    broadcast_snapshot(&sessions, &snapshot, write_timeout);
                } else if use_partial_state {
                    let sim = ctx.sim.read().await;
                    for session in &sessions {
                        let snapshot = build_aoi_snapshot(&sim, session.player_id);
                        send_snapshot(session.clone(), snapshot, write_timeout);
                    }
                }
            }
        });
    }

    fn spawn_rate_limiter_gc(&self) {
        let ctx = self.ctx.clone();
        let root_cancel = self.root_cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = root_cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                ctx.rate_limiter.collect_garbage(std::time::Instant::now());
            }
        });
    }

    /// Subscribes a death-timer handler to `ShipDestroyed` (spec.md:
    /// "Callers are responsible for respecting `respawnDelay` before
    /// invoking `RespawnShip`") and spawns the poller that calls
    /// `respawn_ship` once each ship's delay has elapsed. The elimination
    /// win condition itself is re-evaluated every tick inside
    /// `Simulation::tick`, so it needs no separate subscription here.
    async fn spawn_respawn_scheduler(&self) {
        let ctx = self.ctx.clone();
        let root_cancel = self.root_cancel.clone();
        let respawn_delay = Duration::from_secs_f64(self.config.simulation.game_rules.respawn_delay);
        let pending: Arc<tokio::sync::Mutex<HashMap<u64, tokio::time::Instant>>> = Arc::new(tokio::sync::Mutex::new(HashMap::new()));

        let pending_for_handler = pending.clone();
        let bus = self.sim.read().await.event_bus().clone();
        // Dropping the subscription handle does not unsubscribe (see
        // `Subscription::cancel`); the handler lives for the bus's lifetime,
        // which is what we want here.
        let _ = bus.subscribe(EventKind::ShipDestroyed, move |event| {
            if let netrek_sim::Event::ShipDestroyed { ship_id, .. } = event {
                let pending = pending_for_handler.clone();
                let ship_id = *ship_id;
                let ready_at = tokio::time::Instant::now() + respawn_delay;
                tokio::spawn(async move {
                    pending.lock().await.insert(ship_id, ready_at);
                });
            }
        });

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(500));
            loop {
                tokio::select! {
                    _ = root_cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let now = tokio::time::Instant::now();
                let mut due: Vec<u64> = Vec::new();
                {
                    let mut pending = pending.lock().await;
                    let ready: Vec<u64> = pending.iter().filter(|(_, at)| **at <= now).map(|(id, _)| *id).collect();
                    for id in ready {
                        pending.remove(&id);
                        due.push(id);
                    }
                }
                if due.is_empty() {
                    continue;
                }
                let mut sim = ctx.sim.write().await;
                let sessions = ctx.sessions.read().await;
                for dead_ship_id in due {
                    let owner = sessions.values().find(|s| {
                        sim.ships().get(&dead_ship_id).map(|s| s.player_id) == Some(s.player_id)
                    });
                    if let Some(session) = owner {
                        if let Err(err) = sim.respawn_ship(session.player_id) {
                            tracing::debug!(player_id = session.player_id, %err, "respawn failed");
                        }
                    }
                }
            }
        });
    }
}

fn build_full_snapshot(sim: &Simulation) -> GameStateUpdate {
    netrek_sim::snapshot::build_snapshot(
        sim.tick_count(),
        sim.ships().iter().filter(|(_, s)| s.active).map(|(id, s)| (*id, ShipState::from(s))),
        sim.planets().iter().map(|(id, p)| (*id, PlanetState::from(p))),
        sim.projectiles().iter().filter(|(_, p)| p.active).map(|(id, p)| (*id, ProjectileState::from(p))),
        sim.teams().iter().map(|(id, t)| (*id, TeamState::from(t))),
    )
}

/// AOI filter (§4.7): ships/projectiles within `VIEW_RADIUS` of the
/// player's ship (the zero vector if the player has no ship right now),
/// plus every planet and team unconditionally.
fn build_aoi_snapshot(sim: &Simulation, player_id: u64) -> GameStateUpdate {
    let origin = sim
        .player_ship_id(player_id)
        .and_then(|id| sim.ship_position(id))
        .unwrap_or(protocol::Vector2D::ZERO);

    let ships = sim
        .ships()
        .iter()
        .filter(|(_, s)| s.active && s.position.distance(origin) <= VIEW_RADIUS)
        .map(|(id, s)| (*id, ShipState::from(s)));
    let projectiles = sim
        .projectiles()
        .iter()
        .filter(|(_, p)| p.active && p.position.distance(origin) <= VIEW_RADIUS)
        .map(|(id, p)| (*id, ProjectileState::from(p)));
    let planets = sim.planets().iter().map(|(id, p)| (*id, PlanetState::from(p)));
    let teams = sim.teams().iter().map(|(id, t)| (*id, TeamState::from(t)));

    netrek_sim::snapshot::build_snapshot(sim.tick_count(), ships, planets, projectiles, teams)
}

fn broadcast_snapshot(sessions: &[Arc<ServerSession>], snapshot: &GameStateUpdate, write_timeout: Duration) {
    let body = serde_json::to_vec(snapshot).expect("GameStateUpdate always serializes");
    for session in sessions {
        let session = session.clone();
        let body = body.clone();
        tokio::spawn(async move {
            if let Err(err) = session.send(MessageType::GameStateUpdate, &body, write_timeout).await {
                tracing::debug!(session_id = session.session_id, %err, "broadcast write failed");
            }
        });
    }
}

fn send_snapshot(session: Arc<ServerSession>, snapshot: GameStateUpdate, write_timeout: Duration) {
    tokio::spawn(async move {
        let body = serde_json::to_vec(&snapshot).expect("GameStateUpdate always serializes");
        if let Err(err) = session.send(MessageType::GameStateUpdate, &body, write_timeout).await {
            tracing::debug!(session_id = session.session_id, %err, "AOI write failed");
        }
    });
}
