//! JSON payload shapes carried by each [`crate::MessageType`] frame.
//!
//! Field names are case-sensitive and match spec.md §6 exactly; several
//! types use `#[serde(rename = "...")]` to keep idiomatic Rust field names
//! (`snake_case`) while preserving the wire's mixed-case JSON keys.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::Vector2D;

/// Client -> Server, the first frame of the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    #[serde(rename = "playerName")]
    pub player_name: String,
    #[serde(rename = "teamID")]
    pub team_id: i64,
}

/// Server -> Client, tagged success/failure response to [`ConnectRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConnectResponse {
    Success {
        success: bool,
        #[serde(rename = "playerID")]
        player_id: u64,
        #[serde(rename = "clientID")]
        client_id: u64,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl ConnectResponse {
    pub fn success(player_id: u64, client_id: u64) -> Self {
        ConnectResponse::Success {
            success: true,
            player_id,
            client_id,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ConnectResponse::Failure {
            success: false,
            error: error.into(),
        }
    }
}

/// Client -> Server, applied to the sender's ship on the next tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInput {
    pub thrust: bool,
    #[serde(rename = "turnLeft")]
    pub turn_left: bool,
    #[serde(rename = "turnRight")]
    pub turn_right: bool,
    #[serde(rename = "fireWeapon")]
    pub fire_weapon: i32,
    #[serde(rename = "beamDown")]
    pub beam_down: bool,
    #[serde(rename = "beamUp")]
    pub beam_up: bool,
    #[serde(rename = "beamAmount")]
    pub beam_amount: i64,
    #[serde(rename = "targetID")]
    pub target_id: u64,
}

/// Client -> Server chat submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageIn {
    pub message: String,
}

/// Server -> Client broadcast chat, or the rejection form sent only to the
/// sender when validation fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatMessageOut {
    Broadcast {
        #[serde(rename = "senderID")]
        sender_id: u64,
        #[serde(rename = "senderName")]
        sender_name: String,
        #[serde(rename = "teamID")]
        team_id: i64,
        message: String,
    },
    Rejected {
        error: String,
    },
}

/// Client -> Server, requests the ship-class stat table entry to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestShipClass {
    #[serde(rename = "shipClass")]
    pub ship_class: i32,
}

/// A ping payload is a bare JSON timestamp value (RFC 3339 string).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PingPayload(pub chrono::DateTime<chrono::Utc>);

impl PingPayload {
    pub fn now() -> Self {
        PingPayload(chrono::Utc::now())
    }
}

/// Immutable per-entity state records embedded in a [`GameStateUpdate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipState {
    pub id: u64,
    #[serde(rename = "teamID")]
    pub team_id: i64,
    #[serde(rename = "shipClass")]
    pub ship_class: i32,
    pub position: Vector2D,
    pub rotation: f64,
    pub velocity: Vector2D,
    pub hull: f64,
    pub shields: f64,
    pub fuel: f64,
    pub armies: i64,
    pub active: bool,
    #[serde(rename = "playerID")]
    pub player_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileState {
    pub id: u64,
    #[serde(rename = "ownerShipID")]
    pub owner_ship_id: u64,
    #[serde(rename = "teamID")]
    pub team_id: i64,
    pub position: Vector2D,
    pub velocity: Vector2D,
    pub damage: f64,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanetState {
    pub id: u64,
    pub name: String,
    pub position: Vector2D,
    #[serde(rename = "planetType")]
    pub planet_type: String,
    #[serde(rename = "teamID")]
    pub team_id: i64,
    pub armies: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamState {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub score: i64,
    #[serde(rename = "shipCount")]
    pub ship_count: i64,
    #[serde(rename = "planetCount")]
    pub planet_count: i64,
}

/// Server -> Client (and client <- server) world snapshot, full or
/// AOI-filtered per §4.7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateUpdate {
    #[serde(rename = "Tick")]
    pub tick: u64,
    #[serde(rename = "Ships")]
    pub ships: HashMap<u64, ShipState>,
    #[serde(rename = "Planets")]
    pub planets: HashMap<u64, PlanetState>,
    #[serde(rename = "Projectiles")]
    pub projectiles: HashMap<u64, ProjectileState>,
    #[serde(rename = "Teams")]
    pub teams: HashMap<i64, TeamState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_response_round_trips() {
        let resp = ConnectResponse::success(7, 9);
        let json = serde_json::to_string(&resp).unwrap();
        let back: ConnectResponse = serde_json::from_str(&json).unwrap();
        match back {
            ConnectResponse::Success {
                player_id,
                client_id,
                ..
            } => {
                assert_eq!(player_id, 7);
                assert_eq!(client_id, 9);
            }
            _ => panic!("expected success variant"),
        }
    }

    #[test]
    fn game_state_update_round_trips_field_by_field() {
        let mut ships = HashMap::new();
        ships.insert(
            1,
            ShipState {
                id: 1,
                team_id: 0,
                ship_class: 0,
                position: Vector2D::new(1.0, 2.0),
                rotation: 0.5,
                velocity: Vector2D::ZERO,
                hull: 100.0,
                shields: 50.0,
                fuel: 80.0,
                armies: 0,
                active: true,
                player_id: 42,
            },
        );
        let update = GameStateUpdate {
            tick: 10,
            ships,
            planets: HashMap::new(),
            projectiles: HashMap::new(),
            teams: HashMap::new(),
        };
        let json = serde_json::to_string(&update).unwrap();
        let back: GameStateUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tick, update.tick);
        assert_eq!(
            back.ships.get(&1).unwrap().player_id,
            update.ships.get(&1).unwrap().player_id
        );
    }
}
