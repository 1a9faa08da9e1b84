//! The world-shape portion of the config file (§6): `worldSize`, `teams`,
//! `planets`, `physics`, `gameRules`. `netrek-server::config` embeds this
//! verbatim and adds the server-only keys (`maxPlayers`, `network`).

use serde::{Deserialize, Serialize};

use crate::model::PlanetType;
use protocol::Vector2D;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicsConfig {
    /// Multiplicative velocity decay applied per second.
    pub friction: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        PhysicsConfig { friction: 0.35 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRulesConfig {
    pub friendly_fire: bool,
    pub max_score: i64,
    /// Seconds; 0 disables the time-limit win condition.
    pub time_limit: f64,
    pub respawn_delay: f64,
}

impl Default for GameRulesConfig {
    fn default() -> Self {
        GameRulesConfig {
            friendly_fire: false,
            max_score: 1000,
            time_limit: 0.0,
            respawn_delay: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamTemplate {
    pub id: i64,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanetTemplate {
    pub name: String,
    pub position: Vector2D,
    pub planet_type: PlanetType,
    /// -1 for neutral at game start.
    pub team_id: i64,
    pub armies: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    pub world_size: f64,
    pub teams: Vec<TeamTemplate>,
    pub planets: Vec<PlanetTemplate>,
    pub physics: PhysicsConfig,
    pub game_rules: GameRulesConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            world_size: 20000.0,
            teams: vec![
                TeamTemplate {
                    id: 0,
                    name: "Federation".to_string(),
                    color: "#3399ff".to_string(),
                },
                TeamTemplate {
                    id: 1,
                    name: "Klingon".to_string(),
                    color: "#cc3333".to_string(),
                },
            ],
            planets: vec![
                PlanetTemplate {
                    name: "Earth".to_string(),
                    position: Vector2D::new(-5000.0, 0.0),
                    planet_type: PlanetType::Homeworld,
                    team_id: 0,
                    armies: 50,
                },
                PlanetTemplate {
                    name: "Qo'noS".to_string(),
                    position: Vector2D::new(5000.0, 0.0),
                    planet_type: PlanetType::Homeworld,
                    team_id: 1,
                    armies: 50,
                },
            ],
            physics: PhysicsConfig::default(),
            game_rules: GameRulesConfig::default(),
        }
    }
}
