//! Conversions from the owned entity model to the wire snapshot DTOs
//! (§4.7's "Snapshot"). Lives here, not in `protocol`, because only the
//! simulation knows how to read its own entities.

use protocol::{GameStateUpdate, PlanetState, ProjectileState, ShipState, TeamState};

use crate::model::{Planet, PlanetType, Projectile, Ship, Team};

impl PlanetType {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanetType::Agricultural => "Agricultural",
            PlanetType::Industrial => "Industrial",
            PlanetType::Military => "Military",
            PlanetType::Homeworld => "Homeworld",
        }
    }
}

impl From<&Ship> for ShipState {
    fn from(ship: &Ship) -> Self {
        ShipState {
            id: ship.id,
            team_id: ship.team_id,
            ship_class: ship.ship_class.index(),
            position: ship.position,
            rotation: ship.rotation,
            velocity: ship.velocity,
            hull: ship.hull,
            shields: ship.shields,
            fuel: ship.fuel,
            armies: ship.armies,
            active: ship.active,
            player_id: ship.player_id,
        }
    }
}

impl From<&Projectile> for ProjectileState {
    fn from(p: &Projectile) -> Self {
        ProjectileState {
            id: p.id,
            owner_ship_id: p.owner_ship_id,
            team_id: p.team_id,
            position: p.position,
            velocity: p.velocity,
            damage: p.damage,
            active: p.active,
        }
    }
}

impl From<&Planet> for PlanetState {
    fn from(p: &Planet) -> Self {
        PlanetState {
            id: p.id,
            name: p.name.clone(),
            position: p.position,
            planet_type: p.planet_type.as_str().to_string(),
            team_id: p.team_id,
            armies: p.armies,
        }
    }
}

impl From<&Team> for TeamState {
    fn from(t: &Team) -> Self {
        TeamState {
            id: t.id,
            name: t.name.clone(),
            color: t.color.clone(),
            score: t.score,
            ship_count: t.ship_count,
            planet_count: t.planet_count,
        }
    }
}

/// Builds a full [`GameStateUpdate`] from the current entity model. Active
/// ships/projectiles only; all planets and teams regardless of status.
pub fn build_snapshot(
    tick: u64,
    ships: impl Iterator<Item = (u64, ShipState)>,
    planets: impl Iterator<Item = (u64, PlanetState)>,
    projectiles: impl Iterator<Item = (u64, ProjectileState)>,
    teams: impl Iterator<Item = (i64, TeamState)>,
) -> GameStateUpdate {
    GameStateUpdate {
        tick,
        ships: ships.collect(),
        planets: planets.collect(),
        projectiles: projectiles.collect(),
        teams: teams.collect(),
    }
}
