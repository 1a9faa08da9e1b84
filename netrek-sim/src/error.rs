//! Invariant-violation errors raised by the simulation core.
//!
//! These correspond to spec §7's "Invariant violations" category: caller
//! bugs such as firing a weapon on a ship that no longer exists. They are
//! returned to the caller, logged, and never unwind the tick task.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("unknown team {0}")]
    UnknownTeam(i64),
    #[error("unknown ship {0}")]
    UnknownShip(u64),
    #[error("unknown planet {0}")]
    UnknownPlanet(u64),
    #[error("unknown player {0}")]
    UnknownPlayer(u64),
    #[error("weapon index {0} out of range")]
    WeaponIndexOutOfRange(i32),
    #[error("ship {0} is not active")]
    ShipInactive(u64),
    #[error("ship {ship_id} is out of beaming range of planet {planet_id}")]
    OutOfBeamingRange { ship_id: u64, planet_id: u64 },
    #[error("ship {ship_id} team {ship_team} does not own planet {planet_id} (owned by {planet_team})")]
    PlanetNotOwned {
        ship_id: u64,
        ship_team: i64,
        planet_id: u64,
        planet_team: i64,
    },
}
