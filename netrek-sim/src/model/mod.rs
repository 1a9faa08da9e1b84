//! Entity model: ships, projectiles, planets, teams, players. Each mobile
//! entity exposes `update(dt)` and `get_collider()`; the spatial index and
//! collision resolution are the only callers that care about concrete type.

mod planet;
mod player;
mod projectile;
mod ship;
mod ship_class;
mod team;

pub use planet::{Planet, PlanetType, PLANET_RADIUS};
pub use player::Player;
pub use projectile::{Projectile, PROJECTILE_RADIUS};
pub use ship::{Ship, Weapon};
pub use ship_class::{ShipClass, ShipClassStats, WeaponSpec};
pub use team::Team;
