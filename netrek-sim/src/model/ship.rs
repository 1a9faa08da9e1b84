//! Ship entity (§4.2). `Update` advances kinematics; `TakeDamage` and
//! `FireWeapon` are the two mutating operations the tick loop and input
//! application call directly.

use protocol::{Collider, Vector2D};

use super::projectile::Projectile;
use super::ship_class::ShipClass;

/// A per-weapon-slot runtime instance: the static [`WeaponSpec`] plus the
/// cooldown clock ticking down toward zero.
///
/// [`WeaponSpec`]: super::ship_class::WeaponSpec
#[derive(Debug, Clone, Copy)]
pub struct Weapon {
    pub cooldown_remaining: f64,
}

#[derive(Debug, Clone)]
pub struct Ship {
    pub id: u64,
    pub team_id: i64,
    pub player_id: u64,
    pub ship_class: ShipClass,
    pub position: Vector2D,
    pub rotation: f64,
    pub velocity: Vector2D,
    pub hull: f64,
    pub shields: f64,
    pub fuel: f64,
    pub armies: i64,
    pub active: bool,
    pub thrusting: bool,
    pub turning_cw: bool,
    pub turning_ccw: bool,
    pub weapons: Vec<Weapon>,
}

impl Ship {
    pub fn new(id: u64, team_id: i64, player_id: u64, ship_class: ShipClass, position: Vector2D) -> Self {
        let stats = ship_class.stats();
        Ship {
            id,
            team_id,
            player_id,
            ship_class,
            position,
            rotation: 0.0,
            velocity: Vector2D::ZERO,
            hull: stats.max_hull,
            shields: stats.max_shields,
            fuel: stats.max_fuel,
            armies: 0,
            active: true,
            thrusting: false,
            turning_cw: false,
            turning_ccw: false,
            weapons: vec![Weapon { cooldown_remaining: 0.0 }; stats.weapons.len()],
        }
    }

    pub fn get_collider(&self) -> Collider {
        Collider::new(self.position, self.ship_class.stats().collider_radius)
    }

    /// Apply rotation from turning inputs, thrust, friction, clamp speed,
    /// advance position, and tick weapon cooldowns down. Wrap-around is the
    /// tick loop's responsibility, not the entity's.
    pub fn update(&mut self, dt: f64, friction: f64) {
        let stats = self.ship_class.stats();

        if self.turning_cw {
            self.rotation += stats.turn_rate * dt;
        }
        if self.turning_ccw {
            self.rotation -= stats.turn_rate * dt;
        }

        if self.thrusting && self.fuel > 0.0 {
            let heading = Vector2D::from_angle(self.rotation);
            self.velocity = self.velocity.add(heading.scale(stats.acceleration * dt));
            self.fuel = (self.fuel - stats.acceleration.abs().max(1.0) * dt).max(0.0);
        }

        let decay = (1.0 - friction * dt).max(0.0);
        self.velocity = self.velocity.scale(decay);

        let speed = self.velocity.length();
        if speed > stats.max_speed {
            self.velocity = self.velocity.scale(stats.max_speed / speed);
        }

        self.position = self.position.add(self.velocity.scale(dt));

        for weapon in &mut self.weapons {
            if weapon.cooldown_remaining > 0.0 {
                weapon.cooldown_remaining = (weapon.cooldown_remaining - dt).max(0.0);
            }
        }
    }

    /// Subtracts `d` from shields first (floor at 0), remainder from hull.
    /// Returns `true` iff hull reached 0 in this call.
    pub fn take_damage(&mut self, d: f64) -> bool {
        if d <= 0.0 {
            return false;
        }
        let was_alive = self.hull > 0.0;
        let absorbed = d.min(self.shields);
        self.shields -= absorbed;
        let remainder = d - absorbed;
        self.hull = (self.hull - remainder).max(0.0);
        was_alive && self.hull == 0.0
    }

    /// `None` if `idx` is out of range, the weapon is on cooldown, or the
    /// ship is out of fuel. Resets that weapon's cooldown and produces a
    /// projectile at the muzzle offset along heading.
    pub fn fire_weapon(&mut self, idx: usize, next_id: u64) -> Option<Projectile> {
        let stats = self.ship_class.stats();
        let spec = stats.weapons.get(idx)?;
        let weapon = self.weapons.get_mut(idx)?;
        if weapon.cooldown_remaining > 0.0 || self.fuel <= 0.0 {
            return None;
        }
        weapon.cooldown_remaining = spec.cooldown;

        let heading = Vector2D::from_angle(self.rotation);
        let muzzle = self.position.add(heading.scale(stats.collider_radius + 2.0));
        let velocity = self.velocity.add(heading.scale(spec.muzzle_speed));

        Some(Projectile::new(
            next_id,
            self.id,
            self.team_id,
            muzzle,
            velocity,
            spec.damage,
            spec.ttl,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_damage_drains_shields_before_hull() {
        let mut ship = Ship::new(1, 0, 1, ShipClass::Scout, Vector2D::ZERO);
        ship.shields = 10.0;
        ship.hull = 50.0;
        let destroyed = ship.take_damage(15.0);
        assert!(!destroyed);
        assert_eq!(ship.shields, 0.0);
        assert_eq!(ship.hull, 45.0);
    }

    #[test]
    fn take_damage_reports_destruction_exactly_once() {
        let mut ship = Ship::new(1, 0, 1, ShipClass::Scout, Vector2D::ZERO);
        ship.shields = 0.0;
        ship.hull = 5.0;
        assert!(ship.take_damage(100.0));
        assert_eq!(ship.hull, 0.0);
        // Already dead: further damage reports no new destruction.
        assert!(!ship.take_damage(10.0));
    }

    #[test]
    fn fire_weapon_respects_cooldown() {
        let mut ship = Ship::new(1, 0, 1, ShipClass::Scout, Vector2D::ZERO);
        assert!(ship.fire_weapon(0, 100).is_some());
        assert!(ship.fire_weapon(0, 101).is_none());
    }

    #[test]
    fn fire_weapon_rejects_out_of_range_index() {
        let mut ship = Ship::new(1, 0, 1, ShipClass::Scout, Vector2D::ZERO);
        assert!(ship.fire_weapon(7, 100).is_none());
    }

    #[test]
    fn update_clamps_speed_to_class_max() {
        let mut ship = Ship::new(1, 0, 1, ShipClass::Scout, Vector2D::ZERO);
        ship.velocity = Vector2D::new(10_000.0, 0.0);
        ship.update(0.1, 0.0);
        assert!(ship.velocity.length() <= ShipClass::Scout.stats().max_speed + 1e-9);
    }
}
