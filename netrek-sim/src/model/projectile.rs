//! Projectile entity (§4.2): owner-tagged, team-tagged, bounded lifetime.

use protocol::{Collider, Vector2D};

pub const PROJECTILE_RADIUS: f64 = 3.0;

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u64,
    pub owner_ship_id: u64,
    pub team_id: i64,
    pub position: Vector2D,
    pub velocity: Vector2D,
    pub damage: f64,
    pub active: bool,
    ttl_remaining: f64,
}

impl Projectile {
    pub fn new(
        id: u64,
        owner_ship_id: u64,
        team_id: i64,
        position: Vector2D,
        velocity: Vector2D,
        damage: f64,
        ttl: f64,
    ) -> Self {
        Projectile {
            id,
            owner_ship_id,
            team_id,
            position,
            velocity,
            damage,
            active: true,
            ttl_remaining: ttl,
        }
    }

    pub fn get_collider(&self) -> Collider {
        Collider::new(self.position, PROJECTILE_RADIUS)
    }

    /// Advances position; deactivates once its time-to-live expires.
    pub fn update(&mut self, dt: f64) {
        if !self.active {
            return;
        }
        self.position = self.position.add(self.velocity.scale(dt));
        self.ttl_remaining -= dt;
        if self.ttl_remaining <= 0.0 {
            self.active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deactivates_when_ttl_expires() {
        let mut p = Projectile::new(1, 1, 0, Vector2D::ZERO, Vector2D::new(10.0, 0.0), 5.0, 1.0);
        p.update(0.6);
        assert!(p.active);
        p.update(0.6);
        assert!(!p.active);
    }
}
