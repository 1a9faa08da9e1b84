//! Planet entity (§4.2). Armies grow over time by type-dependent rules;
//! spec.md §3 calls this "out of scope for the combat core... treat as
//! opaque `Update(dt)`", so the growth rates below are additive texture,
//! not part of the contract other modules depend on.

use serde::{Deserialize, Serialize};

use protocol::{Collider, Vector2D};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanetType {
    Agricultural,
    Industrial,
    Military,
    Homeworld,
}

impl PlanetType {
    /// Armies grown per second while owned by a team. Agricultural planets
    /// grow fastest; Industrial slowest; Military and Homeworld sit between.
    fn growth_rate(self) -> f64 {
        match self {
            PlanetType::Agricultural => 0.05,
            PlanetType::Homeworld => 0.03,
            PlanetType::Military => 0.03,
            PlanetType::Industrial => 0.015,
        }
    }
}

pub const PLANET_RADIUS: f64 = 80.0;

#[derive(Debug, Clone)]
pub struct Planet {
    pub id: u64,
    pub name: String,
    pub position: Vector2D,
    pub planet_type: PlanetType,
    /// -1 = neutral.
    pub team_id: i64,
    pub armies: i64,
    growth_accumulator: f64,
}

impl Planet {
    pub fn new(id: u64, name: String, position: Vector2D, planet_type: PlanetType, team_id: i64, armies: i64) -> Self {
        Planet {
            id,
            name,
            position,
            planet_type,
            team_id,
            armies,
            growth_accumulator: 0.0,
        }
    }

    pub fn get_collider(&self) -> Collider {
        Collider::new(self.position, PLANET_RADIUS)
    }

    /// Neutral planets do not grow. Owned planets accrue fractional armies
    /// and convert them to whole armies once the accumulator reaches 1.
    pub fn update(&mut self, dt: f64) {
        if self.team_id < 0 {
            self.growth_accumulator = 0.0;
            return;
        }
        self.growth_accumulator += self.planet_type.growth_rate() * dt;
        while self.growth_accumulator >= 1.0 {
            self.armies += 1;
            self.growth_accumulator -= 1.0;
        }
    }

    /// Removes up to `d` armies; if armies reach 0 the planet becomes
    /// neutral. Returns the number of armies actually removed.
    pub fn bomb(&mut self, d: i64) -> i64 {
        let killed = d.clamp(0, self.armies);
        self.armies -= killed;
        if self.armies == 0 {
            self.team_id = -1;
        }
        killed
    }

    /// Adds armies if the planet is neutral or already `team_id`'s; for a
    /// neutral planet this also sets ownership. Returns `None` if the
    /// planet is held by a different team (use [`Planet::beam_down_hostile`]
    /// for contested takeovers).
    pub fn beam_down_friendly(&mut self, team_id: i64, n: i64) -> Option<i64> {
        if self.team_id != -1 && self.team_id != team_id {
            return None;
        }
        if self.team_id == -1 {
            self.team_id = team_id;
        }
        self.armies += n;
        Some(n)
    }

    /// Contested beam-down against a hostile planet: replace armies with
    /// the attacker's until one side depletes. Returns
    /// `(transferred, captured)`.
    pub fn beam_down_hostile(&mut self, team_id: i64, n: i64) -> (i64, bool) {
        debug_assert!(self.team_id != -1 && self.team_id != team_id);
        if n > self.armies {
            let transferred = self.armies;
            self.team_id = team_id;
            self.armies = n - self.armies;
            (transferred, true)
        } else {
            self.armies -= n;
            if self.armies == 0 {
                self.team_id = -1;
            }
            (n, false)
        }
    }

    /// Succeeds only when the planet is held by `team_id`. Transfers
    /// `min(n, planet.armies)`.
    pub fn beam_up_armies(&mut self, team_id: i64, n: i64) -> Option<i64> {
        if self.team_id != team_id {
            return None;
        }
        let transferred = n.min(self.armies);
        self.armies -= transferred;
        Some(transferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planet() -> Planet {
        Planet::new(1, "Test".into(), Vector2D::ZERO, PlanetType::Agricultural, 0, 10)
    }

    #[test]
    fn bomb_to_zero_becomes_neutral() {
        let mut p = planet();
        let killed = p.bomb(10);
        assert_eq!(killed, 10);
        assert_eq!(p.team_id, -1);
        assert_eq!(p.armies, 0);
    }

    #[test]
    fn bomb_clamps_to_available_armies() {
        let mut p = planet();
        assert_eq!(p.bomb(100), 10);
        assert_eq!(p.armies, 0);
    }

    #[test]
    fn beam_down_friendly_adds_armies() {
        let mut p = planet();
        assert_eq!(p.beam_down_friendly(0, 5), Some(5));
        assert_eq!(p.armies, 15);
    }

    #[test]
    fn beam_down_friendly_rejects_hostile_team() {
        let mut p = planet();
        assert_eq!(p.beam_down_friendly(1, 5), None);
    }

    #[test]
    fn beam_down_hostile_captures_on_full_takeover() {
        let mut p = planet();
        let (transferred, captured) = p.beam_down_hostile(1, 15);
        assert_eq!(transferred, 10);
        assert!(captured);
        assert_eq!(p.team_id, 1);
        assert_eq!(p.armies, 5);
    }

    #[test]
    fn beam_down_hostile_partial_does_not_capture() {
        let mut p = planet();
        let (transferred, captured) = p.beam_down_hostile(1, 4);
        assert_eq!(transferred, 4);
        assert!(!captured);
        assert_eq!(p.team_id, 0);
        assert_eq!(p.armies, 6);
    }

    #[test]
    fn beam_down_hostile_exact_tie_drains_to_neutral() {
        let mut p = planet();
        let (transferred, captured) = p.beam_down_hostile(1, 10);
        assert_eq!(transferred, 10);
        assert!(!captured);
        assert_eq!(p.team_id, -1);
        assert_eq!(p.armies, 0);
    }

    #[test]
    fn beam_up_requires_ownership() {
        let mut p = planet();
        assert_eq!(p.beam_up_armies(1, 5), None);
        assert_eq!(p.beam_up_armies(0, 5), Some(5));
        assert_eq!(p.armies, 5);
    }

    #[test]
    fn neutral_planets_do_not_grow() {
        let mut p = planet();
        p.team_id = -1;
        p.update(1000.0);
        assert_eq!(p.armies, 10);
    }

    #[test]
    fn owned_planets_grow_deterministically() {
        let mut p = planet();
        p.update(20.0); // 0.05/s * 20s = 1.0 accumulated
        assert_eq!(p.armies, 11);
    }
}
