//! Ship class stat table. spec.md treats `class.TurnRate`/`class.Acceleration`/
//! `class.MaxSpeed`/"class max armies" as fields of an opaque table; we give
//! it a concrete closed enum so §6's `RequestShipClass` has something to
//! answer with and the armies-bound invariant has a number to check against.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipClass {
    Scout,
    Destroyer,
    Cruiser,
    Battleship,
}

impl ShipClass {
    pub const ALL: [ShipClass; 4] = [
        ShipClass::Scout,
        ShipClass::Destroyer,
        ShipClass::Cruiser,
        ShipClass::Battleship,
    ];

    pub fn from_index(i: i32) -> Option<ShipClass> {
        Self::ALL.get(usize::try_from(i).ok()?).copied()
    }

    pub fn index(self) -> i32 {
        Self::ALL.iter().position(|c| *c == self).unwrap() as i32
    }

    pub const fn stats(self) -> ShipClassStats {
        match self {
            ShipClass::Scout => ShipClassStats {
                turn_rate: 3.0,
                acceleration: 120.0,
                max_speed: 400.0,
                max_hull: 60.0,
                max_shields: 40.0,
                max_fuel: 100.0,
                max_armies: 2,
                collider_radius: 15.0,
                weapons: &[WeaponSpec {
                    cooldown: 0.3,
                    damage: 8.0,
                    muzzle_speed: 600.0,
                    ttl: 2.0,
                }],
            },
            ShipClass::Destroyer => ShipClassStats {
                turn_rate: 2.4,
                acceleration: 95.0,
                max_speed: 320.0,
                max_hull: 100.0,
                max_shields: 60.0,
                max_fuel: 120.0,
                max_armies: 4,
                collider_radius: 20.0,
                weapons: &[
                    WeaponSpec {
                        cooldown: 0.5,
                        damage: 15.0,
                        muzzle_speed: 550.0,
                        ttl: 2.5,
                    },
                    WeaponSpec {
                        cooldown: 4.0,
                        damage: 40.0,
                        muzzle_speed: 400.0,
                        ttl: 4.0,
                    },
                ],
            },
            ShipClass::Cruiser => ShipClassStats {
                turn_rate: 1.8,
                acceleration: 75.0,
                max_speed: 260.0,
                max_hull: 160.0,
                max_shields: 100.0,
                max_fuel: 150.0,
                max_armies: 6,
                collider_radius: 26.0,
                weapons: &[
                    WeaponSpec {
                        cooldown: 0.6,
                        damage: 20.0,
                        muzzle_speed: 520.0,
                        ttl: 2.5,
                    },
                    WeaponSpec {
                        cooldown: 5.0,
                        damage: 60.0,
                        muzzle_speed: 380.0,
                        ttl: 4.5,
                    },
                ],
            },
            ShipClass::Battleship => ShipClassStats {
                turn_rate: 1.2,
                acceleration: 55.0,
                max_speed: 200.0,
                max_hull: 260.0,
                max_shields: 160.0,
                max_fuel: 200.0,
                max_armies: 10,
                collider_radius: 34.0,
                weapons: &[
                    WeaponSpec {
                        cooldown: 0.8,
                        damage: 25.0,
                        muzzle_speed: 480.0,
                        ttl: 3.0,
                    },
                    WeaponSpec {
                        cooldown: 6.0,
                        damage: 90.0,
                        muzzle_speed: 350.0,
                        ttl: 5.0,
                    },
                ],
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WeaponSpec {
    pub cooldown: f64,
    pub damage: f64,
    pub muzzle_speed: f64,
    pub ttl: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ShipClassStats {
    pub turn_rate: f64,
    pub acceleration: f64,
    pub max_speed: f64,
    pub max_hull: f64,
    pub max_shields: f64,
    pub max_fuel: f64,
    pub max_armies: i64,
    pub collider_radius: f64,
    pub weapons: &'static [WeaponSpec],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_index_round_trips() {
        for class in ShipClass::ALL {
            assert_eq!(ShipClass::from_index(class.index()), Some(class));
        }
        assert_eq!(ShipClass::from_index(-1), None);
        assert_eq!(ShipClass::from_index(99), None);
    }
}
