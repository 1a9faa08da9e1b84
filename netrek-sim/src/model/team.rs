//! Team entity (§4.2): owns the `Player` map directly, per spec.md §3's
//! attribute list ("players (mapping from player id to Player)").

use std::collections::HashMap;

use super::player::Player;

#[derive(Debug, Clone)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub score: i64,
    pub ship_count: i64,
    pub planet_count: i64,
    pub players: HashMap<u64, Player>,
}

impl Team {
    pub fn new(id: i64, name: String, color: String) -> Self {
        Team {
            id,
            name,
            color,
            score: 0,
            ship_count: 0,
            planet_count: 0,
            players: HashMap::new(),
        }
    }
}
