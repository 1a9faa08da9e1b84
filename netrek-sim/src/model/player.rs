//! Player entity (§4.2): the account-less per-connection identity tracked
//! by the simulation, distinct from the transport-level client session
//! tracked by the dispatcher.

#[derive(Debug, Clone)]
pub struct Player {
    pub id: u64,
    pub name: String,
    pub team_id: i64,
    pub ship_id: u64,
    pub connected: bool,
    pub score: i64,
    pub kills: i64,
    pub deaths: i64,
    pub bombs: i64,
    pub captures: i64,
}

impl Player {
    pub fn new(id: u64, name: String, team_id: i64, ship_id: u64) -> Self {
        Player {
            id,
            name,
            team_id,
            ship_id,
            connected: true,
            score: 0,
            kills: 0,
            deaths: 0,
            bombs: 0,
            captures: 0,
        }
    }
}
