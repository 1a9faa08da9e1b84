//! Simulation core (§4.4): the tick loop, collision resolution, beaming,
//! and win conditions. Owns every `Ship`/`Projectile`/`Planet`/`Team`
//! (and, through `Team`, every `Player`) instance; callers outside this
//! crate only ever see an immutable snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use protocol::Vector2D;

use crate::config::SimulationConfig;
use crate::error::SimError;
use crate::events::{Event, EventBus};
use crate::model::{Planet, Player, Projectile, Ship, ShipClass, Team, PLANET_RADIUS};
use crate::spatial::{EntityRef, QuadTree, Rect};

const SPATIAL_CAPACITY: usize = 10;
const MAX_DT: f64 = 0.1;
const PROJECTILE_PLANET_CONTACT: f64 = 10.0;
const PLANET_DOCKING_RANGE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimStatus {
    Waiting,
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamDirection {
    Up,
    Down,
}

/// Pluggable pre-emption of the built-in win conditions (§4.4 "Custom").
pub trait WinConditionStrategy: Send + Sync {
    fn check_winner(&self, teams: &HashMap<i64, Team>, planets: &HashMap<u64, Planet>) -> Option<i64>;
}

/// Wraps a coordinate into `[-size/2, size/2)`, equivalent to repeatedly
/// shifting by `±size` until it lands in range.
fn wrap_coord(v: f64, size: f64) -> f64 {
    let half = size / 2.0;
    (v + half).rem_euclid(size) - half
}

fn wrap_position(p: Vector2D, size: f64) -> Vector2D {
    Vector2D::new(wrap_coord(p.x, size), wrap_coord(p.y, size))
}

pub struct Simulation {
    ships: HashMap<u64, Ship>,
    projectiles: HashMap<u64, Projectile>,
    planets: HashMap<u64, Planet>,
    teams: HashMap<i64, Team>,
    player_index: HashMap<u64, i64>,
    preferred_class: HashMap<u64, ShipClass>,

    tick: u64,
    status: SimStatus,
    elapsed: f64,
    winning_team: Option<i64>,

    world_size: f64,
    friction: f64,
    friendly_fire: bool,
    max_score: i64,
    time_limit: f64,

    spatial: QuadTree,
    events: EventBus,
    custom_win_condition: Option<Arc<dyn WinConditionStrategy>>,

    next_id: u64,
    last_update: Instant,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        let mut teams = HashMap::new();
        for t in &config.teams {
            teams.insert(t.id, Team::new(t.id, t.name.clone(), t.color.clone()));
        }

        let mut planets = HashMap::new();
        let mut next_id = 1;
        for template in &config.planets {
            planets.insert(
                next_id,
                Planet::new(
                    next_id,
                    template.name.clone(),
                    template.position,
                    template.planet_type,
                    template.team_id,
                    template.armies,
                ),
            );
            next_id += 1;
        }
        for planet in planets.values() {
            if planet.team_id >= 0 {
                if let Some(team) = teams.get_mut(&planet.team_id) {
                    team.planet_count += 1;
                }
            }
        }

        let bounds = Rect::centered(Vector2D::ZERO, config.world_size);

        Simulation {
            ships: HashMap::new(),
            projectiles: HashMap::new(),
            planets,
            teams,
            player_index: HashMap::new(),
            preferred_class: HashMap::new(),
            tick: 0,
            status: SimStatus::Waiting,
            elapsed: 0.0,
            winning_team: None,
            world_size: config.world_size,
            friction: config.physics.friction,
            friendly_fire: config.game_rules.friendly_fire,
            max_score: config.game_rules.max_score,
            time_limit: config.game_rules.time_limit,
            spatial: QuadTree::new(bounds, SPATIAL_CAPACITY),
            events: EventBus::new(),
            custom_win_condition: None,
            next_id,
            last_update: Instant::now(),
        }
    }

    pub fn set_win_condition_strategy(&mut self, strategy: Arc<dyn WinConditionStrategy>) {
        self.custom_win_condition = Some(strategy);
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn status(&self) -> SimStatus {
        self.status
    }

    pub fn winning_team(&self) -> Option<i64> {
        self.winning_team
    }

    pub fn ships(&self) -> &HashMap<u64, Ship> {
        &self.ships
    }

    pub fn planets(&self) -> &HashMap<u64, Planet> {
        &self.planets
    }

    pub fn projectiles(&self) -> &HashMap<u64, Projectile> {
        &self.projectiles
    }

    pub fn teams(&self) -> &HashMap<i64, Team> {
        &self.teams
    }

    pub fn ship_position(&self, ship_id: u64) -> Option<Vector2D> {
        self.ships.get(&ship_id).map(|s| s.position)
    }

    /// Team a player is currently on, or `None` if unknown (already removed).
    pub fn player_team_id(&self, player_id: u64) -> Option<i64> {
        self.player_index.get(&player_id).copied()
    }

    /// A player's current ship id, or `None` if unknown or not yet spawned.
    pub fn player_ship_id(&self, player_id: u64) -> Option<u64> {
        let team_id = self.player_index.get(&player_id)?;
        self.teams.get(team_id)?.players.get(&player_id).map(|p| p.ship_id)
    }

    pub fn team_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.teams.keys().copied()
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Transitions Waiting -> Active. A no-op if already Active or Ended.
    pub fn start_game(&mut self) {
        if self.status == SimStatus::Waiting {
            self.status = SimStatus::Active;
            self.last_update = Instant::now();
            self.events.publish(&Event::GameStarted);
            tracing::info!("simulation started");
        }
    }

    /// One discrete simulation step, run under the caller's writer lock.
    pub fn tick(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f64().min(MAX_DT);
        self.last_update = now;

        if self.status == SimStatus::Active {
            self.elapsed += dt;
            if self.time_limit > 0.0 && self.elapsed >= self.time_limit {
                let winner = self.team_with_most_planets_excluding(&[]);
                self.end_game(winner);
            }
        }

        self.check_win_conditions();

        self.spatial.clear();

        for ship in self.ships.values_mut() {
            if !ship.active {
                continue;
            }
            ship.update(dt, self.friction);
            ship.position = wrap_position(ship.position, self.world_size);
        }
        self.resolve_ship_overlaps();

        for projectile in self.projectiles.values_mut() {
            if !projectile.active {
                continue;
            }
            projectile.update(dt);
            projectile.position = wrap_position(projectile.position, self.world_size);
        }

        for planet in self.planets.values_mut() {
            planet.update(dt);
        }

        for (id, ship) in &self.ships {
            if ship.active {
                self.spatial.insert(ship.position, EntityRef::Ship(*id));
            }
        }
        for (id, p) in &self.projectiles {
            if p.active {
                self.spatial.insert(p.position, EntityRef::Projectile(*id));
            }
        }
        for (id, p) in &self.planets {
            self.spatial.insert(p.position, EntityRef::Planet(*id));
        }

        self.process_collisions();

        self.projectiles.retain(|_, p| p.active);

        self.tick += 1;
    }

    fn resolve_ship_overlaps(&mut self) {
        let mut ids: Vec<u64> = self.ships.iter().filter(|(_, s)| s.active).map(|(id, _)| *id).collect();
        ids.sort_unstable();

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (a_id, b_id) = (ids[i], ids[j]);
                let (a_radius, a_pos) = {
                    let a = &self.ships[&a_id];
                    (a.ship_class.stats().collider_radius, a.position)
                };
                let (b_radius, b_pos) = {
                    let b = &self.ships[&b_id];
                    (b.ship_class.stats().collider_radius, b.position)
                };
                let min_sep = a_radius + b_radius;
                let delta = b_pos.sub(a_pos);
                let dist = delta.length();
                if dist < min_sep {
                    let push_dir = if dist > 1e-9 {
                        delta.scale(1.0 / dist)
                    } else {
                        Vector2D::new(1.0, 0.0)
                    };
                    let overlap = min_sep - dist;
                    self.ships.get_mut(&a_id).unwrap().position =
                        a_pos.sub(push_dir.scale(overlap / 2.0));
                    self.ships.get_mut(&b_id).unwrap().position =
                        b_pos.add(push_dir.scale(overlap / 2.0));
                }
            }
        }
    }

    fn credit_kill(&mut self, killer_ship_id: u64, victim_ship_id: u64, victim_team: i64) {
        if let Some(killer_ship) = self.ships.get(&killer_ship_id) {
            let (killer_team, killer_player) = (killer_ship.team_id, killer_ship.player_id);
            if let Some(team) = self.teams.get_mut(&killer_team) {
                if let Some(player) = team.players.get_mut(&killer_player) {
                    player.score += 10;
                    player.kills += 1;
                }
            }
        }
        let victim_player = self.ships.get(&victim_ship_id).map(|s| s.player_id);
        if let Some(victim_player) = victim_player {
            if let Some(team) = self.teams.get_mut(&victim_team) {
                if let Some(player) = team.players.get_mut(&victim_player) {
                    player.deaths += 1;
                }
            }
        }
    }

    fn process_collisions(&mut self) {
        let mut ship_ids: Vec<u64> = self.ships.iter().filter(|(_, s)| s.active).map(|(id, _)| *id).collect();
        ship_ids.sort_unstable();

        for ship_id in ship_ids {
            let Some((ship_pos, ship_radius, ship_team)) = self.ships.get(&ship_id).and_then(|s| {
                s.active.then(|| (s.position, s.ship_class.stats().collider_radius, s.team_id))
            }) else {
                continue;
            };

            let candidates = self.spatial.query(&Rect::centered(ship_pos, ship_radius));
            for candidate in candidates {
                match candidate {
                    EntityRef::Projectile(pid) => {
                        self.resolve_ship_projectile_hit(ship_id, ship_team, pid);
                    }
                    EntityRef::Planet(plid) => {
                        self.resolve_ship_planet_contact(ship_id, ship_pos, ship_radius, plid);
                    }
                    EntityRef::Ship(_) => {}
                }
            }
        }

        self.process_planet_bombing();
    }

    fn resolve_ship_projectile_hit(&mut self, ship_id: u64, ship_team: i64, pid: u64) {
        let Some(ship) = self.ships.get(&ship_id) else { return };
        if !ship.active {
            return;
        }
        let Some(proj) = self.projectiles.get(&pid) else { return };
        if !proj.active {
            return;
        }
        let same_team = proj.team_id == ship_team;
        if same_team && !self.friendly_fire {
            return;
        }
        let hit = ship.get_collider().intersects(&proj.get_collider());
        if !hit {
            return;
        }

        let damage = proj.damage;
        let owner_ship_id = proj.owner_ship_id;
        self.projectiles.get_mut(&pid).unwrap().active = false;
        let destroyed = self.ships.get_mut(&ship_id).unwrap().take_damage(damage);
        self.events.publish(&Event::EntityCollision {
            a: EntityRef::Ship(ship_id),
            b: EntityRef::Projectile(pid),
        });

        if destroyed {
            self.ships.get_mut(&ship_id).unwrap().active = false;
            if let Some(team) = self.teams.get_mut(&ship_team) {
                team.ship_count -= 1;
            }
            self.events.publish(&Event::ShipDestroyed { ship_id, team_id: ship_team });
            self.credit_kill(owner_ship_id, ship_id, ship_team);
        }
    }

    fn resolve_ship_planet_contact(&mut self, ship_id: u64, ship_pos: Vector2D, ship_radius: f64, plid: u64) {
        let Some(planet) = self.planets.get(&plid) else { return };
        let sum_radii = ship_radius + PLANET_RADIUS;
        let dist = ship_pos.distance(planet.position);
        if dist >= sum_radii + PROJECTILE_PLANET_CONTACT {
            return;
        }
        if dist >= sum_radii {
            return;
        }
        let push_dir = if dist > 1e-9 {
            ship_pos.sub(planet.position).scale(1.0 / dist)
        } else {
            Vector2D::new(1.0, 0.0)
        };
        let target = planet.position.add(push_dir.scale(sum_radii));
        if let Some(ship) = self.ships.get_mut(&ship_id) {
            ship.position = target;
            ship.velocity = ship.velocity.scale(0.5);
        }
    }

    fn process_planet_bombing(&mut self) {
        let mut projectile_ids: Vec<u64> = self
            .projectiles
            .iter()
            .filter(|(_, p)| p.active)
            .map(|(id, _)| *id)
            .collect();
        projectile_ids.sort_unstable();

        for pid in projectile_ids {
            let Some(proj) = self.projectiles.get(&pid) else { continue };
            if !proj.active {
                continue;
            }
            let (proj_pos, proj_team, proj_damage, owner_ship_id) =
                (proj.position, proj.team_id, proj.damage, proj.owner_ship_id);

            let candidates = self
                .spatial
                .query(&Rect::centered(proj_pos, PLANET_RADIUS + crate::model::PROJECTILE_RADIUS + PROJECTILE_PLANET_CONTACT));

            for candidate in candidates {
                let EntityRef::Planet(plid) = candidate else { continue };
                let Some(planet) = self.planets.get(&plid) else { continue };
                if planet.team_id == -1 {
                    continue;
                }
                if planet.team_id == proj_team && !self.friendly_fire {
                    continue;
                }
                let sum_radii = PLANET_RADIUS + crate::model::PROJECTILE_RADIUS;
                if proj_pos.distance(planet.position) >= sum_radii {
                    continue;
                }

                self.projectiles.get_mut(&pid).unwrap().active = false;
                let prior_team = planet.team_id;
                let bomb_amount = (proj_damage / 2.0).max(0.0).round() as i64;
                let killed = self.planets.get_mut(&plid).unwrap().bomb(bomb_amount);

                if let Some(ship) = self.ships.get(&owner_ship_id) {
                    let (owner_team, owner_player) = (ship.team_id, ship.player_id);
                    if let Some(team) = self.teams.get_mut(&owner_team) {
                        if let Some(player) = team.players.get_mut(&owner_player) {
                            player.score += killed;
                            player.bombs += 1;
                        }
                    }
                }

                if self.planets[&plid].team_id == -1 {
                    if let Some(team) = self.teams.get_mut(&prior_team) {
                        team.planet_count -= 1;
                    }
                    self.events.publish(&Event::PlanetCaptured {
                        planet_id: plid,
                        new_team: -1,
                        old_team: prior_team,
                    });
                }
                break;
            }
        }
    }

    fn check_win_conditions(&mut self) {
        if self.status != SimStatus::Active {
            return;
        }

        if let Some(custom) = self.custom_win_condition.clone() {
            if let Some(winner) = custom.check_winner(&self.teams, &self.planets) {
                self.end_game(Some(winner));
                return;
            }
        }

        if !self.planets.is_empty() {
            let first_owner = self.planets.values().next().unwrap().team_id;
            if first_owner != -1 && self.planets.values().all(|p| p.team_id == first_owner) {
                self.end_game(Some(first_owner));
                return;
            }
        }

        if let Some((team_id, _)) = self.teams.iter().find(|(_, t)| t.score >= self.max_score) {
            let team_id = *team_id;
            self.end_game(Some(team_id));
            return;
        }

        let eliminated: Vec<i64> = self
            .teams
            .iter()
            .filter(|(_, t)| !t.players.is_empty() && t.ship_count == 0)
            .map(|(id, _)| *id)
            .collect();
        if !eliminated.is_empty() {
            let winner = self.team_with_most_planets_excluding(&eliminated);
            self.end_game(winner);
        }
    }

    fn team_with_most_planets_excluding(&self, excluded: &[i64]) -> Option<i64> {
        let remaining: Vec<(i64, i64)> = self
            .teams
            .iter()
            .filter(|(id, _)| !excluded.contains(id))
            .map(|(id, t)| (*id, t.planet_count))
            .collect();
        if remaining.is_empty() {
            return None;
        }
        let max = remaining.iter().map(|(_, c)| *c).max().unwrap();
        let winners: Vec<i64> = remaining.iter().filter(|(_, c)| *c == max).map(|(id, _)| *id).collect();
        if winners.len() == 1 {
            Some(winners[0])
        } else {
            Some(-1)
        }
    }

    /// Sets status = Ended (idempotent), records the winner, publishes
    /// GameEnded.
    pub fn end_game(&mut self, winner: Option<i64>) {
        if self.status == SimStatus::Ended {
            return;
        }
        self.status = SimStatus::Ended;
        self.winning_team = winner;
        self.events.publish(&Event::GameEnded { winning_team: winner });
        tracing::info!(?winner, tick = self.tick, "simulation ended");
    }

    fn spawn_position_for_team(&self, team_id: i64) -> Vector2D {
        let mut rng = rand::thread_rng();
        let home = self.planets.values().find(|p| p.team_id == team_id);
        match home {
            Some(planet) => {
                let angle = rng.gen_range(0.0..std::f64::consts::TAU);
                let distance = rng.gen_range((PLANET_RADIUS + 100.0)..(PLANET_RADIUS + 200.0));
                planet.position.add(Vector2D::from_angle(angle).scale(distance))
            }
            None => {
                let half = self.world_size / 2.0;
                Vector2D::new(rng.gen_range(-half..half), rng.gen_range(-half..half))
            }
        }
    }

    /// Validates `teamID`, creates a Player and a Scout-class Ship at a
    /// team-homeworld-relative spawn, publishes PlayerJoined/ShipCreated.
    pub fn add_player(&mut self, name: String, team_id: i64) -> Result<u64, SimError> {
        if !self.teams.contains_key(&team_id) {
            return Err(SimError::UnknownTeam(team_id));
        }

        let player_id = self.alloc_id();
        let ship_id = self.alloc_id();
        let spawn = self.spawn_position_for_team(team_id);

        let ship = Ship::new(ship_id, team_id, player_id, ShipClass::Scout, spawn);
        self.ships.insert(ship_id, ship);

        let player = Player::new(player_id, name, team_id, ship_id);
        let team = self.teams.get_mut(&team_id).unwrap();
        team.players.insert(player_id, player);
        team.ship_count += 1;
        self.player_index.insert(player_id, team_id);

        self.events.publish(&Event::PlayerJoined { player_id, team_id });
        self.events.publish(&Event::ShipCreated { ship_id, team_id });

        Ok(player_id)
    }

    /// Marks the player's ship inactive, removes the player from its team,
    /// decrements ship count if the ship was active.
    pub fn remove_player(&mut self, player_id: u64) -> Result<(), SimError> {
        let team_id = *self.player_index.get(&player_id).ok_or(SimError::UnknownPlayer(player_id))?;
        let team = self.teams.get_mut(&team_id).unwrap();
        let player = team.players.remove(&player_id).ok_or(SimError::UnknownPlayer(player_id))?;

        if let Some(ship) = self.ships.get_mut(&player.ship_id) {
            let was_active = ship.active;
            ship.active = false;
            self.events.publish(&Event::ShipDestroyed { ship_id: player.ship_id, team_id });
            if was_active {
                self.teams.get_mut(&team_id).unwrap().ship_count -= 1;
            }
        }

        self.player_index.remove(&player_id);
        self.preferred_class.remove(&player_id);
        self.events.publish(&Event::PlayerLeft { player_id, team_id });
        Ok(())
    }

    /// Creates a replacement ship per the `add_player` spawn rules. Callers
    /// are responsible for respecting `respawnDelay` before invoking.
    pub fn respawn_ship(&mut self, player_id: u64) -> Result<u64, SimError> {
        let team_id = *self.player_index.get(&player_id).ok_or(SimError::UnknownPlayer(player_id))?;
        let old_ship_id = self.teams[&team_id]
            .players
            .get(&player_id)
            .ok_or(SimError::UnknownPlayer(player_id))?
            .ship_id;

        let new_ship_id = self.alloc_id();
        let spawn = self.spawn_position_for_team(team_id);
        let class = self.preferred_class.get(&player_id).copied().unwrap_or(ShipClass::Scout);
        let ship = Ship::new(new_ship_id, team_id, player_id, class, spawn);
        self.ships.insert(new_ship_id, ship);
        self.ships.remove(&old_ship_id);

        let team = self.teams.get_mut(&team_id).unwrap();
        team.players.get_mut(&player_id).unwrap().ship_id = new_ship_id;
        team.ship_count += 1;

        self.events.publish(&Event::ShipCreated { ship_id: new_ship_id, team_id });
        Ok(new_ship_id)
    }

    /// Records the ship class a player wants to fly next; takes effect on
    /// their following [`Simulation::respawn_ship`] call, not the current
    /// ship (answers `RequestShipClass`, §4.6).
    pub fn set_preferred_ship_class(&mut self, player_id: u64, class: ShipClass) {
        self.preferred_class.insert(player_id, class);
    }

    pub fn set_ship_controls(&mut self, ship_id: u64, thrusting: bool, turning_cw: bool, turning_ccw: bool) -> Result<(), SimError> {
        let ship = self.ships.get_mut(&ship_id).ok_or(SimError::UnknownShip(ship_id))?;
        ship.thrusting = thrusting;
        ship.turning_cw = turning_cw;
        ship.turning_ccw = turning_ccw;
        Ok(())
    }

    /// `weapon_idx == -1` means "not firing" and is a no-op. Any other
    /// invalid index is an invariant-violation error; in-range indices
    /// that are on cooldown or out of fuel are silent no-ops (matching
    /// `Ship::fire_weapon`'s contract).
    pub fn fire_weapon(&mut self, ship_id: u64, weapon_idx: i32) -> Result<(), SimError> {
        if weapon_idx == -1 {
            return Ok(());
        }
        if weapon_idx < -1 {
            return Err(SimError::WeaponIndexOutOfRange(weapon_idx));
        }
        let ship = self.ships.get_mut(&ship_id).ok_or(SimError::UnknownShip(ship_id))?;
        if !ship.active {
            return Err(SimError::ShipInactive(ship_id));
        }
        let next_id = self.alloc_id();
        let ship = self.ships.get_mut(&ship_id).unwrap();
        if let Some(projectile) = ship.fire_weapon(weapon_idx as usize, next_id) {
            let pid = projectile.id;
            let owner = projectile.owner_ship_id;
            self.projectiles.insert(pid, projectile);
            self.events.publish(&Event::ProjectileFired { projectile_id: pid, owner_ship_id: owner });
        }
        Ok(())
    }

    /// `BeamArmies` (§4.4): validates range, dispatches to friendly/hostile
    /// planet transfer, credits the capturer and updates planet counts on
    /// a full takeover.
    pub fn beam_armies(&mut self, ship_id: u64, planet_id: u64, direction: BeamDirection, n: i64) -> Result<i64, SimError> {
        let n = n.max(0);
        let (ship_team, ship_pos, ship_radius, ship_armies, ship_capacity, ship_player_id) = {
            let ship = self.ships.get(&ship_id).ok_or(SimError::UnknownShip(ship_id))?;
            if !ship.active {
                return Err(SimError::ShipInactive(ship_id));
            }
            let stats = ship.ship_class.stats();
            (ship.team_id, ship.position, stats.collider_radius, ship.armies, stats.max_armies, ship.player_id)
        };
        let planet_pos = self.planets.get(&planet_id).ok_or(SimError::UnknownPlanet(planet_id))?.position;

        let max_range = ship_radius + PLANET_RADIUS + PLANET_DOCKING_RANGE;
        if ship_pos.distance(planet_pos) > max_range {
            return Err(SimError::OutOfBeamingRange { ship_id, planet_id });
        }

        match direction {
            BeamDirection::Up => {
                let planet_team = self.planets[&planet_id].team_id;
                if planet_team != ship_team {
                    return Err(SimError::PlanetNotOwned {
                        ship_id,
                        ship_team,
                        planet_id,
                        planet_team,
                    });
                }
                let capacity_left = (ship_capacity - ship_armies).max(0);
                let requested = n.min(capacity_left);
                let planet = self.planets.get_mut(&planet_id).unwrap();
                let transferred = planet.beam_up_armies(ship_team, requested).unwrap_or(0);
                self.ships.get_mut(&ship_id).unwrap().armies += transferred;
                Ok(transferred)
            }
            BeamDirection::Down => {
                let requested = n.min(ship_armies);
                let planet_team_before = self.planets[&planet_id].team_id;
                let hostile = planet_team_before != -1 && planet_team_before != ship_team;

                let (transferred, captured) = {
                    let planet = self.planets.get_mut(&planet_id).unwrap();
                    if hostile {
                        planet.beam_down_hostile(ship_team, requested)
                    } else {
                        (planet.beam_down_friendly(ship_team, requested).unwrap_or(0), false)
                    }
                };
                self.ships.get_mut(&ship_id).unwrap().armies -= transferred;

                if captured {
                    if let Some(prior_team) = self.teams.get_mut(&planet_team_before) {
                        prior_team.planet_count -= 1;
                    }
                    if let Some(team) = self.teams.get_mut(&ship_team) {
                        team.planet_count += 1;
                        if let Some(player) = team.players.get_mut(&ship_player_id) {
                            player.score += 50;
                            player.captures += 1;
                        }
                    }
                    self.events.publish(&Event::PlanetCaptured {
                        planet_id,
                        new_team: ship_team,
                        old_team: planet_team_before,
                    });
                }
                Ok(transferred)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> Simulation {
        Simulation::new(SimulationConfig::default())
    }

    #[test]
    fn add_player_rejects_unknown_team() {
        let mut s = sim();
        assert_eq!(s.add_player("X".into(), 99), Err(SimError::UnknownTeam(99)));
    }

    #[test]
    fn add_player_creates_ship_and_updates_team_count() {
        let mut s = sim();
        let player_id = s.add_player("Alice".into(), 0).unwrap();
        assert_eq!(s.teams()[&0].ship_count, 1);
        let ship_id = s.teams()[&0].players[&player_id].ship_id;
        assert!(s.ships()[&ship_id].active);
    }

    #[test]
    fn remove_player_decrements_ship_count_and_marks_inactive() {
        let mut s = sim();
        let player_id = s.add_player("Alice".into(), 0).unwrap();
        let ship_id = s.teams()[&0].players[&player_id].ship_id;
        s.remove_player(player_id).unwrap();
        assert_eq!(s.teams()[&0].ship_count, 0);
        assert!(!s.ships()[&ship_id].active);
        assert!(!s.teams()[&0].players.contains_key(&player_id));
    }

    #[test]
    fn respawn_ship_replaces_ship_and_restores_count() {
        let mut s = sim();
        let player_id = s.add_player("Alice".into(), 0).unwrap();
        let old_ship_id = s.teams()[&0].players[&player_id].ship_id;
        s.ships.get_mut(&old_ship_id).unwrap().active = false;
        s.teams.get_mut(&0).unwrap().ship_count = 0;

        let new_ship_id = s.respawn_ship(player_id).unwrap();
        assert_ne!(new_ship_id, old_ship_id);
        assert!(!s.ships().contains_key(&old_ship_id));
        assert!(s.ships()[&new_ship_id].active);
        assert_eq!(s.teams()[&0].ship_count, 1);
    }

    #[test]
    fn fire_weapon_minus_one_is_a_noop() {
        let mut s = sim();
        let player_id = s.add_player("Alice".into(), 0).unwrap();
        let ship_id = s.teams()[&0].players[&player_id].ship_id;
        s.fire_weapon(ship_id, -1).unwrap();
        assert!(s.projectiles().is_empty());
    }

    #[test]
    fn fire_weapon_creates_projectile_tagged_with_owner_team() {
        let mut s = sim();
        let player_id = s.add_player("Alice".into(), 0).unwrap();
        let ship_id = s.teams()[&0].players[&player_id].ship_id;
        s.fire_weapon(ship_id, 0).unwrap();
        assert_eq!(s.projectiles().len(), 1);
        let proj = s.projectiles().values().next().unwrap();
        assert_eq!(proj.team_id, 0);
        assert_eq!(proj.owner_ship_id, ship_id);
    }

    #[test]
    fn beam_up_requires_planet_ownership() {
        let mut s = sim();
        let player_id = s.add_player("Alice".into(), 1).unwrap();
        let ship_id = s.teams()[&1].players[&player_id].ship_id;
        // Move the ship next to team 0's Earth homeworld (owned by team 0).
        s.ships.get_mut(&ship_id).unwrap().position = Vector2D::new(-5000.0, 0.0);
        let earth_id = *s.planets().iter().find(|(_, p)| p.name == "Earth").unwrap().0;
        let result = s.beam_armies(ship_id, earth_id, BeamDirection::Up, 5);
        assert!(matches!(result, Err(SimError::PlanetNotOwned { .. })));
    }

    #[test]
    fn beam_armies_out_of_range_is_rejected() {
        let mut s = sim();
        let player_id = s.add_player("Alice".into(), 0).unwrap();
        let ship_id = s.teams()[&0].players[&player_id].ship_id;
        s.ships.get_mut(&ship_id).unwrap().position = Vector2D::new(100_000.0, 100_000.0);
        let earth_id = *s.planets().iter().find(|(_, p)| p.name == "Earth").unwrap().0;
        let result = s.beam_armies(ship_id, earth_id, BeamDirection::Up, 5);
        assert!(matches!(result, Err(SimError::OutOfBeamingRange { .. })));
    }

    #[test]
    fn world_wrap_at_exact_boundary() {
        let size = 20000.0;
        assert_eq!(wrap_coord(size / 2.0, size), -size / 2.0);
        assert_eq!(wrap_coord(-size / 2.0, size), -size / 2.0);
        assert_eq!(wrap_coord(size / 2.0 + 1.0, size), -size / 2.0 + 1.0);
    }

    #[test]
    fn end_game_is_idempotent() {
        let mut s = sim();
        s.start_game();
        s.end_game(Some(0));
        assert_eq!(s.winning_team(), Some(0));
        s.end_game(Some(1));
        assert_eq!(s.winning_team(), Some(0));
    }

    #[test]
    fn projectile_kills_ship_within_three_ticks_and_credits_killer() {
        let mut s = sim();
        s.start_game();
        let a_player = s.add_player("A".into(), 0).unwrap();
        let a_ship = s.teams()[&0].players[&a_player].ship_id;
        let b_player = s.add_player("B".into(), 1).unwrap();
        let b_ship = s.teams()[&1].players[&b_player].ship_id;

        s.ships.get_mut(&a_ship).unwrap().position = Vector2D::new(0.0, 0.0);
        s.ships.get_mut(&a_ship).unwrap().shields = 0.0;
        s.ships.get_mut(&a_ship).unwrap().hull = 50.0;
        s.ships.get_mut(&b_ship).unwrap().position = Vector2D::new(-20.0, 0.0);
        s.ships.get_mut(&b_ship).unwrap().rotation = 0.0;

        let proj_id = s.alloc_id();
        let projectile = crate::model::Projectile::new(
            proj_id,
            b_ship,
            1,
            Vector2D::new(-20.0, 0.0),
            Vector2D::new(600.0, 0.0),
            100.0,
            2.0,
        );
        s.projectiles.insert(proj_id, projectile);

        let mut destroyed = false;
        for _ in 0..3 {
            s.tick();
            if !s.ships()[&a_ship].active {
                destroyed = true;
                break;
            }
        }
        assert!(destroyed, "ship A should be destroyed within 3 ticks");
        assert_eq!(s.teams()[&1].players[&b_player].score, 10);
        assert_eq!(s.teams()[&0].players[&a_player].deaths, 1);
    }

    #[test]
    fn friendly_fire_deals_no_damage_when_disabled() {
        let mut s = sim();
        s.start_game();
        let a_player = s.add_player("A".into(), 0).unwrap();
        let a_ship = s.teams()[&0].players[&a_player].ship_id;
        let b_player = s.add_player("B".into(), 0).unwrap();
        let b_ship = s.teams()[&0].players[&b_player].ship_id;

        s.ships.get_mut(&a_ship).unwrap().position = Vector2D::new(0.0, 0.0);
        s.ships.get_mut(&b_ship).unwrap().position = Vector2D::new(-20.0, 0.0);
        s.ships.get_mut(&b_ship).unwrap().rotation = 0.0;

        let proj_id = s.alloc_id();
        let projectile = crate::model::Projectile::new(
            proj_id,
            b_ship,
            0,
            Vector2D::new(-20.0, 0.0),
            Vector2D::new(600.0, 0.0),
            100.0,
            2.0,
        );
        s.projectiles.insert(proj_id, projectile);

        let before_hull = s.ships()[&a_ship].hull;
        for _ in 0..3 {
            s.tick();
        }
        assert_eq!(s.ships()[&a_ship].hull, before_hull);
        assert!(s.ships()[&a_ship].active);
    }
}
