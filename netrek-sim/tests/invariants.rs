//! Universal invariant property tests (spec §8).

use proptest::prelude::*;

use netrek_sim::{SimulationConfig, Simulation};

fn true_active_ship_count(sim: &Simulation, team_id: i64) -> i64 {
    sim.teams()[&team_id]
        .players
        .values()
        .filter(|p| sim.ships().get(&p.ship_id).is_some_and(|s| s.active))
        .count() as i64
}

#[derive(Debug, Clone)]
enum Op {
    Add,
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Add),
        1 => (0usize..8).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn team_ship_count_matches_true_active_count(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut sim = Simulation::new(SimulationConfig::default());
        let mut live_players: Vec<u64> = Vec::new();

        for op in ops {
            match op {
                Op::Add => {
                    let team = (live_players.len() % 2) as i64;
                    if let Ok(id) = sim.add_player("P".to_string(), team) {
                        live_players.push(id);
                    }
                }
                Op::Remove(idx) => {
                    if !live_players.is_empty() {
                        let idx = idx % live_players.len();
                        let player_id = live_players.remove(idx);
                        sim.remove_player(player_id).unwrap();
                    }
                }
            }

            for team_id in [0i64, 1i64] {
                prop_assert_eq!(sim.teams()[&team_id].ship_count, true_active_ship_count(&sim, team_id));
            }
        }
    }

    #[test]
    fn no_two_ships_overlap_after_a_tick(n_ships in 2usize..8, ticks in 1usize..5) {
        let mut sim = Simulation::new(SimulationConfig::default());
        sim.start_game();
        for i in 0..n_ships {
            sim.add_player(format!("P{i}"), (i % 2) as i64).unwrap();
        }
        for _ in 0..ticks {
            sim.tick();
        }

        let positions: Vec<(f64, f64, f64)> = sim
            .ships()
            .values()
            .filter(|s| s.active)
            .map(|s| (s.position.x, s.position.y, s.ship_class.stats().collider_radius))
            .collect();

        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let (ax, ay, ar) = positions[i];
                let (bx, by, br) = positions[j];
                let dist = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();
                prop_assert!(dist >= ar + br - 1e-6);
            }
        }
    }
}

#[test]
fn projectile_team_matches_owner_team_at_fire_time() {
    let mut sim = Simulation::new(SimulationConfig::default());
    let player_id = sim.add_player("A".into(), 1).unwrap();
    let ship_id = sim.teams()[&1].players[&player_id].ship_id;
    sim.fire_weapon(ship_id, 0).unwrap();
    let projectile = sim.projectiles().values().next().unwrap();
    assert_eq!(projectile.team_id, 1);
}

