//! Scalability benchmarks for the horde simulation
//!
//! Measures the per-tick cost of steering, the collision world and a full
//! simulation tick as the enemy population grows.
//!
//! Run with: cargo bench --bench scalability

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use horde_sim::config::SimConfig;
use horde_sim::events::EventBus;
use horde_sim::game::constants::clock::DT;
use horde_sim::game::enemy::{EnemyBlueprint, EnemyType};
use horde_sim::game::population::{PopulationConfig, PopulationManager};
use horde_sim::game::simulation::Simulation;
use horde_sim::game::spatial::{Collider, CollisionWorld, LayerMask, SpatialQuery, Tag};
use horde_sim::game::steering::{Pursuit, PursuitStrategy, SimplePursuit, SteeringSettings};
use horde_sim::game::wave::WavesConfig;
use horde_sim::util::vec2::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const COUNTS: [usize; 5] = [100, 250, 500, 1000, 2000];

fn random_ring_position(rng: &mut StdRng) -> Vec2 {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let radius = rng.gen_range(5.0..40.0);
    Vec2::new(angle.cos() * radius, angle.sin() * radius)
}

/// Obstacle field shared by every benchmark
fn obstacle_world(rng: &mut StdRng) -> CollisionWorld {
    let mut world = CollisionWorld::default();
    for i in 0..40 {
        world.add_static(Collider::new(
            1_000_000 + i,
            random_ring_position(rng),
            rng.gen_range(0.5..2.0),
            LayerMask::OBSTACLES,
            Tag::Obstacle,
        ));
    }
    world
}

/// Population of `count` enemies scattered around the origin
fn create_population(count: usize, enemies_per_tick: usize) -> PopulationManager {
    let mut rng = StdRng::seed_from_u64(count as u64);
    let strategy: Arc<dyn PursuitStrategy> = Arc::new(SteeringSettings::default());
    let config = PopulationConfig {
        initial_pool_size: count,
        enemies_per_tick,
        ..Default::default()
    };

    let mut population = PopulationManager::new(
        &config,
        EnemyBlueprint::roster(Some(strategy)),
        SteeringSettings::default().build(),
        Arc::new(EventBus::new()),
    );
    for i in 0..count {
        let ty = EnemyType::ALL[i % EnemyType::ALL.len()];
        if population.spawn(ty, random_ring_position(&mut rng)).is_err() {
            break;
        }
    }
    population
}

/// Benchmark one steering decision against a populated world
fn bench_steering(c: &mut Criterion) {
    let mut group = c.benchmark_group("steering");
    group.sample_size(50);

    for count in COUNTS {
        let mut rng = StdRng::seed_from_u64(7);
        let population = create_population(count, 5);
        let mut world = obstacle_world(&mut rng);
        world.sync_dynamic(population.colliders());
        let positions: Vec<Vec2> = population.iter().map(|(_, e)| e.position).collect();
        let mut pursuit = SimplePursuit::new(SteeringSettings::default());

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("all_enemies", count), &count, |b, _| {
            b.iter(|| {
                for &position in &positions {
                    black_box(pursuit.calculate_movement(position, Vec2::ZERO, DT, &world));
                }
            })
        });
    }
    group.finish();
}

/// Benchmark the population update with the round-robin budget and with
/// every enemy steered every tick
fn bench_population_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("population_update");
    group.sample_size(50);

    for count in COUNTS {
        let mut rng = StdRng::seed_from_u64(11);
        let world = obstacle_world(&mut rng);

        for (label, budget) in [("round_robin", 5), ("every_enemy", count)] {
            let mut population = create_population(count, budget);

            group.throughput(Throughput::Elements(count as u64));
            group.bench_with_input(BenchmarkId::new(label, count), &count, |b, _| {
                b.iter(|| black_box(population.update(DT, Vec2::ZERO, &world)))
            });
        }
    }
    group.finish();
}

/// Benchmark mirroring the population into the collision grid and querying it
fn bench_collision_world(c: &mut Criterion) {
    let mut group = c.benchmark_group("collision_world");
    group.sample_size(50);

    for count in COUNTS {
        let population = create_population(count, 5);
        let mut world = CollisionWorld::default();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("sync", count), &count, |b, _| {
            b.iter(|| {
                world.sync_dynamic(population.colliders());
                black_box(world.dynamic_count())
            })
        });

        world.sync_dynamic(population.colliders());
        group.bench_with_input(BenchmarkId::new("raycast", count), &count, |b, _| {
            b.iter(|| {
                black_box(world.raycast(Vec2::new(0.0, 20.0), Vec2::new(0.0, -1.0), 20.0, LayerMask::ENEMIES))
            })
        });
    }
    group.finish();
}

/// Benchmark a complete simulation tick with a running wave
fn bench_full_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_tick");
    group.sample_size(30);

    for count in [250, 1000, 2000] {
        let mut config = SimConfig::default();
        config.population.initial_pool_size = count;
        let mut sim = Simulation::new(&config, WavesConfig::builtin());
        let mut rng = StdRng::seed_from_u64(3);
        for i in 0..count {
            let ty = EnemyType::ALL[i % EnemyType::ALL.len()];
            let _ = sim.population_mut().spawn(ty, random_ring_position(&mut rng));
        }
        sim.start();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("complete", count), &count, |b, _| {
            b.iter(|| black_box(sim.tick(DT)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_steering,
    bench_population_update,
    bench_collision_world,
    bench_full_tick,
);

criterion_main!(benches);
