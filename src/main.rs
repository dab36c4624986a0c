use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use horde_sim::config::SimConfig;
use horde_sim::events::{
    AllWavesCompleted, EnemyDeathBatch, GameEnded, PlayerDeath, PlayerHit, PlayerLevelUp, WaveCleared,
    WaveSpawnWindowClosed, WaveStarted,
};
use horde_sim::game::simulation::Simulation;
use horde_sim::game::spatial::{Collider, LayerMask, Tag};
use horde_sim::util::vec2::Vec2;

/// Radius of the circle the scripted player walks
const PATROL_RADIUS: f32 = 12.0;
/// Radians per second along the patrol circle
const PATROL_SPEED: f32 = 0.35;
const OBSTACLE_COUNT: u64 = 24;
/// Keeps obstacle collider ids clear of enemy handles
const OBSTACLE_ID_BASE: u64 = 1 << 32;
const PLAYER_MAX_HEALTH: f32 = 400.0;
/// Damage per second dealt by each enemy touching the player
const CONTACT_DPS: f32 = 2.0;
const CONTACT_RANGE: f32 = 1.2;
const EXPERIENCE_PER_LEVEL: u32 = 100;
/// Ticks between two progress lines
const PROGRESS_INTERVAL: u64 = 500;

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Horde Sim v{}", env!("CARGO_PKG_VERSION"));

    let config = SimConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: pool={}, per_tick={}, tick_rate={}, seed={:#x}",
        config.population.initial_pool_size,
        config.population.enemies_per_tick,
        config.run.tick_rate,
        config.run.seed
    );

    let waves = config.load_waves().context("failed to load wave configuration")?;
    waves.validate().context("invalid wave configuration")?;
    info!("{} waves, {:.1}s of spawn windows", waves.waves.len(), waves.total_time());

    let mut sim = Simulation::new(&config, waves);
    scatter_obstacles(&mut sim, config.run.seed);
    let experience = subscribe_logging(&sim);

    let dt = config.run.dt();
    let started = Instant::now();
    let mut player_health = PLAYER_MAX_HEALTH;
    let mut level = 1;
    let mut attack_timer = 0.0;
    let mut elapsed = 0.0;
    let mut ticks = 0;

    sim.start();

    while !sim.is_finished() && ticks < config.run.max_ticks {
        elapsed += dt;
        let angle = elapsed * PATROL_SPEED;
        let position = Vec2::from_angle(angle) * PATROL_RADIUS;
        let forward = Vec2::from_angle(angle).perpendicular();
        sim.set_player(position, forward);

        attack_timer += dt;
        if attack_timer >= config.run.attack_interval {
            attack_timer = 0.0;
            let hit = sim.damage_in_radius(position, config.run.attack_radius, config.run.attack_damage);
            if hit > 0 {
                debug!("Area attack hit {} enemies", hit);
            }
        }

        let summary = sim.tick(dt);
        ticks += 1;

        let touching = sim
            .population()
            .iter()
            .filter(|(_, e)| !e.is_dying() && e.position.distance_to(position) <= CONTACT_RANGE)
            .count();
        if touching > 0 {
            let damage = touching as f32 * CONTACT_DPS * dt;
            player_health -= damage;
            sim.bus().publish(PlayerHit { damage });
            if player_health <= 0.0 {
                sim.bus().publish(PlayerDeath);
                break;
            }
        }

        let earned_level = 1 + experience.load(Ordering::Relaxed) / EXPERIENCE_PER_LEVEL;
        while level < earned_level {
            level += 1;
            sim.bus().publish(PlayerLevelUp { level });
        }

        if ticks % PROGRESS_INTERVAL == 0 {
            info!(
                "tick {} | phase={} wave={} | active={} steered={} | hp={:.0} level={}",
                ticks,
                summary.phase.as_str(),
                sim.director().wave_index(),
                sim.population().active_count(),
                summary.population.steered,
                player_health,
                level
            );
        }
    }

    if !sim.is_finished() && player_health > 0.0 {
        warn!("Stopped after {} ticks with waves remaining", ticks);
    }

    let snapshot = sim.metrics().snapshot();
    info!(
        "Run finished: {} ticks in {:.2}s, spawned={} killed={} xp={} level={}",
        ticks,
        started.elapsed().as_secs_f32(),
        snapshot.enemies_spawned,
        snapshot.enemies_killed,
        snapshot.experience_awarded,
        level
    );
    info!("Metrics:\n{}", sim.metrics().render());

    Ok(())
}

/// Place static obstacles between the spawn ring and the patrol path
fn scatter_obstacles(sim: &mut Simulation, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed ^ 0x0B57_AC1E);
    let world = sim.world_mut();
    for id in 0..OBSTACLE_COUNT {
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = rng.gen_range(4.0..30.0);
        world.add_static(Collider::new(
            OBSTACLE_ID_BASE + id,
            Vec2::from_angle(angle) * distance,
            rng.gen_range(0.5..1.5),
            LayerMask::OBSTACLES,
            Tag::Obstacle,
        ));
    }
    info!("{} obstacles placed", OBSTACLE_COUNT);
}

/// Log every published event; returns the running experience total
fn subscribe_logging(sim: &Simulation) -> Arc<AtomicU32> {
    let bus = sim.bus();
    let experience = Arc::new(AtomicU32::new(0));

    let total = Arc::clone(&experience);
    bus.subscribe(move |e: &EnemyDeathBatch| {
        total.fetch_add(e.total_experience, Ordering::Relaxed);
        debug!("{} enemies died (+{} xp)", e.total_kills, e.total_experience);
    });
    bus.subscribe(|e: &WaveStarted| info!("Wave {} started", e.wave_index + 1));
    bus.subscribe(|e: &WaveSpawnWindowClosed| {
        info!("Wave {} spawn window closed after {} spawns", e.wave_index + 1, e.spawned)
    });
    bus.subscribe(|e: &WaveCleared| info!("Wave {} cleared", e.wave_index + 1));
    bus.subscribe(|e: &AllWavesCompleted| info!("All {} waves completed", e.waves));
    bus.subscribe(|e: &PlayerLevelUp| info!("Player reached level {}", e.level));
    bus.subscribe(|_: &PlayerDeath| warn!("Player died"));
    bus.subscribe(|_: &GameEnded| info!("Game ended"));

    experience
}
