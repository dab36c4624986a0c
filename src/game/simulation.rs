//! Composition root
//!
//! Owns the event bus, the enemy population, the wave director and the
//! collision world, and advances them once per external tick:
//! mirror colliders → director → population.

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use smallvec::SmallVec;

use crate::config::SimConfig;
use crate::events::{EventBus, GameEnded, GameStarted};
use crate::game::enemy::{DamageOutcome, EnemyBlueprint};
use crate::game::pool::PoolHandle;
use crate::game::population::{PopulationManager, UpdateReport};
use crate::game::spatial::{Collider, CollisionWorld, LayerMask, Tag};
use crate::game::spawn::{Anchor, CircleSpawn};
use crate::game::steering::PursuitStrategy;
use crate::game::wave::{DirectorReport, WaveDirector, WavePhase, WavesConfig};
use crate::metrics::SimMetrics;
use crate::util::vec2::Vec2;

/// Collider id reserved for the player
const PLAYER_COLLIDER_ID: u64 = u64::MAX;

/// Pursued target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Player {
    pub position: Vec2,
    pub forward: Vec2,
    pub radius: f32,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            forward: Vec2::FORWARD,
            radius: 0.5,
        }
    }
}

impl Player {
    fn collider(&self) -> Collider {
        Collider::new(PLAYER_COLLIDER_ID, self.position, self.radius, LayerMask::PLAYER, Tag::Player)
    }

    fn anchor(&self) -> Anchor {
        Anchor::new(self.position, self.forward)
    }
}

/// What one simulation tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickSummary {
    pub director: DirectorReport,
    pub population: UpdateReport,
    pub phase: WavePhase,
}

pub struct Simulation {
    bus: Arc<EventBus>,
    population: PopulationManager,
    director: WaveDirector<CircleSpawn, StdRng>,
    world: CollisionWorld,
    player: Player,
    metrics: Arc<SimMetrics>,
    ended: bool,
}

impl Simulation {
    /// Build a simulation with the stock enemy roster
    pub fn new(config: &SimConfig, waves: WavesConfig) -> Self {
        let strategy: Arc<dyn PursuitStrategy> = Arc::new(config.steering.clone());
        Self::with_blueprints(config, waves, EnemyBlueprint::roster(Some(strategy)))
    }

    pub fn with_blueprints(config: &SimConfig, waves: WavesConfig, blueprints: Vec<EnemyBlueprint>) -> Self {
        let bus = Arc::new(EventBus::new());

        let population = PopulationManager::new(
            &config.population,
            blueprints,
            config.steering.build(),
            Arc::clone(&bus),
        );

        let director = WaveDirector::new(
            config.director.clone(),
            waves,
            CircleSpawn::new(config.spawn.clone()),
            StdRng::seed_from_u64(config.run.seed),
            Arc::clone(&bus),
        );

        Self {
            bus,
            population,
            director,
            world: CollisionWorld::default(),
            player: Player::default(),
            metrics: Arc::new(SimMetrics::new()),
            ended: false,
        }
    }

    /// Begin the first wave
    pub fn start(&mut self) {
        self.bus.publish(GameStarted);
        self.director.start();
        self.metrics.set_wave(self.director.wave_index(), self.director.phase());
    }

    pub fn tick(&mut self, dt: f32) -> TickSummary {
        let started = Instant::now();

        self.world
            .sync_dynamic(self.population.colliders().chain(std::iter::once(self.player.collider())));

        let director = self.director.tick(dt, &mut self.population, self.player.anchor());
        let population = self.population.update(dt, self.player.position, &self.world);

        if self.director.is_finished() && !self.ended {
            self.ended = true;
            self.bus.publish(GameEnded);
        }

        self.metrics.record_spawns(director.spawned, director.failed);
        self.metrics.record_kills(population.kills, population.experience);
        self.metrics.set_population(
            self.population.active_count(),
            self.population.pool().capacity(),
            population.steered,
        );
        self.metrics.set_wave(self.director.wave_index(), self.director.phase());
        self.metrics.record_tick_time(started.elapsed());

        TickSummary {
            director,
            population,
            phase: self.director.phase(),
        }
    }

    /// Damage every live enemy within `radius` of `center`, pushing survivors
    /// away from it. Returns the number of enemies hit.
    pub fn damage_in_radius(&mut self, center: Vec2, radius: f32, amount: f32) -> usize {
        let radius_sq = radius * radius;
        let targets: SmallVec<[PoolHandle; 32]> = self
            .population
            .iter()
            .filter(|(_, e)| !e.is_dying() && e.position.distance_sq_to(center) <= radius_sq)
            .map(|(handle, _)| handle)
            .collect();

        targets
            .into_iter()
            .filter(|&handle| {
                self.population.apply_damage(handle, amount, Some(center)) != DamageOutcome::Ignored
            })
            .count()
    }

    pub fn set_player(&mut self, position: Vec2, forward: Vec2) {
        self.player.position = position;
        if forward.normalize() != Vec2::ZERO {
            self.player.forward = forward.normalize();
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn metrics(&self) -> &Arc<SimMetrics> {
        &self.metrics
    }

    pub fn population(&self) -> &PopulationManager {
        &self.population
    }

    pub fn population_mut(&mut self) -> &mut PopulationManager {
        &mut self.population
    }

    pub fn director(&self) -> &WaveDirector<CircleSpawn, StdRng> {
        &self.director
    }

    /// Static obstacles live here
    pub fn world_mut(&mut self) -> &mut CollisionWorld {
        &mut self.world
    }

    pub fn is_finished(&self) -> bool {
        self.director.is_finished()
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("population", &self.population)
            .field("director", &self.director)
            .field("player", &self.player)
            .finish()
    }
}
