//! Wave director
//!
//! Sequences an ordered list of waves. Each wave waits its pre-delay, then
//! opens a spawn window in which every spawn group is evaluated on a fixed
//! cadence and emits enemies with a probability read from its curve. Once the
//! window has closed the director waits for the population to be wiped out,
//! waits the wave's cooldown and moves on to the next wave.
//!
//! Phases: `Idle → PreDelay → Active → Draining → Cooldown → (PreDelay | Finished)`.
//! At most one phase transition happens per tick.

use std::path::Path;
use std::sync::Arc;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::events::{AllWavesCompleted, EventBus, WaveCleared, WaveSpawnWindowClosed, WaveStarted};
use crate::game::constants::wave;
use crate::game::curve::{Curve, Keyframe};
use crate::game::enemy::EnemyType;
use crate::game::population::Population;
use crate::game::spawn::{Anchor, SpawnPositionGenerator};

/// Slack on evaluation-interval comparisons so accumulated `dt` rounding
/// does not skip a tick
const INTERVAL_EPSILON: f32 = 1e-5;

fn default_max_count() -> u32 {
    10
}

fn default_spawn_delay() -> f32 {
    0.1
}

fn default_curve() -> Curve {
    Curve::constant(1.0)
}

fn default_pre_delay() -> f32 {
    wave::DEFAULT_PRE_DELAY
}

fn default_max_enemies() -> usize {
    wave::DEFAULT_MAX_ENEMIES
}

/// One enemy stream inside a wave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnGroup {
    pub enemy_type: EnemyType,
    /// Spawns emitted before the group goes quiet
    #[serde(default = "default_max_count")]
    pub max_count: u32,
    /// Minimum seconds between two spawns of this group
    #[serde(default = "default_spawn_delay")]
    pub spawn_delay: f32,
    /// Spawn probability over normalized wave time
    #[serde(default = "default_curve")]
    pub spawn_over_time: Curve,
}

impl SpawnGroup {
    pub fn new(enemy_type: EnemyType, max_count: u32, spawn_delay: f32, spawn_over_time: Curve) -> Self {
        Self {
            enemy_type,
            max_count,
            spawn_delay,
            spawn_over_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveSetup {
    pub groups: Vec<SpawnGroup>,
    /// Seconds waited after the wave is cleared
    #[serde(default)]
    pub cooldown: f32,
    /// Seconds waited before the spawn window opens
    #[serde(default = "default_pre_delay")]
    pub pre_delay: f32,
    /// Concurrent population cap while this wave spawns
    #[serde(default = "default_max_enemies")]
    pub max_enemies: usize,
    /// Length of the timed spawn window in seconds
    pub total_time: f32,
}

impl WaveSetup {
    /// Sum of every group's `max_count`
    pub fn expected_enemies(&self) -> u32 {
        self.groups.iter().map(|g| g.max_count).sum()
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let invalid = |what: &str| ConfigError::Invalid(format!("wave {}: {}", index, what));

        if !self.total_time.is_finite() || self.total_time < 0.0 {
            return Err(invalid("total_time must be a non-negative number"));
        }
        if !self.pre_delay.is_finite() || self.pre_delay < 0.0 {
            return Err(invalid("pre_delay must be a non-negative number"));
        }
        if !self.cooldown.is_finite() || self.cooldown < 0.0 {
            return Err(invalid("cooldown must be a non-negative number"));
        }
        if self.max_enemies == 0 {
            return Err(invalid("max_enemies must be at least 1"));
        }
        for (g, group) in self.groups.iter().enumerate() {
            if !group.spawn_delay.is_finite() || group.spawn_delay < 0.0 {
                return Err(invalid(&format!("group {} spawn_delay must be non-negative", g)));
            }
        }
        Ok(())
    }
}

/// Ordered wave list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WavesConfig {
    pub waves: Vec<WaveSetup>,
}

impl WavesConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: WavesConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.waves
            .iter()
            .enumerate()
            .try_for_each(|(i, wave)| wave.validate(i))
    }

    /// Sum of every wave's spawn window
    pub fn total_time(&self) -> f32 {
        self.waves.iter().map(|w| w.total_time).sum()
    }

    /// Wave list used when no file is configured
    pub fn builtin() -> Self {
        let ramp = |start, end| Curve::linear(start, end);
        let burst = Curve::new([
            Keyframe::new(0.0, 0.0),
            Keyframe::new(0.6, 0.0),
            Keyframe::new(0.7, 1.0),
            Keyframe::new(1.0, 0.4),
        ]);

        Self {
            waves: vec![
                WaveSetup {
                    groups: vec![SpawnGroup::new(EnemyType::Skeleton, 20, 0.5, ramp(0.4, 1.0))],
                    cooldown: 3.0,
                    pre_delay: 2.0,
                    max_enemies: 30,
                    total_time: 15.0,
                },
                WaveSetup {
                    groups: vec![
                        SpawnGroup::new(EnemyType::Skeleton, 25, 0.4, Curve::constant(0.8)),
                        SpawnGroup::new(EnemyType::Bat, 15, 0.3, ramp(0.0, 1.0)),
                    ],
                    cooldown: 5.0,
                    pre_delay: wave::DEFAULT_PRE_DELAY,
                    max_enemies: wave::DEFAULT_MAX_ENEMIES,
                    total_time: 25.0,
                },
                WaveSetup {
                    groups: vec![
                        SpawnGroup::new(EnemyType::Zombie, 30, 0.3, ramp(0.5, 1.0)),
                        SpawnGroup::new(EnemyType::Bat, 20, 0.2, Curve::constant(0.6)),
                        SpawnGroup::new(EnemyType::Brute, 3, 2.0, burst),
                    ],
                    cooldown: 0.0,
                    pre_delay: wave::DEFAULT_PRE_DELAY,
                    max_enemies: 80,
                    total_time: 40.0,
                },
            ],
        }
    }
}

/// Per-group bookkeeping while a spawn window is open
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnGroupTracker {
    /// Index of the group in the current wave
    group: usize,
    spawned: u32,
    next_spawn_time: f32,
    is_active: bool,
}

impl SpawnGroupTracker {
    pub fn new(group: usize, now: f32) -> Self {
        Self {
            group,
            spawned: 0,
            next_spawn_time: now,
            is_active: true,
        }
    }

    pub fn group(&self) -> usize {
        self.group
    }

    pub fn spawned_count(&self) -> u32 {
        self.spawned
    }

    pub fn next_spawn_time(&self) -> f32 {
        self.next_spawn_time
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    fn increment_spawn(&mut self) {
        self.spawned += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WavePhase {
    #[default]
    Idle,
    PreDelay,
    Active,
    Draining,
    Cooldown,
    Finished,
}

impl WavePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WavePhase::Idle => "idle",
            WavePhase::PreDelay => "pre_delay",
            WavePhase::Active => "active",
            WavePhase::Draining => "draining",
            WavePhase::Cooldown => "cooldown",
            WavePhase::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    /// Seconds between spawn-group evaluations; 0 evaluates every tick
    pub evaluation_interval: f32,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            evaluation_interval: wave::EVALUATION_INTERVAL,
        }
    }
}

/// What one director tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectorReport {
    pub spawned: usize,
    /// Spawn attempts the population rejected
    pub failed: usize,
}

pub struct WaveDirector<S, R> {
    config: DirectorConfig,
    waves: Vec<WaveSetup>,
    spawner: S,
    rng: R,
    bus: Arc<EventBus>,
    phase: WavePhase,
    wave_index: usize,
    /// Seconds since the director was created
    now: f32,
    /// Seconds spent in the current phase
    phase_elapsed: f32,
    since_evaluation: f32,
    trackers: Vec<SpawnGroupTracker>,
    active_trackers: usize,
    spawned_in_wave: usize,
}

impl<S: SpawnPositionGenerator, R: RngCore> WaveDirector<S, R> {
    pub fn new(config: DirectorConfig, waves: WavesConfig, spawner: S, rng: R, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            waves: waves.waves,
            spawner,
            rng,
            bus,
            phase: WavePhase::Idle,
            wave_index: 0,
            now: 0.0,
            phase_elapsed: 0.0,
            since_evaluation: 0.0,
            trackers: Vec::new(),
            active_trackers: 0,
            spawned_in_wave: 0,
        }
    }

    /// Leave `Idle`. An empty wave list finishes immediately.
    pub fn start(&mut self) {
        if self.phase != WavePhase::Idle {
            tracing::warn!(phase = ?self.phase, "Director already started");
            return;
        }

        if self.waves.is_empty() {
            tracing::warn!("No waves configured");
            self.finish();
            return;
        }

        self.wave_index = 0;
        self.enter_pre_delay();
    }

    /// Advance timers by `dt` and run the current phase
    pub fn tick<P: Population + ?Sized>(&mut self, dt: f32, population: &mut P, anchor: Anchor) -> DirectorReport {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut report = DirectorReport::default();
        self.now += dt;

        match self.phase {
            WavePhase::Idle | WavePhase::Finished => {}
            WavePhase::PreDelay => {
                self.phase_elapsed += dt;
                let pre_delay = self.waves[self.wave_index].pre_delay;
                if self.phase_elapsed >= pre_delay {
                    self.enter_active(population, anchor, &mut report);
                }
            }
            WavePhase::Active => {
                self.phase_elapsed += dt;
                self.since_evaluation += dt;
                if self.window_closed() {
                    self.enter_draining();
                } else if self.since_evaluation + INTERVAL_EPSILON >= self.config.evaluation_interval {
                    self.since_evaluation = 0.0;
                    self.evaluate(population, anchor, &mut report);
                }
            }
            WavePhase::Draining => {
                if population.active_count() == 0 {
                    self.enter_cooldown();
                }
            }
            WavePhase::Cooldown => {
                self.phase_elapsed += dt;
                if self.phase_elapsed >= self.waves[self.wave_index].cooldown {
                    self.advance_wave();
                }
            }
        }

        report
    }

    fn enter_pre_delay(&mut self) {
        let wave = &self.waves[self.wave_index];
        tracing::info!(
            wave = self.wave_index + 1,
            pre_delay = wave.pre_delay,
            expected_enemies = wave.expected_enemies(),
            "Waiting before wave spawn"
        );
        self.phase = WavePhase::PreDelay;
        self.phase_elapsed = 0.0;
    }

    fn enter_active<P: Population + ?Sized>(&mut self, population: &mut P, anchor: Anchor, report: &mut DirectorReport) {
        let groups = self.waves[self.wave_index].groups.len();
        let now = self.now;

        self.trackers.clear();
        self.trackers.extend((0..groups).map(|g| SpawnGroupTracker::new(g, now)));
        self.active_trackers = groups;
        self.spawned_in_wave = 0;
        self.phase = WavePhase::Active;
        self.phase_elapsed = 0.0;
        self.since_evaluation = 0.0;

        tracing::info!(wave = self.wave_index + 1, groups, "Wave spawn started");
        self.bus.publish(WaveStarted {
            wave_index: self.wave_index,
        });

        self.evaluate(population, anchor, report);
    }

    /// Timed window expired and every group went quiet
    fn window_closed(&self) -> bool {
        self.phase_elapsed >= self.waves[self.wave_index].total_time && self.active_trackers == 0
    }

    /// One pass over the trackers
    fn evaluate<P: Population + ?Sized>(&mut self, population: &mut P, anchor: Anchor, report: &mut DirectorReport) {
        let wave = &self.waves[self.wave_index];
        let elapsed = self.phase_elapsed;
        let normalized = if wave.total_time > 0.0 {
            elapsed / wave.total_time
        } else {
            1.0
        };
        let expired = elapsed >= wave.total_time;

        for tracker in self.trackers.iter_mut() {
            if !tracker.is_active {
                continue;
            }
            if population.active_count() >= wave.max_enemies {
                continue;
            }

            let group = &wave.groups[tracker.group];
            if tracker.spawned >= group.max_count {
                tracker.is_active = false;
                self.active_trackers -= 1;
                continue;
            }

            let probability = group.spawn_over_time.evaluate(normalized);
            if expired && probability <= 0.0 {
                tracing::debug!(group = tracker.group, "Curve is zero after the window, group stopped");
                tracker.is_active = false;
                self.active_trackers -= 1;
                continue;
            }

            if self.now < tracker.next_spawn_time {
                continue;
            }

            let roll: f32 = self.rng.gen();
            if roll > probability {
                continue;
            }

            let position = self.spawner.spawn_position(anchor, &mut self.rng);
            match population.spawn(group.enemy_type, position) {
                Ok(_) => {
                    report.spawned += 1;
                    self.spawned_in_wave += 1;
                }
                Err(e) => {
                    tracing::warn!(enemy_type = %group.enemy_type, "Spawn failed: {}", e);
                    report.failed += 1;
                }
            }
            tracker.increment_spawn();
            tracker.next_spawn_time = self.now + group.spawn_delay;
        }
    }

    fn enter_draining(&mut self) {
        self.trackers.clear();
        self.phase = WavePhase::Draining;
        self.phase_elapsed = 0.0;

        tracing::info!(
            wave = self.wave_index + 1,
            spawned = self.spawned_in_wave,
            "Spawn window closed, awaiting elimination"
        );
        self.bus.publish(WaveSpawnWindowClosed {
            wave_index: self.wave_index,
            spawned: self.spawned_in_wave,
        });
    }

    fn enter_cooldown(&mut self) {
        self.phase = WavePhase::Cooldown;
        self.phase_elapsed = 0.0;

        tracing::info!(wave = self.wave_index + 1, "Wave cleared");
        self.bus.publish(WaveCleared {
            wave_index: self.wave_index,
        });
    }

    fn advance_wave(&mut self) {
        self.wave_index += 1;
        if self.wave_index >= self.waves.len() {
            self.finish();
        } else {
            self.enter_pre_delay();
        }
    }

    fn finish(&mut self) {
        self.phase = WavePhase::Finished;
        self.phase_elapsed = 0.0;
        self.trackers.clear();
        self.active_trackers = 0;

        tracing::info!(waves = self.waves.len(), "All waves completed");
        self.bus.publish(AllWavesCompleted {
            waves: self.waves.len(),
        });
    }

    #[inline]
    pub fn phase(&self) -> WavePhase {
        self.phase
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.phase == WavePhase::Finished
    }

    /// Zero-based index of the current wave
    #[inline]
    pub fn wave_index(&self) -> usize {
        self.wave_index
    }

    pub fn current_wave(&self) -> Option<&WaveSetup> {
        match self.phase {
            WavePhase::Idle | WavePhase::Finished => None,
            _ => self.waves.get(self.wave_index),
        }
    }

    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    pub fn trackers(&self) -> &[SpawnGroupTracker] {
        &self.trackers
    }

    pub fn active_tracker_count(&self) -> usize {
        self.active_trackers
    }

    /// Seconds spent in the current phase
    pub fn phase_elapsed(&self) -> f32 {
        self.phase_elapsed
    }

    pub fn now(&self) -> f32 {
        self.now
    }
}

impl<S, R> std::fmt::Debug for WaveDirector<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveDirector")
            .field("phase", &self.phase)
            .field("wave_index", &self.wave_index)
            .field("waves", &self.waves.len())
            .field("active_trackers", &self.active_trackers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::pool::PoolHandle;
    use crate::game::population::SpawnError;
    use crate::game::spawn::CircleSpawn;
    use crate::util::vec2::Vec2;
    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Population stand-in that records spawns and lets tests set the count
    #[derive(Default)]
    struct CountingPopulation {
        count: usize,
        spawned: Vec<(EnemyType, Vec2)>,
        rejected: Option<EnemyType>,
    }

    impl Population for CountingPopulation {
        fn active_count(&self) -> usize {
            self.count
        }

        fn spawn(&mut self, enemy_type: EnemyType, position: Vec2) -> Result<PoolHandle, SpawnError> {
            if self.rejected == Some(enemy_type) {
                return Err(SpawnError::UnknownEnemyType(enemy_type));
            }
            self.spawned.push((enemy_type, position));
            self.count += 1;
            Ok(PoolHandle::from_raw(self.spawned.len() - 1))
        }
    }

    /// Spawns exactly on the anchor
    struct AnchorSpawn;

    impl SpawnPositionGenerator for AnchorSpawn {
        fn spawn_position(&mut self, anchor: Anchor, _: &mut dyn RngCore) -> Vec2 {
            anchor.position
        }
    }

    fn wave(groups: Vec<SpawnGroup>, total_time: f32, cooldown: f32, max_enemies: usize) -> WaveSetup {
        WaveSetup {
            groups,
            cooldown,
            pre_delay: 0.0,
            max_enemies,
            total_time,
        }
    }

    fn director(waves: Vec<WaveSetup>, interval: f32, bus: Arc<EventBus>) -> WaveDirector<AnchorSpawn, StdRng> {
        WaveDirector::new(
            DirectorConfig {
                evaluation_interval: interval,
            },
            WavesConfig { waves },
            AnchorSpawn,
            StdRng::seed_from_u64(1),
            bus,
        )
    }

    #[test]
    fn test_end_to_end_single_tick_window() {
        let dt = 0.25;
        let group = || SpawnGroup::new(EnemyType::Skeleton, 3, 0.0, Curve::constant(1.0));
        let bus = Arc::new(EventBus::new());
        let phases = Arc::new(Mutex::new(Vec::new()));
        {
            let phases = Arc::clone(&phases);
            bus.subscribe(move |e: &WaveStarted| phases.lock().push(format!("started {}", e.wave_index)));
        }
        {
            let phases = Arc::clone(&phases);
            bus.subscribe(move |e: &WaveSpawnWindowClosed| {
                phases.lock().push(format!("closed {} {}", e.wave_index, e.spawned))
            });
        }
        {
            let phases = Arc::clone(&phases);
            bus.subscribe(move |e: &WaveCleared| phases.lock().push(format!("cleared {}", e.wave_index)));
        }

        let mut d = director(
            vec![wave(vec![group()], dt, 1.0, 10), wave(vec![group()], dt, 1.0, 10)],
            0.0,
            Arc::clone(&bus),
        );
        let mut pop = CountingPopulation::default();
        let anchor = Anchor::new(Vec2::ZERO, Vec2::FORWARD);

        d.start();
        assert_eq!(d.phase(), WavePhase::PreDelay);

        // Entering the window spawns on the same tick, then one per tick
        for expected in 1..=3 {
            d.tick(dt, &mut pop, anchor);
            assert_eq!(d.phase(), WavePhase::Active);
            assert_eq!(pop.spawned.len(), expected);
        }

        // Group hits its max and goes quiet, then the window closes
        d.tick(dt, &mut pop, anchor);
        assert_eq!(d.active_tracker_count(), 0);
        d.tick(dt, &mut pop, anchor);
        assert_eq!(d.phase(), WavePhase::Draining);
        assert_eq!(pop.spawned.len(), 3);

        for _ in 0..10 {
            d.tick(dt, &mut pop, anchor);
            assert_eq!(d.phase(), WavePhase::Draining);
        }
        assert_eq!(pop.spawned.len(), 3);

        pop.count = 0;
        d.tick(dt, &mut pop, anchor);
        assert_eq!(d.phase(), WavePhase::Cooldown);

        for _ in 0..3 {
            d.tick(dt, &mut pop, anchor);
            assert_eq!(d.phase(), WavePhase::Cooldown);
        }
        d.tick(dt, &mut pop, anchor);
        assert_eq!(d.phase(), WavePhase::PreDelay);
        assert_eq!(d.wave_index(), 1);

        d.tick(dt, &mut pop, anchor);
        assert_eq!(d.phase(), WavePhase::Active);
        assert_eq!(pop.spawned.len(), 4);

        assert_eq!(
            *phases.lock(),
            vec!["started 0", "closed 0 3", "cleared 0", "started 1"]
        );
    }

    #[test]
    fn test_finishes_after_last_wave() {
        let bus = Arc::new(EventBus::new());
        let completed = Arc::new(Mutex::new(None));
        {
            let completed = Arc::clone(&completed);
            bus.subscribe(move |e: &AllWavesCompleted| *completed.lock() = Some(e.waves));
        }

        let mut d = director(vec![wave(vec![], 0.5, 0.0, 10)], 0.0, Arc::clone(&bus));
        let mut pop = CountingPopulation::default();

        d.start();
        for _ in 0..20 {
            d.tick(0.25, &mut pop, Anchor::default());
        }
        assert!(d.is_finished());
        assert_eq!(*completed.lock(), Some(1));
        assert!(d.current_wave().is_none());
    }

    #[test]
    fn test_empty_wave_list_finishes_on_start() {
        let mut d = director(vec![], 0.0, Arc::new(EventBus::new()));
        d.start();
        assert!(d.is_finished());
    }

    #[test]
    fn test_start_twice_is_ignored() {
        let mut d = director(vec![wave(vec![], 1.0, 0.0, 10)], 0.0, Arc::new(EventBus::new()));
        d.start();
        let mut pop = CountingPopulation::default();
        d.tick(0.1, &mut pop, Anchor::default());
        assert_eq!(d.phase(), WavePhase::Active);
        d.start();
        assert_eq!(d.phase(), WavePhase::Active);
    }

    #[test]
    fn test_population_cap_gates_spawns() {
        let group = SpawnGroup::new(EnemyType::Skeleton, 10, 0.0, Curve::constant(1.0));
        let mut d = director(vec![wave(vec![group], 100.0, 0.0, 2)], 0.0, Arc::new(EventBus::new()));
        let mut pop = CountingPopulation::default();

        d.start();
        for _ in 0..20 {
            d.tick(0.1, &mut pop, Anchor::default());
        }
        assert_eq!(pop.spawned.len(), 2);
        assert_eq!(d.active_tracker_count(), 1);

        pop.count = 0;
        d.tick(0.1, &mut pop, Anchor::default());
        assert_eq!(pop.spawned.len(), 3);
    }

    #[test]
    fn test_spawn_delay_spacing() {
        let group = SpawnGroup::new(EnemyType::Skeleton, 100, 0.5, Curve::constant(1.0));
        let mut d = director(vec![wave(vec![group], 100.0, 0.0, 1000)], 0.0, Arc::new(EventBus::new()));
        let mut pop = CountingPopulation::default();

        d.start();
        // 0.25 s per tick: entry spawn, then one every other tick
        for _ in 0..9 {
            d.tick(0.25, &mut pop, Anchor::default());
        }
        assert_eq!(pop.spawned.len(), 5);
    }

    #[test]
    fn test_evaluation_interval() {
        let group = SpawnGroup::new(EnemyType::Skeleton, 100, 0.0, Curve::constant(1.0));
        let mut d = director(vec![wave(vec![group], 100.0, 0.0, 1000)], 0.1, Arc::new(EventBus::new()));
        let mut pop = CountingPopulation::default();

        d.start();
        for _ in 0..11 {
            d.tick(0.02, &mut pop, Anchor::default());
        }
        assert_eq!(pop.spawned.len(), 3);
    }

    #[test]
    fn test_zero_curve_after_window_stops_group() {
        let group = SpawnGroup::new(EnemyType::Skeleton, 5, 0.0, Curve::constant(0.0));
        let mut d = director(vec![wave(vec![group], 0.5, 0.0, 10)], 0.0, Arc::new(EventBus::new()));
        let mut pop = CountingPopulation::default();

        d.start();
        for _ in 0..10 {
            d.tick(0.25, &mut pop, Anchor::default());
        }
        assert!(pop.spawned.is_empty());
        assert!(matches!(
            d.phase(),
            WavePhase::Cooldown | WavePhase::Finished
        ));
    }

    #[test]
    fn test_rejected_spawns_still_count_toward_max() {
        let group = SpawnGroup::new(EnemyType::Brute, 2, 0.0, Curve::constant(1.0));
        let mut d = director(vec![wave(vec![group], 0.1, 0.0, 10)], 0.0, Arc::new(EventBus::new()));
        let mut pop = CountingPopulation {
            rejected: Some(EnemyType::Brute),
            ..Default::default()
        };

        d.start();
        let mut failed = 0;
        for _ in 0..10 {
            failed += d.tick(0.1, &mut pop, Anchor::default()).failed;
        }
        assert_eq!(failed, 2);
        assert!(d.is_finished());
    }

    #[test]
    fn test_same_seed_same_spawns() {
        let run = || {
            let waves = vec![
                wave(
                    vec![
                        SpawnGroup::new(EnemyType::Skeleton, 30, 0.1, Curve::linear(0.2, 0.9)),
                        SpawnGroup::new(EnemyType::Bat, 10, 0.3, Curve::constant(0.5)),
                    ],
                    3.0,
                    0.5,
                    25,
                ),
                wave(
                    vec![SpawnGroup::new(EnemyType::Zombie, 12, 0.2, Curve::linear(1.0, 0.0))],
                    2.0,
                    0.0,
                    25,
                ),
            ];
            let mut d = WaveDirector::new(
                DirectorConfig::default(),
                WavesConfig { waves },
                CircleSpawn::default(),
                StdRng::seed_from_u64(1234),
                Arc::new(EventBus::new()),
            );
            let mut pop = CountingPopulation::default();
            d.start();
            for tick in 0..600 {
                if tick % 40 == 0 {
                    pop.count = pop.count.saturating_sub(10);
                }
                d.tick(0.02, &mut pop, Anchor::new(Vec2::new(1.0, 2.0), Vec2::FORWARD));
            }
            (pop.spawned, d.phase(), d.wave_index())
        };

        let a = run();
        let b = run();
        assert!(!a.0.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn test_waves_config_json() {
        let json = r#"{
            "waves": [
                {
                    "groups": [
                        {"enemy_type": "skeleton", "max_count": 4,
                         "spawn_over_time": [{"time": 0.0, "value": 0.5}]},
                        {"enemy_type": "bat"}
                    ],
                    "total_time": 30.0,
                    "cooldown": 5.0
                }
            ]
        }"#;
        let config = WavesConfig::from_json_str(json).unwrap();
        let wave = &config.waves[0];
        assert_eq!(wave.expected_enemies(), 14);
        assert_eq!(wave.pre_delay, wave::DEFAULT_PRE_DELAY);
        assert_eq!(wave.max_enemies, wave::DEFAULT_MAX_ENEMIES);
        assert_eq!(wave.groups[1].spawn_delay, 0.1);
        assert_eq!(config.total_time(), 30.0);
    }

    #[test]
    fn test_waves_config_rejects_invalid() {
        let json = r#"{"waves": [{"groups": [], "total_time": -1.0}]}"#;
        assert!(matches!(
            WavesConfig::from_json_str(json),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            WavesConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            WavesConfig::from_json_file("/nonexistent/waves.json"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_builtin_waves_are_valid() {
        let config = WavesConfig::builtin();
        assert!(config.validate().is_ok());
        assert!(config.waves.iter().all(|w| w.expected_enemies() > 0));
    }
}
