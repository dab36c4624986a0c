//! Simulation metrics
//!
//! Counters and gauges updated by `Simulation::tick`, rendered in Prometheus
//! text format or as a JSON snapshot. Serving them is left to the host.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use crate::game::wave::WavePhase;

/// Tick samples kept for percentile calculation
const TICK_HISTORY_LEN: usize = 1000;

/// Samples required before percentiles are published
const MIN_PERCENTILE_SAMPLES: usize = 10;

#[derive(Debug)]
pub struct SimMetrics {
    // Population
    pub enemies_spawned: AtomicU64,
    pub enemies_killed: AtomicU64,
    pub experience_awarded: AtomicU64,
    pub spawn_failures: AtomicU64,
    pub active_enemies: AtomicU64,
    pub pool_capacity: AtomicU64,
    /// Entries steered in the last tick
    pub steered_last_tick: AtomicU64,

    // Waves
    pub wave_index: AtomicU64,
    pub wave_phase: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    start_time: Instant,

    // Rolling tick times for percentile calculation
    tick_history: RwLock<VecDeque<u64>>,
}

/// Point-in-time copy of every metric
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub enemies_spawned: u64,
    pub enemies_killed: u64,
    pub experience_awarded: u64,
    pub spawn_failures: u64,
    pub active_enemies: u64,
    pub pool_capacity: u64,
    pub wave_index: u64,
    pub wave_phase: &'static str,
    pub tick_count: u64,
    pub tick_time_us: u64,
    pub tick_time_p95_us: u64,
    pub tick_time_p99_us: u64,
    pub tick_time_max_us: u64,
    pub uptime_seconds: u64,
}

fn phase_from_code(code: u64) -> WavePhase {
    match code {
        1 => WavePhase::PreDelay,
        2 => WavePhase::Active,
        3 => WavePhase::Draining,
        4 => WavePhase::Cooldown,
        5 => WavePhase::Finished,
        _ => WavePhase::Idle,
    }
}

impl SimMetrics {
    pub fn new() -> Self {
        Self {
            enemies_spawned: AtomicU64::new(0),
            enemies_killed: AtomicU64::new(0),
            experience_awarded: AtomicU64::new(0),
            spawn_failures: AtomicU64::new(0),
            active_enemies: AtomicU64::new(0),
            pool_capacity: AtomicU64::new(0),
            steered_last_tick: AtomicU64::new(0),
            wave_index: AtomicU64::new(0),
            wave_phase: AtomicU64::new(WavePhase::Idle as u64),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY_LEN)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY_LEN {
            history.pop_front();
        }

        if history.len() >= MIN_PERCENTILE_SAMPLES {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    pub fn record_spawns(&self, spawned: usize, failed: usize) {
        self.enemies_spawned.fetch_add(spawned as u64, Ordering::Relaxed);
        self.spawn_failures.fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn record_kills(&self, kills: u32, experience: u32) {
        self.enemies_killed.fetch_add(kills as u64, Ordering::Relaxed);
        self.experience_awarded.fetch_add(experience as u64, Ordering::Relaxed);
    }

    pub fn set_population(&self, active: usize, pool_capacity: usize, steered: usize) {
        self.active_enemies.store(active as u64, Ordering::Relaxed);
        self.pool_capacity.store(pool_capacity as u64, Ordering::Relaxed);
        self.steered_last_tick.store(steered as u64, Ordering::Relaxed);
    }

    pub fn set_wave(&self, index: usize, phase: WavePhase) {
        self.wave_index.store(index as u64, Ordering::Relaxed);
        self.wave_phase.store(phase as u64, Ordering::Relaxed);
    }

    pub fn wave_phase(&self) -> WavePhase {
        phase_from_code(self.wave_phase.load(Ordering::Relaxed))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enemies_spawned: self.enemies_spawned.load(Ordering::Relaxed),
            enemies_killed: self.enemies_killed.load(Ordering::Relaxed),
            experience_awarded: self.experience_awarded.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
            active_enemies: self.active_enemies.load(Ordering::Relaxed),
            pool_capacity: self.pool_capacity.load(Ordering::Relaxed),
            wave_index: self.wave_index.load(Ordering::Relaxed),
            wave_phase: self.wave_phase().as_str(),
            tick_count: self.tick_count.load(Ordering::Relaxed),
            tick_time_us: self.tick_time_us.load(Ordering::Relaxed),
            tick_time_p95_us: self.tick_time_p95_us.load(Ordering::Relaxed),
            tick_time_p99_us: self.tick_time_p99_us.load(Ordering::Relaxed),
            tick_time_max_us: self.tick_time_max_us.load(Ordering::Relaxed),
            uptime_seconds: self.uptime_seconds(),
        }
    }

    /// Prometheus text exposition format
    pub fn render(&self) -> String {
        let s = self.snapshot();
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("horde_sim_enemies_spawned_total", "Enemies spawned", "counter", s.enemies_spawned);
        metric!("horde_sim_enemies_killed_total", "Enemies removed after dying", "counter", s.enemies_killed);
        metric!("horde_sim_experience_total", "Experience carried by death events", "counter", s.experience_awarded);
        metric!("horde_sim_spawn_failures_total", "Spawn attempts rejected by the population", "counter", s.spawn_failures);
        metric!("horde_sim_enemies_active", "Enemies in the active registry", "gauge", s.active_enemies);
        metric!("horde_sim_pool_capacity", "Instances owned by the enemy pool", "gauge", s.pool_capacity);
        metric!("horde_sim_steered_last_tick", "Enemies steered in the last tick", "gauge",
            self.steered_last_tick.load(Ordering::Relaxed));
        metric!("horde_sim_wave_index", "Zero-based index of the current wave", "gauge", s.wave_index);

        output.push_str(&format!(
            "# HELP horde_sim_wave_phase Current wave director phase\n# TYPE horde_sim_wave_phase gauge\nhorde_sim_wave_phase{{phase=\"{}\"}} 1\n",
            s.wave_phase
        ));

        metric!("horde_sim_tick_time_microseconds", "Last tick time in microseconds", "gauge", s.tick_time_us);
        metric!("horde_sim_tick_time_p95_microseconds", "95th percentile tick time", "gauge", s.tick_time_p95_us);
        metric!("horde_sim_tick_time_p99_microseconds", "99th percentile tick time", "gauge", s.tick_time_p99_us);
        metric!("horde_sim_tick_time_max_microseconds", "Maximum tick time", "gauge", s.tick_time_max_us);
        metric!("horde_sim_tick_count", "Total ticks simulated", "counter", s.tick_count);
        metric!("horde_sim_uptime_seconds", "Seconds since the metrics were created", "counter", s.uptime_seconds);

        output
    }

    /// JSON snapshot
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for SimMetrics {
    fn default() -> Self {
        Self::new()
    }
}
