use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::game::constants::clock;
use crate::game::population::PopulationConfig;
use crate::game::spawn::SpawnRingConfig;
use crate::game::steering::SteeringSettings;
use crate::game::wave::{DirectorConfig, WavesConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse waves: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Headless runner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Seed of the director's random source
    pub seed: u64,
    /// Fixed tick rate in Hz
    pub tick_rate: u32,
    /// Stop after this many ticks even if waves remain
    pub max_ticks: u64,
    /// JSON wave list; the built-in waves are used when unset
    pub waves_path: Option<PathBuf>,
    /// Radius of the scripted player's area attack
    pub attack_radius: f32,
    pub attack_damage: f32,
    /// Seconds between two area attacks
    pub attack_interval: f32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            tick_rate: clock::TICK_RATE,
            max_ticks: clock::MAX_TICKS,
            waves_path: None,
            attack_radius: 4.0,
            attack_damage: 6.0,
            attack_interval: 0.5,
        }
    }
}

impl RunConfig {
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SimConfig {
    pub population: PopulationConfig,
    pub steering: SteeringSettings,
    pub director: DirectorConfig,
    pub spawn: SpawnRingConfig,
    pub run: RunConfig,
}

/// Parse `key` with `lookup`, keeping `None` (and warning) when the value is
/// malformed or rejected by `accept`
fn parse_var<T, L, A>(lookup: &L, key: &str, accept: A, rule: &str) -> Option<T>
where
    T: FromStr,
    L: Fn(&str) -> Option<String>,
    A: Fn(&T) -> bool,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(parsed) if accept(&parsed) => Some(parsed),
        Ok(_) => {
            tracing::warn!("{} must be {}, using default", key, rule);
            None
        }
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", key, raw);
            None
        }
    }
}

impl SimConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Load config from an arbitrary key/value source
    pub fn load_from<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "HORDE_POOL_SIZE", |v: &usize| *v <= 100_000, "0-100000") {
            config.population.initial_pool_size = v;
        }
        if let Some(v) = parse_var(&lookup, "HORDE_POOL_CAN_EXPAND", |_: &bool| true, "true or false") {
            config.population.can_expand = v;
        }
        if let Some(v) = parse_var(&lookup, "HORDE_ENEMIES_PER_TICK", |v: &usize| *v > 0, "> 0") {
            config.population.enemies_per_tick = v;
        }
        if let Some(v) = parse_var(&lookup, "HORDE_STOP_DISTANCE", |v: &f32| v.is_finite() && *v >= 0.0, ">= 0") {
            config.steering.stop_distance = v;
        }
        if let Some(v) = parse_var(&lookup, "HORDE_SEPARATION_WEIGHT", |v: &f32| v.is_finite() && *v >= 0.0, ">= 0") {
            config.steering.separation_weight = v;
        }
        if let Some(v) = parse_var(&lookup, "HORDE_EVAL_INTERVAL", |v: &f32| v.is_finite() && *v >= 0.0, ">= 0") {
            config.director.evaluation_interval = v;
        }
        if let Some(v) = parse_var(&lookup, "HORDE_SPAWN_MIN_RADIUS", |v: &f32| v.is_finite() && *v >= 0.0, ">= 0") {
            config.spawn.min_radius = v;
        }
        if let Some(v) = parse_var(&lookup, "HORDE_SPAWN_MAX_RADIUS", |v: &f32| v.is_finite() && *v >= 0.0, ">= 0") {
            config.spawn.max_radius = v;
        }
        if let Some(v) = parse_var(&lookup, "HORDE_SEED", |_: &u64| true, "an unsigned integer") {
            config.run.seed = v;
        }
        if let Some(v) = parse_var(&lookup, "HORDE_TICK_RATE", |v: &u32| (1..=1000).contains(v), "1-1000") {
            config.run.tick_rate = v;
        }
        if let Some(v) = parse_var(&lookup, "HORDE_MAX_TICKS", |v: &u64| *v > 0, "> 0") {
            config.run.max_ticks = v;
        }

        if let Some(path) = lookup("HORDE_WAVES_PATH") {
            if !path.trim().is_empty() {
                config.run.waves_path = Some(PathBuf::from(path.trim()));
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.population.enemies_per_tick == 0 {
            return Err("enemies_per_tick must be at least 1".to_string());
        }
        if !self.population.can_expand && self.population.initial_pool_size == 0 {
            return Err("a fixed-size pool needs initial_pool_size > 0".to_string());
        }
        if self.spawn.min_radius > self.spawn.max_radius {
            return Err("spawn min_radius cannot exceed max_radius".to_string());
        }
        if self.steering.direction_lerp_speed < 0.0 {
            return Err("direction_lerp_speed cannot be negative".to_string());
        }
        if self.run.tick_rate == 0 {
            return Err("tick_rate must be at least 1".to_string());
        }
        Ok(())
    }

    /// Waves from `waves_path`, or the built-in list
    pub fn load_waves(&self) -> Result<WavesConfig, ConfigError> {
        match &self.run.waves_path {
            Some(path) => {
                let waves = WavesConfig::from_json_file(path)?;
                tracing::info!(path = %path.display(), waves = waves.waves.len(), "Waves loaded");
                Ok(waves)
            }
            None => Ok(WavesConfig::builtin()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::{pool, population};
    use hashbrown::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.population.initial_pool_size, pool::INITIAL_SIZE);
        assert_eq!(config.population.enemies_per_tick, population::ENEMIES_PER_TICK);
        assert_eq!(config.director.evaluation_interval, 0.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_overrides() {
        let config = SimConfig::load_from(lookup(&[
            ("HORDE_POOL_SIZE", "32"),
            ("HORDE_ENEMIES_PER_TICK", "12"),
            ("HORDE_SEED", "99"),
            ("HORDE_WAVES_PATH", " waves.json "),
        ]));
        assert_eq!(config.population.initial_pool_size, 32);
        assert_eq!(config.population.enemies_per_tick, 12);
        assert_eq!(config.run.seed, 99);
        assert_eq!(config.run.waves_path, Some(PathBuf::from("waves.json")));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = SimConfig::load_from(lookup(&[
            ("HORDE_ENEMIES_PER_TICK", "0"),
            ("HORDE_TICK_RATE", "fast"),
            ("HORDE_STOP_DISTANCE", "-1"),
        ]));
        assert_eq!(config.population.enemies_per_tick, population::ENEMIES_PER_TICK);
        assert_eq!(config.run.tick_rate, clock::TICK_RATE);
        assert_eq!(config.steering.stop_distance, SteeringSettings::default().stop_distance);
    }

    #[test]
    fn test_validate_rejects_inverted_ring() {
        let mut config = SimConfig::default();
        config.spawn.min_radius = 30.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_waves_falls_back_to_builtin() {
        let config = SimConfig::default();
        assert_eq!(config.load_waves().unwrap(), WavesConfig::builtin());
    }

    #[test]
    fn test_load_or_default() {
        let config = SimConfig::load_or_default();
        assert!(config.run.tick_rate > 0);
    }
}
