//! Spawn position generators

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::game::constants::spawn;
use crate::util::vec2::Vec2;

/// Where the player is and which way it looks
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Anchor {
    pub position: Vec2,
    pub forward: Vec2,
}

impl Anchor {
    pub fn new(position: Vec2, forward: Vec2) -> Self {
        Self { position, forward }
    }
}

/// Picks the world position of the next spawned enemy
pub trait SpawnPositionGenerator {
    fn spawn_position(&mut self, anchor: Anchor, rng: &mut dyn RngCore) -> Vec2;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnRingConfig {
    pub min_radius: f32,
    pub max_radius: f32,
    /// Full width of the forbidden cone in front of the player (degrees)
    pub exclusion_angle_deg: f32,
    pub max_tries: u32,
}

impl Default for SpawnRingConfig {
    fn default() -> Self {
        Self {
            min_radius: spawn::MIN_RADIUS,
            max_radius: spawn::MAX_RADIUS,
            exclusion_angle_deg: spawn::EXCLUSION_ANGLE_DEG,
            max_tries: spawn::MAX_TRIES,
        }
    }
}

/// Uniform angle on a ring around the player, avoiding the cone the player
/// is looking into
#[derive(Debug, Clone, Default)]
pub struct CircleSpawn {
    config: SpawnRingConfig,
}

impl CircleSpawn {
    pub fn new(config: SpawnRingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpawnRingConfig {
        &self.config
    }

    fn random_distance(&self, rng: &mut dyn RngCore) -> f32 {
        let (min, max) = (self.config.min_radius, self.config.max_radius);
        if max > min {
            rng.gen_range(min..max)
        } else {
            min
        }
    }

    fn in_exclusion_cone(&self, forward: Vec2, direction: Vec2) -> bool {
        if self.config.exclusion_angle_deg <= 0.0 || forward.normalize() == Vec2::ZERO {
            return false;
        }
        let half = (self.config.exclusion_angle_deg * 0.5).to_radians();
        forward.angle_between(direction) < half
    }
}

impl SpawnPositionGenerator for CircleSpawn {
    fn spawn_position(&mut self, anchor: Anchor, rng: &mut dyn RngCore) -> Vec2 {
        for _ in 0..self.config.max_tries {
            let distance = self.random_distance(rng);
            let angle: f32 = rng.gen_range(0.0f32..360.0);
            let direction = Vec2::from_angle(angle.to_radians());

            if self.in_exclusion_cone(anchor.forward, direction) {
                continue;
            }
            return anchor.position + direction * distance;
        }

        tracing::error!("Spawn position fell back to the fixed offset");
        anchor.position + Vec2::new(self.random_distance(rng), 0.0)
    }
}
