//! Pursuit steering
//!
//! Per-tick movement direction for an entity chasing a target:
//! stop → seek → obstacle avoidance → flock separation → temporal smoothing.
//! Strategies are stateful (they remember the previous output direction), so
//! every entity owns its own `Pursuit` instance built from a shared
//! `PursuitStrategy`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game::constants::steering::*;
use crate::game::spatial::{LayerMask, OverlapResults, SpatialQuery, Tag};
use crate::util::vec2::Vec2;

/// Neighbors closer than this (squared) are treated as the entity itself
const COLOCATED_DISTANCE_SQ: f32 = 1e-10;

/// Output of one steering step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MovementResult {
    /// Unit direction, or zero when the entity must neither move nor turn
    pub direction: Vec2,
    /// Direction was bent by an obstacle or by neighbors
    pub is_avoiding: bool,
}

impl MovementResult {
    pub const STOP: MovementResult = MovementResult {
        direction: Vec2::ZERO,
        is_avoiding: false,
    };
}

/// Per-entity steering behaviour
pub trait Pursuit: Send + fmt::Debug {
    fn calculate_movement(
        &mut self,
        current: Vec2,
        target: Vec2,
        dt: f32,
        world: &dyn SpatialQuery,
    ) -> MovementResult;

    /// Forget any per-entity memory. Called when a pooled entity respawns
    /// with the strategy that built this instance.
    fn reset(&mut self) {}
}

/// Shared description of a steering behaviour; builds per-entity instances
pub trait PursuitStrategy: Send + Sync + fmt::Debug {
    fn build(&self) -> Box<dyn Pursuit>;
}

/// Tuning of `SimplePursuit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringSettings {
    /// Tag of the pursued target; ray hits on it never trigger avoidance
    pub target_tag: Tag,
    /// Tag shared by the flock; only these neighbors contribute to separation
    pub population_tag: Tag,
    /// Layers probed by the avoidance ray and the neighbor query
    pub obstacle_mask: LayerMask,
    pub avoidance_check_distance: f32,
    pub separation_radius: f32,
    pub separation_weight: f32,
    pub min_separation_distance: f32,
    pub direction_lerp_speed: f32,
    pub stop_distance: f32,
}

impl Default for SteeringSettings {
    fn default() -> Self {
        Self {
            target_tag: Tag::Player,
            population_tag: Tag::Enemy,
            obstacle_mask: LayerMask::OBSTACLES
                .union(LayerMask::ENEMIES)
                .union(LayerMask::PLAYER),
            avoidance_check_distance: AVOIDANCE_CHECK_DISTANCE,
            separation_radius: SEPARATION_RADIUS,
            separation_weight: SEPARATION_WEIGHT,
            min_separation_distance: MIN_SEPARATION_DISTANCE,
            direction_lerp_speed: DIRECTION_LERP_SPEED,
            stop_distance: STOP_DISTANCE,
        }
    }
}

impl PursuitStrategy for SteeringSettings {
    fn build(&self) -> Box<dyn Pursuit> {
        Box::new(SimplePursuit::new(self.clone()))
    }
}

/// Seek with ray-probe obstacle avoidance, separation and smoothing
#[derive(Debug, Clone)]
pub struct SimplePursuit {
    settings: SteeringSettings,
    last_direction: Vec2,
    neighbors: OverlapResults,
}

impl SimplePursuit {
    pub fn new(settings: SteeringSettings) -> Self {
        Self {
            settings,
            last_direction: Vec2::ZERO,
            neighbors: OverlapResults::new(),
        }
    }

    pub fn settings(&self) -> &SteeringSettings {
        &self.settings
    }

    /// Direction returned by the previous non-stopped step
    pub fn last_direction(&self) -> Vec2 {
        self.last_direction
    }

    /// Deflection along the obstacle surface, if the probe ray hits something
    /// that is neither the target nor a trigger volume
    fn avoidance(&self, current: Vec2, seek: Vec2, world: &dyn SpatialQuery) -> Option<Vec2> {
        let hit = world.raycast(
            current,
            seek,
            self.settings.avoidance_check_distance,
            self.settings.obstacle_mask,
        )?;

        if hit.tag == self.settings.target_tag || hit.is_trigger {
            return None;
        }

        let mut avoid = hit.normal.perpendicular();
        if avoid.dot(seek) < (-avoid).dot(seek) {
            avoid = -avoid;
        }
        Some(avoid.normalize())
    }

    /// Normalized push away from flock neighbors (zero when there are none)
    fn separation(&mut self, current: Vec2, world: &dyn SpatialQuery) -> Vec2 {
        world.overlap_circle(
            current,
            self.settings.separation_radius,
            self.settings.obstacle_mask,
            &mut self.neighbors,
        );

        let mut push = Vec2::ZERO;
        for neighbor in &self.neighbors {
            if neighbor.tag != self.settings.population_tag {
                continue;
            }
            let away = current - neighbor.position;
            let distance_sq = away.length_sq();
            if distance_sq <= COLOCATED_DISTANCE_SQ {
                continue;
            }
            let distance = distance_sq.sqrt();
            push += away / (distance * distance.max(self.settings.min_separation_distance));
        }
        self.neighbors.clear();

        push.normalize()
    }
}

impl Pursuit for SimplePursuit {
    fn calculate_movement(
        &mut self,
        current: Vec2,
        target: Vec2,
        dt: f32,
        world: &dyn SpatialQuery,
    ) -> MovementResult {
        let stop = self.settings.stop_distance;
        if current.distance_sq_to(target) < stop * stop {
            return MovementResult::STOP;
        }

        let seek = (target - current).normalize();
        let mut direction = seek;
        let mut is_avoiding = false;

        if seek != Vec2::ZERO {
            if let Some(avoid) = self.avoidance(current, seek, world) {
                direction = avoid;
                is_avoiding = true;
            }
        }

        if !is_avoiding {
            let push = self.separation(current, world);
            if push != Vec2::ZERO {
                direction = (direction + push * self.settings.separation_weight).normalize();
                is_avoiding = true;
            }
        }

        let wanted = direction.normalize();
        if wanted == Vec2::ZERO {
            return MovementResult {
                direction: Vec2::ZERO,
                is_avoiding,
            };
        }

        let t = dt * self.settings.direction_lerp_speed;
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 1.0 };
        let mut smoothed = self.last_direction.lerp(wanted, t).normalize();
        if smoothed == Vec2::ZERO {
            smoothed = wanted;
        }
        self.last_direction = smoothed;

        MovementResult {
            direction: smoothed,
            is_avoiding,
        }
    }

    fn reset(&mut self) {
        self.last_direction = Vec2::ZERO;
        self.neighbors.clear();
    }
}
