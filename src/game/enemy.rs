//! Enemy blueprint and pooled per-instance state

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::game::constants::knockback;
use crate::game::pool::Poolable;
use crate::game::spatial::SpatialQuery;
use crate::game::steering::{Pursuit, PursuitStrategy};
use crate::util::vec2::Vec2;

/// Enemy kind; keys the blueprint table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnemyType {
    #[default]
    Skeleton,
    Zombie,
    Bat,
    Brute,
}

impl EnemyType {
    pub const ALL: [EnemyType; 4] = [
        EnemyType::Skeleton,
        EnemyType::Zombie,
        EnemyType::Bat,
        EnemyType::Brute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnemyType::Skeleton => "skeleton",
            EnemyType::Zombie => "zombie",
            EnemyType::Bat => "bat",
            EnemyType::Brute => "brute",
        }
    }
}

impl fmt::Display for EnemyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Push-back applied when a damaged enemy survives a hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnockbackSettings {
    /// Displacement in world units; 0 disables knockback
    pub distance: f32,
    /// Seconds the eased displacement takes
    pub duration: f32,
}

impl Default for KnockbackSettings {
    fn default() -> Self {
        Self {
            distance: knockback::DISTANCE,
            duration: knockback::DURATION,
        }
    }
}

/// Immutable description of an enemy kind
#[derive(Debug, Clone)]
pub struct EnemyBlueprint {
    pub enemy_type: EnemyType,
    pub name: String,
    pub base_health: f32,
    pub base_speed: f32,
    pub experience: u32,
    pub knockback: KnockbackSettings,
    /// Steering shared by every instance of this kind; `None` uses the
    /// population's fallback
    pub pursuit: Option<Arc<dyn PursuitStrategy>>,
}

impl EnemyBlueprint {
    pub fn new(enemy_type: EnemyType, name: impl Into<String>) -> Self {
        Self {
            enemy_type,
            name: name.into(),
            base_health: 10.0,
            base_speed: 5.0,
            experience: 1,
            knockback: KnockbackSettings::default(),
            pursuit: None,
        }
    }

    pub fn with_stats(mut self, health: f32, speed: f32, experience: u32) -> Self {
        self.base_health = health;
        self.base_speed = speed;
        self.experience = experience;
        self
    }

    pub fn with_knockback(mut self, knockback: KnockbackSettings) -> Self {
        self.knockback = knockback;
        self
    }

    pub fn with_pursuit(mut self, pursuit: Arc<dyn PursuitStrategy>) -> Self {
        self.pursuit = Some(pursuit);
        self
    }

    /// Stock roster used by the headless runner and the benches
    pub fn roster(pursuit: Option<Arc<dyn PursuitStrategy>>) -> Vec<EnemyBlueprint> {
        let with = |bp: EnemyBlueprint| match &pursuit {
            Some(strategy) => bp.with_pursuit(Arc::clone(strategy)),
            None => bp,
        };

        vec![
            with(EnemyBlueprint::new(EnemyType::Skeleton, "Skeleton").with_stats(10.0, 3.0, 1)),
            with(EnemyBlueprint::new(EnemyType::Zombie, "Zombie").with_stats(25.0, 1.8, 3)),
            with(
                EnemyBlueprint::new(EnemyType::Bat, "Bat")
                    .with_stats(4.0, 5.5, 1)
                    .with_knockback(KnockbackSettings {
                        distance: 1.5,
                        duration: 0.15,
                    }),
            ),
            with(
                EnemyBlueprint::new(EnemyType::Brute, "Brute")
                    .with_stats(80.0, 1.2, 10)
                    .with_knockback(KnockbackSettings {
                        distance: 0.0,
                        duration: 0.0,
                    }),
            ),
        ]
    }
}

/// Result of `EnemyEntity::apply_damage`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Entity already dead, dying or not live
    Ignored,
    Damaged,
    /// This hit made the entity dying
    Killed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Knockback {
    from: Vec2,
    to: Vec2,
    elapsed: f32,
    duration: f32,
}

/// Cubic ease-out
#[inline]
fn ease_out_cubic(t: f32) -> f32 {
    let inv = 1.0 - t;
    1.0 - inv * inv * inv
}

/// Mutable enemy state bound to a pool slot. Re-initialized on every spawn.
#[derive(Debug, Default)]
pub struct EnemyEntity {
    pub name: String,
    pub health: f32,
    pub speed: f32,
    pub position: Vec2,
    pub facing: Vec2,
    pub enemy_type: EnemyType,
    pub experience: u32,
    pub is_avoiding: bool,
    is_dying: bool,
    knockback_settings: KnockbackSettings,
    knockback: Option<Knockback>,
    /// Kept across pool cycles; rebuilt only when the strategy changes
    pursuit: Option<Box<dyn Pursuit>>,
    strategy: Option<Arc<dyn PursuitStrategy>>,
    is_valid: bool,
    /// Position in the active registry
    index: Option<usize>,
}

impl EnemyEntity {
    /// Reset from a blueprint at `position`, registered at `index`
    pub fn reinitialize(&mut self, blueprint: &EnemyBlueprint, position: Vec2, index: usize) {
        self.name.clear();
        self.name.push_str(&blueprint.name);
        self.health = blueprint.base_health;
        self.speed = blueprint.base_speed;
        self.enemy_type = blueprint.enemy_type;
        self.experience = blueprint.experience;
        self.knockback_settings = blueprint.knockback;
        self.position = position;
        self.facing = Vec2::FORWARD;
        self.is_avoiding = false;
        self.is_dying = false;
        self.knockback = None;
        self.bind_pursuit(blueprint.pursuit.as_ref());
        self.index = Some(index);
        self.is_valid = true;
    }

    /// Reuse the slot's pursuit when it was built from `strategy`, otherwise
    /// build a fresh one
    fn bind_pursuit(&mut self, strategy: Option<&Arc<dyn PursuitStrategy>>) {
        let Some(strategy) = strategy else {
            self.pursuit = None;
            self.strategy = None;
            return;
        };

        let same = self
            .strategy
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, strategy));
        if same {
            if let Some(pursuit) = self.pursuit.as_mut() {
                pursuit.reset();
                return;
            }
        }

        self.pursuit = Some(strategy.build());
        self.strategy = Some(Arc::clone(strategy));
    }

    #[inline]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    #[inline]
    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = Some(index);
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    #[inline]
    pub fn is_dying(&self) -> bool {
        self.is_dying
    }

    #[inline]
    pub fn is_knocking_back(&self) -> bool {
        self.knockback.is_some()
    }

    /// Whether this entity brings its own steering instance
    pub fn has_own_pursuit(&self) -> bool {
        self.pursuit.is_some()
    }

    /// Subtract `amount` from health. Knockback starts when a surviving
    /// entity is hit from `source`.
    pub fn apply_damage(&mut self, amount: f32, source: Option<Vec2>) -> DamageOutcome {
        if !self.is_valid || self.is_dying || self.health <= 0.0 || !amount.is_finite() {
            return DamageOutcome::Ignored;
        }

        self.health -= amount;
        if self.health <= 0.0 {
            self.is_dying = true;
            self.knockback = None;
            return DamageOutcome::Killed;
        }

        if let Some(source) = source {
            self.start_knockback(source);
        }
        DamageOutcome::Damaged
    }

    /// Begin (or restart) a knockback away from `source`, starting at the
    /// current position
    fn start_knockback(&mut self, source: Vec2) {
        let settings = self.knockback_settings;
        if settings.distance <= 0.0 {
            return;
        }

        let mut away = (self.position - source).normalize();
        if away == Vec2::ZERO {
            away = -self.facing.normalize();
        }

        self.knockback = Some(Knockback {
            from: self.position,
            to: self.position + away * settings.distance,
            elapsed: 0.0,
            duration: settings.duration,
        });
    }

    /// Advance an in-flight knockback. Returns true while it is still running.
    pub fn tick_knockback(&mut self, dt: f32) -> bool {
        let Some(kb) = self.knockback.as_mut() else {
            return false;
        };

        kb.elapsed += dt.max(0.0);
        let t = if kb.duration > 0.0 {
            (kb.elapsed / kb.duration).min(1.0)
        } else {
            1.0
        };
        self.position = kb.from.lerp(kb.to, ease_out_cubic(t));

        if t >= 1.0 {
            self.knockback = None;
            return false;
        }
        true
    }

    /// Steer toward `target` with the own pursuit instance, or `fallback`
    pub fn steer(
        &mut self,
        target: Vec2,
        dt: f32,
        world: &dyn SpatialQuery,
        fallback: &mut dyn Pursuit,
        facing_threshold: f32,
    ) {
        let result = match self.pursuit.as_mut() {
            Some(pursuit) => pursuit.calculate_movement(self.position, target, dt, world),
            None => fallback.calculate_movement(self.position, target, dt, world),
        };
        self.apply_movement(result.direction, result.is_avoiding, dt, facing_threshold);
    }

    /// Move along `direction` at the entity's speed and turn to face it
    pub fn apply_movement(&mut self, direction: Vec2, is_avoiding: bool, dt: f32, facing_threshold: f32) {
        self.position += direction * (self.speed * dt);
        if direction.length() > facing_threshold {
            self.facing = direction.normalize();
        }
        self.is_avoiding = is_avoiding;
    }
}

impl Poolable for EnemyEntity {
    fn on_release(&mut self) {
        self.is_valid = false;
        self.index = None;
        self.knockback = None;
        self.is_avoiding = false;
    }
}
