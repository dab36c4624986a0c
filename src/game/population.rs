//! Enemy population
//!
//! Owns the enemy pool and the registry of active enemies. Steering is the
//! expensive part of a tick, so only `enemies_per_tick` registry entries are
//! steered per update, continuing from a persistent round-robin cursor.
//! Removals use swap-with-last compaction; every entity stores its registry
//! position so removal is O(1).

use std::sync::Arc;

use hashbrown::HashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::events::{EnemyDeathBatch, EventBus};
use crate::game::constants::{pool, population};
use crate::game::enemy::{DamageOutcome, EnemyBlueprint, EnemyEntity, EnemyType};
use crate::game::pool::{Pool, PoolError, PoolHandle};
use crate::game::spatial::{Collider, LayerMask, SpatialQuery, Tag};
use crate::game::steering::Pursuit;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    #[error("no blueprint registered for enemy type {0}")]
    UnknownEnemyType(EnemyType),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemovalError {
    #[error("{0} is not in the active registry")]
    InvalidIndex(PoolHandle),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Tuning of the population scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub initial_pool_size: usize,
    pub can_expand: bool,
    /// Registry entries steered per update
    pub enemies_per_tick: usize,
    /// Minimum direction magnitude before an enemy turns to face it
    pub facing_threshold: f32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            initial_pool_size: pool::INITIAL_SIZE,
            can_expand: pool::CAN_EXPAND,
            enemies_per_tick: population::ENEMIES_PER_TICK,
            facing_threshold: population::FACING_THRESHOLD,
        }
    }
}

/// What one `update` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateReport {
    /// Entries visited by the round-robin batch
    pub visited: usize,
    /// Entries that were actually steered
    pub steered: usize,
    pub kills: u32,
    pub experience: u32,
}

/// Population capability needed by the wave director
pub trait Population {
    fn active_count(&self) -> usize;
    fn spawn(&mut self, enemy_type: EnemyType, position: Vec2) -> Result<PoolHandle, SpawnError>;
}

pub struct PopulationManager {
    pool: Pool<EnemyEntity>,
    /// Active registry; `entity.index == Some(i)` for the entity at `active[i]`
    active: Vec<PoolHandle>,
    to_remove: Vec<PoolHandle>,
    blueprints: HashMap<EnemyType, EnemyBlueprint>,
    /// Steering for enemies whose blueprint carries none
    fallback: Box<dyn Pursuit>,
    enemies_per_tick: usize,
    facing_threshold: f32,
    cursor: usize,
    bus: Arc<EventBus>,
}

impl PopulationManager {
    pub fn new(
        config: &PopulationConfig,
        blueprints: impl IntoIterator<Item = EnemyBlueprint>,
        fallback: Box<dyn Pursuit>,
        bus: Arc<EventBus>,
    ) -> Self {
        let mut mapped = HashMap::new();
        for blueprint in blueprints {
            if mapped.contains_key(&blueprint.enemy_type) {
                tracing::warn!(
                    enemy_type = %blueprint.enemy_type,
                    "Duplicate blueprint ignored"
                );
                continue;
            }
            mapped.insert(blueprint.enemy_type, blueprint);
        }

        tracing::debug!(
            pool_size = config.initial_pool_size,
            blueprints = mapped.len(),
            "Population created"
        );

        Self {
            pool: Pool::new(EnemyEntity::default, config.initial_pool_size, config.can_expand),
            active: Vec::with_capacity(config.initial_pool_size),
            to_remove: Vec::with_capacity(population::REMOVAL_QUEUE_CAPACITY),
            blueprints: mapped,
            fallback,
            enemies_per_tick: config.enemies_per_tick,
            facing_threshold: config.facing_threshold,
            cursor: 0,
            bus,
        }
    }

    /// Draw an enemy of `enemy_type` from the pool and register it at `position`
    pub fn spawn(&mut self, enemy_type: EnemyType, position: Vec2) -> Result<PoolHandle, SpawnError> {
        let Some(blueprint) = self.blueprints.get(&enemy_type) else {
            tracing::error!(%enemy_type, "Spawn requested for a type without blueprint");
            return Err(SpawnError::UnknownEnemyType(enemy_type));
        };

        let handle = self.pool.acquire()?;
        let index = self.active.len();
        match self.pool.get_mut(handle) {
            Some(entity) => entity.reinitialize(blueprint, position, index),
            None => return Err(SpawnError::Pool(PoolError::UnknownHandle(handle))),
        }
        self.active.push(handle);

        tracing::debug!(%enemy_type, %handle, index, "Enemy spawned");
        Ok(handle)
    }

    /// Advance knockbacks, steer the next round-robin batch and remove the
    /// dying enemies it visited
    pub fn update(&mut self, dt: f32, target: Vec2, world: &dyn SpatialQuery) -> UpdateReport {
        let mut report = UpdateReport::default();

        for &handle in &self.active {
            if let Some(entity) = self.pool.get_mut(handle) {
                entity.tick_knockback(dt);
            }
        }

        let active_count = self.active.len();
        if active_count == 0 {
            self.cursor = 0;
            return report;
        }

        let budget = self.enemies_per_tick.min(active_count);
        self.to_remove.clear();

        for _ in 0..budget {
            if self.cursor >= active_count {
                self.cursor = 0;
            }
            let handle = self.active[self.cursor];
            self.cursor += 1;
            report.visited += 1;

            let Some(entity) = self.pool.get_mut(handle) else {
                continue;
            };
            if !entity.is_valid() || entity.is_knocking_back() {
                continue;
            }
            if entity.is_dying() {
                self.to_remove.push(handle);
                continue;
            }

            entity.steer(target, dt, world, self.fallback.as_mut(), self.facing_threshold);
            report.steered += 1;
        }

        if !self.to_remove.is_empty() {
            let queued = std::mem::take(&mut self.to_remove);
            for &handle in &queued {
                let experience = self.pool.get(handle).map_or(0, |e| e.experience);
                if self.remove(handle).is_ok() {
                    report.kills += 1;
                    report.experience += experience;
                }
            }
            self.to_remove = queued;

            self.bus.publish(EnemyDeathBatch {
                total_experience: report.experience,
                total_kills: report.kills,
            });
        }

        if self.cursor >= self.active.len() {
            self.cursor = 0;
        }

        report
    }

    /// Unregister an enemy and return it to the pool
    pub fn remove(&mut self, handle: PoolHandle) -> Result<(), RemovalError> {
        let stored = self.pool.get(handle).and_then(EnemyEntity::index);

        let index = match stored {
            Some(index) if self.active.get(index) == Some(&handle) => index,
            _ => {
                tracing::warn!(%handle, ?stored, "Stored registry index is stale, searching");
                match self.active.iter().position(|&h| h == handle) {
                    Some(index) => index,
                    None => {
                        tracing::error!(%handle, "Removal aborted, enemy is not registered");
                        return Err(RemovalError::InvalidIndex(handle));
                    }
                }
            }
        };

        self.active.swap_remove(index);
        if let Some(&moved) = self.active.get(index) {
            if let Some(entity) = self.pool.get_mut(moved) {
                entity.set_index(index);
            }
        }

        self.pool.release(handle)?;
        tracing::debug!(%handle, index, "Enemy removed");
        Ok(())
    }

    /// Damage an active enemy. Unknown or released handles are ignored.
    pub fn apply_damage(&mut self, handle: PoolHandle, amount: f32, source: Option<Vec2>) -> DamageOutcome {
        match self.pool.get_mut(handle) {
            Some(entity) => entity.apply_damage(amount, source),
            None => DamageOutcome::Ignored,
        }
    }

    /// Remove a random active enemy immediately. No death event is published.
    pub fn kill_random<R: Rng>(&mut self, rng: &mut R) -> Option<PoolHandle> {
        if self.active.is_empty() {
            tracing::info!("No active enemies to kill");
            return None;
        }

        let handle = self.active[rng.gen_range(0..self.active.len())];
        self.remove(handle).ok().map(|_| handle)
    }

    /// Return every active enemy to the pool
    pub fn clear(&mut self) {
        while let Some(handle) = self.active.pop() {
            if let Err(e) = self.pool.release(handle) {
                tracing::warn!(%handle, "Release during clear failed: {}", e);
            }
        }
        self.to_remove.clear();
        self.cursor = 0;
    }

    /// Colliders of the active enemies, for mirroring into a spatial world
    pub fn colliders(&self) -> impl Iterator<Item = Collider> + '_ {
        self.iter().map(|(handle, entity)| {
            Collider::new(
                handle.raw() as u64,
                entity.position,
                population::ENEMY_COLLIDER_RADIUS,
                LayerMask::ENEMIES,
                Tag::Enemy,
            )
        })
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn entity(&self, handle: PoolHandle) -> Option<&EnemyEntity> {
        self.pool.get(handle)
    }

    pub fn handle_at(&self, index: usize) -> Option<PoolHandle> {
        self.active.get(index).copied()
    }

    /// Active enemies in registry order
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &EnemyEntity)> + '_ {
        self.active
            .iter()
            .filter_map(move |&handle| self.pool.get(handle).map(|entity| (handle, entity)))
    }

    /// Registry position the next batch starts from
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn pool(&self) -> &Pool<EnemyEntity> {
        &self.pool
    }

    pub fn blueprint(&self, enemy_type: EnemyType) -> Option<&EnemyBlueprint> {
        self.blueprints.get(&enemy_type)
    }
}

impl Population for PopulationManager {
    fn active_count(&self) -> usize {
        PopulationManager::active_count(self)
    }

    fn spawn(&mut self, enemy_type: EnemyType, position: Vec2) -> Result<PoolHandle, SpawnError> {
        PopulationManager::spawn(self, enemy_type, position)
    }
}

impl std::fmt::Debug for PopulationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopulationManager")
            .field("active", &self.active.len())
            .field("pool", &self.pool)
            .field("cursor", &self.cursor)
            .field("enemies_per_tick", &self.enemies_per_tick)
            .finish()
    }
}
