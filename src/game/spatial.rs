//! Spatial query capability consumed by steering
//!
//! Steering only needs two questions answered: "what does a short ray hit"
//! and "who is within this radius". `SpatialQuery` is that seam; hosts with a
//! physics engine implement it over their engine. `CollisionWorld` is the
//! in-process implementation: static circle obstacles plus a spatial hash of
//! dynamic colliders (enemies, the player) re-synced every tick.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::game::constants::steering::MAX_OVERLAP_RESULTS;
use crate::util::vec2::Vec2;

/// Default cell size for the dynamic collider grid (world units)
pub const DEFAULT_GRID_CELL_SIZE: f32 = 2.0;

/// Initial capacity for grid cells (number of expected non-empty cells)
const GRID_INITIAL_CAPACITY: usize = 256;

/// Initial capacity for collider vectors within cells
const CELL_INITIAL_CAPACITY: usize = 8;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// Bounded result buffer for overlap queries
pub type OverlapResults = SmallVec<[Collider; MAX_OVERLAP_RESULTS]>;

/// Gameplay tag attached to a collider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    #[default]
    Untagged,
    Player,
    Enemy,
    Obstacle,
}

/// Bit set of physics layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const DEFAULT: LayerMask = LayerMask(1 << 0);
    pub const OBSTACLES: LayerMask = LayerMask(1 << 1);
    pub const ENEMIES: LayerMask = LayerMask(1 << 2);
    pub const PLAYER: LayerMask = LayerMask(1 << 3);
    pub const ALL: LayerMask = LayerMask(u32::MAX);

    #[inline]
    pub const fn union(self, other: LayerMask) -> LayerMask {
        LayerMask(self.0 | other.0)
    }

    #[inline]
    pub const fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Circle collider on the ground plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub id: u64,
    pub position: Vec2,
    pub radius: f32,
    pub layer: LayerMask,
    pub tag: Tag,
    pub is_trigger: bool,
}

impl Collider {
    pub fn new(id: u64, position: Vec2, radius: f32, layer: LayerMask, tag: Tag) -> Self {
        Self {
            id,
            position,
            radius,
            layer,
            tag,
            is_trigger: false,
        }
    }

    pub fn trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }
}

/// Nearest ray intersection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec2,
    /// Unit surface normal at `point`
    pub normal: Vec2,
    pub distance: f32,
    pub tag: Tag,
    pub is_trigger: bool,
}

/// Spatial queries answered by the host world
pub trait SpatialQuery {
    /// Nearest collider on `mask` hit by the ray within `max_distance`.
    /// Colliders containing `origin` are not reported.
    fn raycast(&self, origin: Vec2, direction: Vec2, max_distance: f32, mask: LayerMask)
        -> Option<RayHit>;

    /// Colliders on `mask` overlapping the circle, at most `MAX_OVERLAP_RESULTS`
    fn overlap_circle(&self, center: Vec2, radius: f32, mask: LayerMask, out: &mut OverlapResults);
}

/// World with nothing in it
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyWorld;

impl SpatialQuery for EmptyWorld {
    fn raycast(&self, _: Vec2, _: Vec2, _: f32, _: LayerMask) -> Option<RayHit> {
        None
    }

    fn overlap_circle(&self, _: Vec2, _: f32, _: LayerMask, _: &mut OverlapResults) {}
}

/// Distance along a unit ray to a circle, with the surface normal.
/// Rays starting inside the circle report nothing.
fn ray_circle(origin: Vec2, direction: Vec2, max_distance: f32, collider: &Collider) -> Option<(f32, Vec2)> {
    let f = origin - collider.position;
    let c = f.length_sq() - collider.radius * collider.radius;
    if c <= 0.0 {
        return None;
    }

    let b = f.dot(direction);
    if b > 0.0 {
        // Pointing away from the circle
        return None;
    }

    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    let t = -b - discriminant.sqrt();
    if t < 0.0 || t > max_distance {
        return None;
    }

    let point = origin + direction * t;
    Some((t, (point - collider.position).normalize()))
}

/// Static obstacles plus a spatial hash of dynamic colliders
#[derive(Debug)]
pub struct CollisionWorld {
    /// Cell size in world units
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    statics: Vec<Collider>,
    /// Map from cell key to dynamic colliders in that cell
    cells: HashMap<CellKey, Vec<Collider>>,
    /// Largest dynamic radius seen since the last clear (widens cell scans)
    max_dynamic_radius: f32,
    dynamic_count: usize,
}

impl CollisionWorld {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            statics: Vec::new(),
            cells: HashMap::with_capacity(GRID_INITIAL_CAPACITY),
            max_dynamic_radius: 0.0,
            dynamic_count: 0,
        }
    }

    pub fn add_static(&mut self, collider: Collider) {
        self.statics.push(collider);
    }

    pub fn statics(&self) -> &[Collider] {
        &self.statics
    }

    /// Remove all dynamic colliders, keeping cell allocations
    pub fn clear_dynamic(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
        self.max_dynamic_radius = 0.0;
        self.dynamic_count = 0;
    }

    pub fn insert_dynamic(&mut self, collider: Collider) {
        let key = self.position_to_cell(collider.position);
        self.cells
            .entry(key)
            .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
            .push(collider);
        self.max_dynamic_radius = self.max_dynamic_radius.max(collider.radius);
        self.dynamic_count += 1;
    }

    /// Replace all dynamic colliders. Cells left empty by the previous sync
    /// are dropped so the map follows the population across the plane.
    pub fn sync_dynamic(&mut self, colliders: impl IntoIterator<Item = Collider>) {
        self.cells.retain(|_, cell| !cell.is_empty());
        self.clear_dynamic();
        for collider in colliders {
            self.insert_dynamic(collider);
        }
    }

    pub fn dynamic_count(&self) -> usize {
        self.dynamic_count
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Allocated grid cells, including ones emptied by the last clear
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn position_to_cell(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    /// Dynamic colliders in every cell touched by the box, in cell order
    fn dynamic_in_box(&self, min: Vec2, max: Vec2) -> impl Iterator<Item = &Collider> {
        let pad = Vec2::new(self.max_dynamic_radius, self.max_dynamic_radius);
        let (x0, y0) = self.position_to_cell(min - pad);
        let (x1, y1) = self.position_to_cell(max + pad);

        (y0..=y1).flat_map(move |cy| {
            (x0..=x1).flat_map(move |cx| {
                self.cells
                    .get(&(cx, cy))
                    .into_iter()
                    .flat_map(|cell| cell.iter())
            })
        })
    }
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_CELL_SIZE)
    }
}

impl SpatialQuery for CollisionWorld {
    fn raycast(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<RayHit> {
        let direction = direction.normalize();
        if direction == Vec2::ZERO || max_distance <= 0.0 {
            return None;
        }

        let end = origin + direction * max_distance;
        let min = origin.min_components(end);
        let max = origin.max_components(end);

        self.statics
            .iter()
            .chain(self.dynamic_in_box(min, max))
            .filter(|collider| collider.layer.intersects(mask))
            .filter_map(|collider| {
                ray_circle(origin, direction, max_distance, collider).map(|(distance, normal)| RayHit {
                    point: origin + direction * distance,
                    normal,
                    distance,
                    tag: collider.tag,
                    is_trigger: collider.is_trigger,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn overlap_circle(&self, center: Vec2, radius: f32, mask: LayerMask, out: &mut OverlapResults) {
        out.clear();
        let extent = Vec2::new(radius, radius);

        for collider in self
            .statics
            .iter()
            .chain(self.dynamic_in_box(center - extent, center + extent))
        {
            if out.len() >= MAX_OVERLAP_RESULTS {
                break;
            }
            if !collider.layer.intersects(mask) {
                continue;
            }
            let reach = radius + collider.radius;
            if center.distance_sq_to(collider.position) <= reach * reach {
                out.push(*collider);
            }
        }
    }
}
