/// Object pool defaults
pub mod pool {
    /// Instances pre-warmed when the population is created
    pub const INITIAL_SIZE: usize = 250;
    /// Whether the enemy pool may grow past its initial size
    pub const CAN_EXPAND: bool = true;
}

/// Population scheduler defaults
pub mod population {
    /// Entities whose steering is recomputed per tick (round-robin budget)
    pub const ENEMIES_PER_TICK: usize = 5;
    /// Minimum direction magnitude before the entity turns to face it
    pub const FACING_THRESHOLD: f32 = 0.01;
    /// Initial capacity of the per-tick removal queue
    pub const REMOVAL_QUEUE_CAPACITY: usize = 50;
    /// Collider radius used when enemies are mirrored into a spatial world
    pub const ENEMY_COLLIDER_RADIUS: f32 = 0.25;
}

/// Steering (pursuit) defaults
pub mod steering {
    /// Length of the obstacle probe ray
    pub const AVOIDANCE_CHECK_DISTANCE: f32 = 1.0;
    /// Neighbor search radius for flock separation
    pub const SEPARATION_RADIUS: f32 = 0.2;
    /// Weight of the separation force blended into the seek direction
    pub const SEPARATION_WEIGHT: f32 = 0.25;
    /// Lower clamp on neighbor distance so close neighbors don't explode the force
    pub const MIN_SEPARATION_DISTANCE: f32 = 0.1;
    /// Exponential smoothing rate of the output direction (per second)
    pub const DIRECTION_LERP_SPEED: f32 = 10.0;
    /// Entities closer than this to their target stop moving
    pub const STOP_DISTANCE: f32 = 0.5;
    /// Upper bound on neighbors returned by a single overlap query
    pub const MAX_OVERLAP_RESULTS: usize = 8;
}

/// Knockback defaults
pub mod knockback {
    /// Displacement applied by a single hit (world units)
    pub const DISTANCE: f32 = 0.75;
    /// Duration of the eased displacement (seconds)
    pub const DURATION: f32 = 0.2;
}

/// Wave director defaults
pub mod wave {
    /// Seconds between spawn-group evaluations while a wave is active
    pub const EVALUATION_INTERVAL: f32 = 0.1;
    /// Pre-delay of the built-in waves (seconds)
    pub const DEFAULT_PRE_DELAY: f32 = 10.0;
    /// Concurrent population cap of the built-in waves
    pub const DEFAULT_MAX_ENEMIES: usize = 50;
}

/// Ring spawner defaults
pub mod spawn {
    /// Closest spawn distance from the player
    pub const MIN_RADIUS: f32 = 15.0;
    /// Farthest spawn distance from the player
    pub const MAX_RADIUS: f32 = 25.0;
    /// Full width of the cone in front of the player where nothing spawns (degrees)
    pub const EXCLUSION_ANGLE_DEG: f32 = 45.0;
    /// Attempts to find a position outside the exclusion cone
    pub const MAX_TRIES: u32 = 2;
}

/// Simulation clock defaults
pub mod clock {
    /// Fixed tick rate of the headless runner in Hz
    pub const TICK_RATE: u32 = 50;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / TICK_RATE as f32;
    /// Safety limit on ticks simulated by the headless runner
    pub const MAX_TICKS: u64 = 60_000;
}
