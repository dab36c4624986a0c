//! Horde Simulation Library
//!
//! Engine-independent core of a wave-based action game's enemy population:
//! a pre-warmed object pool, a round-robin steering scheduler, pursuit
//! steering with obstacle avoidance and separation, and a wave director that
//! feeds the population over time.
//!
//! `game::simulation::Simulation` wires everything together and is advanced
//! with `tick(dt)`. Hosts with their own physics implement
//! `game::spatial::SpatialQuery` and drive `PopulationManager` and
//! `WaveDirector` directly.

pub mod config;
pub mod events;
pub mod game;
pub mod metrics;
pub mod util;
