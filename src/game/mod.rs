pub mod constants;
pub mod curve;
pub mod enemy;
pub mod pool;
pub mod population;
pub mod simulation;
pub mod spatial;
pub mod spawn;
pub mod steering;
pub mod wave;
