//! Canopy - procedural forest terrain with octahedral impostors

pub mod core;
pub mod math;
pub mod terrain;
pub mod impostor;
pub mod scene;
