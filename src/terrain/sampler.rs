//! Surface sampling for tree placement
//!
//! Rejection-samples positions over the union of resident chunk footprints,
//! evaluating the same height field the chunk meshes were built from.

use std::f32::consts::TAU;

use glam::{Mat4, Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::terrain::store::TerrainChunkStore;

/// Acceptance rules for a candidate position
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementPolicy {
    /// Reject positions below this elevation
    pub min_height: Option<f64>,
    /// Reject positions above this elevation
    pub max_height: Option<f64>,
    /// Reject positions steeper than this (degrees from horizontal)
    pub max_slope_degrees: f64,
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self {
            min_height: None,
            max_height: None,
            max_slope_degrees: 90.0,
        }
    }
}

impl PlacementPolicy {
    pub fn accepts(&self, height: f64, slope_radians: f64) -> bool {
        if self.min_height.is_some_and(|min| height < min) {
            return false;
        }
        if self.max_height.is_some_and(|max| height > max) {
            return false;
        }
        slope_radians <= self.max_slope_degrees.to_radians()
    }

    fn needs_slope(&self) -> bool {
        self.max_slope_degrees < 90.0
    }
}

/// Configuration for [`SurfaceSampler`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Fixed seed for reproducible placement; `None` draws from OS entropy
    pub seed: Option<u64>,
    pub policy: PlacementPolicy,
    /// Rejection budget per requested position
    pub max_attempts_per_sample: u32,
    /// Finite-difference step for slope estimation (world units)
    pub slope_epsilon: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            seed: Some(42),
            policy: PlacementPolicy::default(),
            max_attempts_per_sample: 64,
            slope_epsilon: 1.0,
        }
    }
}

/// Draws object placement positions on the generated terrain surface.
pub struct SurfaceSampler<'a> {
    store: &'a TerrainChunkStore,
    config: SamplerConfig,
}

impl<'a> SurfaceSampler<'a> {
    pub fn new(store: &'a TerrainChunkStore, config: SamplerConfig) -> Self {
        Self { store, config }
    }

    /// Generate exactly `count` accepted positions `(x, height(x, z), z)`.
    ///
    /// Every position lies inside a resident chunk. Fails with
    /// [`Error::SamplingExhausted`] once `count * max_attempts_per_sample`
    /// candidates have been drawn without reaching `count`.
    pub fn generate_trees(&self, count: u32) -> Result<Vec<Vec3>> {
        let chunks = self.store.chunks();
        if chunks.is_empty() {
            return Err(Error::config("tree placement requires at least one generated chunk"));
        }
        if self.config.max_attempts_per_sample == 0 {
            return Err(Error::config("max_attempts_per_sample must be >= 1"));
        }

        let footprints: Vec<(f64, f64, f64, f64)> = chunks.iter().map(|c| c.footprint()).collect();
        let field = self.store.height_field();
        let policy = self.config.policy;
        let budget = count as u64 * self.config.max_attempts_per_sample as u64;
        let mut rng = self.rng();
        let mut positions = Vec::with_capacity(count as usize);
        let mut attempts = 0u64;

        while positions.len() < count as usize {
            if attempts >= budget {
                return Err(Error::SamplingExhausted {
                    requested: count,
                    accepted: positions.len() as u32,
                    attempts,
                });
            }
            attempts += 1;

            let (x0, z0, x1, z1) = footprints[rng.gen_range(0..footprints.len())];
            // Round to the output precision first so y is exactly height(x, z).
            let x = rng.gen_range(x0..x1) as f32 as f64;
            let z = rng.gen_range(z0..z1) as f32 as f64;
            let height = field.height(x, z);
            let slope = if policy.needs_slope() {
                field.slope_at(x, z, self.config.slope_epsilon)
            } else {
                0.0
            };

            if policy.accepts(height, slope) {
                positions.push(Vec3::new(x as f32, height as f32, z as f32));
            }
        }

        log::info!(
            "Placed {} trees over {} chunks ({} candidates drawn)",
            positions.len(),
            footprints.len(),
            attempts
        );
        Ok(positions)
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}

/// Per-tree transform variation applied on top of a placement position
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceTransform {
    pub position: Vec3,
    /// Rotation about Y in radians, `[0, 2π)`
    pub yaw: f32,
    /// Lean about X in radians, `[-0.25, 0.25)`
    pub tilt: f32,
    /// Uniform scale, `[0.75, 1.25)`
    pub scale: f32,
}

impl InstanceTransform {
    pub fn to_matrix(&self) -> Mat4 {
        let rotation = Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.tilt);
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), rotation, self.position)
    }
}

/// Randomise yaw, tilt and scale for each placement.
pub fn scatter_instances(positions: &[Vec3], seed: Option<u64>) -> Vec<InstanceTransform> {
    let mut rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    positions
        .iter()
        .map(|&position| InstanceTransform {
            position,
            yaw: rng.gen_range(0.0..TAU),
            tilt: rng.gen_range(-0.25..0.25),
            scale: rng.gen_range(0.75..1.25),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::config::TerrainConfig;

    fn store_with_chunk() -> TerrainChunkStore {
        let mut store = TerrainChunkStore::new(TerrainConfig {
            max_chunks_x: 2,
            max_chunks_z: 2,
            segments: 8,
            ..Default::default()
        }).unwrap();
        store.add_chunk(0, 0);
        store
    }

    #[test]
    fn test_generate_1000_on_surface() {
        let store = store_with_chunk();
        let sampler = SurfaceSampler::new(&store, SamplerConfig::default());
        let positions = sampler.generate_trees(1000).unwrap();
        assert_eq!(positions.len(), 1000);

        let chunk = store.get(0, 0).unwrap();
        for p in &positions {
            let expected = store.height_at(p.x as f64, p.z as f64) as f32;
            assert!((p.y - expected).abs() <= 1e-4, "{p:?} vs {expected}");
            assert!(chunk.bounds().contains_xz(p.x, p.z));
        }
    }

    #[test]
    fn test_seeded_placement_is_reproducible() {
        let store = store_with_chunk();
        let config = SamplerConfig { seed: Some(7), ..Default::default() };
        let a = SurfaceSampler::new(&store, config.clone()).generate_trees(50).unwrap();
        let b = SurfaceSampler::new(&store, config).generate_trees(50).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_union_covers_every_chunk() {
        let mut store = store_with_chunk();
        store.add_chunk(5, 5);
        let positions = SurfaceSampler::new(&store, SamplerConfig::default())
            .generate_trees(400)
            .unwrap();
        let in_far = positions.iter().filter(|p| p.x >= 640.0 && p.z >= 640.0).count();
        assert!(in_far > 100 && in_far < 300, "{in_far}");
    }

    #[test]
    fn test_empty_store_is_configuration_error() {
        let store = TerrainChunkStore::new(TerrainConfig::default()).unwrap();
        let result = SurfaceSampler::new(&store, SamplerConfig::default()).generate_trees(1);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_impossible_policy_exhausts() {
        let store = store_with_chunk();
        let config = SamplerConfig {
            policy: PlacementPolicy { min_height: Some(1.0e9), ..Default::default() },
            max_attempts_per_sample: 4,
            ..Default::default()
        };
        let result = SurfaceSampler::new(&store, config).generate_trees(10);
        match result {
            Err(Error::SamplingExhausted { requested, accepted, attempts }) => {
                assert_eq!(requested, 10);
                assert_eq!(accepted, 0);
                assert_eq!(attempts, 40);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn test_height_window_policy() {
        let store = store_with_chunk();
        let chunk = store.get(0, 0).unwrap();
        let mid = ((chunk.bounds().min.y + chunk.bounds().max.y) * 0.5) as f64;
        let config = SamplerConfig {
            policy: PlacementPolicy { min_height: Some(mid), ..Default::default() },
            ..Default::default()
        };
        let positions = SurfaceSampler::new(&store, config).generate_trees(100).unwrap();
        assert!(positions.iter().all(|p| p.y as f64 >= mid - 1e-3));
    }

    #[test]
    fn test_policy_accepts() {
        let policy = PlacementPolicy {
            min_height: Some(0.0),
            max_height: Some(10.0),
            max_slope_degrees: 30.0,
        };
        assert!(policy.accepts(5.0, 0.1));
        assert!(!policy.accepts(-1.0, 0.1));
        assert!(!policy.accepts(11.0, 0.1));
        assert!(!policy.accepts(5.0, 45f64.to_radians()));
    }

    #[test]
    fn test_scatter_instances_ranges() {
        let positions = vec![Vec3::new(1.0, 2.0, 3.0); 200];
        let instances = scatter_instances(&positions, Some(1));
        assert_eq!(instances.len(), 200);
        for inst in &instances {
            assert_eq!(inst.position, Vec3::new(1.0, 2.0, 3.0));
            assert!((0.0..TAU).contains(&inst.yaw));
            assert!((-0.25..0.25).contains(&inst.tilt));
            assert!((0.75..1.25).contains(&inst.scale));
        }
        let m = instances[0].to_matrix();
        assert!((m.transform_point3(Vec3::ZERO) - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
    }
}
