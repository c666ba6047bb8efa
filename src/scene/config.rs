//! Scene configuration loaded from JSON

use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::impostor::material::ImpostorConfig;
use crate::scene::lod::LodConfig;
use crate::terrain::config::TerrainConfig;
use crate::terrain::sampler::SamplerConfig;

/// Everything needed to assemble a forest scene
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Directory the asset paths are relative to
    pub asset_dir: PathBuf,
    /// Tree model (glTF or GLB)
    pub model: PathBuf,
    /// Ground colour texture
    pub ground_texture: PathBuf,
    /// Ground tint, linear RGB
    pub ground_color: Vec3,
    /// Ground texture repeats across one chunk-grid span
    pub ground_texture_repeat: f32,
    pub tree_count: u32,
    pub terrain: TerrainConfig,
    pub sampler: SamplerConfig,
    pub impostor: ImpostorConfig,
    pub lod: LodConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("assets"),
            model: PathBuf::from("Pine_5.gltf"),
            ground_texture: PathBuf::from("grass.jpg"),
            ground_color: Vec3::splat(0x88 as f32 / 255.0),
            ground_texture_repeat: 50.0,
            tree_count: 200_000,
            terrain: TerrainConfig::default(),
            sampler: SamplerConfig::default(),
            impostor: ImpostorConfig {
                alpha_clamp: 0.5,
                sprites_per_side: 24,
                texture_size: 3072,
                transform: Mat4::IDENTITY,
                ..Default::default()
            },
            lod: LodConfig::default(),
        }
    }
}

impl SceneConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.terrain.validate()?;
        self.impostor.validate()?;
        self.lod.validate()?;
        if !(self.ground_texture_repeat.is_finite() && self.ground_texture_repeat > 0.0) {
            return Err(Error::config("ground_texture_repeat must be positive"));
        }
        Ok(())
    }
}
