//! Forest scene assembly
//!
//! Loads the tree model and ground texture, fills the terrain grid, places
//! trees on the surface and prepares the tree's level-of-detail chain.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use image::RgbaImage;

use crate::core::{Error, Result};
use crate::impostor::material::ImpostorMaterial;
use crate::impostor::raster::SoftwareRasterizer;
use crate::impostor::target::TargetMesh;
use crate::scene::assets::AssetLoader;
use crate::scene::config::SceneConfig;
use crate::scene::lod::{LodChain, VertexClusterSimplifier};
use crate::scene::settings::RenderSettings;
use crate::terrain::sampler::{InstanceTransform, SurfaceSampler, scatter_instances};
use crate::terrain::store::TerrainChunkStore;

/// Scene content left out because its asset failed to load
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Omitted {
    Trees,
    GroundTexture,
}

impl fmt::Display for Omitted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Omitted::Trees => write!(f, "trees"),
            Omitted::GroundTexture => write!(f, "ground texture"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LoadOutcome {
    #[default]
    Complete,
    Partial { omitted: Vec<Omitted> },
}

impl LoadOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, LoadOutcome::Complete)
    }

    fn omit(&mut self, what: Omitted) {
        match self {
            LoadOutcome::Complete => *self = LoadOutcome::Partial { omitted: vec![what] },
            LoadOutcome::Partial { omitted } => omitted.push(what),
        }
    }
}

/// Tinted, repeating ground surface
#[derive(Clone, Debug)]
pub struct GroundMaterial {
    pub color: Vec3,
    pub texture: Option<Arc<RgbaImage>>,
    pub repeat: f32,
}

/// Placed and prepared trees sharing one model
pub struct ForestTrees {
    pub instances: Vec<InstanceTransform>,
    pub lod: LodChain,
}

/// A fully prepared forest, ready to hand to a renderer
pub struct ForestScene {
    settings: RenderSettings,
    terrain: TerrainChunkStore,
    ground: GroundMaterial,
    trees: Option<ForestTrees>,
    outcome: LoadOutcome,
}

impl ForestScene {
    /// Run the full load sequence.
    ///
    /// Configuration problems are returned as errors. A model or ground
    /// texture that cannot be loaded is logged and the scene completes
    /// without it, reported through [`ForestScene::outcome`].
    pub async fn load<L: AssetLoader>(config: &SceneConfig, settings: RenderSettings, loader: &L) -> Result<Self> {
        config.validate()?;
        let start = Instant::now();
        let mut outcome = LoadOutcome::Complete;

        let (model, texture) = tokio::join!(
            loader.load_model(&config.model),
            loader.load_texture(&config.ground_texture)
        );
        let model = tolerate(model, Omitted::Trees, &mut outcome)?;
        let texture = tolerate(texture, Omitted::GroundTexture, &mut outcome)?;

        let mut terrain = TerrainChunkStore::new(config.terrain.clone())?;
        terrain.populate_centered()?;

        let trees = match model {
            Some(mesh) => Some(Self::prepare_trees(config, &terrain, mesh)?),
            None => None,
        };

        let scene = Self {
            settings,
            terrain,
            ground: GroundMaterial {
                color: config.ground_color,
                texture,
                repeat: config.ground_texture_repeat,
            },
            trees,
            outcome,
        };
        log::info!(
            "Forest scene ready in {:.2}s: {} chunks, {} trees{}",
            start.elapsed().as_secs_f64(),
            scene.terrain.len(),
            scene.tree_count(),
            match &scene.outcome {
                LoadOutcome::Complete => String::new(),
                LoadOutcome::Partial { omitted } => format!(
                    " (omitted: {})",
                    omitted.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                ),
            }
        );
        Ok(scene)
    }

    fn prepare_trees(config: &SceneConfig, terrain: &TerrainChunkStore, mesh: TargetMesh) -> Result<ForestTrees> {
        if mesh.is_empty() {
            return Err(Error::config("tree model contains no triangles"));
        }
        let positions = SurfaceSampler::new(terrain, config.sampler.clone()).generate_trees(config.tree_count)?;
        // Offset so variation does not correlate with placement
        let variation_seed = config.sampler.seed.map(|seed| seed.wrapping_add(1));
        let instances = scatter_instances(&positions, variation_seed);

        let bake_start = Instant::now();
        let mesh = Arc::new(mesh);
        let impostor = ImpostorMaterial::create_impostor(&SoftwareRasterizer::new(&mesh), config.impostor)?;
        log::info!(
            "Baked {}x{} impostor atlas in {:.2}s",
            config.impostor.texture_size,
            config.impostor.texture_size,
            bake_start.elapsed().as_secs_f64()
        );

        let lod = LodChain::assemble(mesh, &VertexClusterSimplifier, impostor, &config.lod)?;
        Ok(ForestTrees { instances, lod })
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn terrain(&self) -> &TerrainChunkStore {
        &self.terrain
    }

    pub fn ground(&self) -> &GroundMaterial {
        &self.ground
    }

    pub fn trees(&self) -> Option<&ForestTrees> {
        self.trees.as_ref()
    }

    pub fn tree_count(&self) -> usize {
        self.trees.as_ref().map_or(0, |t| t.instances.len())
    }

    pub fn outcome(&self) -> &LoadOutcome {
        &self.outcome
    }
}

fn tolerate<T>(result: Result<T>, what: Omitted, outcome: &mut LoadOutcome) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_resource_error() => {
            log::error!("Failed to load {}: {}", what, e);
            outcome.omit(what);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use glam::Vec4;

    use crate::impostor::material::ImpostorConfig;
    use crate::impostor::target::procedural_tree;
    use crate::scene::lod::LodTier;
    use crate::terrain::config::TerrainConfig;

    struct StubLoader {
        model: bool,
        texture: bool,
    }

    impl AssetLoader for StubLoader {
        async fn load_model(&self, path: &Path) -> Result<TargetMesh> {
            if self.model {
                procedural_tree(10.0, Vec4::new(0.4, 0.2, 0.1, 1.0), Vec4::new(0.1, 0.6, 0.1, 1.0))
            } else {
                Err(Error::resource(path, "not found"))
            }
        }

        async fn load_texture(&self, path: &Path) -> Result<Arc<RgbaImage>> {
            if self.texture {
                Ok(Arc::new(RgbaImage::new(2, 2)))
            } else {
                Err(Error::resource(path, "not found"))
            }
        }
    }

    fn small_config() -> SceneConfig {
        SceneConfig {
            tree_count: 40,
            terrain: TerrainConfig { max_chunks_x: 2, max_chunks_z: 2, segments: 8, ..Default::default() },
            impostor: ImpostorConfig { sprites_per_side: 4, texture_size: 64, alpha_clamp: 0.5, ..Default::default() },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_complete_load() {
        crate::core::logging::try_init();
        let loader = StubLoader { model: true, texture: true };
        let scene = ForestScene::load(&small_config(), RenderSettings::default(), &loader).await.unwrap();

        assert!(scene.outcome().is_complete());
        assert_eq!(scene.terrain().len(), 4);
        assert_eq!(scene.tree_count(), 40);
        assert!(scene.ground().texture.is_some());

        let trees = scene.trees().unwrap();
        let extents = scene.terrain().extents().unwrap();
        for instance in &trees.instances {
            assert!(extents.contains_xz(instance.position.x, instance.position.z));
        }
        assert_eq!(trees.lod.tier_for_distance(100.0), LodTier::Impostor);
    }

    #[tokio::test]
    async fn test_missing_model_omits_trees() {
        crate::core::logging::try_init();
        let loader = StubLoader { model: false, texture: true };
        let scene = ForestScene::load(&small_config(), RenderSettings::default(), &loader).await.unwrap();
        assert_eq!(scene.outcome(), &LoadOutcome::Partial { omitted: vec![Omitted::Trees] });
        assert!(scene.trees().is_none());
        assert_eq!(scene.terrain().len(), 4);
    }

    #[tokio::test]
    async fn test_missing_everything_still_builds_terrain() {
        let loader = StubLoader { model: false, texture: false };
        let scene = ForestScene::load(&small_config(), RenderSettings::default(), &loader).await.unwrap();
        assert_eq!(
            scene.outcome(),
            &LoadOutcome::Partial { omitted: vec![Omitted::Trees, Omitted::GroundTexture] }
        );
        assert!(scene.ground().texture.is_none());
        assert_eq!(scene.ground().repeat, 50.0);
    }

    #[tokio::test]
    async fn test_configuration_errors_are_returned() {
        let loader = StubLoader { model: true, texture: true };
        let mut config = small_config();
        config.impostor.texture_size = 65;
        let result = ForestScene::load(&config, RenderSettings::default(), &loader).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_seeded_load_is_reproducible() {
        let loader = StubLoader { model: true, texture: true };
        let a = ForestScene::load(&small_config(), RenderSettings::default(), &loader).await.unwrap();
        let b = ForestScene::load(&small_config(), RenderSettings::default(), &loader).await.unwrap();
        assert_eq!(a.trees().unwrap().instances, b.trees().unwrap().instances);
    }
}
