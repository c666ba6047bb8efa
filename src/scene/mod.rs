//! Forest scene: configuration, render settings, asset loading, LOD and assembly

pub mod assets;
pub mod config;
pub mod forest;
pub mod lod;
pub mod settings;

pub use assets::{AssetLoader, FsAssetLoader};
pub use config::SceneConfig;
pub use forest::{ForestScene, ForestTrees, GroundMaterial, LoadOutcome, Omitted};
pub use lod::{GeometrySimplifier, LodChain, LodConfig, LodGeometry, LodTier, VertexClusterSimplifier};
pub use settings::{RenderSettings, SunPose, SunRig};
