//! Octahedral impostors
//!
//! A target is rendered from an `S × S` grid of directions over the upper
//! hemisphere into one albedo and one normal+depth atlas. At draw time a
//! camera-facing billboard picks the three atlas tiles nearest the current
//! view direction and blends them.

pub mod atlas;
pub mod baker;
pub mod material;
pub mod octahedral;
pub mod raster;
pub mod reconstruct;
pub mod shading;
pub mod target;

pub use atlas::{AtlasLayout, BakedAtlas, TileImage, TileRect};
pub use baker::{AtlasBakeConfig, AtlasBaker, TileRenderer, TileView};
pub use material::{ImpostorConfig, ImpostorMaterial, ImpostorUniforms, ShadingMode};
pub use octahedral::{FrameBasis, OctahedronMode, dir_to_grid, grid_to_dir};
pub use raster::SoftwareRasterizer;
pub use reconstruct::{Fragment, FragmentInput, Reconstructor, TileWeight, triangle_weights};
pub use shading::{HookPoint, ShaderExtension, ShaderProgram, ShaderStage};
pub use target::{AlphaMode, MeshPrimitive, SurfaceMaterial, TargetMesh, procedural_tree};
