//! Octahedral impostor material: options, GPU uniforms and shader extension

use std::collections::BTreeMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::impostor::atlas::BakedAtlas;
use crate::impostor::baker::{AtlasBakeConfig, AtlasBaker, TileRenderer};
use crate::impostor::octahedral::OctahedronMode;
use crate::impostor::reconstruct::Reconstructor;
use crate::impostor::shading::{HookPoint, ShaderExtension, ShaderStage, TextureSlot, UniformValue};

const VARYINGS: &str = include_str!("../../shaders/impostor_varyings.wgsl");
const PARAMS_VERTEX: &str = include_str!("../../shaders/impostor_params_vertex.wgsl");
const VERTEX: &str = include_str!("../../shaders/impostor_vertex.wgsl");
const PARAMS_FRAGMENT: &str = include_str!("../../shaders/impostor_params_fragment.wgsl");
const MAP_FRAGMENT: &str = include_str!("../../shaders/impostor_map_fragment.wgsl");
const NORMAL_FRAGMENT: &str = include_str!("../../shaders/impostor_normal_fragment.wgsl");

/// How reconstructed fragments are lit; fixed when the material is created
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadingMode {
    Unlit,
    /// Lit with the billboard's geometric normal
    LitNoNormal,
    /// Lit with the baked normals
    #[default]
    LitWithNormal,
    /// Baked normals plus occlusion/roughness/metalness
    LitWithNormalAndOrm,
}

impl ShadingMode {
    pub fn is_lit(self) -> bool {
        !matches!(self, ShadingMode::Unlit)
    }

    pub fn uses_normal_map(self) -> bool {
        matches!(self, ShadingMode::LitWithNormal | ShadingMode::LitWithNormalAndOrm)
    }

    pub fn uses_orm(self) -> bool {
        matches!(self, ShadingMode::LitWithNormalAndOrm)
    }

    pub fn ensure_supported(self) -> Result<()> {
        if self.uses_orm() {
            return Err(Error::Unsupported(
                "ORM shading needs an occlusion/roughness/metalness atlas layer, which is not baked".into(),
            ));
        }
        Ok(())
    }
}

/// Options for an impostor material
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpostorConfig {
    pub octahedron: OctahedronMode,
    pub transparent: bool,
    /// Fragments whose blended alpha falls below this are discarded
    pub alpha_clamp: f32,
    pub sprites_per_side: u32,
    pub texture_size: u32,
    pub shading: ShadingMode,
    /// Strength of the depth-based parallax correction; 0 disables it
    pub parallax_scale: f32,
    /// Object to impostor space
    pub transform: Mat4,
}

impl Default for ImpostorConfig {
    fn default() -> Self {
        Self {
            octahedron: OctahedronMode::Hemi,
            transparent: false,
            alpha_clamp: 0.4,
            sprites_per_side: 16,
            texture_size: 2048,
            shading: ShadingMode::LitWithNormal,
            parallax_scale: 0.0,
            transform: Mat4::IDENTITY,
        }
    }
}

impl ImpostorConfig {
    pub fn bake_config(&self) -> AtlasBakeConfig {
        AtlasBakeConfig {
            sprites_per_side: self.sprites_per_side,
            texture_size: self.texture_size,
            alpha_clamp: self.alpha_clamp,
            transparent: self.transparent,
            octahedron: self.octahedron,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.bake_config().validate()?;
        self.shading.ensure_supported()?;
        if !self.parallax_scale.is_finite() {
            return Err(Error::config("parallax_scale must be finite"));
        }
        if !self.transform.is_finite() || self.transform.determinant().abs() <= f32::EPSILON {
            return Err(Error::config("impostor transform must be finite and invertible"));
        }
        Ok(())
    }
}

/// Uniform block matching `ImpostorUniforms` in the impostor WGSL chunks
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ImpostorUniforms {
    pub transform: [[f32; 4]; 4],
    /// Bounding sphere centre (xyz) and radius (w)
    pub bounds: [f32; 4],
    pub sprites_per_side: u32,
    pub alpha_clamp: f32,
    pub parallax_scale: f32,
    pub flags: u32,
}

impl ImpostorUniforms {
    pub const FLAG_HEMI: u32 = 1 << 0;
    pub const FLAG_TRANSPARENT: u32 = 1 << 1;
    pub const FLAG_NORMAL: u32 = 1 << 2;
    pub const FLAG_ORM: u32 = 1 << 3;
}

/// Material drawing a baked atlas on camera-facing billboards
#[derive(Clone)]
pub struct ImpostorMaterial {
    atlas: Arc<BakedAtlas>,
    config: ImpostorConfig,
}

impl ImpostorMaterial {
    pub fn new(atlas: Arc<BakedAtlas>, config: ImpostorConfig) -> Result<Self> {
        config.validate()?;
        let layout = atlas.layout();
        if layout.sprites_per_side() != config.sprites_per_side {
            return Err(Error::config(format!(
                "atlas has {} sprites per side but the material expects {}",
                layout.sprites_per_side(),
                config.sprites_per_side
            )));
        }
        if atlas.mode() != config.octahedron {
            return Err(Error::config("atlas octahedron mode differs from the material's"));
        }
        Ok(Self { atlas, config })
    }

    /// Bake an atlas for `renderer` and wrap it in a material.
    pub fn create_impostor(renderer: &dyn TileRenderer, config: ImpostorConfig) -> Result<Self> {
        config.validate()?;
        let atlas = AtlasBaker::new(config.bake_config())?.bake(renderer)?;
        Self::new(Arc::new(atlas), config)
    }

    pub fn atlas(&self) -> &Arc<BakedAtlas> {
        &self.atlas
    }

    pub fn config(&self) -> &ImpostorConfig {
        &self.config
    }

    pub fn reconstructor(&self) -> Reconstructor {
        Reconstructor::new(self.atlas.clone(), &self.config)
    }

    pub fn uniforms(&self) -> ImpostorUniforms {
        let bounds = self.atlas.bounds();
        let mut flags = 0;
        if self.config.octahedron == OctahedronMode::Hemi {
            flags |= ImpostorUniforms::FLAG_HEMI;
        }
        if self.config.transparent {
            flags |= ImpostorUniforms::FLAG_TRANSPARENT;
        }
        if self.config.shading.uses_normal_map() {
            flags |= ImpostorUniforms::FLAG_NORMAL;
        }
        if self.config.shading.uses_orm() {
            flags |= ImpostorUniforms::FLAG_ORM;
        }
        ImpostorUniforms {
            transform: self.config.transform.to_cols_array_2d(),
            bounds: [bounds.center.x, bounds.center.y, bounds.center.z, bounds.radius],
            sprites_per_side: self.config.sprites_per_side,
            alpha_clamp: self.config.alpha_clamp,
            parallax_scale: self.config.parallax_scale,
            flags,
        }
    }

    /// Programs with equal keys are interchangeable
    pub fn program_cache_key(&self) -> String {
        format!(
            "impostor_{}_{}_{}_{}",
            self.config.octahedron == OctahedronMode::Hemi,
            self.config.transparent,
            self.config.shading.uses_normal_map(),
            self.config.shading.uses_orm()
        )
    }
}

impl ShaderExtension for ImpostorMaterial {
    fn contribute_uniforms(&self, uniforms: &mut BTreeMap<String, UniformValue>) {
        uniforms.insert("sprites_per_side".into(), UniformValue::UInt(self.config.sprites_per_side));
        uniforms.insert("alpha_clamp".into(), UniformValue::Float(self.config.alpha_clamp));
        uniforms.insert("parallax_scale".into(), UniformValue::Float(self.config.parallax_scale));
        uniforms.insert("impostor_transform".into(), UniformValue::Mat4(self.config.transform));
        uniforms.insert("atlas_albedo".into(), UniformValue::Texture(TextureSlot::Albedo));
        if self.config.shading.is_lit() {
            uniforms.insert("atlas_normal_depth".into(), UniformValue::Texture(TextureSlot::NormalDepth));
        }
    }

    fn contribute_defines(&self, defines: &mut BTreeMap<String, bool>) {
        defines.insert("HEMI_OCTAHEDRON".into(), self.config.octahedron == OctahedronMode::Hemi);
        defines.insert("TRANSPARENT".into(), self.config.transparent);
        defines.insert("USE_NORMAL".into(), self.config.shading.uses_normal_map());
        defines.insert("USE_ORM".into(), self.config.shading.uses_orm());
    }

    fn transform_vertex_stage(&self, stage: &mut ShaderStage) -> Result<()> {
        stage.inject(HookPoint::VertexVaryings, VARYINGS)?;
        stage.inject(HookPoint::VertexParams, PARAMS_VERTEX)?;
        stage.replace(HookPoint::VertexProject, VERTEX)
    }

    fn transform_fragment_stage(&self, stage: &mut ShaderStage) -> Result<()> {
        stage.inject(HookPoint::FragmentVaryings, VARYINGS)?;
        stage.inject(HookPoint::FragmentParams, PARAMS_FRAGMENT)?;
        stage.inject(HookPoint::FragmentDiffuse, MAP_FRAGMENT)?;
        stage.replace(HookPoint::FragmentMap, "    diffuse_color = diffuse_color * blended_color;\n")?;
        if self.config.shading.is_lit() {
            stage.replace(HookPoint::FragmentNormal, NORMAL_FRAGMENT)?;
        }
        stage.disable(HookPoint::FragmentNormalMap)
    }

    fn cache_key(&self) -> String {
        self.program_cache_key()
    }
}
