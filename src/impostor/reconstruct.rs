//! Per-fragment impostor reconstruction
//!
//! Mirrors the fragment stage: map the view direction onto the atlas grid,
//! blend the three tiles of the enclosing grid triangle, and discard texels
//! below the alpha clamp.

use std::sync::Arc;

use glam::{Mat3, Mat4, UVec2, Vec2, Vec3, Vec4};

use crate::impostor::atlas::BakedAtlas;
use crate::impostor::material::{ImpostorConfig, ShadingMode};
use crate::impostor::octahedral::{FrameBasis, dir_to_grid};

/// Grid vertex and its blend weight
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileWeight {
    pub tile: UVec2,
    pub weight: f32,
}

/// The three grid vertices of the triangle containing `grid`, with barycentric weights.
///
/// Each grid quad is split along its anti-diagonal. Weights are non-negative
/// and sum to one; at a grid vertex all weight goes to that vertex.
pub fn triangle_weights(grid: Vec2, sprites_per_side: u32) -> [TileWeight; 3] {
    if sprites_per_side <= 1 {
        return [
            TileWeight { tile: UVec2::ZERO, weight: 1.0 },
            TileWeight { tile: UVec2::ZERO, weight: 0.0 },
            TileWeight { tile: UVec2::ZERO, weight: 0.0 },
        ];
    }
    let max = (sprites_per_side - 1) as f32;
    let grid = grid.clamp(Vec2::ZERO, Vec2::splat(max));
    let base = grid.floor().min(Vec2::splat(max - 1.0));
    let f = grid - base;
    let b = base.as_uvec2();

    if f.x + f.y <= 1.0 {
        [
            TileWeight { tile: b, weight: 1.0 - f.x - f.y },
            TileWeight { tile: b + UVec2::X, weight: f.x },
            TileWeight { tile: b + UVec2::Y, weight: f.y },
        ]
    } else {
        [
            TileWeight { tile: b + UVec2::ONE, weight: f.x + f.y - 1.0 },
            TileWeight { tile: b + UVec2::X, weight: 1.0 - f.y },
            TileWeight { tile: b + UVec2::Y, weight: 1.0 - f.x },
        ]
    }
}

/// World-space inputs for one billboard fragment
#[derive(Clone, Copy, Debug)]
pub struct FragmentInput {
    /// Camera position
    pub eye: Vec3,
    /// Point on the billboard being shaded
    pub point: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fragment {
    Discard,
    Shaded {
        color: Vec4,
        /// World-space normal, present for shading modes that light with normals
        normal: Option<Vec3>,
        /// Blended linear depth within the bounding sphere, 0 nearest
        depth: f32,
    },
}

impl Fragment {
    pub fn is_discard(&self) -> bool {
        matches!(self, Fragment::Discard)
    }
}

/// Shades billboard fragments from a baked atlas.
///
/// Stateless apart from the shared atlas and the material options.
#[derive(Clone)]
pub struct Reconstructor {
    atlas: Arc<BakedAtlas>,
    alpha_clamp: f32,
    transparent: bool,
    shading: ShadingMode,
    parallax_scale: f32,
    transform: Mat4,
}

impl Reconstructor {
    pub fn new(atlas: Arc<BakedAtlas>, config: &ImpostorConfig) -> Self {
        Self {
            atlas,
            alpha_clamp: config.alpha_clamp,
            transparent: config.transparent,
            shading: config.shading,
            parallax_scale: config.parallax_scale,
            transform: config.transform,
        }
    }

    pub fn atlas(&self) -> &Arc<BakedAtlas> {
        &self.atlas
    }

    /// Atlas tiles and weights used for a view direction given in atlas space
    pub fn weights_for(&self, view_dir: Vec3) -> [TileWeight; 3] {
        let s = self.atlas.layout().sprites_per_side();
        triangle_weights(dir_to_grid(view_dir, s), s)
    }

    /// Shade one fragment of an instance drawn with transform `instance`.
    pub fn shade(&self, input: &FragmentInput, instance: &Mat4) -> Fragment {
        let object_to_world = *instance * self.transform;
        let world_to_object = object_to_world.inverse();
        let eye = world_to_object.transform_point3(input.eye);
        let point = world_to_object.transform_point3(input.point);

        let bounds = self.atlas.bounds();
        let Some(view_dir) = (eye - bounds.center).try_normalize() else {
            return Fragment::Discard;
        };
        let Some(ray) = (point - eye).try_normalize() else {
            return Fragment::Discard;
        };

        let mut color = Vec4::ZERO;
        let mut normal = Vec3::ZERO;
        let mut depth = 0.0;
        let mut total = 0.0;

        for TileWeight { tile, weight } in self.weights_for(view_dir) {
            if weight <= 0.0 {
                continue;
            }
            let basis = self.atlas.tile_basis(tile);
            let Some(uv) = self.tile_uv(&basis, tile, eye, ray) else {
                continue;
            };
            let texel = self.atlas.sample_albedo(tile, uv);
            let (n, d) = self.atlas.sample_normal_depth(tile, uv);
            color += texel * weight;
            // Empty texels carry no surface, so they must not bend the normal
            normal += n * (weight * texel.w);
            depth += d * weight;
            total += weight;
        }

        if total <= 0.0 {
            return Fragment::Discard;
        }
        color /= total;
        depth /= total;

        if color.w < self.alpha_clamp {
            return Fragment::Discard;
        }
        if !self.transparent {
            color.w = 1.0;
        }

        let normal = self.shading.uses_normal_map().then(|| {
            let normal_matrix = Mat3::from_mat4(object_to_world).inverse().transpose();
            (normal_matrix * normal).normalize_or_zero()
        });

        Fragment::Shaded { color, normal, depth }
    }

    /// Tile-local uv where the view ray crosses the tile's image plane,
    /// shifted by one parallax step using the sampled depth.
    fn tile_uv(&self, basis: &FrameBasis, tile: UVec2, eye: Vec3, ray: Vec3) -> Option<Vec2> {
        let bounds = self.atlas.bounds();
        let r = bounds.radius;
        let facing = ray.dot(basis.direction);
        if facing > -1e-4 {
            return None;
        }
        let t = (bounds.center - eye).dot(basis.direction) / facing;
        let hit = eye + ray * t - bounds.center;
        let mut uv = to_tile_uv(basis.project(hit), r);

        if self.parallax_scale != 0.0 {
            let (_, d) = self.atlas.sample_normal_depth(tile, uv);
            let height = (0.5 - d) * 2.0 * r;
            let along = (height / -facing).clamp(-2.0 * r, 2.0 * r) * self.parallax_scale;
            let shift = basis.project(-ray * along);
            uv += Vec2::new(shift.x, -shift.y) / (2.0 * r);
        }
        Some(uv)
    }
}

fn to_tile_uv(plane: Vec2, radius: f32) -> Vec2 {
    Vec2::new(0.5 + plane.x / (2.0 * radius), 0.5 - plane.y / (2.0 * radius))
}
