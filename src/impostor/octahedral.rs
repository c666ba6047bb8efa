//! Octahedral direction mapping between atlas grid cells and view directions
//!
//! Grid vertex `(i, j)` of an `S × S` grid maps to `uv ∈ [-1, 1]²` by
//! `uv = (i, j) / (S - 1) * 2 - 1`, so the outer ring of tiles samples the
//! edges of the octahedron. The hemi variant folds the square onto the upper
//! hemisphere (`y >= 0`, +Y up) through a diamond rotated by 45°.

use glam::{UVec2, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Which part of the sphere the baked directions cover
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OctahedronMode {
    /// Upper hemisphere only; for objects never seen from below
    #[default]
    Hemi,
    /// Whole sphere. Recognised but not implemented.
    Full,
}

impl OctahedronMode {
    /// Fail fast on modes without a mapping
    pub fn ensure_supported(self) -> Result<()> {
        match self {
            OctahedronMode::Hemi => Ok(()),
            OctahedronMode::Full => Err(Error::Unsupported(
                "full-octahedron impostors are not implemented; use the hemi-octahedron mode".into(),
            )),
        }
    }
}

/// Grid coordinate (continuous) to octahedron square `[-1, 1]²`
pub fn grid_to_uv(grid: Vec2, sprites_per_side: u32) -> Vec2 {
    if sprites_per_side <= 1 {
        return Vec2::ZERO;
    }
    grid / (sprites_per_side - 1) as f32 * 2.0 - Vec2::ONE
}

/// Octahedron square `[-1, 1]²` to continuous grid coordinate in `[0, S-1]²`
pub fn uv_to_grid(uv: Vec2, sprites_per_side: u32) -> Vec2 {
    if sprites_per_side <= 1 {
        return Vec2::ZERO;
    }
    let max = (sprites_per_side - 1) as f32;
    ((uv + Vec2::ONE) * 0.5 * max).clamp(Vec2::ZERO, Vec2::splat(max))
}

/// Unfold a point of the square onto the upper hemisphere.
pub fn hemi_uv_to_dir(uv: Vec2) -> Vec3 {
    let x = (uv.x - uv.y) * 0.5;
    let z = (uv.x + uv.y) * 0.5;
    let y = 1.0 - x.abs() - z.abs();
    Vec3::new(x, y.max(0.0), z).normalize()
}

/// Inverse of [`hemi_uv_to_dir`]. Directions below the horizon are clamped
/// onto it.
pub fn hemi_dir_to_uv(dir: Vec3) -> Vec2 {
    let d = Vec3::new(dir.x, dir.y.max(0.0), dir.z);
    let l1 = d.x.abs() + d.y + d.z.abs();
    if l1 <= f32::EPSILON {
        return Vec2::ZERO;
    }
    let x = d.x / l1;
    let z = d.z / l1;
    Vec2::new(x + z, z - x)
}

/// Baked view direction of tile `(i, j)`, pointing from the object towards
/// the camera.
pub fn grid_to_dir(tile: UVec2, sprites_per_side: u32) -> Vec3 {
    hemi_uv_to_dir(grid_to_uv(tile.as_vec2(), sprites_per_side))
}

/// Continuous grid coordinate of a view direction (need not be normalized).
pub fn dir_to_grid(dir: Vec3, sprites_per_side: u32) -> Vec2 {
    uv_to_grid(hemi_dir_to_uv(dir), sprites_per_side)
}

/// Camera basis used for a baked direction.
///
/// World +Y is the up hint; looking straight down the hint becomes −Z, which
/// is the limit approached from the +Z side. Baking and reconstruction must
/// use this same basis or tiles appear rolled against each other.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameBasis {
    /// Unit direction from the object towards the camera
    pub direction: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl FrameBasis {
    pub fn from_direction(direction: Vec3) -> Self {
        let direction = direction.normalize();
        let forward = -direction;
        let hint = if direction.y.abs() > 1.0 - 1e-6 { Vec3::NEG_Z } else { Vec3::Y };
        let right = forward.cross(hint).normalize();
        let up = right.cross(forward);
        Self { direction, right, up }
    }

    /// Camera viewing direction (towards the object)
    pub fn forward(&self) -> Vec3 {
        -self.direction
    }

    /// Coordinates of an offset from the object centre in this frame's image plane
    pub fn project(&self, offset: Vec3) -> Vec2 {
        Vec2::new(offset.dot(self.right), offset.dot(self.up))
    }
}
