//! Atlas layout and the baked albedo / normal+depth textures

use std::path::Path;

use glam::{UVec2, Vec2, Vec3, Vec4};
use image::{Rgba, RgbaImage};

use crate::core::{Error, Result};
use crate::impostor::octahedral::{FrameBasis, OctahedronMode, grid_to_dir};
use crate::math::BoundingSphere;

/// Normal/depth texel written where a tile saw nothing: object-space +Z, far plane.
pub const EMPTY_NORMAL_DEPTH: Rgba<u8> = Rgba([128, 128, 255, 255]);

/// Texel rectangle of one tile
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl TileRect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.size && y >= self.y && y < self.y + self.size
    }
}

/// Partition of a `T × T` texture into an `S × S` grid of square tiles
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasLayout {
    sprites_per_side: u32,
    texture_size: u32,
}

impl AtlasLayout {
    pub fn new(sprites_per_side: u32, texture_size: u32) -> Result<Self> {
        if sprites_per_side == 0 {
            return Err(Error::config("sprites_per_side must be >= 1"));
        }
        if texture_size == 0 {
            return Err(Error::config("texture_size must be >= 1"));
        }
        if texture_size % sprites_per_side != 0 {
            return Err(Error::config(format!(
                "sprites_per_side {} does not evenly tile texture_size {}",
                sprites_per_side, texture_size
            )));
        }
        Ok(Self { sprites_per_side, texture_size })
    }

    pub fn sprites_per_side(&self) -> u32 {
        self.sprites_per_side
    }

    pub fn texture_size(&self) -> u32 {
        self.texture_size
    }

    /// Texels per tile side
    pub fn tile_size(&self) -> u32 {
        self.texture_size / self.sprites_per_side
    }

    pub fn tile_count(&self) -> u32 {
        self.sprites_per_side * self.sprites_per_side
    }

    /// Rectangle of tile `(i, j)`: column `i`, row `j`
    pub fn tile_rect(&self, tile: UVec2) -> TileRect {
        let size = self.tile_size();
        TileRect { x: tile.x * size, y: tile.y * size, size }
    }

    /// Tile owning a texel
    pub fn tile_at_texel(&self, x: u32, y: u32) -> Option<UVec2> {
        if x >= self.texture_size || y >= self.texture_size {
            return None;
        }
        let size = self.tile_size();
        Some(UVec2::new(x / size, y / size))
    }

    /// All tiles in row-major order
    pub fn tiles(&self) -> impl Iterator<Item = UVec2> + use<> {
        let s = self.sprites_per_side;
        (0..s).flat_map(move |j| (0..s).map(move |i| UVec2::new(i, j)))
    }
}

/// One rendered view of the target, `size × size` texels
#[derive(Clone, Debug)]
pub struct TileImage {
    pub albedo: RgbaImage,
    pub normal_depth: RgbaImage,
}

impl TileImage {
    pub fn empty(size: u32) -> Self {
        Self {
            albedo: RgbaImage::new(size, size),
            normal_depth: RgbaImage::from_pixel(size, size, EMPTY_NORMAL_DEPTH),
        }
    }

    pub fn size(&self) -> u32 {
        self.albedo.width()
    }
}

/// Baked direction-indexed views of one object.
///
/// Immutable once baked; share it behind an `Arc` across every material and
/// instance that draws the object.
#[derive(Clone, Debug)]
pub struct BakedAtlas {
    layout: AtlasLayout,
    mode: OctahedronMode,
    bounds: BoundingSphere,
    albedo: RgbaImage,
    normal_depth: RgbaImage,
}

impl BakedAtlas {
    pub(crate) fn from_parts(
        layout: AtlasLayout,
        mode: OctahedronMode,
        bounds: BoundingSphere,
        albedo: RgbaImage,
        normal_depth: RgbaImage,
    ) -> Self {
        Self { layout, mode, bounds, albedo, normal_depth }
    }

    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    pub fn mode(&self) -> OctahedronMode {
        self.mode
    }

    /// Bounding sphere of the baked object, in object space
    pub fn bounds(&self) -> BoundingSphere {
        self.bounds
    }

    pub fn albedo(&self) -> &RgbaImage {
        &self.albedo
    }

    pub fn normal_depth(&self) -> &RgbaImage {
        &self.normal_depth
    }

    /// View direction baked into a tile
    pub fn tile_direction(&self, tile: UVec2) -> Vec3 {
        grid_to_dir(tile, self.layout.sprites_per_side())
    }

    pub fn tile_basis(&self, tile: UVec2) -> FrameBasis {
        FrameBasis::from_direction(self.tile_direction(tile))
    }

    /// Bilinear albedo sample at tile-local `uv ∈ [0, 1]²`, linear 0..1 channels.
    ///
    /// Outside the tile the object was not visible, so the sample is transparent.
    pub fn sample_albedo(&self, tile: UVec2, uv: Vec2) -> Vec4 {
        if !in_unit_square(uv) {
            return Vec4::ZERO;
        }
        sample_bilinear(&self.albedo, self.layout.tile_rect(tile), uv)
    }

    /// Decoded normal (object space) and linear depth in `[0, 1]` at tile-local `uv`.
    pub fn sample_normal_depth(&self, tile: UVec2, uv: Vec2) -> (Vec3, f32) {
        let texel = if in_unit_square(uv) {
            sample_bilinear(&self.normal_depth, self.layout.tile_rect(tile), uv)
        } else {
            rgba_to_vec4(EMPTY_NORMAL_DEPTH)
        };
        let normal = (texel.truncate() * 2.0 - Vec3::ONE).normalize_or_zero();
        (normal, texel.w)
    }

    /// Write `albedo.png` and `normal_depth.png` into `dir` for inspection.
    pub fn export_png(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        self.albedo.save(dir.join("albedo.png"))?;
        self.normal_depth.save(dir.join("normal_depth.png"))?;
        log::info!("Exported impostor atlas to {}", dir.display());
        Ok(())
    }
}

/// Pack an object-space normal and linear depth into a texel.
pub fn encode_normal_depth(normal: Vec3, depth: f32) -> Rgba<u8> {
    let n = normal.normalize_or_zero() * 0.5 + Vec3::splat(0.5);
    let v = Vec4::new(n.x, n.y, n.z, depth);
    vec4_to_rgba(v)
}

pub fn vec4_to_rgba(v: Vec4) -> Rgba<u8> {
    let c = (v.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
    Rgba([c.x as u8, c.y as u8, c.z as u8, c.w as u8])
}

pub fn rgba_to_vec4(p: Rgba<u8>) -> Vec4 {
    Vec4::new(p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32) / 255.0
}

fn in_unit_square(uv: Vec2) -> bool {
    uv.x >= 0.0 && uv.x <= 1.0 && uv.y >= 0.0 && uv.y <= 1.0
}

/// Texel-centre bilinear filter clamped to the tile so neighbours never bleed in.
fn sample_bilinear(image: &RgbaImage, rect: TileRect, uv: Vec2) -> Vec4 {
    let max = (rect.size - 1) as f32;
    let p = (uv * rect.size as f32 - Vec2::splat(0.5)).clamp(Vec2::ZERO, Vec2::splat(max));
    let x0 = p.x.floor() as u32;
    let y0 = p.y.floor() as u32;
    let x1 = (x0 + 1).min(rect.size - 1);
    let y1 = (y0 + 1).min(rect.size - 1);
    let fx = p.x - x0 as f32;
    let fy = p.y - y0 as f32;

    let texel = |x: u32, y: u32| rgba_to_vec4(*image.get_pixel(rect.x + x, rect.y + y));
    let top = texel(x0, y0).lerp(texel(x1, y0), fx);
    let bottom = texel(x0, y1).lerp(texel(x1, y1), fx);
    top.lerp(bottom, fy)
}
