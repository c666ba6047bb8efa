//! Atlas baking: render the target from every grid direction into one texture pair

use std::time::Instant;

use glam::{UVec2, Vec3};
use image::imageops;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::camera::Camera;
use crate::core::{Error, Result};
use crate::impostor::atlas::{AtlasLayout, BakedAtlas, EMPTY_NORMAL_DEPTH, TileImage};
use crate::impostor::octahedral::{FrameBasis, OctahedronMode, grid_to_dir};
use crate::math::BoundingSphere;

/// Parameters for baking one atlas
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasBakeConfig {
    /// Tiles per atlas side (S)
    pub sprites_per_side: u32,
    /// Atlas width and height in texels (T); must be a multiple of S
    pub texture_size: u32,
    /// Texels with alpha below this are treated as empty
    pub alpha_clamp: f32,
    /// Keep partial alpha in the albedo instead of forcing covered texels opaque
    pub transparent: bool,
    pub octahedron: OctahedronMode,
}

impl Default for AtlasBakeConfig {
    fn default() -> Self {
        Self {
            sprites_per_side: 16,
            texture_size: 2048,
            alpha_clamp: 0.4,
            transparent: false,
            octahedron: OctahedronMode::Hemi,
        }
    }
}

impl AtlasBakeConfig {
    pub fn validate(&self) -> Result<AtlasLayout> {
        self.octahedron.ensure_supported()?;
        if !(0.0..=1.0).contains(&self.alpha_clamp) {
            return Err(Error::config(format!(
                "alpha_clamp must be within [0, 1], got {}",
                self.alpha_clamp
            )));
        }
        AtlasLayout::new(self.sprites_per_side, self.texture_size)
    }
}

/// Everything a renderer needs to draw one tile
#[derive(Clone, Copy, Debug)]
pub struct TileView {
    pub tile: UVec2,
    pub basis: FrameBasis,
    pub bounds: BoundingSphere,
}

impl TileView {
    pub fn new(tile: UVec2, sprites_per_side: u32, bounds: BoundingSphere) -> Self {
        let basis = FrameBasis::from_direction(grid_to_dir(tile, sprites_per_side));
        Self { tile, basis, bounds }
    }

    /// Direction from the object towards the camera
    pub fn direction(&self) -> Vec3 {
        self.basis.direction
    }

    /// Orthographic camera framing the bounding sphere.
    ///
    /// Sits `2r` from the centre so the centre lands at depth 0.5 of the
    /// `[r, 3r]` clip range, which is what the parallax reconstruction expects.
    pub fn camera(&self) -> Camera {
        let r = self.bounds.radius;
        Camera::orthographic(
            self.bounds.center + self.basis.direction * 2.0 * r,
            self.basis.right,
            self.basis.up,
            self.basis.forward(),
            r,
            r,
            3.0 * r,
        )
    }
}

/// Render-to-texture capability used by the baker.
///
/// Implementations must be safe to call from several threads at once.
pub trait TileRenderer: Sync {
    /// Bounding sphere of the target; `None` if there is nothing to bake
    fn bounds(&self) -> Option<BoundingSphere>;

    /// Draw the target as seen from `view` into a `resolution²` tile.
    fn render_tile(&self, view: &TileView, resolution: u32) -> Result<TileImage>;
}

/// Bakes [`BakedAtlas`]es for a fixed configuration
pub struct AtlasBaker {
    config: AtlasBakeConfig,
    layout: AtlasLayout,
}

impl AtlasBaker {
    pub fn new(config: AtlasBakeConfig) -> Result<Self> {
        let layout = config.validate()?;
        Ok(Self { config, layout })
    }

    pub fn config(&self) -> &AtlasBakeConfig {
        &self.config
    }

    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    /// Render all `S²` tiles and assemble them into an atlas.
    ///
    /// Tiles render in parallel into private buffers; the atlas is only
    /// assembled once every tile succeeded.
    pub fn bake(&self, renderer: &dyn TileRenderer) -> Result<BakedAtlas> {
        let bounds = renderer
            .bounds()
            .filter(BoundingSphere::is_valid)
            .ok_or_else(|| Error::config("bake target has no geometry or invalid bounds"))?;

        let start = Instant::now();
        let s = self.layout.sprites_per_side();
        let resolution = self.layout.tile_size();
        let tiles: Vec<UVec2> = self.layout.tiles().collect();

        let rendered: Vec<(UVec2, TileImage)> = tiles
            .par_iter()
            .map(|&tile| {
                let view = TileView::new(tile, s, bounds);
                let image = renderer.render_tile(&view, resolution)?;
                if image.albedo.dimensions() != (resolution, resolution)
                    || image.normal_depth.dimensions() != (resolution, resolution)
                {
                    return Err(Error::config(format!(
                        "renderer returned a {}x{} tile, expected {}x{}",
                        image.albedo.width(),
                        image.albedo.height(),
                        resolution,
                        resolution
                    )));
                }
                log::debug!("Rendered impostor tile ({}, {})", tile.x, tile.y);
                Ok((tile, self.finish_tile(image)))
            })
            .collect::<Result<Vec<_>>>()?;

        let size = self.layout.texture_size();
        let mut albedo = image::RgbaImage::new(size, size);
        let mut normal_depth = image::RgbaImage::from_pixel(size, size, EMPTY_NORMAL_DEPTH);
        for (tile, image) in &rendered {
            let rect = self.layout.tile_rect(*tile);
            imageops::replace(&mut albedo, &image.albedo, rect.x as i64, rect.y as i64);
            imageops::replace(&mut normal_depth, &image.normal_depth, rect.x as i64, rect.y as i64);
        }

        log::info!(
            "Baked {}x{} impostor atlas ({} tiles of {}px) in {:.2}s",
            size,
            size,
            rendered.len(),
            resolution,
            start.elapsed().as_secs_f64()
        );

        Ok(BakedAtlas::from_parts(self.layout, self.config.octahedron, bounds, albedo, normal_depth))
    }

    /// Apply the alpha clamp: texels below it become empty, the rest opaque
    /// unless the atlas keeps transparency.
    fn finish_tile(&self, mut image: TileImage) -> TileImage {
        let clamp = (self.config.alpha_clamp * 255.0).round() as u8;
        for (albedo, normal_depth) in image.albedo.pixels_mut().zip(image.normal_depth.pixels_mut()) {
            if albedo[3] == 0 || albedo[3] < clamp {
                *albedo = image::Rgba([0, 0, 0, 0]);
                *normal_depth = EMPTY_NORMAL_DEPTH;
            } else if !self.config.transparent {
                albedo[3] = 255;
            }
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fills each tile with a colour derived from its coordinate
    struct StampRenderer {
        calls: AtomicUsize,
        fail_at: Option<UVec2>,
    }

    impl StampRenderer {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0), fail_at: None }
        }
    }

    impl TileRenderer for StampRenderer {
        fn bounds(&self) -> Option<BoundingSphere> {
            Some(BoundingSphere::new(Vec3::ZERO, 1.0))
        }

        fn render_tile(&self, view: &TileView, resolution: u32) -> Result<TileImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(view.tile) == self.fail_at {
                return Err(Error::config("stamp failure"));
            }
            let mut image = TileImage::empty(resolution);
            for p in image.albedo.pixels_mut() {
                *p = image::Rgba([view.tile.x as u8, view.tile.y as u8, 7, 200]);
            }
            Ok(image)
        }
    }

    fn config(s: u32, t: u32) -> AtlasBakeConfig {
        AtlasBakeConfig { sprites_per_side: s, texture_size: t, ..Default::default() }
    }

    #[test]
    fn test_bake_places_every_tile() {
        let renderer = StampRenderer::new();
        let atlas = AtlasBaker::new(config(4, 512)).unwrap().bake(&renderer).unwrap();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 16);
        assert_eq!(atlas.layout().tile_size(), 128);
        assert_eq!(atlas.albedo().dimensions(), (512, 512));

        for (x, y, p) in atlas.albedo().enumerate_pixels() {
            let tile = atlas.layout().tile_at_texel(x, y).unwrap();
            assert_eq!(p.0, [tile.x as u8, tile.y as u8, 7, 255], "texel ({x}, {y})");
        }
    }

    #[test]
    fn test_transparent_keeps_alpha() {
        let mut cfg = config(2, 8);
        cfg.transparent = true;
        let atlas = AtlasBaker::new(cfg).unwrap().bake(&StampRenderer::new()).unwrap();
        assert_eq!(atlas.albedo().get_pixel(0, 0)[3], 200);
    }

    #[test]
    fn test_alpha_clamp_clears_texels() {
        let mut cfg = config(2, 8);
        cfg.alpha_clamp = 0.9;
        let atlas = AtlasBaker::new(cfg).unwrap().bake(&StampRenderer::new()).unwrap();
        assert!(atlas.albedo().pixels().all(|p| p[3] == 0));
        assert!(atlas.normal_depth().pixels().all(|p| *p == EMPTY_NORMAL_DEPTH));
    }

    #[test]
    fn test_failed_tile_fails_bake() {
        let renderer = StampRenderer { fail_at: Some(UVec2::new(1, 1)), ..StampRenderer::new() };
        let result = AtlasBaker::new(config(2, 8)).unwrap().bake(&renderer);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(AtlasBaker::new(config(0, 512)), Err(Error::Configuration(_))));
        assert!(matches!(AtlasBaker::new(config(24, 4096)), Err(Error::Configuration(_))));
        let mut cfg = config(4, 512);
        cfg.alpha_clamp = 1.5;
        assert!(matches!(AtlasBaker::new(cfg), Err(Error::Configuration(_))));
        cfg = config(4, 512);
        cfg.octahedron = OctahedronMode::Full;
        assert!(matches!(AtlasBaker::new(cfg), Err(Error::Unsupported(_))));
    }

    struct EmptyRenderer;

    impl TileRenderer for EmptyRenderer {
        fn bounds(&self) -> Option<BoundingSphere> {
            None
        }

        fn render_tile(&self, _view: &TileView, resolution: u32) -> Result<TileImage> {
            Ok(TileImage::empty(resolution))
        }
    }

    #[test]
    fn test_empty_target_is_configuration_error() {
        let result = AtlasBaker::new(config(2, 8)).unwrap().bake(&EmptyRenderer);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_tile_camera_frames_sphere() {
        let bounds = BoundingSphere::new(Vec3::new(1.0, 2.0, 3.0), 2.0);
        let view = TileView::new(UVec2::new(3, 1), 8, bounds);
        let camera = view.camera();
        let vp = camera.view_projection();

        let center = vp.project_point3(bounds.center);
        assert!(center.truncate().length() < 1e-4);
        assert!((center.z - 0.5).abs() < 1e-4);

        let edge = vp.project_point3(bounds.center + view.basis.right * 2.0);
        assert!((edge.x - 1.0).abs() < 1e-4);
        let top = vp.project_point3(bounds.center + view.basis.up * 2.0);
        assert!((top.y - 1.0).abs() < 1e-4);
        let near = vp.project_point3(bounds.center + view.direction() * 2.0);
        assert!(near.z.abs() < 1e-4);
    }
}
