//! CPU tile renderer: orthographic, z-buffered triangle rasterization of a [`TargetMesh`]

use glam::{Vec2, Vec3, Vec4};

use crate::core::Result;
use crate::impostor::atlas::{TileImage, encode_normal_depth, vec4_to_rgba};
use crate::impostor::baker::{TileRenderer, TileView};
use crate::impostor::target::{AlphaMode, MeshPrimitive, TargetMesh};
use crate::math::BoundingSphere;

/// Projected vertex: pixel position, clip depth in [0, 1]
#[derive(Clone, Copy)]
struct ScreenVertex {
    xy: Vec2,
    z: f32,
}

/// Renders tiles without a GPU, one triangle at a time.
pub struct SoftwareRasterizer<'a> {
    mesh: &'a TargetMesh,
}

impl<'a> SoftwareRasterizer<'a> {
    pub fn new(mesh: &'a TargetMesh) -> Self {
        Self { mesh }
    }

    fn draw_primitive(
        &self,
        primitive: &MeshPrimitive,
        view: &TileView,
        project: &dyn Fn(Vec3) -> ScreenVertex,
        resolution: u32,
        depth: &mut [f32],
        image: &mut TileImage,
    ) {
        let screen: Vec<ScreenVertex> = primitive.positions.iter().map(|&p| project(p)).collect();
        let res = resolution as f32;

        for tri in primitive.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (a, b, c) = (screen[i0], screen[i1], screen[i2]);

            // Screen y points down, so counter-clockwise front faces have negative area here.
            let area = edge(a.xy, b.xy, c.xy);
            if area.abs() < 1e-12 {
                continue;
            }
            if area > 0.0 && !primitive.material.double_sided {
                continue;
            }

            let min = a.xy.min(b.xy).min(c.xy).floor().max(Vec2::ZERO);
            let max = a.xy.max(b.xy).max(c.xy).ceil().min(Vec2::splat(res));
            if min.x >= max.x || min.y >= max.y {
                continue;
            }

            for y in min.y as u32..max.y as u32 {
                for x in min.x as u32..max.x as u32 {
                    let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                    let w0 = edge(b.xy, c.xy, p) / area;
                    let w1 = edge(c.xy, a.xy, p) / area;
                    let w2 = edge(a.xy, b.xy, p) / area;
                    if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                        continue;
                    }

                    let z = w0 * a.z + w1 * b.z + w2 * c.z;
                    let idx = (y * resolution + x) as usize;
                    if !(0.0..=1.0).contains(&z) || z >= depth[idx] {
                        continue;
                    }

                    let uv = primitive.uvs[i0] * w0 + primitive.uvs[i1] * w1 + primitive.uvs[i2] * w2;
                    let vertex_color =
                        primitive.colors[i0] * w0 + primitive.colors[i1] * w1 + primitive.colors[i2] * w2;
                    let mut color = primitive.material.sample(uv) * vertex_color;
                    if !primitive.material.keeps(color.w) {
                        continue;
                    }
                    if primitive.material.alpha_mode != AlphaMode::Blend {
                        color.w = 1.0;
                    }

                    let mut normal = (primitive.normals[i0] * w0
                        + primitive.normals[i1] * w1
                        + primitive.normals[i2] * w2)
                        .normalize_or_zero();
                    if normal.dot(view.direction()) < 0.0 {
                        normal = -normal;
                    }

                    depth[idx] = z;
                    image.albedo.put_pixel(x, y, vec4_to_rgba(color));
                    image.normal_depth.put_pixel(x, y, encode_normal_depth(normal, z));
                }
            }
        }
    }
}

impl TileRenderer for SoftwareRasterizer<'_> {
    fn bounds(&self) -> Option<BoundingSphere> {
        self.mesh.bounds()
    }

    fn render_tile(&self, view: &TileView, resolution: u32) -> Result<TileImage> {
        let view_projection = view.camera().view_projection();
        let res = resolution as f32;
        let project = |p: Vec3| {
            let ndc = view_projection.project_point3(p);
            ScreenVertex {
                xy: Vec2::new((ndc.x * 0.5 + 0.5) * res, (1.0 - (ndc.y * 0.5 + 0.5)) * res),
                z: ndc.z,
            }
        };

        let mut image = TileImage::empty(resolution);
        let mut depth = vec![f32::INFINITY; (resolution * resolution) as usize];
        for primitive in self.mesh.primitives() {
            self.draw_primitive(primitive, view, &project, resolution, &mut depth, &mut image);
        }
        Ok(image)
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b - a).perp_dot(p - a)
}

/// Fraction of texels with any coverage, for diagnostics.
pub fn coverage(image: &TileImage) -> f32 {
    let total = image.albedo.width() * image.albedo.height();
    if total == 0 {
        return 0.0;
    }
    let covered = image.albedo.pixels().filter(|p| p[3] > 0).count();
    covered as f32 / total as f32
}
