//! Bake target geometry: triangle primitives with simple surface materials
//!
//! Loaded from glTF or built procedurally. Primitives keep the order they
//! are drawn in; alpha-tested foliage draws after opaque bark.

use std::path::Path;
use std::sync::Arc;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use image::RgbaImage;

use crate::core::{Error, Result};
use crate::math::{Aabb, BoundingSphere};

/// How a material treats alpha
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum AlphaMode {
    #[default]
    Opaque,
    /// Texels with alpha below the cutoff are discarded
    Mask(f32),
    Blend,
}

#[derive(Clone, Debug)]
pub struct SurfaceMaterial {
    /// Linear RGBA multiplier
    pub base_color: Vec4,
    pub base_color_texture: Option<Arc<RgbaImage>>,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            base_color_texture: None,
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
        }
    }
}

impl SurfaceMaterial {
    pub fn solid(color: Vec4) -> Self {
        Self { base_color: color, ..Default::default() }
    }

    /// Base colour times the nearest texel of the base-colour texture (repeat wrap).
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let Some(texture) = &self.base_color_texture else {
            return self.base_color;
        };
        let (w, h) = texture.dimensions();
        if w == 0 || h == 0 {
            return self.base_color;
        }
        let u = uv.x - uv.x.floor();
        let v = uv.y - uv.y.floor();
        let x = ((u * w as f32) as u32).min(w - 1);
        let y = ((v * h as f32) as u32).min(h - 1);
        let p = texture.get_pixel(x, y);
        let texel = Vec4::new(p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32) / 255.0;
        self.base_color * texel
    }

    /// Whether a fragment with this alpha is kept
    pub fn keeps(&self, alpha: f32) -> bool {
        match self.alpha_mode {
            AlphaMode::Opaque => true,
            AlphaMode::Mask(cutoff) => alpha >= cutoff,
            AlphaMode::Blend => alpha > 0.0,
        }
    }

    fn default_render_order(&self) -> i32 {
        match self.alpha_mode {
            AlphaMode::Opaque => 0,
            AlphaMode::Mask(_) => 1,
            AlphaMode::Blend => 2,
        }
    }
}

/// One indexed triangle list with a single material
#[derive(Clone, Debug)]
pub struct MeshPrimitive {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub colors: Vec<Vec4>,
    pub indices: Vec<u32>,
    pub material: SurfaceMaterial,
    /// Lower orders draw first
    pub render_order: i32,
}

impl MeshPrimitive {
    /// Build a primitive from positions and triangle indices.
    ///
    /// Normals are computed from the faces, uvs default to zero and vertex
    /// colours to white.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, material: SurfaceMaterial) -> Result<Self> {
        let normals = compute_normals(&positions, &indices);
        let count = positions.len();
        let render_order = material.default_render_order();
        let primitive = Self {
            positions,
            normals,
            uvs: vec![Vec2::ZERO; count],
            colors: vec![Vec4::ONE; count],
            indices,
            material,
            render_order,
        };
        primitive.validate()?;
        Ok(primitive)
    }

    pub fn with_render_order(mut self, order: i32) -> Self {
        self.render_order = order;
        self
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.positions.len();
        if self.indices.len() % 3 != 0 {
            return Err(Error::config("primitive index count is not a multiple of 3"));
        }
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= n) {
            return Err(Error::config(format!("primitive index {} out of range for {} vertices", bad, n)));
        }
        if self.normals.len() != n || self.uvs.len() != n || self.colors.len() != n {
            return Err(Error::config("primitive attribute lengths differ from position count"));
        }
        Ok(())
    }
}

/// Geometry rendered into an impostor atlas
#[derive(Clone, Debug, Default)]
pub struct TargetMesh {
    primitives: Vec<MeshPrimitive>,
}

impl TargetMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_primitives(primitives: Vec<MeshPrimitive>) -> Self {
        let mut mesh = Self { primitives };
        mesh.sort_by_render_order();
        mesh
    }

    pub fn push(&mut self, primitive: MeshPrimitive) {
        self.primitives.push(primitive);
        self.sort_by_render_order();
    }

    /// Primitives in draw order
    pub fn primitives(&self) -> &[MeshPrimitive] {
        &self.primitives
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.iter().all(|p| p.indices.is_empty())
    }

    pub fn vertex_count(&self) -> usize {
        self.primitives.iter().map(|p| p.positions.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.primitives.iter().map(|p| p.triangle_count()).sum()
    }

    /// Axis-aligned bounds over every vertex
    pub fn aabb(&self) -> Option<Aabb> {
        Aabb::from_points(self.primitives.iter().flat_map(|p| p.positions.iter().copied()))
    }

    /// Sphere around the bounding box centre reaching the farthest vertex.
    ///
    /// `None` for an empty mesh or one with non-finite positions.
    pub fn bounds(&self) -> Option<BoundingSphere> {
        let center = self.aabb()?.center();
        let radius = self
            .primitives
            .iter()
            .flat_map(|p| p.positions.iter())
            .map(|p| p.distance(center))
            .fold(0.0f32, f32::max);
        let sphere = BoundingSphere::new(center, radius);
        sphere.is_valid().then_some(sphere)
    }

    /// Every vertex transformed by `m`, normals by its inverse transpose
    pub fn transformed(&self, m: &Mat4) -> Self {
        let normal_matrix = Mat3::from_mat4(*m).inverse().transpose();
        let primitives = self
            .primitives
            .iter()
            .map(|p| MeshPrimitive {
                positions: p.positions.iter().map(|&v| m.transform_point3(v)).collect(),
                normals: p.normals.iter().map(|&n| (normal_matrix * n).normalize_or_zero()).collect(),
                ..p.clone()
            })
            .collect();
        Self { primitives }
    }

    /// Import every triangle primitive of a glTF / GLB file.
    pub fn import_gltf(path: &Path) -> Result<Self> {
        let (document, buffers, images) =
            gltf::import(path).map_err(|e| Error::resource(path, e))?;
        let mesh = Self::from_gltf_import(&document, &buffers, &images)?;
        log::info!(
            "Imported {} ({} primitives, {} triangles)",
            path.display(),
            mesh.primitives.len(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }

    /// Import a self-contained glTF (embedded buffers) or GLB from memory.
    pub fn from_gltf_slice(bytes: &[u8]) -> Result<Self> {
        let (document, buffers, images) = gltf::import_slice(bytes)?;
        Self::from_gltf_import(&document, &buffers, &images)
    }

    pub fn from_gltf_import(
        document: &gltf::Document,
        buffers: &[gltf::buffer::Data],
        images: &[gltf::image::Data],
    ) -> Result<Self> {
        let textures: Vec<Option<Arc<RgbaImage>>> =
            images.iter().map(|data| convert_image(data).map(Arc::new)).collect();

        let mut primitives = Vec::new();
        match document.default_scene().or_else(|| document.scenes().next()) {
            Some(scene) => {
                for node in scene.nodes() {
                    collect_node(&node, Mat4::IDENTITY, buffers, &textures, &mut primitives)?;
                }
            }
            None => {
                for mesh in document.meshes() {
                    collect_mesh(&mesh, Mat4::IDENTITY, buffers, &textures, &mut primitives)?;
                }
            }
        }

        if primitives.is_empty() {
            return Err(Error::config("glTF document contains no triangle primitives"));
        }
        Ok(Self::from_primitives(primitives))
    }

    fn sort_by_render_order(&mut self) {
        self.primitives.sort_by_key(|p| p.render_order);
    }
}

fn collect_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    textures: &[Option<Arc<RgbaImage>>],
    out: &mut Vec<MeshPrimitive>,
) -> Result<()> {
    let local = Mat4::from_cols_array_2d(&node.transform().matrix());
    let world = parent * local;
    if let Some(mesh) = node.mesh() {
        collect_mesh(&mesh, world, buffers, textures, out)?;
    }
    for child in node.children() {
        collect_node(&child, world, buffers, textures, out)?;
    }
    Ok(())
}

fn collect_mesh(
    mesh: &gltf::Mesh,
    transform: Mat4,
    buffers: &[gltf::buffer::Data],
    textures: &[Option<Arc<RgbaImage>>],
    out: &mut Vec<MeshPrimitive>,
) -> Result<()> {
    let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!(
                "Skipping non-triangle primitive {} of mesh {}",
                primitive.index(),
                mesh.name().unwrap_or("[unnamed]")
            );
            continue;
        }

        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
        let Some(positions) = reader.read_positions() else {
            continue;
        };
        let positions: Vec<Vec3> = positions
            .map(|p| transform.transform_point3(Vec3::from(p)))
            .collect();
        let count = positions.len();

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..count as u32).collect(),
        };

        let normals: Vec<Vec3> = match reader.read_normals() {
            Some(normals) => normals
                .map(|n| (normal_matrix * Vec3::from(n)).normalize_or_zero())
                .collect(),
            None => compute_normals(&positions, &indices),
        };
        let uvs: Vec<Vec2> = match reader.read_tex_coords(0) {
            Some(uvs) => uvs.into_f32().map(Vec2::from).collect(),
            None => vec![Vec2::ZERO; count],
        };
        let colors: Vec<Vec4> = match reader.read_colors(0) {
            Some(colors) => colors.into_rgba_f32().map(Vec4::from).collect(),
            None => vec![Vec4::ONE; count],
        };

        let material = convert_material(&primitive.material(), textures);
        let render_order = material.default_render_order();
        let primitive = MeshPrimitive {
            positions,
            normals,
            uvs,
            colors,
            indices,
            material,
            render_order,
        };
        primitive.validate()?;
        out.push(primitive);
    }
    Ok(())
}

fn convert_material(material: &gltf::Material, textures: &[Option<Arc<RgbaImage>>]) -> SurfaceMaterial {
    let pbr = material.pbr_metallic_roughness();
    let base_color_texture = pbr
        .base_color_texture()
        .and_then(|info| textures.get(info.texture().source().index()).cloned().flatten());
    let alpha_mode = match material.alpha_mode() {
        gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
        gltf::material::AlphaMode::Mask => AlphaMode::Mask(material.alpha_cutoff().unwrap_or(0.5)),
        gltf::material::AlphaMode::Blend => AlphaMode::Blend,
    };
    SurfaceMaterial {
        base_color: Vec4::from(pbr.base_color_factor()),
        base_color_texture,
        alpha_mode,
        double_sided: material.double_sided(),
    }
}

fn convert_image(data: &gltf::image::Data) -> Option<RgbaImage> {
    use gltf::image::Format;

    let pixels: Vec<u8> = match data.format {
        Format::R8G8B8A8 => data.pixels.clone(),
        Format::R8G8B8 => data.pixels.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 255]).collect(),
        Format::R8G8 => data.pixels.chunks_exact(2).flat_map(|p| [p[0], p[1], 0, 255]).collect(),
        Format::R8 => data.pixels.iter().flat_map(|&p| [p, p, p, 255]).collect(),
        other => {
            log::warn!("Unsupported glTF image format {:?}; texture ignored", other);
            return None;
        }
    };
    RgbaImage::from_raw(data.width, data.height, pixels)
}

/// Area-weighted vertex normals
fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals.iter().map(|n| n.try_normalize().unwrap_or(Vec3::Y)).collect()
}

/// Simple test tree: a hexagonal trunk under a cone crown, standing on the origin.
pub fn procedural_tree(height: f32, trunk_color: Vec4, leaf_color: Vec4) -> Result<TargetMesh> {
    if !(height.is_finite() && height > 0.0) {
        return Err(Error::config("tree height must be positive"));
    }
    let trunk_height = height * 0.4;
    let trunk_radius = height / 16.0;
    let crown_radius = height / 3.0;
    let sides = 6;

    let (positions, indices) = prism(trunk_radius, 0.0, trunk_height, sides);
    let trunk = MeshPrimitive::new(positions, indices, SurfaceMaterial::solid(trunk_color))?;

    let (positions, indices) = cone(crown_radius, trunk_height * 0.75, height, sides * 2);
    let leaves = MeshPrimitive::new(
        positions,
        indices,
        SurfaceMaterial {
            base_color: leaf_color,
            alpha_mode: AlphaMode::Mask(0.5),
            double_sided: true,
            ..Default::default()
        },
    )?;

    Ok(TargetMesh::from_primitives(vec![leaves, trunk]))
}

fn ring(radius: f32, y: f32, sides: u32) -> impl Iterator<Item = Vec3> {
    (0..sides).map(move |k| {
        let angle = k as f32 / sides as f32 * std::f32::consts::TAU;
        Vec3::new(radius * angle.cos(), y, radius * angle.sin())
    })
}

fn prism(radius: f32, y0: f32, y1: f32, sides: u32) -> (Vec<Vec3>, Vec<u32>) {
    let mut positions: Vec<Vec3> = ring(radius, y0, sides).collect();
    positions.extend(ring(radius, y1, sides));
    let mut indices = Vec::with_capacity(sides as usize * 6);
    for k in 0..sides {
        let next = (k + 1) % sides;
        let (a, b) = (k, next);
        let (c, d) = (k + sides, next + sides);
        indices.extend_from_slice(&[a, c, b, b, c, d]);
    }
    (positions, indices)
}

fn cone(radius: f32, y0: f32, apex: f32, sides: u32) -> (Vec<Vec3>, Vec<u32>) {
    let mut positions: Vec<Vec3> = ring(radius, y0, sides).collect();
    positions.push(Vec3::new(0.0, apex, 0.0));
    positions.push(Vec3::new(0.0, y0, 0.0));
    let tip = sides;
    let base = sides + 1;
    let mut indices = Vec::with_capacity(sides as usize * 6);
    for k in 0..sides {
        let next = (k + 1) % sides;
        indices.extend_from_slice(&[k, tip, next]);
        indices.extend_from_slice(&[k, next, base]);
    }
    (positions, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    fn triangle() -> MeshPrimitive {
        MeshPrimitive::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Z],
            vec![0, 2, 1],
            SurfaceMaterial::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_primitive_normals_follow_winding() {
        let tri = triangle();
        for n in &tri.normals {
            assert!((*n - Vec3::Y).length() < 1e-6);
        }
    }

    #[test]
    fn test_primitive_rejects_bad_indices() {
        let result = MeshPrimitive::new(vec![Vec3::ZERO], vec![0, 1, 2], SurfaceMaterial::default());
        assert!(matches!(result, Err(Error::Configuration(_))));
        let result = MeshPrimitive::new(vec![Vec3::ZERO; 3], vec![0, 1], SurfaceMaterial::default());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        assert!(TargetMesh::new().bounds().is_none());
        assert!(TargetMesh::new().is_empty());
    }

    #[test]
    fn test_bounds_enclose_all_vertices() {
        let tree = procedural_tree(10.0, Vec4::ONE, Vec4::ONE).unwrap();
        let bounds = tree.bounds().unwrap();
        for p in tree.primitives().iter().flat_map(|p| p.positions.iter()) {
            assert!(bounds.contains(*p));
        }
        assert!((bounds.center.y - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_render_order_draws_foliage_last() {
        let tree = procedural_tree(10.0, Vec4::ONE, Vec4::ONE).unwrap();
        let orders: Vec<_> = tree.primitives().iter().map(|p| p.render_order).collect();
        assert_eq!(orders, vec![0, 1]);
        assert!(matches!(tree.primitives()[1].material.alpha_mode, AlphaMode::Mask(_)));
    }

    #[test]
    fn test_material_sampling() {
        let mut texture = RgbaImage::new(2, 1);
        texture.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        texture.put_pixel(1, 0, image::Rgba([0, 0, 255, 0]));
        let material = SurfaceMaterial {
            base_color: Vec4::new(1.0, 1.0, 1.0, 0.5),
            base_color_texture: Some(Arc::new(texture)),
            alpha_mode: AlphaMode::Mask(0.25),
            double_sided: false,
        };
        assert_eq!(material.sample(Vec2::new(0.25, 0.5)), Vec4::new(1.0, 0.0, 0.0, 0.5));
        // Repeat wrap
        assert_eq!(material.sample(Vec2::new(1.75, 0.5)), Vec4::new(0.0, 0.0, 1.0, 0.0));
        assert!(material.keeps(0.5));
        assert!(!material.keeps(0.1));
    }

    #[test]
    fn test_transformed_moves_bounds() {
        let tree = procedural_tree(10.0, Vec4::ONE, Vec4::ONE).unwrap();
        let moved = tree.transformed(&Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        let a = tree.bounds().unwrap();
        let b = moved.bounds().unwrap();
        assert!((b.center - a.center - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-4);
        assert!((a.radius - b.radius).abs() < 1e-4);
    }

    #[test]
    fn test_invalid_gltf_slice() {
        assert!(TargetMesh::from_gltf_slice(b"not a gltf").is_err());
    }

    #[test]
    fn test_import_embedded_gltf() {
        // One triangle, positions only, buffer embedded as a data URI
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, -1.0];
        let bytes: Vec<u8> = positions.iter().flat_map(|f| f.to_le_bytes()).collect();
        let encoded = STANDARD.encode(&bytes);
        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "mesh": 0, "translation": [0.0, 2.0, 0.0] }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}],
  "buffers": [{{ "byteLength": 36, "uri": "data:application/octet-stream;base64,{encoded}" }}],
  "bufferViews": [{{ "buffer": 0, "byteLength": 36 }}],
  "accessors": [{{
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0.0, 0.0, -1.0], "max": [1.0, 0.0, 0.0]
  }}]
}}"#
        );
        let mesh = TargetMesh::from_gltf_slice(json.as_bytes()).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        let p = &mesh.primitives()[0];
        assert_eq!(p.positions[1], Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(p.colors[0], Vec4::ONE);
        assert!(p.normals[0].y.abs() > 0.99);
    }
}
