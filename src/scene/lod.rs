//! Distance-based level of detail for tree instances
//!
//! Each tree is drawn as the full mesh up close, a simplified mesh at
//! middle distance and the octahedral impostor beyond that. A box proxy
//! stands in for the tree when casting shadows.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{IVec3, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::impostor::material::ImpostorMaterial;
use crate::impostor::target::{MeshPrimitive, SurfaceMaterial, TargetMesh};

/// Detail tier, nearest first
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LodTier {
    Full,
    Simplified,
    Impostor,
}

impl LodTier {
    pub const ALL: [LodTier; 3] = [LodTier::Full, LodTier::Simplified, LodTier::Impostor];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Tier thresholds and proxy dimensions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    /// Distance at which the simplified mesh takes over
    pub simplified_distance: f32,
    /// Distance at which the impostor takes over
    pub impostor_distance: f32,
    /// Simplification error as a fraction of the mesh's largest extent
    pub simplify_error: f32,
    /// Width, height and depth of the shadow proxy box
    pub shadow_proxy: Vec3,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            simplified_distance: 10.0,
            impostor_distance: 50.0,
            simplify_error: 0.05,
            shadow_proxy: Vec3::new(3.0, 10.0, 3.0),
        }
    }
}

impl LodConfig {
    pub fn validate(&self) -> Result<()> {
        let near = self.simplified_distance;
        let far = self.impostor_distance;
        if !(near.is_finite() && far.is_finite() && near >= 0.0 && near < far) {
            return Err(Error::config(format!(
                "LOD distances must satisfy 0 <= simplified ({}) < impostor ({})",
                near, far
            )));
        }
        if !(self.simplify_error > 0.0 && self.simplify_error <= 1.0) {
            return Err(Error::config("simplify_error must be in (0, 1]"));
        }
        if !(self.shadow_proxy.is_finite() && self.shadow_proxy.min_element() > 0.0) {
            return Err(Error::config("shadow proxy dimensions must be positive"));
        }
        Ok(())
    }

    /// Start distance of each tier, nearest first
    pub fn thresholds(&self) -> [f32; 3] {
        [0.0, self.simplified_distance, self.impostor_distance]
    }

    pub fn tier_for_distance(&self, distance: f32) -> LodTier {
        let thresholds = self.thresholds();
        for (tier, &start) in LodTier::ALL.iter().zip(thresholds.iter()).rev() {
            if distance >= start {
                return *tier;
            }
        }
        LodTier::Full
    }
}

/// Reduces a mesh to fewer triangles within an error bound
pub trait GeometrySimplifier {
    /// `error` is a fraction of the mesh's largest extent.
    fn simplify(&self, mesh: &TargetMesh, error: f32) -> Result<TargetMesh>;
}

/// Merges vertices that fall into the same grid cell and drops the
/// triangles that collapse.
#[derive(Clone, Copy, Debug, Default)]
pub struct VertexClusterSimplifier;

impl GeometrySimplifier for VertexClusterSimplifier {
    fn simplify(&self, mesh: &TargetMesh, error: f32) -> Result<TargetMesh> {
        if !(error > 0.0 && error.is_finite()) {
            return Err(Error::config("simplification error must be positive"));
        }
        let Some(aabb) = mesh.aabb() else {
            return Ok(mesh.clone());
        };
        let cell = aabb.size().max_element() * error;
        if cell <= f32::EPSILON {
            return Ok(mesh.clone());
        }

        let mut primitives = Vec::with_capacity(mesh.primitives().len());
        for primitive in mesh.primitives() {
            if let Some(simplified) = cluster_primitive(primitive, aabb.min, cell)? {
                primitives.push(simplified);
            }
        }
        let simplified = TargetMesh::from_primitives(primitives);
        log::debug!(
            "Simplified mesh from {} to {} triangles (cell {:.3})",
            mesh.triangle_count(),
            simplified.triangle_count(),
            cell
        );
        Ok(simplified)
    }
}

fn cluster_primitive(primitive: &MeshPrimitive, origin: Vec3, cell: f32) -> Result<Option<MeshPrimitive>> {
    // Cell -> (new vertex index, position sum, member count)
    let mut clusters: HashMap<IVec3, (u32, Vec3, u32)> = HashMap::new();
    let mut remap = Vec::with_capacity(primitive.positions.len());
    let mut first_member = Vec::new();

    for (i, &p) in primitive.positions.iter().enumerate() {
        let key = ((p - origin) / cell).floor().as_ivec3();
        let next = clusters.len() as u32;
        let entry = clusters.entry(key).or_insert_with(|| {
            first_member.push(i);
            (next, Vec3::ZERO, 0)
        });
        entry.1 += p;
        entry.2 += 1;
        remap.push(entry.0);
    }

    let mut positions = vec![Vec3::ZERO; clusters.len()];
    for (index, sum, count) in clusters.into_values() {
        positions[index as usize] = sum / count as f32;
    }

    let mut indices = Vec::with_capacity(primitive.indices.len());
    for tri in primitive.indices.chunks_exact(3) {
        let [a, b, c] = [remap[tri[0] as usize], remap[tri[1] as usize], remap[tri[2] as usize]];
        if a != b && b != c && a != c {
            indices.extend_from_slice(&[a, b, c]);
        }
    }
    if indices.is_empty() {
        return Ok(None);
    }

    let mut simplified = MeshPrimitive::new(positions, indices, primitive.material.clone())?
        .with_render_order(primitive.render_order);
    simplified.uvs = first_member.iter().map(|&i| primitive.uvs[i]).collect();
    simplified.colors = first_member.iter().map(|&i| primitive.colors[i]).collect();
    Ok(Some(simplified))
}

/// What gets drawn for one tier
#[derive(Clone)]
pub enum LodGeometry {
    Mesh(Arc<TargetMesh>),
    Impostor(ImpostorMaterial),
}

#[derive(Clone)]
pub struct LodLevel {
    pub tier: LodTier,
    /// Distance from which this level is used
    pub distance: f32,
    pub geometry: LodGeometry,
}

/// Instance indices grouped by tier
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LodBuckets {
    pub full: Vec<usize>,
    pub simplified: Vec<usize>,
    pub impostor: Vec<usize>,
}

impl LodBuckets {
    pub fn get(&self, tier: LodTier) -> &[usize] {
        match tier {
            LodTier::Full => &self.full,
            LodTier::Simplified => &self.simplified,
            LodTier::Impostor => &self.impostor,
        }
    }

    pub fn counts(&self) -> [usize; 3] {
        [self.full.len(), self.simplified.len(), self.impostor.len()]
    }
}

/// Full, simplified and impostor representations of one tree model
#[derive(Clone)]
pub struct LodChain {
    config: LodConfig,
    levels: [LodLevel; 3],
    shadow_proxy: Arc<TargetMesh>,
}

impl LodChain {
    pub fn assemble(
        mesh: Arc<TargetMesh>,
        simplifier: &dyn GeometrySimplifier,
        impostor: ImpostorMaterial,
        config: &LodConfig,
    ) -> Result<Self> {
        config.validate()?;
        if mesh.is_empty() {
            return Err(Error::config("cannot build a LOD chain from an empty mesh"));
        }
        let simplified = simplifier.simplify(&mesh, config.simplify_error)?;
        let [full_at, simplified_at, impostor_at] = config.thresholds();
        log::info!(
            "LOD chain: {} / {} triangles, impostor from {}m",
            mesh.triangle_count(),
            simplified.triangle_count(),
            impostor_at
        );
        Ok(Self {
            config: config.clone(),
            levels: [
                LodLevel { tier: LodTier::Full, distance: full_at, geometry: LodGeometry::Mesh(mesh) },
                LodLevel {
                    tier: LodTier::Simplified,
                    distance: simplified_at,
                    geometry: LodGeometry::Mesh(Arc::new(simplified)),
                },
                LodLevel { tier: LodTier::Impostor, distance: impostor_at, geometry: LodGeometry::Impostor(impostor) },
            ],
            shadow_proxy: Arc::new(shadow_proxy_box(config.shadow_proxy)?),
        })
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    /// Levels nearest first
    pub fn levels(&self) -> &[LodLevel; 3] {
        &self.levels
    }

    pub fn level(&self, tier: LodTier) -> &LodLevel {
        &self.levels[tier.index()]
    }

    pub fn shadow_proxy(&self) -> &Arc<TargetMesh> {
        &self.shadow_proxy
    }

    pub fn tier_for_distance(&self, distance: f32) -> LodTier {
        self.config.tier_for_distance(distance)
    }

    /// Sort instance positions into tiers by distance to `viewer`.
    pub fn bucket(&self, positions: impl IntoIterator<Item = Vec3>, viewer: Vec3) -> LodBuckets {
        let mut buckets = LodBuckets::default();
        for (i, p) in positions.into_iter().enumerate() {
            match self.tier_for_distance(p.distance(viewer)) {
                LodTier::Full => buckets.full.push(i),
                LodTier::Simplified => buckets.simplified.push(i),
                LodTier::Impostor => buckets.impostor.push(i),
            }
        }
        buckets
    }
}

/// Closed box standing on the origin, used only as a shadow caster.
pub fn shadow_proxy_box(size: Vec3) -> Result<TargetMesh> {
    let h = Vec3::new(size.x * 0.5, 0.0, size.z * 0.5);
    let positions: Vec<Vec3> = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { -h.x } else { h.x },
                if i & 2 == 0 { 0.0 } else { size.y },
                if i & 4 == 0 { -h.z } else { h.z },
            )
        })
        .collect();
    #[rustfmt::skip]
    let indices = vec![
        0, 1, 5, 0, 5, 4, // bottom
        1, 3, 7, 1, 7, 5,
        3, 2, 6, 3, 6, 7, // top
        2, 0, 4, 2, 4, 6,
        4, 5, 7, 4, 7, 6,
        0, 2, 3, 0, 3, 1,
    ];
    let material = SurfaceMaterial::solid(Vec4::ONE);
    Ok(TargetMesh::from_primitives(vec![MeshPrimitive::new(positions, indices, material)?]))
}
