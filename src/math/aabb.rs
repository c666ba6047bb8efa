//! Axis-aligned bounding box

use crate::core::types::Vec3;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point, or `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        points
            .into_iter()
            .fold(None, |acc: Option<Aabb>, p| match acc {
                Some(b) => Some(Aabb::new(b.min.min(p), b.max.max(p))),
                None => Some(Aabb::new(p, p)),
            })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Footprint test; ignores height.
    pub fn contains_xz(&self, x: f32, z: f32) -> bool {
        (self.min.x..=self.max.x).contains(&x) && (self.min.z..=self.max.z).contains(&z)
    }

    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }
}
