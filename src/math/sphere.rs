//! Bounding sphere

use serde::{Deserialize, Serialize};

use crate::core::types::Vec3;

/// Sphere enclosing a baked object; defines the impostor camera distance and
/// orthographic extent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Whether the sphere encloses anything at all
    pub fn is_valid(&self) -> bool {
        self.radius.is_finite() && self.radius > 0.0 && self.center.is_finite()
    }

    pub fn contains(&self, p: Vec3) -> bool {
        (p - self.center).length() <= self.radius * (1.0 + 1e-5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity() {
        assert!(BoundingSphere::new(Vec3::ZERO, 1.0).is_valid());
        assert!(!BoundingSphere::new(Vec3::ZERO, 0.0).is_valid());
        assert!(!BoundingSphere::new(Vec3::NAN, 1.0).is_valid());
    }
}
