//! Cameras for viewing the forest and for baking impostor tiles

use crate::core::types::{Mat3, Mat4, Quat, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    /// Vertical field of view in radians
    Perspective { fov_y: f32 },
    /// Half extent of the view volume; width is `half_height * aspect`
    Orthographic { half_height: f32 },
}

/// Right-handed camera looking down its local -Z
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    pub projection: Projection,
    /// Width / height
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Perspective camera at `position` facing `target`
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let forward = (target - position).normalize();
        let right = forward.cross(up).normalize();
        let up = right.cross(forward);

        Self {
            position,
            rotation: rotation_from_axes(right, up, forward),
            projection: Projection::Perspective { fov_y: 50.0_f32.to_radians() },
            aspect: 1.0,
            near: 0.1,
            far: 1200.0,
        }
    }

    /// Square orthographic camera with an explicit orthonormal basis.
    ///
    /// `forward` points from the camera towards what it looks at.
    pub fn orthographic(
        position: Vec3,
        right: Vec3,
        up: Vec3,
        forward: Vec3,
        half_height: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            position,
            rotation: rotation_from_axes(right, up, forward),
            projection: Projection::Orthographic { half_height },
            aspect: 1.0,
            near,
            far,
        }
    }

    /// World to camera space
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_quat(self.rotation.conjugate()) * Mat4::from_translation(-self.position)
    }

    /// Camera to clip space, depth in [0, 1]
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y } => Mat4::perspective_rh(fov_y, self.aspect, self.near, self.far),
            Projection::Orthographic { half_height } => {
                let half_width = half_height * self.aspect;
                Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, self.near, self.far)
            }
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }
}

fn rotation_from_axes(right: Vec3, up: Vec3, forward: Vec3) -> Quat {
    Quat::from_mat3(&Mat3::from_cols(right, up, -forward)).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_at_points_at_target() {
        let camera = Camera::look_at(Vec3::new(0.0, 5.0, 10.0), Vec3::ZERO, Vec3::Y);
        let expected = (Vec3::ZERO - camera.position).normalize();
        assert!(camera.forward().dot(expected) > 0.9999);
        let origin = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!((origin.z + camera.position.length()).abs() < 1e-4);
    }

    #[test]
    fn test_orthographic_maps_extent_to_ndc() {
        let camera = Camera::orthographic(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::X,
            Vec3::Y,
            -Vec3::Z,
            2.0,
            0.1,
            20.0,
        );
        let vp = camera.view_projection();
        let ndc = vp.project_point3(Vec3::new(2.0, -2.0, 0.0));
        assert!((ndc.x - 1.0).abs() < 1e-5);
        assert!((ndc.y + 1.0).abs() < 1e-5);
        let far = vp.project_point3(Vec3::new(0.0, 0.0, -10.0));
        assert!((far.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_perspective_depth_range() {
        let mut camera = Camera::look_at(Vec3::ZERO, -Vec3::Z, Vec3::Y);
        camera.near = 1.0;
        camera.far = 100.0;
        let vp = camera.view_projection();
        assert!(vp.project_point3(Vec3::new(0.0, 0.0, -1.0)).z.abs() < 1e-5);
        assert!((vp.project_point3(Vec3::new(0.0, 0.0, -100.0)).z - 1.0).abs() < 1e-4);
    }
}
