//! Render settings for the forest scene
//!
//! Built once and handed to scene setup; nothing here is mutated at runtime.

use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::camera::{Camera, Projection};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMapping {
    None,
    #[default]
    AcesFilmic,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowFilter {
    Hard,
    #[default]
    PcfSoft,
}

/// Directional shadow map covering a square around the camera
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShadowSettings {
    pub enabled: bool,
    pub filter: ShadowFilter,
    pub map_size: u32,
    /// Half extent of the orthographic shadow camera
    pub extent: f32,
    pub far: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: ShadowFilter::PcfSoft,
            map_size: 2048,
            extent: 450.0,
            far: 5000.0,
        }
    }
}

/// Exponential-squared distance fog
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FogSettings {
    pub color: Vec3,
    pub density: f32,
}

impl FogSettings {
    /// Fog amount in [0, 1] at a view distance
    pub fn factor(&self, distance: f32) -> f32 {
        let d = self.density * distance;
        (1.0 - (-d * d).exp()).clamp(0.0, 1.0)
    }

    pub fn apply(&self, color: Vec3, distance: f32) -> Vec3 {
        color.lerp(self.color, self.factor(distance))
    }
}

/// Orbit camera limits
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrbitSettings {
    pub target: Vec3,
    /// Largest angle between +Y and the target-to-eye vector
    pub max_polar_angle: f32,
}

impl OrbitSettings {
    /// Move `eye` back inside the allowed polar range, keeping its distance and azimuth.
    pub fn clamp_eye(&self, eye: Vec3) -> Vec3 {
        let offset = eye - self.target;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return eye;
        }
        let polar = (offset.y / distance).clamp(-1.0, 1.0).acos();
        if polar <= self.max_polar_angle {
            return eye;
        }
        let horizontal = Vec3::new(offset.x, 0.0, offset.z);
        let azimuth = horizontal.try_normalize().unwrap_or(Vec3::X);
        let (sin, cos) = self.max_polar_angle.sin_cos();
        self.target + (azimuth * sin + Vec3::Y * cos) * distance
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub position: Vec3,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub orbit: OrbitSettings,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 50.0, 0.0),
            fov_degrees: 50.0,
            near: 0.1,
            far: 1200.0,
            orbit: OrbitSettings {
                target: Vec3::new(100.0, 0.0, 0.0),
                max_polar_angle: FRAC_PI_2,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightSettings {
    pub color: Vec3,
    pub intensity: f32,
}

/// Immutable renderer configuration
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
    pub shadows: ShadowSettings,
    pub background: Vec3,
    pub fog: FogSettings,
    /// Upper bound on the device pixel ratio
    pub max_pixel_ratio: f32,
    pub camera: CameraSettings,
    pub sun: LightSettings,
    pub ambient: LightSettings,
    pub sun_rig: SunRig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        let cyan = Vec3::new(0.0, 1.0, 1.0);
        Self {
            tone_mapping: ToneMapping::AcesFilmic,
            exposure: 0.7,
            shadows: ShadowSettings::default(),
            background: cyan,
            fog: FogSettings { color: cyan, density: 0.0015 },
            max_pixel_ratio: 1.25,
            camera: CameraSettings::default(),
            sun: LightSettings { color: Vec3::ONE, intensity: 1.5 },
            ambient: LightSettings { color: Vec3::ONE, intensity: 2.0 },
            sun_rig: SunRig::default(),
        }
    }
}

impl RenderSettings {
    pub fn pixel_ratio(&self, device_ratio: f32) -> f32 {
        device_ratio.min(self.max_pixel_ratio)
    }

    /// Initial scene camera looking at the orbit target
    pub fn camera(&self, aspect: f32) -> Camera {
        let c = &self.camera;
        let mut camera = Camera::look_at(c.position, c.orbit.target, Vec3::Y);
        camera.projection = Projection::Perspective { fov_y: c.fov_degrees.to_radians() };
        camera.aspect = aspect;
        camera.near = c.near;
        camera.far = c.far;
        camera
    }
}

/// Where the sun light sits for a given camera position
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SunPose {
    pub position: Vec3,
    pub target: Vec3,
}

impl SunPose {
    /// Direction the light travels
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }
}

/// Keeps the shadow-casting sun at a fixed offset from the camera so the
/// shadow map always covers the area around the viewer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SunRig {
    pub offset: Vec3,
}

impl Default for SunRig {
    fn default() -> Self {
        Self { offset: Vec3::new(1.0, 1.0, 0.0).normalize() * 1000.0 }
    }
}

impl SunRig {
    pub fn follow(&self, camera_position: Vec3) -> SunPose {
        SunPose {
            position: camera_position + self.offset,
            target: camera_position - self.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RenderSettings::default();
        assert_eq!(settings.tone_mapping, ToneMapping::AcesFilmic);
        assert_eq!(settings.exposure, 0.7);
        assert_eq!(settings.shadows.map_size, 2048);
        assert_eq!(settings.fog.density, 0.0015);
        assert_eq!(settings.camera.far, 1200.0);
    }

    #[test]
    fn test_pixel_ratio_capped() {
        let settings = RenderSettings::default();
        assert_eq!(settings.pixel_ratio(2.0), 1.25);
        assert_eq!(settings.pixel_ratio(1.0), 1.0);
    }

    #[test]
    fn test_sun_follows_camera() {
        let rig = SunRig::default();
        let camera = Vec3::new(10.0, 50.0, -20.0);
        let pose = rig.follow(camera);
        assert!(((pose.position - camera).length() - 1000.0).abs() < 1e-2);
        assert!(((pose.position + pose.target) * 0.5 - camera).length() < 1e-3);
        let dir = pose.direction();
        assert!((dir - Vec3::new(-1.0, -1.0, 0.0).normalize()).length() < 1e-5);
    }

    #[test]
    fn test_fog_factor() {
        let fog = RenderSettings::default().fog;
        assert_eq!(fog.factor(0.0), 0.0);
        assert!(fog.factor(100.0) < fog.factor(1000.0));
        assert!(fog.factor(10_000.0) > 0.999);
        assert_eq!(fog.apply(Vec3::ZERO, 1.0e6), fog.color);
    }

    #[test]
    fn test_orbit_keeps_camera_above_horizon() {
        let orbit = CameraSettings::default().orbit;
        let above = Vec3::new(100.0, 30.0, 40.0);
        assert_eq!(orbit.clamp_eye(above), above);

        let below = Vec3::new(100.0, -30.0, 40.0);
        let clamped = orbit.clamp_eye(below);
        assert!(clamped.y.abs() < 1e-3);
        assert!(((clamped - orbit.target).length() - 50.0).abs() < 1e-3);
        assert!(clamped.z > 0.0);
    }

    #[test]
    fn test_initial_camera_faces_target() {
        let settings = RenderSettings::default();
        let camera = settings.camera(16.0 / 9.0);
        let to_target = (settings.camera.orbit.target - camera.position).normalize();
        assert!(camera.forward().dot(to_target) > 0.999);
        assert_eq!(camera.far, 1200.0);
    }
}
