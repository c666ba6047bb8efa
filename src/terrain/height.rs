//! Fractal noise height field

use glam::Vec3;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Parameters of the fractal height function
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightFieldParams {
    pub seed: u32,
    /// Base frequency of the first octave (cycles per world unit)
    pub frequency: f64,
    /// Vertical scale applied to the normalized octave sum
    pub amplitude: f64,
    /// Number of noise layers (detail levels)
    pub octaves: u32,
    /// Frequency multiplier between octaves
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves
    pub gain: f64,
}

impl Default for HeightFieldParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            frequency: 0.001,
            amplitude: 150.0,
            octaves: 4,
            lacunarity: 3.0,
            gain: 0.2,
        }
    }
}

impl HeightFieldParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(Error::config(format!("frequency must be > 0, got {}", self.frequency)));
        }
        if !(self.amplitude.is_finite() && self.amplitude >= 0.0) {
            return Err(Error::config(format!("amplitude must be >= 0, got {}", self.amplitude)));
        }
        if self.octaves == 0 {
            return Err(Error::config("octaves must be >= 1"));
        }
        if !(self.lacunarity.is_finite() && self.lacunarity > 0.0) {
            return Err(Error::config(format!("lacunarity must be > 0, got {}", self.lacunarity)));
        }
        if !(self.gain.is_finite() && self.gain > 0.0) {
            return Err(Error::config(format!("gain must be > 0, got {}", self.gain)));
        }
        Ok(())
    }
}

/// Deterministic elevation function over world (x, z).
///
/// Chunk meshing and tree placement both sample through the same instance so
/// trees sit exactly on the generated ground.
#[derive(Clone, Debug)]
pub struct HeightField {
    params: HeightFieldParams,
    noise: Fbm<Perlin>,
}

impl HeightField {
    pub fn new(params: HeightFieldParams) -> Result<Self> {
        params.validate()?;
        let noise = Fbm::<Perlin>::new(params.seed)
            .set_frequency(params.frequency)
            .set_octaves(params.octaves as usize)
            .set_lacunarity(params.lacunarity)
            .set_persistence(params.gain);
        Ok(Self { params, noise })
    }

    pub fn params(&self) -> &HeightFieldParams {
        &self.params
    }

    /// Elevation at world position (x, z).
    ///
    /// The octave sum is normalized by the total octave weight, so the result
    /// stays within roughly `[-amplitude, amplitude]`.
    pub fn height(&self, x: f64, z: f64) -> f64 {
        self.noise.get([x, z]) * self.params.amplitude
    }

    /// Upward surface normal from central differences over `eps`.
    pub fn normal_at(&self, x: f64, z: f64, eps: f64) -> Vec3 {
        let (dh_dx, dh_dz) = self.gradient(x, z, eps);
        Vec3::new(-dh_dx as f32, 1.0, -dh_dz as f32).normalize()
    }

    /// Slope angle from horizontal in radians.
    pub fn slope_at(&self, x: f64, z: f64, eps: f64) -> f64 {
        let (dh_dx, dh_dz) = self.gradient(x, z, eps);
        (dh_dx * dh_dx + dh_dz * dh_dz).sqrt().atan()
    }

    fn gradient(&self, x: f64, z: f64, eps: f64) -> (f64, f64) {
        let dh_dx = (self.height(x + eps, z) - self.height(x - eps, z)) / (2.0 * eps);
        let dh_dz = (self.height(x, z + eps) - self.height(x, z - eps)) / (2.0 * eps);
        (dh_dx, dh_dz)
    }
}
