use clap::ValueEnum;
use fastrand::Rng;
use thiserror::Error;

use crate::picture::Color;
use crate::ray::Ray;
use crate::render::{path_trace, ray_trace};
use crate::scene::Scene;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("survival probability must lie in (0, 1), got {0}")]
    SurvivalProbability(f32),

    #[error("patch size must be at least one pixel")]
    EmptyPatch,

    #[error("image must be at least 1x1, got {0}x{1}")]
    EmptyImage(u32, u32),

    #[error("ray tracing needs at least one bounce")]
    ZeroDepth,

    #[error("emitter gain must be finite and non-negative, got {0}")]
    EmitterGain(f32),
}

/// Which light-transport estimator produces the pixel samples.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Estimator {
    /// Bounded-depth direct lighting with shadow probes.
    #[default]
    #[value(name = "ray")]
    RayTrace,
    /// Unbiased path tracing with Russian roulette.
    #[value(name = "path")]
    PathTrace,
}

impl Estimator {
    pub fn radiance(self, scene: &Scene, ray: &Ray, settings: &TraceSettings, rng: &mut Rng) -> Color {
        match self {
            Estimator::RayTrace => ray_trace(scene, ray, settings, rng),
            Estimator::PathTrace => path_trace(scene, ray, settings, rng),
        }
    }
}

/// Constants of the two estimators.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceSettings {
    /// Bounces followed by the ray tracer.
    pub max_depth: u32,
    /// Fraction of `k_s` carried to the next bounce by the ray tracer.
    pub specular_blend: f32,
    /// Shadow probes start this fraction of the way to the light.
    pub shadow_offset: f32,
    /// Ray tracer bounce rays start this far from the surface.
    pub bounce_offset: f32,
    /// Russian-roulette continuation probability of the path tracer.
    pub survival_probability: f32,
    /// Path tracer bounce rays start this far from the surface.
    pub path_offset: f32,
    /// Scale applied to a light's intensity when a path reaches its emitter.
    pub emitter_gain: f32,
}

impl Default for TraceSettings {
    fn default() -> Self {
        TraceSettings {
            max_depth: 10,
            specular_blend: 0.5,
            shadow_offset: 0.01,
            bounce_offset: 0.01,
            survival_probability: 0.9,
            path_offset: 0.0001,
            emitter_gain: 8.0,
        }
    }
}

impl TraceSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        let p = self.survival_probability;
        if !(p > 0.0 && p < 1.0) {
            return Err(ConfigError::SurvivalProbability(p));
        }
        if !self.emitter_gain.is_finite() || self.emitter_gain < 0.0 {
            return Err(ConfigError::EmitterGain(self.emitter_gain));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Pixel samples taken per driver call.
    pub patch_size: usize,
    pub seed: u64,
    pub estimator: Estimator,
    pub trace: TraceSettings,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            width: 800,
            height: 600,
            patch_size: 50_000,
            seed: 0,
            estimator: Estimator::default(),
            trace: TraceSettings::default(),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyImage(self.width, self.height));
        }
        if self.patch_size == 0 {
            return Err(ConfigError::EmptyPatch);
        }
        self.trace.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(RenderConfig::default().validate(), Ok(()));
        assert_eq!(RenderConfig::default().estimator, Estimator::RayTrace);
    }

    #[test]
    fn survival_probability_must_be_open_interval() {
        for p in [0.0, 1.0, -0.5, f32::NAN] {
            let settings = TraceSettings { survival_probability: p, ..Default::default() };
            assert!(matches!(settings.validate(), Err(ConfigError::SurvivalProbability(_))));
        }
    }

    #[test]
    fn empty_sizes_are_rejected() {
        let config = RenderConfig { patch_size: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::EmptyPatch));

        let config = RenderConfig { width: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::EmptyImage(0, 600)));

        let config = RenderConfig { trace: TraceSettings { max_depth: 0, ..Default::default() }, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroDepth));
    }

    #[test]
    fn estimator_names_parse() {
        assert_eq!(Estimator::from_str("path", true), Ok(Estimator::PathTrace));
        assert_eq!(Estimator::from_str("ray", true), Ok(Estimator::RayTrace));
    }
}
