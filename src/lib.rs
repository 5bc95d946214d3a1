//! Progressive CPU renderer for small analytic scenes.
//!
//! Two estimators are available: bounded-depth ray tracing with shadow
//! probes ([`render::ray_trace`]) and unbiased path tracing with Russian
//! roulette ([`render::path_trace`]). [`progressive::ProgressiveRenderer`]
//! folds their samples into per-pixel running means patch by patch.

pub mod brdf;
pub mod camera;
pub mod config;
pub mod material;
pub mod object;
pub mod picture;
pub mod progressive;
pub mod ray;
pub mod render;
pub mod scene;
