//! Light-transport estimators. Both take an explicit random stream and
//! return one radiance sample for the given camera ray.

use fastrand::Rng;

use crate::brdf::{fr, sample_weighted};
use crate::config::TraceSettings;
use crate::picture::Color;
use crate::ray::Ray;
use crate::scene::Scene;

/// Direct lighting with shadow probes, followed through at most
/// `settings.max_depth` bounces. Biased by construction.
pub fn ray_trace(scene: &Scene, ray: &Ray, settings: &TraceSettings, rng: &mut Rng) -> Color {
    let mut color = Color::BLACK;
    let mut weight = Color::WHITE;
    let mut ray = ray.clone();

    for _ in 0..settings.max_depth {
        let Some(hit) = scene.intersect(&ray) else {
            return color;
        };
        let material = scene.material(hit.object.material());
        let n = hit.object.closest_normal(&hit.point);
        let v = -ray.direction;

        let direct: Color = scene.lights().iter()
            .filter(|light| scene.light_visible(&hit.point, light, settings.shadow_offset))
            .map(|light| {
                let to_light = light.position - hit.point;
                let l = to_light.normalize();
                fr(material, &n, &v, &l) * light.intensity / to_light.magnitude_squared()
            })
            .sum();
        let shading = direct + material.k_d * scene.ambient();

        let reflected = material.k_s * settings.specular_blend;
        color += weight * (Color::WHITE - reflected) * shading;
        weight *= reflected;

        let (l, sample_weight) = sample_weighted(material, &n, &v, rng);
        weight *= sample_weight;
        if !weight.any() {
            break;
        }
        ray = Ray::offset(hit.point, l, settings.bounce_offset);
    }

    color
}

/// Unbiased path tracing. The Russian-roulette draw at the top of each
/// bounce is the only way the loop ends without reaching an emitter,
/// escaping the scene, or losing all throughput.
///
/// Bounces are weighted by [`sample_weighted`]: the lobe reflectance over the
/// lobe selection probability, with the cosine and lobe densities cancelled
/// by the sampling itself. An emitter returns the intensity of the light
/// attached to it, or black when it carries none.
pub fn path_trace(scene: &Scene, ray: &Ray, settings: &TraceSettings, rng: &mut Rng) -> Color {
    let survival = settings.survival_probability;
    let mut weight = Color::WHITE;
    let mut ray = ray.clone();

    loop {
        if rng.f32() > survival {
            return Color::BLACK;
        }
        weight /= survival;

        let Some(hit) = scene.intersect(&ray) else {
            return Color::BLACK;
        };
        let material = scene.material(hit.object.material());
        if material.emissive {
            return match scene.light_of(hit.object) {
                Some(light) => light.intensity * weight * settings.emitter_gain,
                None => Color::BLACK,
            };
        }
        if !weight.any() {
            return Color::BLACK;
        }

        let n = hit.object.closest_normal(&hit.point);
        let v = -ray.direction;
        let (l, sample_weight) = sample_weighted(material, &n, &v, rng);
        weight *= sample_weight;
        ray = Ray::offset(hit.point, l, settings.path_offset);
    }
}
