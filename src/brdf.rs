//! Importance sampling and evaluation of the diffuse + Phong reflectance model.
//!
//! Each call first picks the diffuse or the specular lobe with probability
//! proportional to the mean reflectance of the lobe, then draws a direction
//! from it. `wi` and `v` always point away from the surface.

use std::f32::consts::PI;

use fastrand::Rng;
use nalgebra::{vector, Vector3};

use crate::material::Material;
use crate::picture::Color;

/// How close `n·h` has to be to one for a mirror to reflect into a direction.
const MIRROR_TOLERANCE: f32 = 1e-4;

enum Lobe {
    Diffuse,
    Specular,
}

/// Probability of sampling the diffuse lobe, `mean(k_d) / (mean(k_d) + mean(k_s))`.
///
/// A material without any reflectance always takes the diffuse lobe, whose
/// weight is zero for it anyway.
pub fn diffuse_probability(material: &Material) -> f32 {
    let diffuse = material.k_d.mean();
    let total = diffuse + material.k_s.mean();
    if total <= 0.0 {
        return 1.0;
    }
    diffuse / total
}

/// Mirror reflection of `wi` about `n`.
pub fn reflect(n: &Vector3<f32>, wi: &Vector3<f32>) -> Vector3<f32> {
    n * 2.0 * n.dot(wi) - wi
}

/// Unit direction at polar angle `acos(sqrt(cos2theta))` and azimuth `phi` around the axis `w`.
pub fn axis_angle(w: &Vector3<f32>, cos2theta: f32, phi: f32) -> Vector3<f32> {
    let cos_theta = cos2theta.sqrt();
    let sin_theta = (1.0 - cos2theta).max(0.0).sqrt();
    let helper = if w.x.abs() > 0.1 { vector![0.0, 1.0, 0.0] } else { vector![1.0, 0.0, 0.0] };
    let u = helper.cross(w).normalize();
    let v = w.cross(&u);
    (u * phi.cos() * sin_theta + v * phi.sin() * sin_theta + w * cos_theta).normalize()
}

fn sample_lobe(material: &Material, n: &Vector3<f32>, wi: &Vector3<f32>, rng: &mut Rng) -> (Vector3<f32>, Lobe) {
    let r = diffuse_probability(material);
    if rng.f32() < r {
        let cos2theta = rng.f32();
        return (axis_angle(n, cos2theta, rng.f32() * 2.0 * PI), Lobe::Diffuse);
    }

    let mirrored = reflect(n, wi);
    if material.is_mirror() {
        return (mirrored, Lobe::Specular);
    }
    let cos2theta = rng.f32().powf(2.0 / (material.alpha + 2.0));
    (axis_angle(&mirrored, cos2theta, rng.f32() * 2.0 * PI), Lobe::Specular)
}

/// Samples an outgoing direction.
pub fn sample(material: &Material, n: &Vector3<f32>, wi: &Vector3<f32>, rng: &mut Rng) -> Vector3<f32> {
    sample_lobe(material, n, wi, rng).0
}

/// Samples an outgoing direction together with its reflectance weight,
/// the lobe reflectance divided by the probability of picking that lobe.
pub fn sample_weighted(material: &Material, n: &Vector3<f32>, wi: &Vector3<f32>, rng: &mut Rng) -> (Vector3<f32>, Color) {
    let r = diffuse_probability(material);
    let (direction, lobe) = sample_lobe(material, n, wi, rng);
    let weight = match lobe {
        Lobe::Diffuse if material.k_d.any() => material.k_d / r,
        Lobe::Specular if !material.k_s.any() => Color::BLACK,
        // below-horizon Phong samples carry no energy
        Lobe::Specular if !material.is_mirror() && n.dot(&direction) <= 0.0 => Color::BLACK,
        Lobe::Specular => material.k_s / (1.0 - r),
        Lobe::Diffuse => Color::BLACK,
    };
    (direction, weight)
}

/// Phong specular lobe value for the half vector `h`.
fn specular_lobe(material: &Material, n: &Vector3<f32>, h: &Vector3<f32>) -> f32 {
    let cos_h = n.dot(h).max(0.0);
    if material.is_mirror() {
        return if cos_h >= 1.0 - MIRROR_TOLERANCE { 1.0 } else { 0.0 };
    }
    cos_h.powf(material.alpha)
}

/// Reflectance from `l` toward `v`: Phong half-vector lobe plus the cosine-weighted Lambert term.
pub fn fr(material: &Material, n: &Vector3<f32>, v: &Vector3<f32>, l: &Vector3<f32>) -> Color {
    let specular = match (v + l).try_normalize(f32::EPSILON) {
        Some(h) => specular_lobe(material, n, &h),
        None => 0.0,
    };
    material.k_s * specular + material.k_d * n.dot(l).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIALS: usize = 200_000;

    fn mean_weight(material: &Material, n: &Vector3<f32>, wi: &Vector3<f32>, seed: u64) -> Color {
        let mut rng = Rng::with_seed(seed);
        let sum: Color = (0..TRIALS)
            .map(|_| sample_weighted(material, n, wi, &mut rng).1)
            .sum();
        sum / TRIALS as f32
    }

    fn assert_close(actual: Color, expected: Color, tolerance: f32) {
        let diff = actual - expected;
        assert!(
            diff.r.abs() < tolerance && diff.g.abs() < tolerance && diff.b.abs() < tolerance,
            "{:?} is not within {} of {:?}", actual, tolerance, expected,
        );
    }

    #[test]
    fn split_probability_is_strictly_between_zero_and_one() {
        let material = Material::phong(Color::new(0.5, 0.2, 0.1), Color::gray(0.3), 20.0);
        let r = diffuse_probability(&material);
        assert!(r > 0.0 && r < 1.0);

        assert_eq!(diffuse_probability(&Material::lambert(Color::WHITE)), 1.0);
        assert_eq!(diffuse_probability(&Material::phong(Color::BLACK, Color::WHITE, 10.0)), 0.0);
        assert_eq!(diffuse_probability(&Material::default()), 1.0);
    }

    #[test]
    fn axis_angle_produces_unit_vectors_around_the_axis() {
        let w = vector![0.0, 0.0, 1.0];
        let straight = axis_angle(&w, 1.0, 0.3);
        assert!((straight - w).magnitude() < 1e-6);

        let tilted = axis_angle(&vector![0.6, 0.8, 0.0], 0.25, 1.0);
        assert!((tilted.magnitude() - 1.0).abs() < 1e-6);
        assert!((tilted.dot(&vector![0.6, 0.8, 0.0]) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn diffuse_samples_stay_in_the_upper_hemisphere() {
        let material = Material::lambert(Color::gray(0.7));
        let n = vector![0.0, 1.0, 0.0];
        let mut rng = Rng::with_seed(7);
        for _ in 0..1000 {
            assert!(sample(&material, &n, &n, &mut rng).dot(&n) >= 0.0);
        }
    }

    #[test]
    fn ideal_mirror_is_deterministic() {
        let material = Material::mirror(Color::new(0.15, 0.1, 0.05), Color::gray(0.6));
        let n = vector![0.0, 1.0, 0.0];
        let wi = vector![0.6, 0.8, 0.0];
        let expected = n * 2.0 * n.dot(&wi) - wi;
        let mut rng = Rng::with_seed(11);

        let mut specular = 0;
        for _ in 0..1000 {
            let direction = sample(&material, &n, &wi, &mut rng);
            if direction == expected {
                specular += 1;
            }
        }
        assert!(specular > 0);

        let pure = Material::mirror(Color::BLACK, Color::gray(0.6));
        for _ in 0..100 {
            let (direction, weight) = sample_weighted(&pure, &n, &wi, &mut rng);
            assert_eq!(direction, expected);
            assert_eq!(weight, Color::gray(0.6));
        }
    }

    #[test]
    fn weighted_mirror_samples_are_unbiased() {
        let material = Material::mirror(Color::new(0.5, 0.2, 0.1), Color::gray(0.3));
        let n = vector![0.0, 1.0, 0.0];
        let wi = vector![0.0, 0.6, 0.8];
        assert_close(mean_weight(&material, &n, &wi, 1), material.k_d + material.k_s, 0.02);
    }

    #[test]
    fn weighted_phong_samples_are_unbiased() {
        let material = Material::phong(Color::new(0.4, 0.4, 0.1), Color::new(0.2, 0.5, 0.5), 20.0);
        let n = vector![0.0, 1.0, 0.0];
        assert_close(mean_weight(&material, &n, &n, 2), material.k_d + material.k_s, 0.02);
    }

    #[test]
    fn zero_reflectance_lobes_weigh_nothing() {
        let material = Material::default();
        let n = vector![0.0, 1.0, 0.0];
        let mut rng = Rng::with_seed(3);
        for _ in 0..100 {
            let (_, weight) = sample_weighted(&material, &n, &n, &mut rng);
            assert!(weight.is_finite());
            assert!(!weight.any());
        }
    }

    #[test]
    fn fr_combines_phong_and_lambert() {
        let material = Material::phong(Color::gray(0.5), Color::gray(0.25), 10.0);
        let n = vector![0.0, 1.0, 0.0];
        // h == n, so the lobe is at its peak
        let value = fr(&material, &n, &n, &n);
        assert_close(value, Color::gray(0.75), 1e-6);

        let grazing = vector![1.0, 0.0, 0.0];
        assert_close(fr(&material, &n, &-grazing, &grazing), Color::BLACK, 1e-6);
    }

    #[test]
    fn fr_treats_mirrors_as_a_delta_lobe() {
        let material = Material::mirror(Color::BLACK, Color::gray(0.6));
        let n = vector![0.0, 1.0, 0.0];
        let v = vector![0.6, 0.8, 0.0];
        assert_close(fr(&material, &n, &v, &reflect(&n, &v)), Color::gray(0.6), 1e-6);
        assert_close(fr(&material, &n, &v, &n), Color::BLACK, 1e-6);
    }
}
