//! Analytic primitives. A miss is reported as an infinite distance.

use nalgebra::{Point3, Vector3};

use crate::material::MaterialId;
use crate::ray::Ray;

/// Below this `|n·d|` a ray counts as parallel to a plane.
const PARALLEL_EPSILON: f32 = 1e-8;

#[derive(Clone, Debug)]
pub struct Plane {
    pub point: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl Plane {
    pub fn new(point: Point3<f32>, normal: Vector3<f32>) -> Self {
        Plane { point, normal: normal.normalize() }
    }

    pub fn intersect(&self, ray: &Ray) -> f32 {
        let denominator = self.normal.dot(&ray.direction);
        if denominator.abs() < PARALLEL_EPSILON {
            return f32::INFINITY;
        }
        let t = self.normal.dot(&(self.point - ray.origin)) / denominator;
        if t < 0.0 || !t.is_finite() {
            return f32::INFINITY;
        }
        t
    }
}

#[derive(Clone, Debug)]
pub struct Sphere {
    pub center: Point3<f32>,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Point3<f32>, radius: f32) -> Self {
        Sphere { center, radius }
    }

    pub fn intersect(&self, ray: &Ray) -> f32 {
        let oc = ray.origin - self.center;
        let a = ray.direction.magnitude_squared();
        let half_b = oc.dot(&ray.direction);
        let c = oc.magnitude_squared() - self.radius * self.radius;

        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            return f32::INFINITY;
        }
        let sqrtd = discriminant.sqrt();

        // nearest root in front of the origin; the far one when starting inside
        let near = (-half_b - sqrtd) / a;
        if near >= 0.0 {
            return near;
        }
        let far = (-half_b + sqrtd) / a;
        if far >= 0.0 {
            return far;
        }
        f32::INFINITY
    }
}

#[derive(Clone, Debug)]
pub enum Shape {
    Plane(Plane),
    Sphere(Sphere),
}

#[derive(Clone, Debug)]
pub struct Object {
    shape: Shape,
    material: MaterialId,
    light: Option<usize>,
}

impl Object {
    pub fn new(shape: Shape, material: MaterialId) -> Self {
        Object { shape, material, light: None }
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    /// Index of the scene light this emitter carries, if any.
    pub fn light(&self) -> Option<usize> {
        self.light
    }

    pub(crate) fn attach_light(&mut self, light: usize) {
        self.light = Some(light);
    }

    /// Distance to the nearest forward intersection, `f32::INFINITY` on a miss.
    pub fn intersect(&self, ray: &Ray) -> f32 {
        match &self.shape {
            Shape::Plane(plane) => plane.intersect(ray),
            Shape::Sphere(sphere) => sphere.intersect(ray),
        }
    }

    /// Outward unit normal at `point`, which is assumed to lie on the surface.
    pub fn closest_normal(&self, point: &Point3<f32>) -> Vector3<f32> {
        match &self.shape {
            Shape::Plane(plane) => plane.normal,
            Shape::Sphere(sphere) => (point - sphere.center).normalize(),
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{point, vector};

    use super::*;
    use crate::material::MaterialTable;

    fn any_material() -> MaterialId {
        MaterialTable::default().insert("any", Default::default()).expect("fresh table")
    }

    #[test]
    fn plane_hit_straight_down() {
        let plane = Plane::new(Point3::origin(), vector![0.0, 2.0, 0.0]);
        let ray = Ray::new(point![0.0, 1.0, -1.0], vector![0.0, -1.0, 0.0]);
        assert!((plane.intersect(&ray) - 1.0).abs() < 1e-6);
        assert_eq!(plane.normal, vector![0.0, 1.0, 0.0]);
    }

    #[test]
    fn plane_behind_or_parallel_is_a_miss() {
        let plane = Plane::new(Point3::origin(), vector![0.0, 1.0, 0.0]);
        let away = Ray::new(point![0.0, 1.0, 0.0], vector![0.0, 1.0, 0.0]);
        let parallel = Ray::new(point![0.0, 1.0, 0.0], vector![1.0, 0.0, 0.0]);
        assert_eq!(plane.intersect(&away), f32::INFINITY);
        assert_eq!(plane.intersect(&parallel), f32::INFINITY);
    }

    #[test]
    fn sphere_hit_from_outside_and_inside() {
        let sphere = Sphere::new(point![0.0, 0.0, -1.0], 0.5);
        let outside = Ray::new(Point3::origin(), vector![0.0, 0.0, -1.0]);
        assert!((sphere.intersect(&outside) - 0.5).abs() < 1e-6);

        let inside = Ray::new(point![0.0, 0.0, -1.0], vector![0.0, 1.0, 0.0]);
        assert!((sphere.intersect(&inside) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn sphere_negative_discriminant_is_a_miss() {
        let sphere = Sphere::new(point![0.0, 0.0, -1.0], 0.5);
        let ray = Ray::new(Point3::origin(), vector![0.0, 1.0, 0.0]);
        let t = sphere.intersect(&ray);
        assert_eq!(t, f32::INFINITY);
        assert!(!t.is_nan());
    }

    #[test]
    fn sphere_behind_origin_is_a_miss() {
        let sphere = Sphere::new(point![0.0, 0.0, 2.0], 0.5);
        let ray = Ray::new(Point3::origin(), vector![0.0, 0.0, -1.0]);
        assert_eq!(sphere.intersect(&ray), f32::INFINITY);
    }

    #[test]
    fn sphere_normal_points_outward() {
        let center = point![1.0, 2.0, -3.0];
        let object = Object::new(Shape::Sphere(Sphere::new(center, 2.0)), any_material());
        let ray = Ray::new(point![0.0, 0.0, 5.0], center - point![0.3, 0.1, 5.0]);
        let t = object.intersect(&ray);
        assert!(t.is_finite());

        let hit = ray.at(t);
        let normal = object.closest_normal(&hit);
        assert!((normal.magnitude() - 1.0).abs() < 1e-5);
        assert!(normal.dot(&(hit - center)) > 0.0);
    }
}
