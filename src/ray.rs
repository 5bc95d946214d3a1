use nalgebra::{Point3, Vector3};

use crate::object::Object;

#[derive(Clone, Debug, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    /// The direction is normalized; every estimator expects unit-length directions.
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self { origin, direction: direction.normalize() }
    }

    /// A ray leaving a surface point, started `epsilon` units along `direction`
    /// so that it does not hit the surface it leaves.
    pub fn offset(origin: Point3<f32>, direction: Vector3<f32>, epsilon: f32) -> Self {
        let direction = direction.normalize();
        Self { origin: origin + direction * epsilon, direction }
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }
}

pub struct Hit<'a> {
    pub object: &'a Object,
    pub point: Point3<f32>,
    pub t: f32,
}
