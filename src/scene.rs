use float_ord::FloatOrd;
use log::debug;
use nalgebra::{point, vector, Point3, Vector3};
use thiserror::Error;

use crate::material::{Material, MaterialId, MaterialTable};
use crate::object::{Object, Plane, Shape, Sphere};
use crate::picture::Color;
use crate::ray::{Hit, Ray};

#[derive(Error, Debug, PartialEq)]
pub enum SceneError {
    #[error("unknown material `{0}`")]
    UnknownMaterial(String),

    #[error("material `{0}` is already defined")]
    DuplicateMaterial(String),

    #[error("plane normal must not be zero")]
    DegenerateNormal,

    #[error("sphere radius must be positive, got {0}")]
    InvalidRadius(f32),

    #[error("a light can only be attached to the last added emissive object, once")]
    NoEmitter,
}

/// Point light used for explicit light sampling. Lights attached to an
/// emissive object also give that object its radiance in the path tracer.
#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub position: Point3<f32>,
    pub intensity: Color,
}

impl Light {
    pub fn new(position: Point3<f32>, intensity: Color) -> Self {
        Light { position, intensity }
    }
}

/// The static world being rendered. Read-only once built.
#[derive(Clone, Debug)]
pub struct Scene {
    materials: MaterialTable,
    objects: Vec<Object>,
    lights: Vec<Light>,
    ambient: Color,
}

impl Scene {
    pub fn builder() -> SceneBuilder {
        SceneBuilder::default()
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn ambient(&self) -> Color {
        self.ambient
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id]
    }

    /// Nearest object along the ray, found by scanning every object.
    pub fn intersect<'a>(&'a self, ray: &Ray) -> Option<Hit<'a>> {
        self.objects.iter()
            .map(|object| (object, object.intersect(ray)))
            .filter(|(_, t)| t.is_finite())
            .min_by_key(|(_, t)| FloatOrd(*t))
            .map(|(object, t)| Hit { object, point: ray.at(t), t })
    }

    /// Proxy visibility: a light counts as visible from `point` when the first
    /// object hit on the way towards it is emissive. Occluders behind the
    /// light and the identity of the emitter are not checked.
    pub fn light_visible(&self, point: &Point3<f32>, light: &Light, offset: f32) -> bool {
        let to_light = light.position - point;
        let probe = Ray::new(point + to_light * offset, to_light);
        match self.intersect(&probe) {
            Some(hit) => self.material(hit.object.material()).emissive,
            None => false,
        }
    }

    /// The light attached to an emissive object.
    pub fn light_of(&self, object: &Object) -> Option<&Light> {
        object.light().map(|index| &self.lights[index])
    }

    /// Closed box with colored walls, a glowing ceiling cap, a wooden and a
    /// metal ball, one point light under the cap.
    pub fn cornell_box() -> Result<Scene, SceneError> {
        let cap_offset = 2.0 / 3.0;
        let cap_radius: f32 = 5.0;
        let cap_height = (cap_radius * cap_radius - cap_offset * cap_offset).sqrt();

        let mut builder = Scene::builder();
        builder
            .material("ceiling", Material::lambert(Color::new(1.0, 0.0, 0.0)))?
            .material("floor", Material::lambert(Color::new(0.0, 1.0, 0.0)))?
            .material("wall", Material::lambert(Color::new(0.0, 0.0, 1.0)))?
            .material("side", Material::lambert(Color::new(0.0, 1.0, 1.0)))?
            .material("wood", Material::lambert(Color::new(1.0, 1.0, 0.0)))?
            .material("metal", Material::phong(Color::BLACK, Color::gray(0.8), 30.0))?
            .material("mirror", Material::mirror(Color::new(37.2, 24.4, 13.2) / 255.0, Color::gray(0.6)))?
            .material("light", Material::emitter(Color::gray(20.0)))?;
        builder
            .plane("ceiling", point![0.0, 3.0, 0.0], vector![0.0, -1.0, 0.0])?
            .plane("floor", Point3::origin(), vector![0.0, 1.0, 0.0])?
            .plane("side", point![-2.0, 0.0, 0.0], vector![1.0, 0.0, 0.0])?
            .plane("side", point![2.0, 0.0, 0.0], vector![-1.0, 0.0, 0.0])?
            .plane("wall", point![0.0, 0.0, -4.0], vector![0.0, 0.0, 1.0])?
            .sphere("light", point![0.0, 3.0 + cap_height, -2.0], cap_radius)?
            .attach_light(point![0.0, 3.0, -2.0], Color::gray(2.0))?
            .sphere("wood", point![1.0, 0.8, -3.0], 0.8)?
            .sphere("metal", point![-1.0, 0.8, -2.0], 0.8)?
            .ambient(Color::gray(0.05));
        Ok(builder.build())
    }
}

/// Assembles a [`Scene`], resolving material names as objects are added.
#[derive(Default)]
pub struct SceneBuilder {
    materials: MaterialTable,
    objects: Vec<Object>,
    lights: Vec<Light>,
    ambient: Color,
}

impl SceneBuilder {
    pub fn material(&mut self, name: &str, material: Material) -> Result<&mut Self, SceneError> {
        self.materials.insert(name, material)?;
        Ok(self)
    }

    pub fn plane(&mut self, material: &str, point: Point3<f32>, normal: Vector3<f32>) -> Result<&mut Self, SceneError> {
        let material = self.materials.lookup(material)?;
        if normal.magnitude_squared() == 0.0 || !normal.iter().all(|c| c.is_finite()) {
            return Err(SceneError::DegenerateNormal);
        }
        self.objects.push(Object::new(Shape::Plane(Plane::new(point, normal)), material));
        Ok(self)
    }

    pub fn sphere(&mut self, material: &str, center: Point3<f32>, radius: f32) -> Result<&mut Self, SceneError> {
        let material = self.materials.lookup(material)?;
        if radius <= 0.0 || !radius.is_finite() {
            return Err(SceneError::InvalidRadius(radius));
        }
        self.objects.push(Object::new(Shape::Sphere(Sphere::new(center, radius)), material));
        Ok(self)
    }

    pub fn light(&mut self, position: Point3<f32>, intensity: Color) -> &mut Self {
        self.lights.push(Light::new(position, intensity));
        self
    }

    /// Adds a light carried by the most recently added object, which must be
    /// emissive and not carry a light yet.
    pub fn attach_light(&mut self, position: Point3<f32>, intensity: Color) -> Result<&mut Self, SceneError> {
        let index = self.lights.len();
        let materials = &self.materials;
        match self.objects.last_mut() {
            Some(object) if materials[object.material()].emissive && object.light().is_none() => {
                object.attach_light(index);
            }
            _ => return Err(SceneError::NoEmitter),
        }
        self.lights.push(Light::new(position, intensity));
        Ok(self)
    }

    pub fn ambient(&mut self, ambient: Color) -> &mut Self {
        self.ambient = ambient;
        self
    }

    pub fn build(&mut self) -> Scene {
        let scene = Scene {
            materials: std::mem::take(&mut self.materials),
            objects: std::mem::take(&mut self.objects),
            lights: std::mem::take(&mut self.lights),
            ambient: self.ambient,
        };
        debug!(target: "app", "Built scene: {} materials, {} objects, {} lights",
            scene.materials.len(), scene.objects.len(), scene.lights.len());
        scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_spheres() -> Scene {
        let mut builder = Scene::builder();
        builder
            .material("gray", Material::lambert(Color::gray(0.5))).unwrap()
            .material("lamp", Material::emitter(Color::gray(10.0))).unwrap()
            .sphere("gray", point![0.0, 0.0, -5.0], 1.0).unwrap()
            .sphere("lamp", point![0.0, 0.0, -10.0], 1.0).unwrap()
            .light(point![0.0, 0.0, -9.0], Color::WHITE);
        builder.build()
    }

    #[test]
    fn intersect_picks_the_nearest_object() {
        let scene = two_spheres();
        let hit = scene.intersect(&Ray::new(Point3::origin(), vector![0.0, 0.0, -1.0])).unwrap();
        assert!((hit.t - 4.0).abs() < 1e-5);
        assert!((hit.point - point![0.0, 0.0, -4.0]).magnitude() < 1e-5);
        assert!(!scene.material(hit.object.material()).emissive);
    }

    #[test]
    fn intersect_misses_return_none() {
        let scene = two_spheres();
        assert!(scene.intersect(&Ray::new(Point3::origin(), vector![0.0, 1.0, 0.0])).is_none());
    }

    #[test]
    fn light_visibility_requires_an_emissive_first_hit() {
        let scene = two_spheres();
        let light = &scene.lights()[0];
        // blocked by the gray sphere
        assert!(!scene.light_visible(&Point3::origin(), light, 0.01));
        // the probe reaches the lamp sphere first
        assert!(scene.light_visible(&point![0.0, 0.0, -20.0], light, 0.01));
        // nothing is hit at all
        let stray = Light::new(point![20.0, 20.0, 20.0], Color::WHITE);
        assert!(!scene.light_visible(&point![10.0, 10.0, 10.0], &stray, 0.01));
    }

    #[test]
    fn attached_lights_belong_to_their_emitter() {
        let mut builder = Scene::builder();
        builder
            .material("gray", Material::lambert(Color::gray(0.5))).unwrap()
            .material("lamp", Material::emitter(Color::WHITE)).unwrap()
            .light(point![0.0, 9.0, 0.0], Color::gray(3.0))
            .sphere("lamp", point![0.0, 0.0, -5.0], 1.0).unwrap()
            .attach_light(point![0.0, 0.0, -4.0], Color::gray(2.0)).unwrap()
            .sphere("lamp", point![0.0, 0.0, -10.0], 1.0).unwrap()
            .sphere("gray", point![0.0, 0.0, -15.0], 1.0).unwrap();
        let scene = builder.build();

        assert_eq!(scene.lights().len(), 2);
        let [first, second, third] = scene.objects() else {
            panic!("expected three objects");
        };
        assert_eq!(scene.light_of(first).unwrap().intensity, Color::gray(2.0));
        assert!(scene.light_of(second).is_none());
        assert!(scene.light_of(third).is_none());
    }

    #[test]
    fn lights_attach_only_to_fresh_emitters() {
        let mut builder = Scene::builder();
        builder
            .material("gray", Material::lambert(Color::gray(0.5))).unwrap()
            .material("lamp", Material::emitter(Color::WHITE)).unwrap();
        assert_eq!(builder.attach_light(Point3::origin(), Color::WHITE).err(), Some(SceneError::NoEmitter));

        builder.sphere("gray", Point3::origin(), 1.0).unwrap();
        assert_eq!(builder.attach_light(Point3::origin(), Color::WHITE).err(), Some(SceneError::NoEmitter));

        builder.sphere("lamp", Point3::origin(), 1.0).unwrap();
        assert!(builder.attach_light(Point3::origin(), Color::WHITE).is_ok());
        assert_eq!(builder.attach_light(Point3::origin(), Color::WHITE).err(), Some(SceneError::NoEmitter));
        assert_eq!(builder.build().lights().len(), 1);
    }

    #[test]
    fn builder_rejects_bad_input() {
        let mut builder = Scene::builder();
        builder.material("gray", Material::default()).unwrap();

        assert_eq!(builder.plane("chalk", Point3::origin(), vector![0.0, 1.0, 0.0]).err(),
            Some(SceneError::UnknownMaterial("chalk".into())));
        assert_eq!(builder.plane("gray", Point3::origin(), vector![0.0, 0.0, 0.0]).err(),
            Some(SceneError::DegenerateNormal));
        assert_eq!(builder.sphere("gray", Point3::origin(), -1.0).err(),
            Some(SceneError::InvalidRadius(-1.0)));
        assert_eq!(builder.material("gray", Material::default()).err(),
            Some(SceneError::DuplicateMaterial("gray".into())));
    }

    #[test]
    fn cornell_box_is_closed_and_lit() {
        let scene = Scene::cornell_box().unwrap();
        assert_eq!(scene.objects().len(), 8);
        assert_eq!(scene.lights().len(), 1);
        assert_eq!(scene.materials().len(), 8);

        // the point light sits on the glowing cap poking through the ceiling
        let up = scene.intersect(&Ray::new(point![0.0, 1.5, -2.0], vector![0.0, 1.0, 0.0])).unwrap();
        assert!(scene.material(up.object.material()).emissive);
        let light = scene.light_of(up.object).unwrap();
        assert!((up.point - light.position).magnitude() < 0.05);
    }
}
