use std::collections::HashMap;
use std::ops::Index;

use crate::picture::Color;
use crate::scene::SceneError;

/// Phong exponent reserved for ideal mirrors.
pub const MIRROR_EXPONENT: f32 = -1.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub k_d: Color,
    pub k_s: Color,
    /// Phong exponent; negative for an ideal mirror.
    pub alpha: f32,
    pub emissive: bool,
}

impl Default for Material {
    fn default() -> Self {
        Material::lambert(Color::BLACK)
    }
}

impl Material {
    pub fn lambert(k_d: Color) -> Material {
        Material { k_d, k_s: Color::BLACK, alpha: 1.0, emissive: false }
    }

    pub fn phong(k_d: Color, k_s: Color, alpha: f32) -> Material {
        Material { k_d, k_s, alpha, emissive: false }
    }

    pub fn mirror(k_d: Color, k_s: Color) -> Material {
        Material::phong(k_d, k_s, MIRROR_EXPONENT)
    }

    pub fn emitter(k_d: Color) -> Material {
        Material { emissive: true, ..Material::lambert(k_d) }
    }

    pub fn is_mirror(&self) -> bool {
        self.alpha < 0.0
    }
}

/// Stable index into a [`MaterialTable`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(usize);

/// Materials addressed by name while building a scene and by [`MaterialId`] while rendering.
#[derive(Clone, Debug, Default)]
pub struct MaterialTable {
    materials: Vec<Material>,
    names: HashMap<String, MaterialId>,
}

impl MaterialTable {
    pub fn insert(&mut self, name: &str, material: Material) -> Result<MaterialId, SceneError> {
        if self.names.contains_key(name) {
            return Err(SceneError::DuplicateMaterial(name.to_owned()));
        }
        let id = MaterialId(self.materials.len());
        self.materials.push(material);
        self.names.insert(name.to_owned(), id);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Result<MaterialId, SceneError> {
        self.names.get(name)
            .copied()
            .ok_or_else(|| SceneError::UnknownMaterial(name.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl Index<MaterialId> for MaterialTable {
    type Output = Material;

    fn index(&self, id: MaterialId) -> &Material {
        &self.materials[id.0]
    }
}
