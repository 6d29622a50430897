//! Material records and the registry that hands out their ids.
//!
//! Records are immutable once registered. The registry only ever grows, and
//! ids are indices, so a particle's `material` stays valid for the whole run.

use crate::error::{SimError, SimResult};

pub type MaterialId = usize;

/// Elastic-frictional material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub young: f64,          // Young's modulus (Pa)
    pub poisson: f64,        // Poisson ratio, also the shear/normal stiffness ratio
    pub friction_angle: f64, // radians
    pub density: f64,        // kg/m^3
}

impl Material {
    pub fn new(name: &str, young: f64, poisson: f64, friction_angle: f64, density: f64) -> Self {
        Self {
            name: name.to_string(),
            young,
            poisson,
            friction_angle,
            density,
        }
    }

    /// Granular soil of borehole BH-5
    pub fn granular() -> Self {
        Self::new("granular", 1e7, 0.3, 30f64.to_radians(), 2600.0)
    }

    /// Clayey soil of borehole BH-6
    pub fn clayey() -> Self {
        Self::new("clayey", 1e6, 0.4, 20f64.to_radians(), 1800.0)
    }

    /// Frictionless steel for the loading plate
    pub fn steel_plate() -> Self {
        Self::new("plate", 2e8, 0.25, 0.0, 7850.0)
    }

    /// Speed of a compression wave, sqrt(E / rho)
    pub fn p_wave_speed(&self) -> f64 {
        (self.young / self.density).sqrt()
    }

    pub fn validate(&self) -> SimResult<()> {
        let ok = self.young > 0.0
            && self.young.is_finite()
            && self.density > 0.0
            && self.density.is_finite()
            && self.poisson >= 0.0
            && (0.0..std::f64::consts::FRAC_PI_2).contains(&self.friction_angle);
        if ok {
            Ok(())
        } else {
            Err(SimError::config(format!(
                "material '{}' has invalid properties (E={}, nu={}, phi={}, rho={})",
                self.name, self.young, self.poisson, self.friction_angle, self.density
            )))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaterialRegistry {
    materials: Vec<Material>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the granular, clayey and plate materials
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        for mat in [Material::granular(), Material::clayey(), Material::steel_plate()] {
            // defaults are valid and uniquely named
            reg.materials.push(mat);
        }
        reg
    }

    /// Add a material and return its id. Names must be unique.
    pub fn register(&mut self, material: Material) -> SimResult<MaterialId> {
        material.validate()?;
        if self.id_of(&material.name).is_some() {
            return Err(SimError::config(format!(
                "material '{}' is already registered",
                material.name
            )));
        }
        self.materials.push(material);
        Ok(self.materials.len() - 1)
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    /// Lookup by id for bodies already validated against this registry
    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id]
    }

    pub fn id_of(&self, name: &str) -> Option<MaterialId> {
        self.materials.iter().position(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.materials.iter().enumerate()
    }
}
