//! Mixture of solids sharing one deformation.
//!
//! Stress, tangent and strain energy are the sums over the components.

use crate::error::{Error, Result};
use crate::material::params::{MaterialSpec, DENSITY};
use crate::material::registry::MaterialRegistry;
use crate::material::{History, Material, MaterialPoint};
use crate::types::{Mat3, Tangent};

pub const KIND: &str = "solid mixture";

/// Prefix of component property names, e.g. `solid1`, `solid2`.
const COMPONENT: &str = "solid";

#[derive(Debug)]
pub struct SolidMixture {
    components: Vec<Box<dyn Material>>,
    pub density: f64,
}

impl SolidMixture {
    /// # Errors
    ///
    /// Components must not carry history; their points would have to be
    /// tracked separately.
    pub fn new(components: Vec<Box<dyn Material>>) -> Result<Self> {
        if components.is_empty() {
            return Err(Error::invalid_material(COMPONENT, "a mixture needs at least one component"));
        }
        if let Some(m) = components.iter().find(|m| m.create_point().history != History::None) {
            return Err(Error::invalid_material(
                COMPONENT,
                format!("'{}' carries history and cannot be mixed", m.kind()),
            ));
        }
        Ok(Self {
            components,
            density: 1.0,
        })
    }

    pub(crate) fn from_spec(spec: &MaterialSpec, registry: &MaterialRegistry) -> Result<Box<dyn Material>> {
        spec.check_known(&[DENSITY])?;
        let components = spec
            .properties
            .iter()
            .filter(|(name, _)| name.starts_with(COMPONENT))
            .map(|(_, component)| registry.create(component))
            .collect::<Result<Vec<_>>>()?;
        let mut mixture = Self::new(components)?;
        mixture.density = spec.value(&DENSITY)?;
        Ok(Box::new(mixture))
    }

    pub fn components(&self) -> &[Box<dyn Material>] {
        &self.components
    }
}

impl Material for SolidMixture {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn density(&self) -> f64 {
        self.density
    }

    fn stress(&self, pt: &MaterialPoint) -> Mat3 {
        self.components.iter().map(|m| m.stress(pt)).sum()
    }

    fn tangent(&self, pt: &MaterialPoint) -> Tangent {
        self.components.iter().map(|m| m.tangent(pt)).sum()
    }

    fn strain_energy_density(&self, pt: &MaterialPoint) -> f64 {
        self.components.iter().map(|m| m.strain_energy_density(pt)).sum()
    }
}
