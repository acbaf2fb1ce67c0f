//! Registration table mapping material kind tags to constructors.
//!
//! A registry is an explicit value handed to the model builder. The
//! built-in variants are available through [`MaterialRegistry::with_builtin`];
//! callers can register further kinds before building.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::material::params::MaterialSpec;
use crate::material::{
    fiber_pow_linear, mixture, mooney_rivlin, neo_hookean, reactive_viscoelastic, FiberPowLinear,
    Material, MooneyRivlin, NeoHookean, ReactiveViscoelastic, SolidMixture, UncoupledMaterial,
    UncoupledSolid,
};

/// Constructor of a coupled solid.
pub type SolidFactory = fn(&MaterialSpec, &MaterialRegistry) -> Result<Box<dyn Material>>;

/// Constructor of an uncoupled solid.
pub type UncoupledFactory = fn(&MaterialSpec, &MaterialRegistry) -> Result<Box<dyn UncoupledMaterial>>;

#[derive(Clone)]
pub struct MaterialRegistry {
    solids: BTreeMap<String, SolidFactory>,
    uncoupled: BTreeMap<String, UncoupledFactory>,
}

impl fmt::Debug for MaterialRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterialRegistry").field("kinds", &self.kinds()).finish()
    }
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl MaterialRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            solids: BTreeMap::new(),
            uncoupled: BTreeMap::new(),
        }
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_solid(neo_hookean::KIND, NeoHookean::from_spec);
        registry.register_solid(fiber_pow_linear::KIND, FiberPowLinear::from_spec);
        registry.register_solid(mixture::KIND, SolidMixture::from_spec);
        registry.register_uncoupled(mooney_rivlin::KIND, MooneyRivlin::from_spec);
        registry.register_uncoupled(reactive_viscoelastic::KIND, ReactiveViscoelastic::from_spec);
        registry
    }

    pub fn register_solid(&mut self, kind: &str, factory: SolidFactory) {
        self.solids.insert(kind.to_string(), factory);
    }

    pub fn register_uncoupled(&mut self, kind: &str, factory: UncoupledFactory) {
        self.uncoupled.insert(kind.to_string(), factory);
    }

    /// All registered kind tags.
    pub fn kinds(&self) -> Vec<&str> {
        self.solids
            .keys()
            .chain(self.uncoupled.keys())
            .map(String::as_str)
            .collect()
    }

    /// Build a solid. Uncoupled kinds get the volumetric penalty attached.
    ///
    /// # Errors
    ///
    /// Unknown kinds and out-of-range parameters fail with
    /// [`Error::InvalidMaterial`] naming the offending parameter.
    pub fn create(&self, spec: &MaterialSpec) -> Result<Box<dyn Material>> {
        debug!(kind = %spec.kind, "creating material");
        if let Some(factory) = self.solids.get(&spec.kind) {
            return factory(spec, self);
        }
        if let Some(factory) = self.uncoupled.get(&spec.kind) {
            return Ok(Box::new(UncoupledSolid::new(factory(spec, self)?)));
        }
        Err(self.unknown(spec))
    }

    /// Build an uncoupled material, e.g. the base of a reactive solid.
    pub fn create_uncoupled(&self, spec: &MaterialSpec) -> Result<Box<dyn UncoupledMaterial>> {
        match self.uncoupled.get(&spec.kind) {
            Some(factory) => factory(spec, self),
            None if self.solids.contains_key(&spec.kind) => Err(Error::invalid_material(
                "kind",
                format!("'{}' has no uncoupled formulation", spec.kind),
            )),
            None => Err(self.unknown(spec)),
        }
    }

    fn unknown(&self, spec: &MaterialSpec) -> Error {
        Error::invalid_material("kind", format!("unknown material '{}'", spec.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_kinds() {
        let registry = MaterialRegistry::default();
        let kinds = registry.kinds();
        for kind in [
            "neo-Hookean",
            "fiber-pow-linear",
            "solid mixture",
            "Mooney-Rivlin",
            "uncoupled viscoelastic",
        ] {
            assert!(kinds.contains(&kind), "{kind} missing");
        }
        assert!(MaterialRegistry::new().kinds().is_empty());
    }

    #[test]
    fn test_unknown_kind() {
        let registry = MaterialRegistry::with_builtin();
        match registry.create(&MaterialSpec::new("Ogden")) {
            Err(Error::InvalidMaterial { parameter, .. }) => assert_eq!(parameter, "kind"),
            other => panic!("expected unknown kind, got {other:?}"),
        }
    }

    #[test]
    fn test_uncoupled_kind_is_wrapped() {
        let registry = MaterialRegistry::with_builtin();
        let spec = MaterialSpec::new("Mooney-Rivlin").with("c1", 1.0).with("k", 10.0);
        let m = registry.create(&spec).unwrap();
        assert_eq!(m.kind(), "Mooney-Rivlin");
        let neo = MaterialSpec::new("neo-Hookean").with("E", 1.0).with("v", 0.3);
        assert!(registry.create_uncoupled(&neo).is_err());
    }

    #[test]
    fn test_parameter_errors_name_the_parameter() {
        let registry = MaterialRegistry::with_builtin();
        let spec = MaterialSpec::new("fiber-pow-linear")
            .with("E", 1.0)
            .with("lam0", 1.0)
            .with("beta", 2.0);
        match registry.create(&spec) {
            Err(Error::InvalidMaterial { parameter, .. }) => assert_eq!(parameter, "lam0"),
            other => panic!("expected invalid lam0, got {other:?}"),
        }
    }

    #[test]
    fn test_custom_registration() {
        fn soft(_: &MaterialSpec, _: &MaterialRegistry) -> Result<Box<dyn Material>> {
            Ok(Box::new(NeoHookean::new(1e-3, 0.0)?))
        }
        let mut registry = MaterialRegistry::new();
        registry.register_solid("soft", soft);
        assert_eq!(registry.create(&MaterialSpec::new("soft")).unwrap().kind(), "neo-Hookean");
    }
}
