//! Material parameter sets and their admissible ranges.
//!
//! A loader hands the core one [`MaterialSpec`] per material instance: a
//! kind tag, named scalar parameters and named sub-material properties.
//! Each variant declares its parameters as [`ParamDecl`]s; values outside
//! the declared range fail fast with [`Error::InvalidMaterial`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Admissible range of a scalar parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamRange {
    Any,
    /// v > a
    Greater(f64),
    /// v ≥ a
    GreaterOrEqual(f64),
    /// a < v < b
    Open(f64, f64),
    /// a ≤ v ≤ b
    Closed(f64, f64),
}

impl ParamRange {
    pub fn contains(&self, v: f64) -> bool {
        if !v.is_finite() {
            return false;
        }
        match *self {
            ParamRange::Any => true,
            ParamRange::Greater(a) => v > a,
            ParamRange::GreaterOrEqual(a) => v >= a,
            ParamRange::Open(a, b) => v > a && v < b,
            ParamRange::Closed(a, b) => v >= a && v <= b,
        }
    }

    fn describe(&self) -> String {
        match *self {
            ParamRange::Any => "must be finite".into(),
            ParamRange::Greater(a) => format!("must be > {a}"),
            ParamRange::GreaterOrEqual(a) => format!("must be >= {a}"),
            ParamRange::Open(a, b) => format!("must be in ({a}, {b})"),
            ParamRange::Closed(a, b) => format!("must be in [{a}, {b}]"),
        }
    }
}

/// Declaration of one parameter of a material variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDecl {
    pub name: &'static str,
    pub range: ParamRange,
    pub default: Option<f64>,
}

impl ParamDecl {
    pub const fn required(name: &'static str, range: ParamRange) -> Self {
        Self { name, range, default: None }
    }

    pub const fn optional(name: &'static str, range: ParamRange, default: f64) -> Self {
        Self { name, range, default: Some(default) }
    }
}

/// Mass density, shared by every variant.
pub const DENSITY: ParamDecl = ParamDecl::optional("density", ParamRange::Greater(0.0), 1.0);

/// Parsed parameter set of one material instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    /// Variant tag resolved by the registry.
    pub kind: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
    /// Named sub-materials (mixture components, reactive base and bond, ...).
    #[serde(default)]
    pub properties: BTreeMap<String, MaterialSpec>,
}

impl MaterialSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Set a parameter.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }

    /// Set a sub-material property.
    pub fn with_property(mut self, name: &str, spec: MaterialSpec) -> Self {
        self.properties.insert(name.to_string(), spec);
        self
    }

    /// Reject parameters the variant does not declare.
    pub fn check_known(&self, decls: &[ParamDecl]) -> Result<()> {
        match self
            .parameters
            .keys()
            .find(|name| !decls.iter().any(|d| d.name == name.as_str()))
        {
            Some(name) => Err(Error::invalid_material(
                name,
                format!("not a parameter of '{}'", self.kind),
            )),
            None => Ok(()),
        }
    }

    /// Value of a declared parameter, falling back to its default.
    pub fn value(&self, decl: &ParamDecl) -> Result<f64> {
        let v = match (self.parameters.get(decl.name), decl.default) {
            (Some(&v), _) => v,
            (None, Some(d)) => d,
            (None, None) => {
                return Err(Error::invalid_material(decl.name, format!("required by '{}'", self.kind)))
            }
        };
        if decl.range.contains(v) {
            Ok(v)
        } else {
            Err(Error::invalid_material(decl.name, format!("{} (got {v})", decl.range.describe())))
        }
    }

    /// A named sub-material.
    pub fn property(&self, name: &str) -> Result<&MaterialSpec> {
        self.properties
            .get(name)
            .ok_or_else(|| Error::invalid_material(name, format!("property required by '{}'", self.kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const E: ParamDecl = ParamDecl::required("E", ParamRange::Greater(0.0));
    const NU: ParamDecl = ParamDecl::optional("v", ParamRange::Open(-1.0, 0.5), 0.3);

    #[test]
    fn test_defaults_and_ranges() {
        let spec = MaterialSpec::new("neo-Hookean").with("E", 10.0);
        assert_eq!(spec.value(&E).unwrap(), 10.0);
        assert_eq!(spec.value(&NU).unwrap(), 0.3);

        let spec = spec.with("v", 0.5);
        match spec.value(&NU) {
            Err(Error::InvalidMaterial { parameter, .. }) => assert_eq!(parameter, "v"),
            other => panic!("expected invalid material, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_and_unknown_parameters() {
        let spec = MaterialSpec::new("neo-Hookean").with("G", 1.0);
        assert!(spec.value(&E).is_err());
        assert!(spec.check_known(&[E, NU]).is_err());
        assert!(MaterialSpec::new("x").with("E", 1.0).check_known(&[E, NU]).is_ok());
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        assert!(!ParamRange::Any.contains(f64::NAN));
        assert!(!ParamRange::Greater(0.0).contains(f64::INFINITY));
        assert!(ParamRange::Closed(0.0, 1.0).contains(1.0));
    }

    #[test]
    fn test_spec_deserializes_from_json() {
        let json = r#"{
            "kind": "solid mixture",
            "properties": {
                "solid1": { "kind": "neo-Hookean", "parameters": { "E": 1.0, "v": 0.3 } }
            }
        }"#;
        let spec: MaterialSpec = serde_json::from_str(json).unwrap();
        assert!(spec.parameters.is_empty());
        assert_eq!(spec.property("solid1").unwrap().parameters["E"], 1.0);
        assert!(spec.property("solid2").is_err());
    }
}
