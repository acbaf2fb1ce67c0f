//! Uncoupled reactive viscoelastic solid.
//!
//! The response is an elastic base plus a population of reactive bonds.
//! Bonds form in generations: generation i is created at time vᵢ with the
//! deformation Fᵢ current at that moment, and carries mass fraction
//!
//! ```text
//! wᵢ(t) = fᵢ g(t - vᵢ)
//! ```
//!
//! where g is the bond relaxation law. Each generation responds to the
//! relative deformation F Fᵢ⁻¹, so
//!
//! ```text
//! σ̃ = σ̃_base(F) + Σ wᵢ σ̃_bond(F Fᵢ⁻¹)
//! ```
//!
//! A converged state whose strain since the newest generation exceeds the
//! trigger threshold creates a generation with the reforming fraction
//! 1 - Σ wᵢ. Generations (other than the newest) whose fraction has decayed
//! below `wmin` are culled.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::material::params::{MaterialSpec, ParamDecl, ParamRange, DENSITY};
use crate::material::registry::MaterialRegistry;
use crate::material::relaxation::BondRelaxation;
use crate::material::{Generation, History, MaterialPoint, UncoupledMaterial};
use crate::types::{Mat3, Tangent};

pub const KIND: &str = "uncoupled viscoelastic";

const WMIN: ParamDecl = ParamDecl::optional("wmin", ParamRange::Closed(0.0, 1.0), 0.0);
const TRIGGER: ParamDecl = ParamDecl::optional("trigger", ParamRange::Closed(0.0, 2.0), 0.0);
const EMIN: ParamDecl = ParamDecl::optional("emin", ParamRange::GreaterOrEqual(0.0), f64::EPSILON);
const K: ParamDecl = ParamDecl::required("k", ParamRange::GreaterOrEqual(0.0));

/// Strain measure that triggers a new bond generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Any change of the right stretch tensor.
    #[default]
    Any,
    /// Isochoric part of the stretch only.
    Distortional,
    /// Volume change only.
    Dilatational,
}

impl Trigger {
    fn from_code(code: f64) -> Result<Self> {
        match code {
            c if c == 0.0 => Ok(Self::Any),
            c if c == 1.0 => Ok(Self::Distortional),
            c if c == 2.0 => Ok(Self::Dilatational),
            _ => Err(Error::invalid_material("trigger", "must be 0, 1 or 2")),
        }
    }

    /// Strain of the relative deformation `fv` with Jacobian `jv`.
    pub fn strain(&self, fv: &Mat3, jv: f64) -> f64 {
        match self {
            Self::Any => (right_stretch(fv) - Mat3::identity()).norm(),
            Self::Distortional => (right_stretch(fv) * jv.powf(-1.0 / 3.0) - Mat3::identity()).norm(),
            Self::Dilatational => (jv - 1.0).abs(),
        }
    }
}

/// Right stretch U = √(FᵀF).
fn right_stretch(f: &Mat3) -> Mat3 {
    let mut eig = (f.transpose() * f).symmetric_eigen();
    eig.eigenvalues.apply(|v| *v = v.max(0.0).sqrt());
    eig.recompose()
}

#[derive(Debug)]
pub struct ReactiveViscoelastic {
    base: Box<dyn UncoupledMaterial>,
    bond: Box<dyn UncoupledMaterial>,
    relaxation: BondRelaxation,
    /// Culling floor on generation mass fractions.
    pub wmin: f64,
    pub trigger: Trigger,
    /// Strain threshold of the trigger.
    pub emin: f64,
    /// Bulk modulus of the volumetric penalty.
    pub k: f64,
    pub density: f64,
}

impl ReactiveViscoelastic {
    pub fn new(
        base: Box<dyn UncoupledMaterial>,
        bond: Box<dyn UncoupledMaterial>,
        relaxation: BondRelaxation,
        k: f64,
    ) -> Result<Self> {
        if !(k >= 0.0) {
            return Err(Error::invalid_material("k", "bulk modulus must be non-negative"));
        }
        Ok(Self {
            base,
            bond,
            relaxation,
            wmin: 0.0,
            trigger: Trigger::Any,
            emin: f64::EPSILON,
            k,
            density: 1.0,
        })
    }

    pub fn with_wmin(mut self, wmin: f64) -> Result<Self> {
        if !WMIN.range.contains(wmin) {
            return Err(Error::invalid_material("wmin", "must be in [0, 1]"));
        }
        self.wmin = wmin;
        Ok(self)
    }

    pub fn with_trigger(mut self, trigger: Trigger, emin: f64) -> Result<Self> {
        if !EMIN.range.contains(emin) {
            return Err(Error::invalid_material("emin", "must be non-negative"));
        }
        self.trigger = trigger;
        self.emin = emin;
        Ok(self)
    }

    pub(crate) fn from_spec(
        spec: &MaterialSpec,
        registry: &MaterialRegistry,
    ) -> Result<Box<dyn UncoupledMaterial>> {
        spec.check_known(&[WMIN, TRIGGER, EMIN, K, DENSITY])?;
        let base = registry.create_uncoupled(spec.property("elastic")?)?;
        let bond = registry.create_uncoupled(spec.property("bond")?)?;
        for (name, m) in [("elastic", &base), ("bond", &bond)] {
            if m.create_point().history != History::None {
                return Err(Error::invalid_material(name, "reactive components must be history-free"));
            }
        }
        let relaxation = BondRelaxation::from_spec(spec.property("relaxation")?)?;

        let mut material = Self::new(base, bond, relaxation, spec.value(&K)?)?
            .with_wmin(spec.value(&WMIN)?)?
            .with_trigger(Trigger::from_code(spec.value(&TRIGGER)?)?, spec.value(&EMIN)?)?;
        material.density = spec.value(&DENSITY)?;
        Ok(Box::new(material))
    }

    pub fn relaxation(&self) -> &BondRelaxation {
        &self.relaxation
    }

    /// Mass fraction of generation `g` at time `t`.
    pub fn weight(&self, g: &Generation, t: f64) -> f64 {
        g.fraction * self.relaxation.relaxation(t - g.time)
    }

    /// Fraction available to a generation formed at time `t`.
    pub fn reforming_fraction(&self, generations: &[Generation], t: f64) -> f64 {
        let used: f64 = generations.iter().map(|g| self.weight(g, t)).sum();
        (1.0 - used).clamp(0.0, 1.0)
    }

    /// Strain since the newest generation.
    pub fn generation_strain(&self, pt: &MaterialPoint) -> f64 {
        match pt.generations().last() {
            Some(g) => {
                let fv = pt.elastic.f * g.fi;
                self.trigger.strain(&fv, pt.elastic.j * g.ji)
            }
            None => 0.0,
        }
    }

    /// Whether committing `pt` would create a generation.
    pub fn new_generation(&self, pt: &MaterialPoint) -> bool {
        matches!(pt.history, History::Reactive(_)) && self.generation_strain(pt) > self.emin
    }

    /// Remove decayed generations, always keeping the newest. Returns the
    /// fractions of the removed generations at time `t`.
    pub fn cull_generations(&self, generations: &mut Vec<Generation>, t: f64) -> Vec<f64> {
        let newest = generations.len().saturating_sub(1);
        let mut removed = Vec::new();
        let mut index = 0;
        generations.retain(|g| {
            let keep = index == newest || self.weight(g, t) >= self.wmin;
            if !keep {
                removed.push(self.weight(g, t));
            }
            index += 1;
            keep
        });
        removed
    }

    /// Point state of one generation: the relative deformation F Fᵢ⁻¹.
    fn bond_point(pt: &MaterialPoint, g: &Generation) -> MaterialPoint {
        MaterialPoint {
            elastic: pt.elastic.with_deformation(pt.elastic.f * g.fi, pt.elastic.j * g.ji),
            history: History::None,
        }
    }

    fn bonds<'a>(&'a self, pt: &'a MaterialPoint) -> impl Iterator<Item = (f64, MaterialPoint)> + 'a {
        let t = pt.elastic.time;
        pt.generations()
            .iter()
            .map(move |g| (self.weight(g, t), Self::bond_point(pt, g)))
            .filter(|(w, _)| *w > 0.0)
    }
}

impl UncoupledMaterial for ReactiveViscoelastic {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn density(&self) -> f64 {
        self.density
    }

    fn bulk_modulus(&self) -> f64 {
        self.k
    }

    fn dev_stress(&self, pt: &MaterialPoint) -> Mat3 {
        self.bonds(pt)
            .fold(self.base.dev_stress(pt), |s, (w, bp)| s + self.bond.dev_stress(&bp) * w)
    }

    fn dev_tangent(&self, pt: &MaterialPoint) -> Tangent {
        self.bonds(pt)
            .fold(self.base.dev_tangent(pt), |c, (w, bp)| c + self.bond.dev_tangent(&bp) * w)
    }

    fn dev_strain_energy_density(&self, pt: &MaterialPoint) -> f64 {
        self.bonds(pt).fold(self.base.dev_strain_energy_density(pt), |sed, (w, bp)| {
            sed + self.bond.dev_strain_energy_density(&bp) * w
        })
    }

    fn create_point(&self) -> MaterialPoint {
        MaterialPoint::with_history(History::Reactive(vec![Generation::initial()]))
    }

    fn commit(&self, pt: &mut MaterialPoint) {
        let t = pt.elastic.time;
        let created = if self.new_generation(pt) {
            let fraction = self.reforming_fraction(pt.generations(), t);
            pt.elastic.f.try_inverse().map(|fi| Generation {
                fi,
                ji: 1.0 / pt.elastic.j,
                time: t,
                fraction,
            })
        } else {
            None
        };

        if let History::Reactive(generations) = &mut pt.history {
            if let Some(g) = created {
                trace!(time = t, fraction = g.fraction, "bond generation created");
                generations.push(g);
            }
            let removed = self.cull_generations(generations, t);
            if !removed.is_empty() {
                trace!(time = t, culled = removed.len(), live = generations.len(), "bond generations culled");
            }
        }
    }
}
