//! The analysis model.
//!
//! A [`Model`] ties the mesh to its domains, boundary conditions, loads and
//! contact interfaces, and owns the nodal fields of the current state.
//! Prescribed displacements, nodal loads and body forces are scaled by a
//! common [`LoadCurve`].

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::body_force::BodyForce;
use crate::contact::ContactInterface;
use crate::dof::{DofTable, EquationMap, NodalDofs, DOFS_PER_NODE};
use crate::domain::ElasticSolidDomain;
use crate::error::{Error, Result};
use crate::material::{MaterialRegistry, MaterialSpec};
use crate::mesh::{ElementType, Mesh};
use crate::sparse::{GlobalMatrix, GlobalVector};
use crate::types::{Point3, Vec3};

/// A value attached to one nodal dof.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodalValue {
    pub node: usize,
    pub dof: usize,
    pub value: f64,
}

/// Load factor as a function of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadCurve {
    /// Full load at all times.
    Constant,
    /// Piecewise linear through (time, factor) points, constant outside.
    Linear(Vec<(f64, f64)>),
}

impl Default for LoadCurve {
    fn default() -> Self {
        Self::Linear(vec![(0.0, 0.0), (1.0, 1.0)])
    }
}

impl LoadCurve {
    /// Linear ramp from 0 at t = 0 to 1 at `end`.
    pub fn ramp(end: f64) -> Result<Self> {
        Self::linear(vec![(0.0, 0.0), (end, 1.0)])
    }

    /// # Errors
    ///
    /// The points must be non-empty with strictly increasing times.
    pub fn linear(points: Vec<(f64, f64)>) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::Config("load curve has no points".into()));
        }
        if points.windows(2).any(|w| !(w[1].0 > w[0].0)) {
            return Err(Error::Config("load curve times must increase".into()));
        }
        Ok(Self::Linear(points))
    }

    pub fn value(&self, t: f64) -> f64 {
        let points = match self {
            Self::Constant => return 1.0,
            Self::Linear(points) => points,
        };
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return 1.0;
        };
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }
        points
            .windows(2)
            .find(|w| t <= w[1].0)
            .map_or(last.1, |w| {
                let (t0, v0) = w[0];
                let (t1, v1) = w[1];
                v0 + (v1 - v0) * (t - t0) / (t1 - t0)
            })
    }
}

#[derive(Debug)]
pub struct Model {
    mesh: Mesh,
    domains: Vec<ElasticSolidDomain>,
    contacts: Vec<Box<dyn ContactInterface>>,
    prescribed: Vec<NodalValue>,
    loads: Vec<NodalValue>,
    body_forces: Vec<BodyForce>,
    load_curve: LoadCurve,
    dofs: Option<DofTable>,
    time: f64,
    displacement: Vec<Vec3>,
    velocity: Vec<Vec3>,
    acceleration: Vec<Vec3>,
}

impl Model {
    pub fn new(mesh: Mesh) -> Self {
        let n = mesh.n_nodes();
        Self {
            mesh,
            domains: Vec::new(),
            contacts: Vec::new(),
            prescribed: Vec::new(),
            loads: Vec::new(),
            body_forces: Vec::new(),
            load_curve: LoadCurve::default(),
            dofs: None,
            time: 0.0,
            displacement: vec![Vec3::zeros(); n],
            velocity: vec![Vec3::zeros(); n],
            acceleration: vec![Vec3::zeros(); n],
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn domains(&self) -> &[ElasticSolidDomain] {
        &self.domains
    }

    pub fn domain_mut(&mut self, index: usize) -> Option<&mut ElasticSolidDomain> {
        self.domains.get_mut(index)
    }

    pub fn contacts(&self) -> &[Box<dyn ContactInterface>] {
        &self.contacts
    }

    /// Add a domain. An element may belong to one domain only.
    pub fn add_domain(&mut self, domain: ElasticSolidDomain) -> Result<usize> {
        if let Some(e) = domain
            .elements()
            .iter()
            .find(|&&e| self.domains.iter().any(|d| d.elements().contains(&e)))
        {
            return Err(Error::Mesh(format!(
                "element {e} of domain '{}' already belongs to another domain",
                domain.name()
            )));
        }
        self.dofs = None;
        self.domains.push(domain);
        Ok(self.domains.len() - 1)
    }

    /// Build a domain whose material is created from `spec`.
    pub fn add_material_domain(
        &mut self,
        name: &str,
        element_type: ElementType,
        elements: Vec<usize>,
        spec: &MaterialSpec,
        registry: &MaterialRegistry,
    ) -> Result<usize> {
        let material = registry.create(spec)?;
        let domain = ElasticSolidDomain::new(name, &self.mesh, element_type, elements)?.with_material(material);
        self.add_domain(domain)
    }

    fn check_node(&self, node: usize, dof: usize) -> Result<()> {
        if node >= self.mesh.n_nodes() || dof >= DOFS_PER_NODE {
            return Err(Error::Mesh(format!(
                "dof ({node}, {dof}) out of range for {} nodes",
                self.mesh.n_nodes()
            )));
        }
        Ok(())
    }

    /// Hold dofs of `node` at zero.
    pub fn fix(&mut self, node: usize, dofs: &[usize]) -> Result<()> {
        for &dof in dofs {
            self.prescribe(node, dof, 0.0)?;
        }
        Ok(())
    }

    /// Prescribe a displacement, reached at load factor 1.
    pub fn prescribe(&mut self, node: usize, dof: usize, value: f64) -> Result<()> {
        self.check_node(node, dof)?;
        self.prescribed.retain(|p| (p.node, p.dof) != (node, dof));
        self.prescribed.push(NodalValue { node, dof, value });
        self.dofs = None;
        Ok(())
    }

    /// Apply a nodal force, reached at load factor 1.
    pub fn add_nodal_load(&mut self, node: usize, dof: usize, value: f64) -> Result<()> {
        self.check_node(node, dof)?;
        self.loads.push(NodalValue { node, dof, value });
        Ok(())
    }

    pub fn add_body_force(&mut self, force: BodyForce) {
        self.body_forces.push(force);
    }

    pub fn add_contact(&mut self, contact: Box<dyn ContactInterface>) {
        self.dofs = None;
        self.contacts.push(contact);
    }

    pub fn set_load_curve(&mut self, curve: LoadCurve) {
        self.load_curve = curve;
    }

    pub fn load_factor(&self, t: f64) -> f64 {
        self.load_curve.value(t)
    }

    /// Number equations, create material points and set up contacts on the
    /// reference configuration.
    ///
    /// # Errors
    ///
    /// Fails if an element belongs to no domain, a domain has no material
    /// or a contact surface references a missing node.
    pub fn initialize(&mut self) -> Result<()> {
        let covered: usize = self.domains.iter().map(ElasticSolidDomain::n_elements).sum();
        if covered != self.mesh.n_elements() {
            return Err(Error::Mesh(format!(
                "{} of {} elements are assigned to a domain",
                covered,
                self.mesh.n_elements()
            )));
        }
        let fixed: Vec<(usize, usize)> = self.prescribed.iter().map(|p| (p.node, p.dof)).collect();
        let dofs = DofTable::new(self.mesh.n_nodes(), &fixed)?;

        for domain in &mut self.domains {
            domain.initialize(&self.mesh)?;
        }
        for contact in &mut self.contacts {
            contact.initialize(self.mesh.nodes())?;
        }
        let n = self.mesh.n_nodes();
        self.displacement = vec![Vec3::zeros(); n];
        self.velocity = vec![Vec3::zeros(); n];
        self.acceleration = vec![Vec3::zeros(); n];
        self.time = 0.0;

        info!(
            nodes = n,
            elements = self.mesh.n_elements(),
            equations = dofs.n_equations(),
            domains = self.domains.len(),
            contacts = self.contacts.len(),
            "model initialized"
        );
        self.dofs = Some(dofs);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.dofs.is_some() && self.domains.iter().all(ElasticSolidDomain::is_initialized)
    }

    /// Return to the reference state at t = 0.
    pub fn reset(&mut self) -> Result<()> {
        self.initialize()
    }

    /// Equation numbering of the free dofs.
    pub fn dofs(&self) -> Result<&DofTable> {
        self.dofs
            .as_ref()
            .ok_or_else(|| Error::Config("model is not initialized".into()))
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn displacement(&self) -> &[Vec3] {
        &self.displacement
    }

    pub fn velocity(&self) -> &[Vec3] {
        &self.velocity
    }

    pub fn acceleration(&self) -> &[Vec3] {
        &self.acceleration
    }

    pub(crate) fn set_kinematics(&mut self, velocity: Vec<Vec3>, acceleration: Vec<Vec3>) {
        self.velocity = velocity;
        self.acceleration = acceleration;
    }

    pub(crate) fn set_state(
        &mut self,
        time: f64,
        displacement: Vec<Vec3>,
        velocity: Vec<Vec3>,
        acceleration: Vec<Vec3>,
    ) -> Result<()> {
        let n = self.mesh.n_nodes();
        if [displacement.len(), velocity.len(), acceleration.len()] != [n; 3] {
            return Err(Error::Checkpoint(format!("nodal fields do not match {n} nodes")));
        }
        self.time = time;
        self.displacement = displacement;
        self.velocity = velocity;
        self.acceleration = acceleration;
        Ok(())
    }

    pub(crate) fn domains_mut(&mut self) -> &mut [ElasticSolidDomain] {
        &mut self.domains
    }

    pub(crate) fn contacts_mut(&mut self) -> &mut [Box<dyn ContactInterface>] {
        &mut self.contacts
    }

    /// Current nodal positions x = X + u.
    pub fn current_positions(&self) -> Vec<Point3> {
        self.mesh
            .nodes()
            .iter()
            .zip(&self.displacement)
            .map(|(x0, u)| x0 + u)
            .collect()
    }

    /// Set prescribed dofs to their values at time `t`.
    pub fn apply_prescribed(&mut self, t: f64) {
        let lf = self.load_factor(t);
        for p in &self.prescribed {
            self.displacement[p.node][p.dof] = p.value * lf;
        }
    }

    /// Add a solution increment to the free dofs.
    pub fn apply_increment(&mut self, du: &[f64]) -> Result<()> {
        let dofs = self
            .dofs
            .as_ref()
            .ok_or_else(|| Error::Config("model is not initialized".into()))?;
        if du.len() != dofs.n_equations() {
            return Err(Error::Solver(format!(
                "increment has {} entries for {} equations",
                du.len(),
                dofs.n_equations()
            )));
        }
        for (node, u) in self.displacement.iter_mut().enumerate() {
            for (dof, eq) in dofs.node_lm(node).into_iter().enumerate() {
                if eq >= 0 {
                    u[dof] += du[eq as usize];
                }
            }
        }
        Ok(())
    }

    /// Evaluate every domain and contact at the current displacement.
    ///
    /// # Errors
    ///
    /// An inverted element reports [`Error::DegenerateElement`].
    pub fn update(&mut self, time: f64) -> Result<()> {
        let x = self.current_positions();
        for domain in &mut self.domains {
            domain.update(&x, time)?;
        }
        for contact in &mut self.contacts {
            contact.update(&x)?;
        }
        self.time = time;
        Ok(())
    }

    /// Advance material history at a converged state.
    pub fn commit(&mut self) -> Result<()> {
        for domain in &mut self.domains {
            domain.commit()?;
        }
        Ok(())
    }

    /// Equation lists of every element and contact pair.
    pub fn equation_lists(&self, map: &dyn EquationMap) -> Vec<Vec<isize>> {
        self.domains
            .iter()
            .flat_map(|d| d.equation_lists(map))
            .chain(self.contact_equation_lists(map))
            .collect()
    }

    pub fn contact_equation_lists(&self, map: &dyn EquationMap) -> Vec<Vec<isize>> {
        self.contacts.iter().flat_map(|c| c.equation_lists(map)).collect()
    }

    /// Out-of-balance force R = f_ext - f_int - M a + f_contact.
    ///
    /// The inertial term is included when `inertia` is set.
    pub fn residual(&self, map: &dyn EquationMap, inertia: bool) -> Result<GlobalVector> {
        let n = map.len();
        let lf = self.load_factor(self.time);
        let x = self.current_positions();

        let mut r = GlobalVector::zeros(n);
        for load in &self.loads {
            let eq = map.element_lm(&[load.node])[load.dof];
            if eq >= 0 {
                r.add(eq as usize, load.value * lf);
            }
        }
        let mut resisting = GlobalVector::zeros(n);
        for domain in &self.domains {
            domain.body_forces(&self.body_forces, lf, &x, map, &mut r)?;
            domain.internal_forces(map, &mut resisting)?;
            if inertia {
                domain.inertial_forces(&self.acceleration, map, &mut resisting)?;
            }
        }
        for (ri, fi) in r.as_mut_slice().iter_mut().zip(resisting.as_slice()) {
            *ri -= fi;
        }
        for contact in &self.contacts {
            contact.residual(map, &mut r);
        }
        Ok(r)
    }

    /// Tangent K + `mass_factor` M over the free dofs.
    pub fn stiffness(&self, mass_factor: f64, k: &mut GlobalMatrix) -> Result<()> {
        let map = self.dofs()?;
        let lf = self.load_factor(self.time);
        let x = self.current_positions();
        k.zero();
        for domain in &self.domains {
            domain.stiffness(map, k)?;
            if mass_factor > 0.0 {
                domain.mass_stiffness(mass_factor, map, k)?;
            }
            domain.body_force_stiffness(&self.body_forces, lf, &x, map, k)?;
        }
        for contact in &self.contacts {
            contact.stiffness(map, k)?;
        }
        Ok(())
    }

    /// Support reactions at the prescribed dofs, zero elsewhere.
    pub fn reactions(&self) -> Result<Vec<Vec3>> {
        let dofs = self.dofs()?;
        let inertia = self.acceleration.iter().any(|a| *a != Vec3::zeros());
        let r = self.residual(&NodalDofs { n_nodes: self.mesh.n_nodes() }, inertia)?;
        Ok((0..self.mesh.n_nodes())
            .map(|node| {
                Vec3::from_fn(|dof, _| {
                    if dofs.is_prescribed(node, dof) {
                        -r.as_slice()[DOFS_PER_NODE * node + dof]
                    } else {
                        0.0
                    }
                })
            })
            .collect())
    }

    /// Total strain energy of all domains.
    pub fn strain_energy(&self) -> Result<f64> {
        self.domains.iter().map(ElasticSolidDomain::strain_energy).sum()
    }
}
