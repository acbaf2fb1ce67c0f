//! Elastic solid domains.
//!
//! A domain groups elements of one family that share a material. It owns
//! the material points of its elements in a flat arena indexed by
//! `element * n_points + gp` and provides the element loops of the
//! assembly: internal forces, material plus geometric stiffness, consistent
//! mass and body forces.
//!
//! Element loops run in parallel with Rayon. Each worker accumulates into
//! its own triplet buffer or list of vector entries; the buffers are merged
//! after the loop, so assembly needs no locks.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::debug;

use crate::body_force::BodyForce;
use crate::dof::{EquationMap, DOFS_PER_NODE};
use crate::element::{solid_shape, ReferenceGradients, ShapeTable};
use crate::error::{Error, Result};
use crate::material::{Material, MaterialPoint};
use crate::mesh::{ElementType, Mesh};
use crate::sparse::{GlobalMatrix, GlobalVector, TripletMatrix};
use crate::types::{Mat3, Point3, Vec3};

#[derive(Debug)]
pub struct ElasticSolidDomain {
    name: String,
    element_type: ElementType,
    /// Mesh indices of the elements.
    elements: Vec<usize>,
    connectivity: Vec<Vec<usize>>,
    material: Option<Box<dyn Material>>,
    shape: ShapeTable,
    /// Material orientation Q of each element.
    orientations: Vec<Mat3>,
    reference: Vec<ReferenceGradients>,
    points: Vec<MaterialPoint>,
}

impl ElasticSolidDomain {
    /// Create a domain over mesh elements of one type.
    ///
    /// # Errors
    ///
    /// Fails if an element does not exist or is of another type.
    pub fn new(name: impl Into<String>, mesh: &Mesh, element_type: ElementType, elements: Vec<usize>) -> Result<Self> {
        let name = name.into();
        let connectivity = elements
            .iter()
            .map(|&e| match mesh.element(e) {
                Some(el) if el.element_type == element_type => Ok(el.nodes.clone()),
                Some(el) => Err(Error::Mesh(format!(
                    "element {e} is {:?}, domain '{name}' holds {element_type:?}",
                    el.element_type
                ))),
                None => Err(Error::Mesh(format!("domain '{name}' references missing element {e}"))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            shape: ShapeTable::new(solid_shape(element_type).as_ref()),
            orientations: vec![Mat3::identity(); elements.len()],
            name,
            element_type,
            elements,
            connectivity,
            material: None,
            reference: Vec::new(),
            points: Vec::new(),
        })
    }

    /// Domain over every mesh element of `element_type`.
    pub fn all_of_type(name: impl Into<String>, mesh: &Mesh, element_type: ElementType) -> Result<Self> {
        let elements = (0..mesh.n_elements())
            .filter(|&e| mesh.elements()[e].element_type == element_type)
            .collect();
        Self::new(name, mesh, element_type, elements)
    }

    pub fn with_material(mut self, material: Box<dyn Material>) -> Self {
        self.set_material(material);
        self
    }

    /// Assign the material. Points are created by the next [`initialize`](Self::initialize).
    pub fn set_material(&mut self, material: Box<dyn Material>) {
        self.material = Some(material);
        self.points.clear();
    }

    pub fn material(&self) -> Option<&dyn Material> {
        self.material.as_deref()
    }

    pub(crate) fn require_material(&self) -> Result<&dyn Material> {
        self.material
            .as_deref()
            .ok_or_else(|| Error::Config(format!("domain '{}' has no material", self.name)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Mesh indices of the domain's elements.
    pub fn elements(&self) -> &[usize] {
        &self.elements
    }

    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn connectivity(&self, e: usize) -> &[usize] {
        &self.connectivity[e]
    }

    /// Integration points per element.
    pub fn n_points(&self) -> usize {
        self.shape.n_points()
    }

    /// Set the local material axes of element `e` (domain-local index).
    pub fn set_orientation(&mut self, e: usize, q: Mat3) -> Result<()> {
        if e >= self.orientations.len() {
            return Err(Error::Mesh(format!("domain '{}' has no element {e}", self.name)));
        }
        if (q.transpose() * q - Mat3::identity()).norm() > 1e-8 {
            return Err(Error::Mesh(format!("orientation of element {e} is not orthonormal")));
        }
        self.orientations[e] = q;
        let ngp = self.n_points();
        if let Some(points) = self.points.get_mut(e * ngp..(e + 1) * ngp) {
            points.iter_mut().for_each(|pt| pt.elastic.q = q);
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.points.len() == self.elements.len() * self.n_points()
            && self.reference.len() == self.points.len()
    }

    /// Tabulate reference gradients and create the material points.
    ///
    /// # Errors
    ///
    /// Any degenerate element or a missing material fails the whole domain.
    pub fn initialize(&mut self, mesh: &Mesh) -> Result<()> {
        let material = self.require_material()?;
        let ngp = self.n_points();
        let shape = &self.shape;

        let reference = self
            .elements
            .par_iter()
            .map(|&id| {
                let coords = mesh
                    .element_coords(id)
                    .ok_or_else(|| Error::Mesh(format!("domain '{}' references missing element {id}", self.name)))?;
                (0..ngp)
                    .map(|gp| shape.gradients(gp, &coords, id))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        let points = self.create_points(material);

        self.reference = reference.into_iter().flatten().collect();
        self.points = points;
        debug!(
            domain = %self.name,
            elements = self.elements.len(),
            points = self.points.len(),
            "domain initialized"
        );
        Ok(())
    }

    fn create_points(&self, material: &dyn Material) -> Vec<MaterialPoint> {
        self.orientations
            .iter()
            .flat_map(|q| {
                (0..self.n_points()).map(move |_| {
                    let mut pt = material.create_point();
                    pt.elastic.q = *q;
                    pt
                })
            })
            .collect()
    }

    /// Return every material point to the reference state.
    pub fn reset(&mut self) -> Result<()> {
        let material = self.require_material()?;
        self.points = self.create_points(material);
        Ok(())
    }

    /// Evaluate the trial deformation and stress at every point.
    ///
    /// `current` holds the current position of every mesh node.
    ///
    /// # Errors
    ///
    /// A non-positive Jacobian reports [`Error::DegenerateElement`].
    pub fn update(&mut self, current: &[Point3], time: f64) -> Result<()> {
        if !self.is_initialized() {
            return Err(Error::Config(format!("domain '{}' is not initialized", self.name)));
        }
        let ngp = self.n_points();
        let material = self
            .material
            .as_deref()
            .ok_or_else(|| Error::Config(format!("domain '{}' has no material", self.name)))?;

        self.points
            .par_chunks_mut(ngp)
            .zip(self.reference.par_chunks(ngp))
            .zip(self.connectivity.par_iter())
            .zip(self.elements.par_iter())
            .try_for_each(|(((points, reference), conn), &id)| {
                for (pt, r) in points.iter_mut().zip(reference) {
                    let f = deformation_gradient(conn, current, &r.gradients);
                    let j = f.determinant();
                    if j <= 0.0 {
                        return Err(Error::DegenerateElement { element: id, jacobian: j });
                    }
                    pt.elastic.f = f;
                    pt.elastic.j = j;
                    pt.elastic.time = time;
                    pt.elastic.stress = material.stress(pt);
                }
                Ok(())
            })
    }

    /// Advance material history at a converged state.
    pub fn commit(&mut self) -> Result<()> {
        let material = self
            .material
            .as_deref()
            .ok_or_else(|| Error::Config(format!("domain '{}' has no material", self.name)))?;
        self.points.par_iter_mut().for_each(|pt| material.commit(pt));
        Ok(())
    }

    pub fn points(&self) -> &[MaterialPoint] {
        &self.points
    }

    /// Points of element `e`.
    pub fn element_points(&self, e: usize) -> &[MaterialPoint] {
        let ngp = self.n_points();
        &self.points[e * ngp..(e + 1) * ngp]
    }

    /// Replace the points, e.g. from a checkpoint.
    pub fn restore_points(&mut self, points: Vec<MaterialPoint>) -> Result<()> {
        if points.len() != self.elements.len() * self.n_points() {
            return Err(Error::Checkpoint(format!(
                "domain '{}' expects {} points, got {}",
                self.name,
                self.elements.len() * self.n_points(),
                points.len()
            )));
        }
        self.points = points;
        Ok(())
    }

    /// Equation lists of every element, for the sparsity profile.
    pub fn equation_lists(&self, map: &dyn EquationMap) -> Vec<Vec<isize>> {
        self.connectivity.iter().map(|conn| map.element_lm(conn)).collect()
    }

    fn element_data(&self, e: usize) -> impl Iterator<Item = (&ReferenceGradients, &MaterialPoint)> {
        let ngp = self.n_points();
        self.reference[e * ngp..(e + 1) * ngp]
            .iter()
            .zip(&self.points[e * ngp..(e + 1) * ngp])
    }

    /// Internal force vector f_a = ∫ σ ∇N_a dv of element `e`.
    pub fn element_internal_force(&self, e: usize) -> Result<DVector<f64>> {
        let id = self.elements[e];
        let n = self.connectivity[e].len();
        let mut fe = DVector::zeros(DOFS_PER_NODE * n);
        for (r, pt) in self.element_data(e) {
            let grads = spatial_gradients(r, pt, id)?;
            let w = pt.elastic.j * r.dv0;
            for (a, g) in grads.iter().enumerate() {
                let fa = pt.elastic.stress * g * w;
                for i in 0..DOFS_PER_NODE {
                    fe[DOFS_PER_NODE * a + i] += fa[i];
                }
            }
        }
        Ok(fe)
    }

    /// Material plus geometric stiffness of element `e`.
    pub fn element_stiffness(&self, e: usize) -> Result<DMatrix<f64>> {
        let material = self.require_material()?;
        let id = self.elements[e];
        let ndof = DOFS_PER_NODE * self.connectivity[e].len();
        let mut ke = DMatrix::zeros(ndof, ndof);
        for (r, pt) in self.element_data(e) {
            let grads = spatial_gradients(r, pt, id)?;
            let w = pt.elastic.j * r.dv0;

            let c = material.tangent(pt);
            let d = DMatrix::from_iterator(6, 6, c.iter().copied());
            let b = strain_displacement(&grads);
            ke += b.transpose() * (d * &b) * w;

            let s = pt.elastic.stress;
            for (a, ga) in grads.iter().enumerate() {
                for (bn, gb) in grads.iter().enumerate() {
                    let kab = ga.dot(&(s * gb)) * w;
                    for i in 0..DOFS_PER_NODE {
                        ke[(DOFS_PER_NODE * a + i, DOFS_PER_NODE * bn + i)] += kab;
                    }
                }
            }
        }
        Ok(ke)
    }

    /// Scalar consistent mass M_ab = ∫ ρ0 N_a N_b dV0 of element `e`.
    pub fn element_mass(&self, e: usize) -> Result<DMatrix<f64>> {
        let rho = self.require_material()?.density();
        let n = self.connectivity[e].len();
        let mut me = DMatrix::zeros(n, n);
        for (gp, (r, _)) in self.element_data(e).enumerate() {
            let values = &self.shape.values[gp];
            for a in 0..n {
                for b in 0..n {
                    me[(a, b)] += rho * values[a] * values[b] * r.dv0;
                }
            }
        }
        Ok(me)
    }

    /// Body force vector of element `e` at the current configuration.
    pub fn element_body_force(
        &self,
        e: usize,
        forces: &[BodyForce],
        scale: f64,
        current: &[Point3],
    ) -> Result<DVector<f64>> {
        let rho = self.require_material()?.density();
        let conn = &self.connectivity[e];
        let mut fe = DVector::zeros(DOFS_PER_NODE * conn.len());
        for (gp, (r, _)) in self.element_data(e).enumerate() {
            let values = &self.shape.values[gp];
            let x = interpolate(conn, current, values);
            let b: Vec3 = forces.iter().map(|f| f.value(&x)).sum::<Vec3>() * scale;
            for (a, &na) in values.iter().enumerate() {
                for i in 0..DOFS_PER_NODE {
                    fe[DOFS_PER_NODE * a + i] += rho * na * b[i] * r.dv0;
                }
            }
        }
        Ok(fe)
    }

    /// Stiffness -∂f_body/∂x of element `e`.
    pub fn element_body_stiffness(
        &self,
        e: usize,
        forces: &[BodyForce],
        scale: f64,
        current: &[Point3],
    ) -> Result<DMatrix<f64>> {
        let rho = self.require_material()?.density();
        let conn = &self.connectivity[e];
        let ndof = DOFS_PER_NODE * conn.len();
        let mut ke = DMatrix::zeros(ndof, ndof);
        for (gp, (r, _)) in self.element_data(e).enumerate() {
            let values = &self.shape.values[gp];
            let x = interpolate(conn, current, values);
            let db: Mat3 = forces.iter().map(|f| f.stiffness(&x)).sum::<Mat3>() * scale;
            for (a, &na) in values.iter().enumerate() {
                for (b, &nb) in values.iter().enumerate() {
                    let w = rho * na * nb * r.dv0;
                    for i in 0..DOFS_PER_NODE {
                        for j in 0..DOFS_PER_NODE {
                            ke[(DOFS_PER_NODE * a + i, DOFS_PER_NODE * b + j)] -= w * db[(i, j)];
                        }
                    }
                }
            }
        }
        Ok(ke)
    }

    /// Sum an element vector over all elements into `out`.
    fn assemble_vector<F>(&self, map: &dyn EquationMap, out: &mut GlobalVector, element: F) -> Result<()>
    where
        F: Fn(usize) -> Result<DVector<f64>> + Sync,
    {
        // (equation, value) entries of the free dofs, scattered once at the end
        let entries = (0..self.n_elements())
            .into_par_iter()
            .try_fold(Vec::new, |mut acc: Vec<(usize, f64)>, e| {
                let fe = element(e)?;
                let lm = map.element_lm(&self.connectivity[e]);
                acc.extend(
                    lm.iter()
                        .zip(fe.iter())
                        .filter_map(|(&eq, &v)| usize::try_from(eq).ok().map(|eq| (eq, v))),
                );
                Ok::<_, Error>(acc)
            })
            .try_reduce(Vec::new, |mut a, mut b| {
                a.append(&mut b);
                Ok(a)
            })?;
        for (eq, v) in entries {
            out.add(eq, v);
        }
        Ok(())
    }

    /// Sum an element matrix over all elements into `k`.
    fn assemble_matrix<F>(&self, map: &dyn EquationMap, k: &mut GlobalMatrix, element: F) -> Result<()>
    where
        F: Fn(usize) -> Result<DMatrix<f64>> + Sync,
    {
        let n = map.len();
        let triplets = (0..self.n_elements())
            .into_par_iter()
            .try_fold(
                || TripletMatrix::new(n, n),
                |mut acc, e| {
                    let ke = element(e)?;
                    acc.add_element(&map.element_lm(&self.connectivity[e]), &ke);
                    Ok::<_, Error>(acc)
                },
            )
            .try_reduce(
                || TripletMatrix::new(n, n),
                |mut a, b| {
                    a.append(b);
                    Ok(a)
                },
            )?;
        k.scatter(&triplets)
    }

    /// Add the internal forces of all elements to `out`.
    pub fn internal_forces(&self, map: &dyn EquationMap, out: &mut GlobalVector) -> Result<()> {
        self.assemble_vector(map, out, |e| self.element_internal_force(e))
    }

    /// Add the material and geometric stiffness of all elements to `k`.
    pub fn stiffness(&self, map: &dyn EquationMap, k: &mut GlobalMatrix) -> Result<()> {
        self.assemble_matrix(map, k, |e| self.element_stiffness(e))
    }

    /// Add the inertial forces M a to `out`.
    pub fn inertial_forces(&self, acceleration: &[Vec3], map: &dyn EquationMap, out: &mut GlobalVector) -> Result<()> {
        self.assemble_vector(map, out, |e| {
            let me = self.element_mass(e)?;
            let conn = &self.connectivity[e];
            let mut fe = DVector::zeros(DOFS_PER_NODE * conn.len());
            for a in 0..conn.len() {
                for (b, &node) in conn.iter().enumerate() {
                    for i in 0..DOFS_PER_NODE {
                        fe[DOFS_PER_NODE * a + i] += me[(a, b)] * acceleration[node][i];
                    }
                }
            }
            Ok(fe)
        })
    }

    /// Add `factor` times the consistent mass matrix to `k`.
    pub fn mass_stiffness(&self, factor: f64, map: &dyn EquationMap, k: &mut GlobalMatrix) -> Result<()> {
        self.assemble_matrix(map, k, |e| {
            let me = self.element_mass(e)?;
            let n = me.nrows();
            let mut ke = DMatrix::zeros(DOFS_PER_NODE * n, DOFS_PER_NODE * n);
            for a in 0..n {
                for b in 0..n {
                    for i in 0..DOFS_PER_NODE {
                        ke[(DOFS_PER_NODE * a + i, DOFS_PER_NODE * b + i)] = factor * me[(a, b)];
                    }
                }
            }
            Ok(ke)
        })
    }

    /// Add body forces to `out`.
    pub fn body_forces(
        &self,
        forces: &[BodyForce],
        scale: f64,
        current: &[Point3],
        map: &dyn EquationMap,
        out: &mut GlobalVector,
    ) -> Result<()> {
        if forces.is_empty() {
            return Ok(());
        }
        self.assemble_vector(map, out, |e| self.element_body_force(e, forces, scale, current))
    }

    /// Add the stiffness of position-dependent body forces to `k`.
    pub fn body_force_stiffness(
        &self,
        forces: &[BodyForce],
        scale: f64,
        current: &[Point3],
        map: &dyn EquationMap,
        k: &mut GlobalMatrix,
    ) -> Result<()> {
        if !forces.iter().any(BodyForce::is_position_dependent) {
            return Ok(());
        }
        self.assemble_matrix(map, k, |e| self.element_body_stiffness(e, forces, scale, current))
    }

    /// Total strain energy ∫ W dV0.
    pub fn strain_energy(&self) -> Result<f64> {
        let material = self.require_material()?;
        Ok(self
            .reference
            .par_iter()
            .zip(self.points.par_iter())
            .map(|(r, pt)| material.strain_energy_density(pt) * r.dv0)
            .sum())
    }

    /// Reference volume of the domain.
    pub fn volume(&self) -> f64 {
        self.reference.iter().map(|r| r.dv0).sum()
    }
}

/// F = Σ x_a ⊗ ∇_X N_a.
fn deformation_gradient(conn: &[usize], current: &[Point3], gradients: &[Vec3]) -> Mat3 {
    conn.iter()
        .zip(gradients)
        .fold(Mat3::zeros(), |f, (&n, g)| f + current[n] * g.transpose())
}

/// ∇_x N_a = F⁻ᵀ ∇_X N_a.
fn spatial_gradients(r: &ReferenceGradients, pt: &MaterialPoint, element: usize) -> Result<Vec<Vec3>> {
    let f_inv_t = pt
        .elastic
        .f
        .try_inverse()
        .ok_or(Error::DegenerateElement {
            element,
            jacobian: pt.elastic.j,
        })?
        .transpose();
    Ok(r.gradients.iter().map(|g| f_inv_t * g).collect())
}

fn interpolate(conn: &[usize], current: &[Point3], values: &[f64]) -> Point3 {
    conn.iter()
        .zip(values)
        .fold(Point3::zeros(), |x, (&n, &na)| x + current[n] * na)
}

/// Strain-displacement matrix (6 × 3n) for engineering shear strains
/// [xx, yy, zz, xy, yz, xz].
fn strain_displacement(grads: &[Vec3]) -> DMatrix<f64> {
    let mut b = DMatrix::zeros(6, DOFS_PER_NODE * grads.len());
    for (i, g) in grads.iter().enumerate() {
        let col = i * DOFS_PER_NODE;
        b[(0, col)] = g[0];
        b[(1, col + 1)] = g[1];
        b[(2, col + 2)] = g[2];
        b[(3, col)] = g[1];
        b[(3, col + 1)] = g[0];
        b[(4, col + 1)] = g[2];
        b[(4, col + 2)] = g[1];
        b[(5, col)] = g[2];
        b[(5, col + 2)] = g[0];
    }
    b
}
