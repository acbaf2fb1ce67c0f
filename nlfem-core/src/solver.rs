//! Linear system solvers.
//!
//! Solves K Δu = R for the Newton increment.
//!
//! # Solver Backends
//!
//! - [`FaerCholeskySolver`]: sparse Cholesky factorization using the faer
//!   library. Tangents of stable hyperelastic problems are symmetric positive
//!   definite after Dirichlet elimination.
//! - [`DenseLUSolver`]: nalgebra dense LU, for small or indefinite systems.
//! - [`AutoSolver`]: Cholesky first, dense LU when the tangent is not
//!   positive definite (e.g. near a limit point or with active contact).
//!
//! A failed factorization is an [`Error::SingularMatrix`] or
//! [`Error::Solver`], both of which the step controller retries with a
//! smaller step.

use faer::linalg::cholesky::llt::factor::LltError;
use faer::prelude::*;
use faer::sparse::linalg::solvers::{Llt, SymbolicLlt};
use faer::sparse::linalg::LltError as SparseLltError;
use faer::sparse::{SparseColMat, SymbolicSparseColMat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::sparse::CsrMatrix;

/// Linear solver interface.
pub trait Solver: Send + Sync {
    /// Solve the linear system Ax = b.
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64]) -> Result<Vec<f64>>;

    /// Solver name for diagnostics.
    fn name(&self) -> &str;
}

/// Solver selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverType {
    /// Cholesky with a dense LU fallback.
    #[default]
    Auto,
    Cholesky,
    DenseLu,
}

/// Build the solver for `kind`.
pub fn solver_for(kind: SolverType) -> Box<dyn Solver> {
    match kind {
        SolverType::Auto => Box::new(AutoSolver),
        SolverType::Cholesky => Box::new(FaerCholeskySolver),
        SolverType::DenseLu => Box::new(DenseLUSolver),
    }
}

fn check_dimensions(matrix: &CsrMatrix, rhs: &[f64]) -> Result<()> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(Error::Solver("Matrix must be square".into()));
    }
    if n != rhs.len() {
        return Err(Error::Solver(format!(
            "RHS size mismatch: {} equations, {} entries",
            n,
            rhs.len()
        )));
    }
    Ok(())
}

/// Direct solver using nalgebra dense LU.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseLUSolver;

impl DenseLUSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Solver for DenseLUSolver {
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64]) -> Result<Vec<f64>> {
        use nalgebra::{DMatrix, DVector};

        check_dimensions(matrix, rhs)?;
        if rhs.is_empty() {
            return Ok(vec![]);
        }

        let dense = DMatrix::from(matrix);
        let b = DVector::from_column_slice(rhs);

        let solution = dense
            .lu()
            .solve(&b)
            .ok_or_else(|| Error::SingularMatrix("LU factorization failed".into()))?;
        if !solution.iter().all(|v| v.is_finite()) {
            return Err(Error::SingularMatrix("LU solution is not finite".into()));
        }

        Ok(solution.as_slice().to_vec())
    }

    fn name(&self) -> &str {
        "Dense LU"
    }
}

/// Convert nalgebra-sparse CSR matrix to faer SparseColMat (CSC format).
///
/// The global matrix stores both triangles, so transposing the CSR layout
/// gives the CSC layout of the same matrix.
fn csr_to_faer_csc(csr: &CsrMatrix) -> SparseColMat<usize, f64> {
    let nrows = csr.nrows();
    let ncols = csr.ncols();

    let row_offsets = csr.row_offsets();
    let col_indices = csr.col_indices();
    let values = csr.values();

    let mut col_counts = vec![0usize; ncols];
    for &col in col_indices {
        col_counts[col] += 1;
    }

    let mut col_offsets = vec![0usize; ncols + 1];
    for i in 0..ncols {
        col_offsets[i + 1] = col_offsets[i] + col_counts[i];
    }

    let nnz = values.len();
    let mut csc_row_indices = vec![0usize; nnz];
    let mut csc_values = vec![0.0f64; nnz];
    let mut col_positions = col_offsets[..ncols].to_vec();

    for row in 0..nrows {
        for idx in row_offsets[row]..row_offsets[row + 1] {
            let col = col_indices[idx];
            let pos = col_positions[col];
            csc_row_indices[pos] = row;
            csc_values[pos] = values[idx];
            col_positions[col] += 1;
        }
    }

    // SAFETY: rows are visited in increasing order, so every column's row
    // indices are sorted and within bounds.
    unsafe {
        SparseColMat::new(
            SymbolicSparseColMat::new_unchecked(nrows, ncols, col_offsets, None, csc_row_indices),
            csc_values,
        )
    }
}

/// Sparse Cholesky solver using the faer library.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaerCholeskySolver;

impl FaerCholeskySolver {
    pub fn new() -> Self {
        Self
    }
}

impl Solver for FaerCholeskySolver {
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64]) -> Result<Vec<f64>> {
        check_dimensions(matrix, rhs)?;
        let n = rhs.len();
        if n == 0 {
            return Ok(vec![]);
        }

        let csc = csr_to_faer_csc(matrix);
        let csc_ref = csc.as_ref();

        let symbolic = SymbolicLlt::try_new(csc_ref.symbolic(), faer::Side::Lower)
            .map_err(|_| Error::Solver("Symbolic Cholesky analysis failed".into()))?;

        let llt = Llt::try_new_with_symbolic(symbolic, csc_ref, faer::Side::Lower).map_err(|e| {
            match e {
                SparseLltError::Generic(err) => {
                    Error::Solver(format!("Sparse Cholesky error: {:?}", err))
                }
                SparseLltError::Numeric(LltError::NonPositivePivot { index }) => {
                    Error::SingularMatrix(format!(
                        "Matrix is not positive definite at pivot {}",
                        index
                    ))
                }
            }
        })?;

        let mut x = faer::Mat::from_fn(n, 1, |i, _| rhs[i]);
        llt.solve_in_place(x.as_mut());

        Ok((0..n).map(|i| x[(i, 0)]).collect())
    }

    fn name(&self) -> &str {
        "faer Sparse Cholesky (LLᵀ)"
    }
}

/// Sparse Cholesky, falling back to dense LU on a non-positive pivot.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoSolver;

impl Solver for AutoSolver {
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64]) -> Result<Vec<f64>> {
        match FaerCholeskySolver.solve(matrix, rhs) {
            Err(Error::SingularMatrix(reason)) => {
                debug!(%reason, equations = rhs.len(), "Cholesky failed, retrying with dense LU");
                DenseLUSolver.solve(matrix, rhs)
            }
            other => other,
        }
    }

    fn name(&self) -> &str {
        "Auto (Cholesky, dense LU fallback)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::TripletMatrix;
    use approx::assert_relative_eq;

    fn matrix(n: usize, entries: &[(usize, usize, f64)]) -> CsrMatrix {
        let mut triplet = TripletMatrix::new(n, n);
        for &(i, j, v) in entries {
            triplet.add(i, j, v);
        }
        triplet.to_csr().unwrap()
    }

    #[test]
    fn test_dense_lu_simple() {
        // [2 1; 1 3] x = [1; 2] → x = (1/5, 3/5)
        let a = matrix(2, &[(0, 0, 2.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)]);
        let solution = DenseLUSolver::new().solve(&a, &[1.0, 2.0]).unwrap();
        assert_relative_eq!(solution[0], 0.2, epsilon = 1e-10);
        assert_relative_eq!(solution[1], 0.6, epsilon = 1e-10);
    }

    #[test]
    fn test_empty_system() {
        let a = matrix(0, &[]);
        for kind in [SolverType::Auto, SolverType::Cholesky, SolverType::DenseLu] {
            assert!(solver_for(kind).solve(&a, &[]).unwrap().is_empty());
        }
    }

    #[test]
    fn test_faer_cholesky_3x3_spd() {
        // A = [4 2 0; 2 5 2; 0 2 3], b = [2; 8; 5] → x = [-3/16, 11/8, 3/4]
        let a = matrix(
            3,
            &[
                (0, 0, 4.0),
                (0, 1, 2.0),
                (1, 0, 2.0),
                (1, 1, 5.0),
                (1, 2, 2.0),
                (2, 1, 2.0),
                (2, 2, 3.0),
            ],
        );
        let solution = FaerCholeskySolver::new().solve(&a, &[2.0, 8.0, 5.0]).unwrap();
        let expected = [-0.1875, 1.375, 0.75];
        for i in 0..3 {
            assert_relative_eq!(solution[i], expected[i], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_rhs_mismatch() {
        let a = matrix(2, &[(0, 0, 1.0), (1, 1, 1.0)]);
        for kind in [SolverType::Auto, SolverType::Cholesky, SolverType::DenseLu] {
            assert!(matches!(solver_for(kind).solve(&a, &[1.0, 2.0, 3.0]), Err(Error::Solver(_))));
        }
    }

    #[test]
    fn test_indefinite_matrix_falls_back_to_lu() {
        // eigenvalues 3 and -1
        let a = matrix(2, &[(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 1.0)]);
        let rhs = [3.0, 3.0];
        assert!(matches!(
            FaerCholeskySolver.solve(&a, &rhs),
            Err(Error::SingularMatrix(_))
        ));
        let solution = AutoSolver.solve(&a, &rhs).unwrap();
        assert_relative_eq!(solution[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(solution[1], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_singular_matrix_is_recoverable() {
        let a = matrix(2, &[(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.0)]);
        let err = AutoSolver.solve(&a, &[1.0, 0.0]).unwrap_err();
        assert!(err.is_recoverable(), "{err}");
    }

    #[test]
    fn test_banded_stiffness() {
        let mut entries: Vec<_> = (0..6).map(|i| (i, i, 4.0)).collect();
        for i in 0..5 {
            entries.push((i, i + 1, -1.0));
            entries.push((i + 1, i, -1.0));
        }
        let a = matrix(6, &entries);
        let rhs = vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let solution = solver_for(SolverType::default()).solve(&a, &rhs).unwrap();

        let dense = nalgebra::DMatrix::from(&a);
        let x = nalgebra::DVector::from_vec(solution);
        let b = nalgebra::DVector::from_vec(rhs);
        assert!((&dense * &x - &b).norm() < 1e-10);
    }

    #[test]
    fn test_solver_type_serde() {
        let kind: SolverType = serde_json::from_str("\"dense_lu\"").unwrap();
        assert_eq!(kind, SolverType::DenseLu);
        assert_eq!(solver_for(kind).name(), "Dense LU");
    }
}
