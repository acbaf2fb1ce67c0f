//! Sparse matrix operations.
//!
//! Element contributions are collected in thread-local [`TripletMatrix`]
//! buffers during the parallel phase and then scattered into a
//! [`GlobalMatrix`], whose CSR pattern is fixed by the sparsity profile.

use nalgebra::DMatrix;
use nalgebra_sparse::csr::CsrMatrix as NalgebraCsr;

use crate::error::{Error, Result};
use crate::profile::SparseMatrixProfile;

/// Compressed Sparse Row matrix.
pub type CsrMatrix = NalgebraCsr<f64>;

/// Builder for assembling a sparse matrix from triplets (COO format).
///
/// Accumulates (row, col, value) triplets; duplicates are summed when the
/// triplets are scattered or converted.
#[derive(Debug, Clone, Default)]
pub struct TripletMatrix {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl TripletMatrix {
    /// Create a new triplet matrix builder.
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            ..Default::default()
        }
    }

    /// Add a value at (row, col). Exact zeros are not stored.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.n_rows, "Row index out of bounds");
        debug_assert!(col < self.n_cols, "Column index out of bounds");

        if value != 0.0 {
            self.rows.push(row);
            self.cols.push(col);
            self.values.push(value);
        }
    }

    /// Add a dense element matrix through its equation-number list.
    ///
    /// Rows and columns with a negative equation number are prescribed and
    /// dropped.
    pub fn add_element(&mut self, lm: &[isize], ke: &DMatrix<f64>) {
        debug_assert_eq!(ke.nrows(), lm.len());
        debug_assert_eq!(ke.ncols(), lm.len());

        for (i, &row) in lm.iter().enumerate().filter(|(_, &r)| r >= 0) {
            for (j, &col) in lm.iter().enumerate().filter(|(_, &c)| c >= 0) {
                self.add(row as usize, col as usize, ke[(i, j)]);
            }
        }
    }

    /// Move the triplets of `other` into this buffer.
    pub fn append(&mut self, mut other: TripletMatrix) {
        self.rows.append(&mut other.rows);
        self.cols.append(&mut other.cols);
        self.values.append(&mut other.values);
    }

    /// Number of stored triplets.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Iterate over the stored (row, col, value) triplets.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows
            .iter()
            .zip(&self.cols)
            .zip(&self.values)
            .map(|((&r, &c), &v)| (r, c, v))
    }

    /// Convert to CSR format, summing duplicate entries.
    pub fn to_csr(self) -> Result<CsrMatrix> {
        use nalgebra_sparse::coo::CooMatrix;

        let coo = CooMatrix::try_from_triplets(
            self.n_rows,
            self.n_cols,
            self.rows,
            self.cols,
            self.values,
        )
        .map_err(|e| Error::Assembly(format!("invalid triplet data: {e}")))?;

        Ok(CsrMatrix::from(&coo))
    }
}

/// Global stiffness matrix with a pattern fixed by a sparsity profile.
///
/// Both triangles are stored so the CSR can be handed to any linear solver.
/// Writing an entry outside the pattern is an assembly error.
#[derive(Debug, Clone)]
pub struct GlobalMatrix {
    csr: CsrMatrix,
}

impl GlobalMatrix {
    /// Allocate a zero matrix over the pattern of `profile`.
    pub fn from_profile(profile: &SparseMatrixProfile) -> Result<Self> {
        let n = profile.size();
        let (offsets, indices) = profile.csr_pattern()?;
        let mut values = Vec::new();
        values
            .try_reserve_exact(indices.len())
            .map_err(|_| Error::Allocation {
                requested: indices.len().saturating_mul(std::mem::size_of::<f64>()),
            })?;
        values.resize(indices.len(), 0.0);

        let csr = CsrMatrix::try_from_csr_data(n, n, offsets, indices, values)
            .map_err(|e| Error::Assembly(format!("invalid profile pattern: {e}")))?;
        Ok(Self { csr })
    }

    /// Number of equations.
    pub fn n_equations(&self) -> usize {
        self.csr.nrows()
    }

    /// Number of stored entries (both triangles).
    pub fn nnz(&self) -> usize {
        self.csr.nnz()
    }

    /// Reset all values, keeping the pattern.
    pub fn zero(&mut self) {
        self.csr.values_mut().fill(0.0);
    }

    /// Add `value` at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let n = self.n_equations();
        let (offsets, indices, values) = self.csr.csr_data_mut();
        if row >= n {
            return Err(Error::Assembly(format!("row {row} out of range for {n} equations")));
        }
        let (lo, hi) = (offsets[row], offsets[row + 1]);
        match indices[lo..hi].binary_search(&col) {
            Ok(k) => {
                values[lo + k] += value;
                Ok(())
            }
            Err(_) => Err(Error::Assembly(format!(
                "entry ({row}, {col}) is outside the sparsity profile"
            ))),
        }
    }

    /// Scatter a dense element matrix through its equation-number list.
    pub fn assemble(&mut self, lm: &[isize], ke: &DMatrix<f64>) -> Result<()> {
        for (i, &row) in lm.iter().enumerate().filter(|(_, &r)| r >= 0) {
            for (j, &col) in lm.iter().enumerate().filter(|(_, &c)| c >= 0) {
                self.add(row as usize, col as usize, ke[(i, j)])?;
            }
        }
        Ok(())
    }

    /// Scatter a triplet buffer produced by a parallel assembly phase.
    pub fn scatter(&mut self, triplets: &TripletMatrix) -> Result<()> {
        for (row, col, value) in triplets.iter() {
            self.add(row, col, value)?;
        }
        Ok(())
    }

    /// Value at (row, col); zero outside the pattern.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let offsets = self.csr.row_offsets();
        let indices = self.csr.col_indices();
        if row >= self.n_equations() {
            return 0.0;
        }
        let (lo, hi) = (offsets[row], offsets[row + 1]);
        indices[lo..hi]
            .binary_search(&col)
            .map(|k| self.csr.values()[lo + k])
            .unwrap_or(0.0)
    }

    pub fn csr(&self) -> &CsrMatrix {
        &self.csr
    }
}

/// Dense global vector (residual, increments) with LM scatter.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVector {
    values: Vec<f64>,
}

impl GlobalVector {
    /// Create a zero vector of given size.
    pub fn zeros(size: usize) -> Self {
        Self {
            values: vec![0.0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Add a value at the given index.
    pub fn add(&mut self, index: usize, value: f64) {
        self.values[index] += value;
    }

    /// Scatter an element vector; negative equation numbers are dropped.
    pub fn assemble(&mut self, lm: &[isize], fe: &[f64]) {
        debug_assert_eq!(lm.len(), fe.len());
        for (&eq, &val) in lm.iter().zip(fe.iter()) {
            if eq >= 0 {
                self.values[eq as usize] += val;
            }
        }
    }

    pub fn fill(&mut self, value: f64) {
        self.values.fill(value);
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn dot(&self, other: &GlobalVector) -> f64 {
        self.values.iter().zip(&other.values).map(|(a, b)| a * b).sum()
    }

    /// Get the underlying dense vector.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Mutable access to the underlying vector.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Consume and return the dense vector.
    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }
}

impl From<Vec<f64>> for GlobalVector {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}
