//! Sparsity profile of the global stiffness matrix.
//!
//! The profile records, for every column, the rows that may receive a
//! nonzero entry during assembly as a sorted list of contiguous runs. Only
//! the upper triangle (row ≤ column) is stored; (j, i) is implied by (i, j).
//!
//! Runs are kept in canonical form: sorted, non-overlapping and
//! non-adjacent. The two update methods therefore produce identical
//! profiles from the same equation lists.

use serde::{Deserialize, Serialize};
use std::mem::size_of;

use crate::error::{Error, Result};

/// Inclusive (start, end) row run of one column.
pub type RowRun = (usize, usize);

/// Strategy used to grow the profile from equation lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMethod {
    /// Insert the pairs of one list at a time into the column runs.
    #[default]
    Incremental,
    /// Gather candidate rows of all lists per column, then merge once.
    Bulk,
}

/// Condensed per-column row runs of a symmetric sparse matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseMatrixProfile {
    columns: Vec<Vec<RowRun>>,
    method: UpdateMethod,
}

/// Profile of a rectangular block of a [`SparseMatrixProfile`].
///
/// Both triangles are stored explicitly since the block need not lie on the
/// diagonal. Indices are local to the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockProfile {
    pub row_offset: usize,
    pub col_offset: usize,
    pub n_rows: usize,
    pub columns: Vec<Vec<RowRun>>,
}

impl BlockProfile {
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Whether the local entry (row, col) is in the block.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.columns
            .get(col)
            .is_some_and(|runs| run_contains(runs, row))
    }
}

fn reserve<T>(v: &mut Vec<T>, additional: usize) -> Result<()> {
    v.try_reserve_exact(additional).map_err(|_| Error::Allocation {
        requested: additional.saturating_mul(size_of::<T>()),
    })
}

fn run_contains(runs: &[RowRun], row: usize) -> bool {
    let idx = runs.partition_point(|&(_, end)| end < row);
    idx < runs.len() && runs[idx].0 <= row
}

/// Merge [start, end] into canonical runs.
fn insert_run(runs: &mut Vec<RowRun>, start: usize, end: usize) -> Result<()> {
    let lo = runs.partition_point(|&(_, e)| e + 1 < start);
    let hi = runs.partition_point(|&(s, _)| s <= end + 1);
    if lo == hi {
        reserve(runs, 1)?;
        runs.insert(lo, (start, end));
    } else {
        let merged = (runs[lo].0.min(start), runs[hi - 1].1.max(end));
        runs.splice(lo..hi, std::iter::once(merged));
    }
    Ok(())
}

/// Split sorted, deduplicated indices into contiguous runs.
fn compress(sorted: &[usize]) -> impl Iterator<Item = RowRun> + '_ {
    let mut i = 0;
    std::iter::from_fn(move || {
        let start = *sorted.get(i)?;
        let mut end = start;
        i += 1;
        while i < sorted.len() && sorted[i] == end + 1 {
            end = sorted[i];
            i += 1;
        }
        Some((start, end))
    })
}

impl SparseMatrixProfile {
    /// Create an empty profile for `n_equations` equations.
    pub fn new(n_equations: usize) -> Result<Self> {
        let mut columns = Vec::new();
        reserve(&mut columns, n_equations)?;
        columns.resize_with(n_equations, Vec::new);
        Ok(Self {
            columns,
            method: UpdateMethod::default(),
        })
    }

    pub fn with_method(mut self, method: UpdateMethod) -> Self {
        self.method = method;
        self
    }

    pub fn update_method(&self) -> UpdateMethod {
        self.method
    }

    pub fn set_update_method(&mut self, method: UpdateMethod) {
        self.method = method;
    }

    /// Number of equations (rows and columns).
    pub fn size(&self) -> usize {
        self.columns.len()
    }

    /// Remove every entry, keeping the size.
    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
    }

    /// Row runs of a column (rows ≤ col).
    pub fn column(&self, col: usize) -> &[RowRun] {
        &self.columns[col]
    }

    /// Add every diagonal entry.
    pub fn create_diagonal(&mut self) -> Result<()> {
        for (i, column) in self.columns.iter_mut().enumerate() {
            insert_run(column, i, i)?;
        }
        Ok(())
    }

    /// Grow the profile so it covers every pair of active indices of every
    /// list, using the configured update method.
    pub fn update_profile(&mut self, lists: &[Vec<isize>]) -> Result<()> {
        match self.method {
            UpdateMethod::Incremental => {
                for lm in lists {
                    self.add_element(lm)?;
                }
                Ok(())
            }
            UpdateMethod::Bulk => self.update_bulk(lists),
        }
    }

    /// Sorted, deduplicated active indices of an equation list.
    fn active(&self, lm: &[isize]) -> Result<Vec<usize>> {
        let mut active = Vec::new();
        reserve(&mut active, lm.len())?;
        for &eq in lm.iter().filter(|&&eq| eq >= 0) {
            let eq = eq as usize;
            if eq >= self.size() {
                return Err(Error::Assembly(format!(
                    "equation {eq} exceeds profile size {}",
                    self.size()
                )));
            }
            active.push(eq);
        }
        active.sort_unstable();
        active.dedup();
        Ok(active)
    }

    /// Insert the pairs of a single equation list.
    pub fn add_element(&mut self, lm: &[isize]) -> Result<()> {
        let active = self.active(lm)?;
        for (k, &col) in active.iter().enumerate() {
            let column = &mut self.columns[col];
            for (start, end) in compress(&active[..=k]) {
                insert_run(column, start, end)?;
            }
        }
        Ok(())
    }

    fn update_bulk(&mut self, lists: &[Vec<isize>]) -> Result<()> {
        let mut candidates: Vec<Vec<usize>> = Vec::new();
        reserve(&mut candidates, self.size())?;
        candidates.resize_with(self.size(), Vec::new);

        for lm in lists {
            let active = self.active(lm)?;
            for (k, &col) in active.iter().enumerate() {
                let rows = &mut candidates[col];
                reserve(rows, k + 1)?;
                rows.extend_from_slice(&active[..=k]);
            }
        }

        for (col, mut rows) in candidates.into_iter().enumerate() {
            if rows.is_empty() {
                continue;
            }
            rows.sort_unstable();
            rows.dedup();
            let column = &mut self.columns[col];
            for (start, end) in compress(&rows) {
                insert_run(column, start, end)?;
            }
        }
        Ok(())
    }

    /// Whether (row, col) or its mirror is in the profile.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        let (r, c) = if row <= col { (row, col) } else { (col, row) };
        c < self.size() && run_contains(&self.columns[c], r)
    }

    /// Whether every pair of active indices in `lm` is in the profile.
    pub fn covers(&self, lm: &[isize]) -> bool {
        let active: Vec<usize> = lm.iter().filter(|&&eq| eq >= 0).map(|&eq| eq as usize).collect();
        active
            .iter()
            .all(|&i| active.iter().all(|&j| self.contains(i, j)))
    }

    /// Number of stored (upper triangle) entries.
    pub fn stored_entries(&self) -> usize {
        self.columns
            .iter()
            .flat_map(|runs| runs.iter())
            .map(|&(s, e)| e - s + 1)
            .sum()
    }

    /// Number of nonzeros of the full symmetric matrix.
    pub fn nonzeros(&self) -> usize {
        self.columns
            .iter()
            .enumerate()
            .flat_map(|(c, runs)| runs.iter().map(move |&(s, e)| (c, s, e)))
            .map(|(c, s, e)| {
                let n = e - s + 1;
                if (s..=e).contains(&c) {
                    2 * n - 1
                } else {
                    2 * n
                }
            })
            .sum()
    }

    /// Profile of the rectangle rows `nrow0..=nrow1`, columns `ncol0..=ncol1`.
    pub fn block_profile(
        &self,
        nrow0: usize,
        ncol0: usize,
        nrow1: usize,
        ncol1: usize,
    ) -> Result<BlockProfile> {
        if nrow0 > nrow1 || ncol0 > ncol1 || nrow1 >= self.size() || ncol1 >= self.size() {
            return Err(Error::Assembly(format!(
                "block [{nrow0}..={nrow1}] x [{ncol0}..={ncol1}] outside profile of size {}",
                self.size()
            )));
        }

        let mut columns = Vec::new();
        reserve(&mut columns, ncol1 - ncol0 + 1)?;
        for col in ncol0..=ncol1 {
            let mut runs = Vec::new();
            for &(s, e) in &self.columns[col] {
                let (s, e) = (s.max(nrow0), e.min(nrow1));
                if s <= e {
                    insert_run(&mut runs, s - nrow0, e - nrow0)?;
                }
            }
            // entries below the diagonal live in the columns of their rows
            for row in (col + 1).max(nrow0)..=nrow1 {
                if run_contains(&self.columns[row], col) {
                    insert_run(&mut runs, row - nrow0, row - nrow0)?;
                }
            }
            columns.push(runs);
        }

        Ok(BlockProfile {
            row_offset: nrow0,
            col_offset: ncol0,
            n_rows: nrow1 - nrow0 + 1,
            columns,
        })
    }

    /// Row offsets and column indices of the full symmetric matrix in CSR form.
    pub fn csr_pattern(&self) -> Result<(Vec<usize>, Vec<usize>)> {
        let n = self.size();
        let mut offsets = Vec::new();
        reserve(&mut offsets, n + 1)?;
        offsets.resize(n + 1, 0usize);

        for (c, runs) in self.columns.iter().enumerate() {
            for &(s, e) in runs {
                for r in s..=e {
                    offsets[r + 1] += 1;
                    if r != c {
                        offsets[c + 1] += 1;
                    }
                }
            }
        }
        for i in 0..n {
            offsets[i + 1] += offsets[i];
        }

        let nnz = offsets[n];
        let mut indices = Vec::new();
        reserve(&mut indices, nnz)?;
        indices.resize(nnz, 0usize);
        let mut next = offsets[..n].to_vec();
        for (c, runs) in self.columns.iter().enumerate() {
            for &(s, e) in runs {
                for r in s..=e {
                    indices[next[r]] = c;
                    next[r] += 1;
                    if r != c {
                        indices[next[c]] = r;
                        next[c] += 1;
                    }
                }
            }
        }
        for i in 0..n {
            indices[offsets[i]..offsets[i + 1]].sort_unstable();
        }

        Ok((offsets, indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lists() -> Vec<Vec<isize>> {
        vec![
            vec![0, 1, 2, 5, 6, 7],
            vec![3, 4, -1, 9, 10, 11],
            vec![5, 6, 7, 12, 13, -1],
            vec![2, 3, 8, 14, -1, -1],
            vec![11, 12, 13, 14, 0, 1],
        ]
    }

    fn built(method: UpdateMethod, lists: &[Vec<isize>]) -> SparseMatrixProfile {
        let mut profile = SparseMatrixProfile::new(15).unwrap().with_method(method);
        profile.update_profile(lists).unwrap();
        profile
    }

    #[test]
    fn test_incremental_and_bulk_are_identical() {
        let lists = sample_lists();
        let a = built(UpdateMethod::Incremental, &lists);
        let b = built(UpdateMethod::Bulk, &lists);
        for col in 0..15 {
            assert_eq!(a.column(col), b.column(col), "column {col}");
        }
    }

    #[test]
    fn test_methods_agree_when_growing_existing_profile() {
        let lists = sample_lists();
        let mut a = built(UpdateMethod::Incremental, &lists[..2]);
        let mut b = built(UpdateMethod::Bulk, &lists[..2]);
        a.update_profile(&lists[2..]).unwrap();
        b.update_profile(&lists[2..]).unwrap();
        assert_eq!(a.stored_entries(), b.stored_entries());
        for col in 0..15 {
            assert_eq!(a.column(col), b.column(col));
        }
    }

    #[test]
    fn test_every_pair_is_covered() {
        let lists = sample_lists();
        let profile = built(UpdateMethod::Incremental, &lists);
        for lm in &lists {
            assert!(profile.covers(lm));
            for &i in lm.iter().filter(|&&i| i >= 0) {
                for &j in lm.iter().filter(|&&j| j >= 0) {
                    assert!(profile.contains(i as usize, j as usize));
                }
            }
        }
        assert!(!profile.contains(0, 9));
    }

    #[test]
    fn test_runs_are_merged() {
        let mut profile = SparseMatrixProfile::new(6).unwrap();
        profile.add_element(&[0, 1, 2]).unwrap();
        profile.add_element(&[4, 5]).unwrap();
        profile.add_element(&[3, 5]).unwrap();
        assert_eq!(profile.column(5), &[(3, 5)]);
        profile.add_element(&[2, 5]).unwrap();
        assert_eq!(profile.column(5), &[(2, 5)]);
        assert_eq!(profile.column(2), &[(0, 2)]);
    }

    #[test]
    fn test_prescribed_entries_are_skipped() {
        let mut profile = SparseMatrixProfile::new(3).unwrap();
        profile.add_element(&[-1, -1, 2, -1]).unwrap();
        assert_eq!(profile.stored_entries(), 1);
        assert_eq!(profile.column(2), &[(2, 2)]);
    }

    #[test]
    fn test_out_of_range_equation() {
        let mut profile = SparseMatrixProfile::new(3).unwrap();
        assert!(matches!(profile.add_element(&[0, 3]), Err(Error::Assembly(_))));
    }

    #[test]
    fn test_allocation_failure_reports_size() {
        match SparseMatrixProfile::new(usize::MAX) {
            Err(Error::Allocation { requested }) => assert!(requested > 0),
            other => panic!("expected allocation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_nonzero_count_matches_csr_pattern() {
        let profile = built(UpdateMethod::Bulk, &sample_lists());
        let (offsets, indices) = profile.csr_pattern().unwrap();
        assert_eq!(offsets.len(), 16);
        assert_eq!(indices.len(), profile.nonzeros());
        for row in 0..15 {
            let cols = &indices[offsets[row]..offsets[row + 1]];
            assert!(cols.windows(2).all(|w| w[0] < w[1]));
            for &col in cols {
                assert!(profile.contains(row, col));
            }
        }
    }

    #[test]
    fn test_block_profile_matches_full_profile() {
        let profile = built(UpdateMethod::Incremental, &sample_lists());
        let block = profile.block_profile(2, 5, 9, 13).unwrap();
        assert_eq!(block.n_rows, 8);
        assert_eq!(block.n_cols(), 9);
        for row in 2..=9 {
            for col in 5..=13 {
                assert_eq!(
                    block.contains(row - 2, col - 5),
                    profile.contains(row, col),
                    "({row}, {col})"
                );
            }
        }
    }

    #[test]
    fn test_block_outside_profile() {
        let profile = SparseMatrixProfile::new(4).unwrap();
        assert!(profile.block_profile(0, 0, 4, 1).is_err());
        assert!(profile.block_profile(2, 0, 1, 1).is_err());
    }

    #[test]
    fn test_clear_keeps_size() {
        let mut profile = built(UpdateMethod::Incremental, &sample_lists());
        profile.clear();
        assert_eq!(profile.size(), 15);
        assert_eq!(profile.stored_entries(), 0);
        profile.create_diagonal().unwrap();
        assert_eq!(profile.nonzeros(), 15);
    }
}
