//! Equation numbering.
//!
//! Every node carries three displacement degrees of freedom. Free dofs are
//! numbered consecutively; prescribed dofs map to [`PRESCRIBED`] and are
//! dropped during assembly.

use crate::error::{Error, Result};

/// Displacement dofs per node.
pub const DOFS_PER_NODE: usize = 3;

/// Equation number of a prescribed or inactive dof.
pub const PRESCRIBED: isize = -1;

/// Maps element node lists to equation-number (LM) lists.
pub trait EquationMap: Sync {
    /// Size of the vectors the map scatters into.
    fn len(&self) -> usize;

    /// Equation numbers of `nodes`, three per node.
    fn element_lm(&self, nodes: &[usize]) -> Vec<isize>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Equation numbers of all nodal dofs after Dirichlet elimination.
#[derive(Debug, Clone, PartialEq)]
pub struct DofTable {
    ids: Vec<[isize; DOFS_PER_NODE]>,
    n_equations: usize,
}

impl DofTable {
    /// Number the free dofs of `n_nodes` nodes, skipping the `(node, dof)`
    /// pairs in `prescribed`.
    pub fn new(n_nodes: usize, prescribed: &[(usize, usize)]) -> Result<Self> {
        let mut ids = vec![[0isize; DOFS_PER_NODE]; n_nodes];
        for &(node, dof) in prescribed {
            if node >= n_nodes || dof >= DOFS_PER_NODE {
                return Err(Error::Mesh(format!(
                    "prescribed dof ({node}, {dof}) out of range for {n_nodes} nodes"
                )));
            }
            ids[node][dof] = PRESCRIBED;
        }

        let mut next = 0isize;
        for id in ids.iter_mut().flat_map(|row| row.iter_mut()) {
            if *id != PRESCRIBED {
                *id = next;
                next += 1;
            }
        }

        Ok(Self {
            ids,
            n_equations: next as usize,
        })
    }

    /// Number of free equations.
    pub fn n_equations(&self) -> usize {
        self.n_equations
    }

    /// Number of nodes in the table.
    pub fn n_nodes(&self) -> usize {
        self.ids.len()
    }

    /// Equation number of a nodal dof, or [`PRESCRIBED`].
    pub fn equation(&self, node: usize, dof: usize) -> isize {
        self.ids[node][dof]
    }

    /// Equation numbers of one node.
    pub fn node_lm(&self, node: usize) -> [isize; DOFS_PER_NODE] {
        self.ids[node]
    }

    pub fn is_prescribed(&self, node: usize, dof: usize) -> bool {
        self.ids[node][dof] == PRESCRIBED
    }
}

impl EquationMap for DofTable {
    fn len(&self) -> usize {
        self.n_equations
    }

    fn element_lm(&self, nodes: &[usize]) -> Vec<isize> {
        nodes.iter().flat_map(|&n| self.ids[n]).collect()
    }
}

/// Identity numbering over all nodal dofs, used to recover reactions.
#[derive(Debug, Clone, Copy)]
pub struct NodalDofs {
    pub n_nodes: usize,
}

impl EquationMap for NodalDofs {
    fn len(&self) -> usize {
        self.n_nodes * DOFS_PER_NODE
    }

    fn element_lm(&self, nodes: &[usize]) -> Vec<isize> {
        nodes
            .iter()
            .flat_map(|&n| (0..DOFS_PER_NODE).map(move |d| (n * DOFS_PER_NODE + d) as isize))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering_skips_prescribed() {
        let dofs = DofTable::new(3, &[(0, 0), (0, 1), (0, 2), (2, 1)]).unwrap();
        assert_eq!(dofs.n_equations(), 5);
        assert_eq!(dofs.node_lm(0), [-1, -1, -1]);
        assert_eq!(dofs.node_lm(1), [0, 1, 2]);
        assert_eq!(dofs.node_lm(2), [3, -1, 4]);
        assert_eq!(dofs.element_lm(&[2, 1]), vec![3, -1, 4, 0, 1, 2]);
    }

    #[test]
    fn test_duplicate_prescription_is_harmless() {
        let dofs = DofTable::new(2, &[(1, 2), (1, 2)]).unwrap();
        assert_eq!(dofs.n_equations(), 5);
        assert!(dofs.is_prescribed(1, 2));
    }

    #[test]
    fn test_out_of_range_prescription() {
        assert!(DofTable::new(2, &[(2, 0)]).is_err());
        assert!(DofTable::new(2, &[(0, 3)]).is_err());
    }

    #[test]
    fn test_nodal_map() {
        let map = NodalDofs { n_nodes: 4 };
        assert_eq!(map.len(), 12);
        assert_eq!(map.element_lm(&[3]), vec![9, 10, 11]);
    }
}
