//! Sparse accumulation of the global constraint operators.
//!
//! Element contributions are collected as COO triplets, which can be added
//! in any order; duplicates are summed when the accumulator is compressed to
//! CSR. Entries below the drop tolerance are pruned at compression time, so
//! the stored operators stay sparse.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Append-only triplet accumulator for one global operator
#[derive(Debug, Clone, Default)]
pub struct SparseAccumulator {
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl SparseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scatter-add a local matrix at the given global row/column indices
    pub fn add(&mut self, row_dofs: &[usize], col_dofs: &[usize], local: &DMatrix<f64>) {
        debug_assert_eq!(local.nrows(), row_dofs.len());
        debug_assert_eq!(local.ncols(), col_dofs.len());
        for (i, &row) in row_dofs.iter().enumerate() {
            for (j, &col) in col_dofs.iter().enumerate() {
                let value = local[(i, j)];
                if value != 0.0 {
                    self.rows.push(row);
                    self.cols.push(col);
                    self.values.push(value);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compress to CSR, summing duplicates, then dropping entries whose
    /// summed absolute value is at most `drop_tolerance`
    pub fn into_csr(self, nrows: usize, ncols: usize, drop_tolerance: f64) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(nrows, ncols);
        for ((row, col), value) in self.rows.into_iter().zip(self.cols).zip(self.values) {
            coo.push(row, col, value);
        }
        let summed = CsrMatrix::from(&coo);
        prune(&summed, drop_tolerance)
    }
}

/// Rebuild a CSR matrix without entries of absolute value <= `tolerance`
pub(crate) fn prune(matrix: &CsrMatrix<f64>, tolerance: f64) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(matrix.nrows(), matrix.ncols());
    for (row, col, &value) in matrix.triplet_iter() {
        if value.abs() > tolerance {
            coo.push(row, col, value);
        }
    }
    CsrMatrix::from(&coo)
}

/// Build a CSR matrix from explicit triplets
pub(crate) fn csr_from_triplets(
    nrows: usize,
    ncols: usize,
    triplets: &[(usize, usize, f64)],
    drop_tolerance: f64,
) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(nrows, ncols);
    for &(row, col, value) in triplets {
        if value.abs() > drop_tolerance {
            coo.push(row, col, value);
        }
    }
    CsrMatrix::from(&coo)
}

/// Mutable global operators of one mortar assembly call: the coupling
/// matrices C1, C2, D and the weighted gap vector g. All contributions are
/// purely additive until the state machine compresses and post-processes
/// them.
#[derive(Debug, Clone)]
pub struct MortarAssembly {
    pub c1: SparseAccumulator,
    pub c2: SparseAccumulator,
    pub d: SparseAccumulator,
    pub g: DVector<f64>,
    num_dofs: usize,
}

impl MortarAssembly {
    pub fn new(num_dofs: usize) -> Self {
        Self {
            c1: SparseAccumulator::new(),
            c2: SparseAccumulator::new(),
            d: SparseAccumulator::new(),
            g: DVector::zeros(num_dofs),
            num_dofs,
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    /// Scatter-add a local vector into the weighted gap
    pub fn add_gap(&mut self, dofs: &[usize], local: &DVector<f64>) {
        debug_assert_eq!(local.len(), dofs.len());
        for (i, &dof) in dofs.iter().enumerate() {
            self.g[dof] += local[i];
        }
    }
}

/// Expand a compressed matrix to dense form, for tests and debugging
pub fn to_dense(matrix: &CsrMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(matrix.nrows(), matrix.ncols());
    for (row, col, &value) in matrix.triplet_iter() {
        dense[(row, col)] = value;
    }
    dense
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_summed_on_compression() {
        let mut acc = SparseAccumulator::new();
        let local = DMatrix::from_element(2, 2, 1.0);
        acc.add(&[0, 1], &[0, 1], &local);
        acc.add(&[0, 1], &[0, 1], &local);

        let csr = acc.into_csr(3, 3, 0.0);
        assert_eq!(csr.nnz(), 4);
        let dense = to_dense(&csr);
        assert_eq!(dense[(0, 0)], 2.0);
        assert_eq!(dense[(1, 0)], 2.0);
        assert_eq!(dense[(2, 2)], 0.0);
    }

    #[test]
    fn drop_tolerance_prunes_small_sums() {
        let mut acc = SparseAccumulator::new();
        let mut local = DMatrix::zeros(1, 2);
        local[(0, 0)] = 1.0;
        local[(0, 1)] = 1e-14;
        acc.add(&[0], &[0, 1], &local);
        // cancellation: +1 then -1 at (0,0) leaves a zero entry
        let mut cancel = DMatrix::zeros(1, 1);
        cancel[(0, 0)] = -1.0;
        acc.add(&[0], &[0], &cancel);

        let csr = acc.into_csr(1, 2, 1e-12);
        assert_eq!(csr.nnz(), 0);
    }

    #[test]
    fn gap_accumulates_additively() {
        let mut assembly = MortarAssembly::new(6);
        assembly.add_gap(&[0, 4], &DVector::from_vec(vec![0.5, 1.0]));
        assembly.add_gap(&[4], &DVector::from_vec(vec![0.25]));
        assert_eq!(assembly.g[0], 0.5);
        assert_eq!(assembly.g[4], 1.25);
        assert_eq!(assembly.g[1], 0.0);
    }
}
