//! Executors for velocity and Jacobian evaluation, and sparse Jacobian assembly.
//!
//! Two ways of producing the Jacobian are provided:
//!
//! - Fresh assembly from `(row, col, value)` triplets on every evaluation
//!   ([`collect_jacobian_triplets`] + [`assemble_csr_from_triplets`]).
//! - A [`JacobianPattern`] built once from the mesh graph, after which only the values of an
//!   existing CSR matrix are refreshed, either sequentially or in parallel.
//!
//! Duplicate `(row, col)` contributions, which occur on very small periodic meshes where two
//! neighbours of a cell coincide, are summed. Contributions to a given entry are always
//! accumulated in stencil slot order, so all paths produce bit-identical matrices.
use crate::mesh::MeshGraph;
use crate::stencil::{jacobian_row_columns, StencilKernel};
use crate::{NONZEROS_PER_ROW, NUM_SPECIES};
use adr_paradis::DisjointRanges;
use itertools::Itertools;
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Selects how per-cell work is executed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionBackend {
    /// Cells are processed one at a time, in residual order. The Jacobian is assembled from
    /// triplets collected in a caller-owned scratch buffer.
    #[default]
    Sequential,
    /// Cells are processed in parallel. Each cell writes only its own velocity entries and the
    /// values of its own Jacobian rows in a pre-built sparsity pattern.
    Parallel,
}

/// A `(row, col, value)` Jacobian contribution.
pub type Triplet = (usize, usize, f64);

fn assert_consistent_sizes(mesh: &MeshGraph, u: &[f64], f_len: Option<usize>) {
    assert_eq!(
        u.len(),
        mesh.num_state_dofs(),
        "State vector length must be the number of state dofs of the mesh"
    );
    if let Some(f_len) = f_len {
        assert_eq!(
            f_len,
            mesh.num_residual_dofs(),
            "Velocity vector length must be the number of residual dofs of the mesh"
        );
    }
}

/// Evaluates the velocity of every residual cell with the given backend.
///
/// # Panics
///
/// Panics if `u` or `f` do not have the sizes prescribed by the mesh.
pub fn compute_velocity(kernel: &StencilKernel, u: &[f64], t: f64, f: &mut [f64], backend: ExecutionBackend) {
    match backend {
        ExecutionBackend::Sequential => compute_velocity_sequential(kernel, u, t, f),
        ExecutionBackend::Parallel => compute_velocity_parallel(kernel, u, t, f),
    }
}

pub fn compute_velocity_sequential(kernel: &StencilKernel, u: &[f64], t: f64, f: &mut [f64]) {
    assert_consistent_sizes(kernel.mesh(), u, Some(f.len()));
    for (k, f_k) in f.chunks_exact_mut(NUM_SPECIES).enumerate() {
        f_k.copy_from_slice(&kernel.cell_velocity(k, u, t));
    }
}

pub fn compute_velocity_parallel(kernel: &StencilKernel, u: &[f64], t: f64, f: &mut [f64]) {
    assert_consistent_sizes(kernel.mesh(), u, Some(f.len()));
    f.par_chunks_exact_mut(NUM_SPECIES)
        .enumerate()
        .for_each(|(k, f_k)| f_k.copy_from_slice(&kernel.cell_velocity(k, u, t)));
}

/// Collects the Jacobian triplets of all residual cells into `triplets`.
///
/// The buffer is cleared first. Exactly [`NONZEROS_PER_ROW`] triplets are produced for every
/// residual row, including entries whose value happens to be zero. Triplets of a row are
/// emitted consecutively and in stencil slot order.
pub fn collect_jacobian_triplets(kernel: &StencilKernel, u: &[f64], t: f64, triplets: &mut Vec<Triplet>) {
    let mesh = kernel.mesh();
    assert_consistent_sizes(mesh, u, None);
    triplets.clear();
    triplets.reserve(NONZEROS_PER_ROW * mesh.num_residual_dofs());
    for k in 0..mesh.num_residual_cells() {
        let cell_jacobian = kernel.cell_jacobian(k, u, t);
        for d in 0..NUM_SPECIES {
            let row = NUM_SPECIES * k + d;
            for (&col, &value) in cell_jacobian.columns[d]
                .iter()
                .zip(&cell_jacobian.values[d])
            {
                triplets.push((row, col, value));
            }
        }
    }
}

/// Assembles a CSR matrix from triplets, summing duplicate entries.
///
/// Duplicates are summed in the order in which they appear in `triplets`, starting from zero.
///
/// # Panics
///
/// Panics if a triplet is out of bounds.
pub fn assemble_csr_from_triplets(nrows: usize, ncols: usize, triplets: &[Triplet]) -> CsrMatrix<f64> {
    // Stable sort, so that duplicates retain their relative order
    let mut order: Vec<usize> = (0..triplets.len()).collect();
    order.sort_by_key(|&i| (triplets[i].0, triplets[i].1));

    let mut offsets = Vec::with_capacity(nrows + 1);
    let mut column_indices = Vec::with_capacity(triplets.len());
    let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
    offsets.push(0);

    let mut prev_entry = None;
    for i in order {
        let (row, col, value) = triplets[i];
        assert!(row < nrows && col < ncols, "Triplet ({row}, {col}) out of bounds");
        if prev_entry != Some((row, col)) {
            // Handles empty rows between consecutive entries
            while offsets.len() < row + 1 {
                offsets.push(column_indices.len());
            }
            column_indices.push(col);
            values.push(0.0);
            prev_entry = Some((row, col));
        }
        let last = values.len() - 1;
        values[last] += value;
    }

    // Fill out offsets for trailing empty rows
    while offsets.len() < nrows + 1 {
        offsets.push(column_indices.len());
    }

    let pattern = SparsityPattern::try_from_offsets_and_indices(nrows, ncols, offsets, column_indices)
        .expect("Pattern data must be valid by construction");
    CsrMatrix::try_from_pattern_and_values(pattern, values).expect("CSR data must be valid by construction")
}

/// The static sparsity pattern of the Jacobian of a mesh graph.
///
/// The Jacobian has `3 * num_residual_cells` rows and `3 * num_state_cells` columns. Besides the
/// CSR pattern, it stores for every row and stencil slot the position of the corresponding
/// entry in the CSR value array, so that values can be refreshed in place without searching.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianPattern {
    pattern: SparsityPattern,
    slots: Vec<[usize; NONZEROS_PER_ROW]>,
    cell_ranges: DisjointRanges,
}

impl JacobianPattern {
    pub fn build(mesh: &MeshGraph) -> Self {
        let nrows = mesh.num_residual_dofs();
        let ncols = mesh.num_state_dofs();
        let mut offsets = Vec::with_capacity(nrows + 1);
        let mut column_indices = Vec::with_capacity(NONZEROS_PER_ROW * nrows);
        let mut slots = Vec::with_capacity(nrows);
        offsets.push(0);

        for stencil in mesh.stencils() {
            for d in 0..NUM_SPECIES {
                let columns = jacobian_row_columns(stencil, d);
                let mut sorted_columns = columns;
                sorted_columns.sort_unstable();

                let row_start = column_indices.len();
                column_indices.extend(sorted_columns.iter().copied().dedup());
                let row_columns = &column_indices[row_start..];

                let mut row_slots = [0; NONZEROS_PER_ROW];
                for (slot, col) in row_slots.iter_mut().zip(&columns) {
                    let local_idx = row_columns
                        .binary_search(col)
                        .expect("Every stencil column is part of its row by construction");
                    *slot = row_start + local_idx;
                }
                slots.push(row_slots);
                offsets.push(column_indices.len());
            }
        }

        // The rows of residual cell k are 3k .. 3k + 3, so its values form a contiguous range
        let cell_offsets = offsets.iter().step_by(NUM_SPECIES).copied().collect();
        let cell_ranges =
            DisjointRanges::try_from_offsets(cell_offsets).expect("CSR offsets are non-decreasing by construction");

        let pattern = SparsityPattern::try_from_offsets_and_indices(nrows, ncols, offsets, column_indices)
            .expect("Pattern data must be valid by construction");

        Self {
            pattern,
            slots,
            cell_ranges,
        }
    }

    pub fn sparsity_pattern(&self) -> &SparsityPattern {
        &self.pattern
    }

    /// For every row, the index into the CSR value array of each stencil slot.
    pub fn slots(&self) -> &[[usize; NONZEROS_PER_ROW]] {
        &self.slots
    }

    pub fn nrows(&self) -> usize {
        self.pattern.major_dim()
    }

    pub fn ncols(&self) -> usize {
        self.pattern.minor_dim()
    }

    pub fn nnz(&self) -> usize {
        self.pattern.nnz()
    }

    /// A matrix with this pattern and all values set to zero.
    pub fn create_matrix(&self) -> CsrMatrix<f64> {
        CsrMatrix::try_from_pattern_and_values(self.pattern.clone(), vec![0.0; self.nnz()])
            .expect("CSR data must be valid by construction")
    }

    /// Whether `matrix` has exactly this sparsity pattern.
    pub fn is_pattern_of(&self, matrix: &CsrMatrix<f64>) -> bool {
        matrix.pattern() == &self.pattern
    }

    /// Overwrites the values of `matrix` with the Jacobian at `(u, t)`.
    ///
    /// # Panics
    ///
    /// Panics if `matrix` does not have this pattern, or if `u` does not have the size
    /// prescribed by the mesh.
    pub fn refresh_values(
        &self,
        kernel: &StencilKernel,
        u: &[f64],
        t: f64,
        matrix: &mut CsrMatrix<f64>,
        backend: ExecutionBackend,
    ) {
        assert!(
            self.is_pattern_of(matrix),
            "Matrix must have the sparsity pattern of the Jacobian"
        );
        assert_consistent_sizes(kernel.mesh(), u, None);
        assert_eq!(
            kernel.mesh().num_residual_dofs(),
            self.nrows(),
            "Kernel mesh must be the mesh the pattern was built from"
        );

        let values = matrix.values_mut();
        match backend {
            ExecutionBackend::Sequential => self
                .cell_ranges
                .for_each_mut(values, |k, cell_values| self.write_cell_values(kernel, k, u, t, cell_values)),
            ExecutionBackend::Parallel => self
                .cell_ranges
                .par_for_each_mut(values, |k, cell_values| self.write_cell_values(kernel, k, u, t, cell_values)),
        }
    }

    /// Writes the values of the rows of residual cell `k`, given as the contiguous subslice
    /// of the CSR value array covering those rows.
    #[inline]
    fn write_cell_values(&self, kernel: &StencilKernel, k: usize, u: &[f64], t: f64, cell_values: &mut [f64]) {
        let base = self.cell_ranges.range(k).start;
        let cell_jacobian = kernel.cell_jacobian(k, u, t);
        cell_values.fill(0.0);
        for d in 0..NUM_SPECIES {
            let row_slots = &self.slots[NUM_SPECIES * k + d];
            for (&slot, &value) in row_slots.iter().zip(&cell_jacobian.values[d]) {
                cell_values[slot - base] += value;
            }
        }
    }
}
