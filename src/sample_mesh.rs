//! Index bookkeeping between a sample mesh and the full mesh it was extracted from.
//!
//! On a sample mesh, the velocity is only evaluated at a subset of cells, while the state
//! (and any basis spanning it) lives on the cells of the full mesh. The operations in this
//! module relate the two index spaces.
use crate::mesh::MeshGraph;
use crate::{dof_index, NUM_SPECIES};
use eyre::eyre;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Ordered list of `(sample_local_gid, full_gid)` pairs, one per state-carrying cell of a
/// sample mesh.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SampleToFullMap {
    pairs: Vec<(usize, usize)>,
}

impl SampleToFullMap {
    pub fn from_pairs(pairs: Vec<(usize, usize)>) -> Self {
        Self { pairs }
    }

    /// The map `(i, i)` for `i in 0 .. num_cells`.
    pub fn identity(num_cells: usize) -> Self {
        Self::from_pairs((0..num_cells).map(|i| (i, i)).collect())
    }

    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Gathers the state dofs of the listed full-mesh cells into a vector indexed by
    /// sample-local GID.
    pub fn restrict_state(&self, full_state: &DVector<f64>) -> eyre::Result<DVector<f64>> {
        let reduced = extract_rows(&DMatrix::from_column_slice(full_state.len(), 1, full_state.as_slice()), self)?;
        Ok(reduced.column(0).into_owned())
    }
}

/// Extracts the rows of `full_basis` corresponding to the cells of a sample mesh.
///
/// For every pair `(local, full)` in `map`, the rows `3 local .. 3 local + 3` of the result
/// are the rows `3 full .. 3 full + 3` of `full_basis`. The result has
/// `3 * (max local + 1)` rows, so that it can be indexed with sample-local GIDs.
///
/// Returns an error if a sample-local GID appears more than once, if a sample-local GID is
/// not covered by the map, or if a full GID addresses rows outside of `full_basis`.
pub fn extract_rows(full_basis: &DMatrix<f64>, map: &SampleToFullMap) -> eyre::Result<DMatrix<f64>> {
    let num_sample_cells = map
        .pairs()
        .iter()
        .map(|&(local, _)| local + 1)
        .max()
        .unwrap_or(0);
    if num_sample_cells != map.len() {
        return Err(eyre!(
            "sample-to-full map with {} entries does not cover sample-local GIDs 0 .. {}",
            map.len(),
            num_sample_cells
        ));
    }

    let mut visited = vec![false; num_sample_cells];
    let mut reduced = DMatrix::zeros(NUM_SPECIES * num_sample_cells, full_basis.ncols());
    for &(local, full) in map.pairs() {
        if std::mem::replace(&mut visited[local], true) {
            return Err(eyre!("sample-local GID {local} appears more than once in sample-to-full map"));
        }
        if dof_index(full, NUM_SPECIES - 1) >= full_basis.nrows() {
            return Err(eyre!(
                "full GID {full} is out of bounds for a basis with {} rows",
                full_basis.nrows()
            ));
        }
        reduced
            .rows_mut(dof_index(local, 0), NUM_SPECIES)
            .copy_from(&full_basis.rows(dof_index(full, 0), NUM_SPECIES));
    }
    Ok(reduced)
}

fn assert_time_discrete_dimensions(mesh: &MeshGraph, residual_rows: usize, xn_rows: usize, xnm1_rows: usize) {
    assert_eq!(
        residual_rows,
        mesh.num_residual_dofs(),
        "Residual must have one row per residual dof"
    );
    assert_eq!(xn_rows, mesh.num_state_dofs(), "Current state must have one row per state dof");
    assert_eq!(xnm1_rows, mesh.num_state_dofs(), "Previous state must have one row per state dof");
}

/// Turns the velocity stored in `r` into the backward Euler residual
/// `r = xn - xnm1 - dt r`, evaluated at the residual cells of `mesh`.
///
/// `r` is indexed by residual cell, `xn` and `xnm1` by state GID.
///
/// # Panics
///
/// Panics if the dimensions do not match the mesh.
pub fn time_discrete_euler(r: &mut DVector<f64>, xn: &DVector<f64>, xnm1: &DVector<f64>, dt: f64, mesh: &MeshGraph) {
    assert_time_discrete_dimensions(mesh, r.len(), xn.len(), xnm1.len());
    for (k, gid) in mesh.residual_gids().enumerate() {
        for d in 0..NUM_SPECIES {
            let row = dof_index(k, d);
            let state_idx = dof_index(gid, d);
            r[row] = xn[state_idx] - xnm1[state_idx] - dt * r[row];
        }
    }
}

/// Turns the projected Jacobian stored in `jphi` into the backward Euler Jacobian
/// `jphi = phi - prefactor dt jphi`, row-remapped from residual cells to state GIDs.
///
/// # Panics
///
/// Panics if the dimensions do not match the mesh, or if `jphi` and `phi` have different
/// numbers of columns.
pub fn time_discrete_jacobian(jphi: &mut DMatrix<f64>, phi: &DMatrix<f64>, prefactor: f64, dt: f64, mesh: &MeshGraph) {
    assert_time_discrete_dimensions(mesh, jphi.nrows(), phi.nrows(), phi.nrows());
    assert_eq!(jphi.ncols(), phi.ncols(), "Column counts must agree");
    let scale = prefactor * dt;
    for j in 0..jphi.ncols() {
        for (k, gid) in mesh.residual_gids().enumerate() {
            for d in 0..NUM_SPECIES {
                let row = dof_index(k, d);
                jphi[(row, j)] = phi[(dof_index(gid, d), j)] - scale * jphi[(row, j)];
            }
        }
    }
}
