use crate::{dof_index, NUM_SPECIES};
use eyre::eyre;
use nalgebra::{DVector, Point2};
use serde::{Deserialize, Serialize};

pub mod procedural;

/// GIDs of a residual cell and its four neighbours, in the order
/// `[center, west, north, east, south]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellStencil(pub [usize; 5]);

impl CellStencil {
    pub fn new(center: usize, west: usize, north: usize, east: usize, south: usize) -> Self {
        Self([center, west, north, east, south])
    }

    pub fn center(&self) -> usize {
        self.0[0]
    }

    pub fn west(&self) -> usize {
        self.0[1]
    }

    pub fn north(&self) -> usize {
        self.0[2]
    }

    pub fn east(&self) -> usize {
        self.0[3]
    }

    pub fn south(&self) -> usize {
        self.0[4]
    }

    /// Neighbour GIDs in the order `[west, north, east, south]`.
    pub fn neighbors(&self) -> [usize; 4] {
        [self.0[1], self.0[2], self.0[3], self.0[4]]
    }

    pub fn gids(&self) -> &[usize; 5] {
        &self.0
    }
}

/// Connectivity of the cells where the velocity (residual) is evaluated, together with the
/// coordinates of every state-carrying cell.
///
/// The graph holds one [`CellStencil`] per residual cell. The `k`-th residual cell owns the
/// velocity entries `3k .. 3k + 3`, while the GIDs stored in the stencils index into the
/// (possibly larger) state vector. A mesh graph is immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshGraph {
    dx: f64,
    dy: f64,
    stencils: Vec<CellStencil>,
    coordinates: Vec<Point2<f64>>,
}

impl MeshGraph {
    /// Construct a mesh graph from grid spacing, residual-cell stencils and the coordinates of
    /// all state cells (indexed by GID).
    ///
    /// Returns an error if a stencil references a GID without coordinates, or if the grid
    /// spacing is not positive.
    pub fn try_from_stencils_and_coordinates(
        dx: f64,
        dy: f64,
        stencils: Vec<CellStencil>,
        coordinates: Vec<Point2<f64>>,
    ) -> eyre::Result<Self> {
        if !(dx > 0.0 && dy > 0.0) {
            return Err(eyre!("grid spacing must be positive, got dx = {dx}, dy = {dy}"));
        }
        let num_state_cells = coordinates.len();
        for (k, stencil) in stencils.iter().enumerate() {
            if let Some(gid) = stencil.gids().iter().find(|&&gid| gid >= num_state_cells) {
                return Err(eyre!(
                    "stencil of residual cell {k} references GID {gid}, \
                     but there are only {num_state_cells} state cells"
                ));
            }
        }
        Ok(Self {
            dx,
            dy,
            stencils,
            coordinates,
        })
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn dy(&self) -> f64 {
        self.dy
    }

    pub fn stencils(&self) -> &[CellStencil] {
        &self.stencils
    }

    pub fn stencil(&self, residual_cell: usize) -> &CellStencil {
        &self.stencils[residual_cell]
    }

    /// Coordinates of all state cells, indexed by GID.
    pub fn coordinates(&self) -> &[Point2<f64>] {
        &self.coordinates
    }

    pub fn num_residual_cells(&self) -> usize {
        self.stencils.len()
    }

    pub fn num_state_cells(&self) -> usize {
        self.coordinates.len()
    }

    pub fn num_residual_dofs(&self) -> usize {
        NUM_SPECIES * self.num_residual_cells()
    }

    pub fn num_state_dofs(&self) -> usize {
        NUM_SPECIES * self.num_state_cells()
    }

    /// Whether velocity is evaluated at every state cell, i.e. whether this is a full mesh.
    pub fn is_full_mesh(&self) -> bool {
        self.num_residual_cells() == self.num_state_cells()
    }

    /// The GIDs of the residual cells, in residual order.
    pub fn residual_gids(&self) -> impl '_ + ExactSizeIterator<Item = usize> {
        self.stencils.iter().map(CellStencil::center)
    }

    /// Pairs `(residual_dof, state_dof)` for the first species of every residual cell.
    pub fn residual_to_state_dofs(&self) -> impl '_ + ExactSizeIterator<Item = (usize, usize)> {
        self.residual_gids()
            .enumerate()
            .map(|(k, gid)| (dof_index(k, 0), dof_index(gid, 0)))
    }

    /// x-coordinates of all state cells.
    pub fn x(&self) -> DVector<f64> {
        DVector::from_iterator(self.num_state_cells(), self.coordinates.iter().map(|p| p.x))
    }

    /// y-coordinates of all state cells.
    pub fn y(&self) -> DVector<f64> {
        DVector::from_iterator(self.num_state_cells(), self.coordinates.iter().map(|p| p.y))
    }
}
