//! Full-order finite-difference model of a 2D advection-diffusion-reaction (ADR) system.
//!
//! The model evaluates the semi-discrete right-hand side ("velocity") and its sparse Jacobian
//! for three chemical species on a cell-centred grid described by a mesh graph. Each cell
//! where a residual is needed stores its own GID and the GIDs of its west, north, east and
//! south neighbours. The graph may cover only a subset of the state-carrying cells
//! (a *sample mesh*), in which case the velocity is shorter than the state.
//!
//! Dof layout: the state entry for species `s` of the cell with GID `g` is
//! [`dof_index(g, s)`](dof_index), i.e. species are interleaved per cell.
pub mod assembly;
pub mod config;
pub mod fom;
pub mod io;
pub mod mesh;
pub mod observer;
pub mod physics;
pub mod sample_mesh;
pub mod stencil;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

/// Number of chemical species, i.e. dofs per cell.
pub const NUM_SPECIES: usize = 3;

/// Number of Jacobian entries contributed to every residual row by the 5-point stencil.
pub const NONZEROS_PER_ROW: usize = 7;

/// Index of the dof for the given species of the cell with the given GID.
#[inline(always)]
pub fn dof_index(gid: usize, species: usize) -> usize {
    debug_assert!(species < NUM_SPECIES);
    gid * NUM_SPECIES + species
}
