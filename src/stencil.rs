//! Finite-difference stencil evaluation for a single residual cell.
//!
//! The per-cell computation is a pure function of the residual cell index, the mesh graph, the
//! state and the precomputed coefficients. Both the sequential and the parallel executors in
//! [`assembly`](crate::assembly) drive exactly the same functions, which is what makes their
//! results identical.
use crate::mesh::{CellStencil, MeshGraph};
use crate::physics::AdrPhysics;
use crate::{dof_index, NONZEROS_PER_ROW, NUM_SPECIES};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Finite-difference coefficients that depend only on the grid spacing and the diffusion
/// coefficient. Computed once per model.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FdCoefficients {
    diffusion: f64,
    /// `1 / dx^2`
    dx_sq_inv: f64,
    /// `1 / dy^2`
    dy_sq_inv: f64,
    /// `1 / (2 dx)`
    dx2_inv: f64,
    /// `1 / (2 dy)`
    dy2_inv: f64,
    /// `D / dx^2`
    diffusion_over_dx_sq: f64,
    /// `D / dy^2`
    diffusion_over_dy_sq: f64,
    /// `-2 (D / dx^2 + D / dy^2)`
    center: f64,
}

impl FdCoefficients {
    pub fn new(dx: f64, dy: f64, diffusion: f64) -> Self {
        let dx_sq_inv = 1.0 / (dx * dx);
        let dy_sq_inv = 1.0 / (dy * dy);
        let diffusion_over_dx_sq = diffusion * dx_sq_inv;
        let diffusion_over_dy_sq = diffusion * dy_sq_inv;
        Self {
            diffusion,
            dx_sq_inv,
            dy_sq_inv,
            dx2_inv: 1.0 / (2.0 * dx),
            dy2_inv: 1.0 / (2.0 * dy),
            diffusion_over_dx_sq,
            diffusion_over_dy_sq,
            center: -2.0 * (diffusion_over_dx_sq + diffusion_over_dy_sq),
        }
    }

    pub fn from_mesh(mesh: &MeshGraph, diffusion: f64) -> Self {
        Self::new(mesh.dx(), mesh.dy(), diffusion)
    }

    pub fn diffusion(&self) -> f64 {
        self.diffusion
    }

    pub fn dx_sq_inv(&self) -> f64 {
        self.dx_sq_inv
    }

    pub fn dy_sq_inv(&self) -> f64 {
        self.dy_sq_inv
    }

    pub fn dx2_inv(&self) -> f64 {
        self.dx2_inv
    }

    pub fn dy2_inv(&self) -> f64 {
        self.dy2_inv
    }

    pub fn diffusion_over_dx_sq(&self) -> f64 {
        self.diffusion_over_dx_sq
    }

    pub fn diffusion_over_dy_sq(&self) -> f64 {
        self.diffusion_over_dy_sq
    }

    /// Coefficient of the cell's own state, `-2 (D / dx^2 + D / dy^2)`.
    pub fn center(&self) -> f64 {
        self.center
    }

    /// Neighbour coefficients for the local advection velocity `v`.
    #[inline]
    pub fn directional(&self, v: &Vector2<f64>) -> DirectionalCoefficients {
        DirectionalCoefficients {
            west: v.x * self.dx2_inv + self.diffusion_over_dx_sq,
            north: -v.y * self.dy2_inv + self.diffusion_over_dy_sq,
            east: -v.x * self.dx2_inv + self.diffusion_over_dx_sq,
            south: v.y * self.dy2_inv + self.diffusion_over_dy_sq,
        }
    }
}

/// Weights of the four neighbours in the stencil of one cell, combining central-difference
/// advection and diffusion.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DirectionalCoefficients {
    pub west: f64,
    pub north: f64,
    pub east: f64,
    pub south: f64,
}

impl DirectionalCoefficients {
    /// Coefficients in stencil neighbour order `[west, north, east, south]`.
    pub fn as_array(&self) -> [f64; 4] {
        [self.west, self.north, self.east, self.south]
    }
}

/// The two species other than `species`, in ascending order.
#[inline(always)]
pub fn other_species(species: usize) -> [usize; 2] {
    match species {
        0 => [1, 2],
        1 => [0, 2],
        2 => [0, 1],
        _ => panic!("Species index {species} out of range"),
    }
}

/// State columns of the Jacobian entries of one residual row, in slot order
/// `[self_d, self_other1, self_other2, west_d, north_d, east_d, south_d]`.
///
/// The column order is fixed and shared by the sparsity pattern and every assembly path.
pub fn jacobian_row_columns(stencil: &CellStencil, species: usize) -> [usize; NONZEROS_PER_ROW] {
    let center = stencil.center();
    let [other1, other2] = other_species(species);
    [
        dof_index(center, species),
        dof_index(center, other1),
        dof_index(center, other2),
        dof_index(stencil.west(), species),
        dof_index(stencil.north(), species),
        dof_index(stencil.east(), species),
        dof_index(stencil.south(), species),
    ]
}

/// Jacobian entries of the three rows of a residual cell, in slot order
/// (see [`jacobian_row_columns`]).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CellJacobian {
    pub columns: [[usize; NONZEROS_PER_ROW]; NUM_SPECIES],
    pub values: [[f64; NONZEROS_PER_ROW]; NUM_SPECIES],
}

/// Evaluates the stencil of individual residual cells.
#[derive(Debug, Copy, Clone)]
pub struct StencilKernel<'a> {
    mesh: &'a MeshGraph,
    coefficients: &'a FdCoefficients,
    physics: &'a AdrPhysics,
}

impl<'a> StencilKernel<'a> {
    pub fn new(mesh: &'a MeshGraph, coefficients: &'a FdCoefficients, physics: &'a AdrPhysics) -> Self {
        Self {
            mesh,
            coefficients,
            physics,
        }
    }

    pub fn mesh(&self) -> &'a MeshGraph {
        self.mesh
    }

    pub fn coefficients(&self) -> &'a FdCoefficients {
        self.coefficients
    }

    pub fn physics(&self) -> &'a AdrPhysics {
        self.physics
    }

    #[inline]
    fn gather_cell_state(&self, gid: usize, u: &[f64]) -> Vector3<f64> {
        Vector3::new(u[dof_index(gid, 0)], u[dof_index(gid, 1)], u[dof_index(gid, 2)])
    }

    /// Velocity entries `f[3k .. 3k + 3]` of residual cell `k`.
    ///
    /// # Panics
    ///
    /// Panics if `u` is shorter than the state described by the mesh.
    #[inline]
    pub fn cell_velocity(&self, k: usize, u: &[f64], t: f64) -> [f64; NUM_SPECIES] {
        let stencil = self.mesh.stencil(k);
        let gid = stencil.center();
        let p = &self.mesh.coordinates()[gid];
        let u_cell = self.gather_cell_state(gid, u);

        let v = self.physics.advection.evaluate(p.x, p.y, t, &u_cell);
        let src = self.physics.source.evaluate(p.x, p.y, t, &u_cell);
        let c = self.coefficients.directional(&v);

        let mut f = [0.0; NUM_SPECIES];
        for (d, f_d) in f.iter_mut().enumerate() {
            *f_d = self.coefficients.center() * u_cell[d];
            *f_d += c.west * u[dof_index(stencil.west(), d)]
                + c.north * u[dof_index(stencil.north(), d)]
                + c.east * u[dof_index(stencil.east(), d)]
                + c.south * u[dof_index(stencil.south(), d)]
                + src[d];
        }
        f
    }

    /// Jacobian entries of the rows `3k .. 3k + 3` of residual cell `k`.
    ///
    /// # Panics
    ///
    /// Panics if `u` is shorter than the state described by the mesh.
    #[inline]
    pub fn cell_jacobian(&self, k: usize, u: &[f64], t: f64) -> CellJacobian {
        let stencil = self.mesh.stencil(k);
        let gid = stencil.center();
        let p = &self.mesh.coordinates()[gid];
        let u_cell = self.gather_cell_state(gid, u);

        let v = self.physics.advection.evaluate(p.x, p.y, t, &u_cell);
        let src_jacobian = self.physics.source.jacobian(p.x, p.y, t, &u_cell);
        let c = self.coefficients.directional(&v);

        let mut columns = [[0; NONZEROS_PER_ROW]; NUM_SPECIES];
        let mut values = [[0.0; NONZEROS_PER_ROW]; NUM_SPECIES];
        for d in 0..NUM_SPECIES {
            let [other1, other2] = other_species(d);
            columns[d] = jacobian_row_columns(stencil, d);
            values[d] = [
                self.coefficients.center() + src_jacobian[(d, d)],
                src_jacobian[(d, other1)],
                src_jacobian[(d, other2)],
                c.west,
                c.north,
                c.east,
                c.south,
            ];
        }
        CellJacobian { columns, values }
    }
}
