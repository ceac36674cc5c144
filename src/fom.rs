//! The full-order model exposed to time integrators and reduced-order layers.
use crate::assembly::{
    assemble_csr_from_triplets, collect_jacobian_triplets, compute_velocity, ExecutionBackend, JacobianPattern, Triplet,
};
use crate::io::load_mesh_from_file;
use crate::mesh::MeshGraph;
use crate::physics::AdrPhysics;
use crate::stencil::{FdCoefficients, StencilKernel};
use eyre::Context;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use std::path::Path;

/// Scratch data for Jacobian evaluations.
///
/// A workspace is owned by the caller and can be reused across evaluations (and models) to
/// avoid repeated allocation.
#[derive(Debug, Clone)]
pub struct FomWorkspace {
    triplets: Vec<Triplet>,
    jacobian: CsrMatrix<f64>,
}

impl Default for FomWorkspace {
    fn default() -> Self {
        Self {
            triplets: Vec::new(),
            jacobian: CsrMatrix::zeros(0, 0),
        }
    }
}

/// Finite-difference full-order model of the 2D advection-diffusion-reaction system.
///
/// A model is only ever observable in its ready state: the mesh graph is loaded, the
/// finite-difference coefficients are computed and the sparsity pattern of the Jacobian has
/// been built. Construction fails as a whole if the mesh cannot be loaded.
#[derive(Debug, Clone)]
pub struct Adr2dFom {
    mesh: MeshGraph,
    physics: AdrPhysics,
    coefficients: FdCoefficients,
    pattern: JacobianPattern,
    backend: ExecutionBackend,
    state: DVector<f64>,
}

impl Adr2dFom {
    /// Constructs a model from a mesh graph, pointwise physics and diffusion coefficient.
    pub fn new(mesh: MeshGraph, physics: AdrPhysics, diffusion: f64) -> Self {
        let coefficients = FdCoefficients::from_mesh(&mesh, diffusion);
        let pattern = JacobianPattern::build(&mesh);
        debug!(
            "Built Jacobian pattern with {} rows, {} columns and {} stored entries",
            pattern.nrows(),
            pattern.ncols(),
            pattern.nnz()
        );
        let state = DVector::zeros(mesh.num_state_dofs());
        Self {
            mesh,
            physics,
            coefficients,
            pattern,
            backend: ExecutionBackend::default(),
            state,
        }
    }

    /// Loads the mesh graph at `path` and constructs a model from it.
    pub fn from_mesh_file(path: impl AsRef<Path>, physics: AdrPhysics, diffusion: f64) -> eyre::Result<Self> {
        let path = path.as_ref();
        let mesh =
            load_mesh_from_file(path).wrap_err_with(|| format!("failed to set up model from {}", path.display()))?;
        info!(
            "Constructing ADR model with {} residual cells and {} state cells",
            mesh.num_residual_cells(),
            mesh.num_state_cells()
        );
        Ok(Self::new(mesh, physics, diffusion))
    }

    pub fn with_backend(mut self, backend: ExecutionBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn backend(&self) -> ExecutionBackend {
        self.backend
    }

    pub fn mesh(&self) -> &MeshGraph {
        &self.mesh
    }

    pub fn physics(&self) -> &AdrPhysics {
        &self.physics
    }

    pub fn coefficients(&self) -> &FdCoefficients {
        &self.coefficients
    }

    pub fn jacobian_pattern(&self) -> &JacobianPattern {
        &self.pattern
    }

    /// Length of the state vector.
    pub fn state_size(&self) -> usize {
        self.mesh.num_state_dofs()
    }

    /// Length of the velocity vector, i.e. the number of Jacobian rows.
    pub fn residual_size(&self) -> usize {
        self.mesh.num_residual_dofs()
    }

    /// The initial state, which is identically zero.
    pub fn state(&self) -> &DVector<f64> {
        &self.state
    }

    /// x-coordinates of all state cells.
    pub fn x(&self) -> DVector<f64> {
        self.mesh.x()
    }

    /// y-coordinates of all state cells.
    pub fn y(&self) -> DVector<f64> {
        self.mesh.y()
    }

    pub fn kernel(&self) -> StencilKernel<'_> {
        StencilKernel::new(&self.mesh, &self.coefficients, &self.physics)
    }

    pub fn create_velocity(&self) -> DVector<f64> {
        DVector::zeros(self.residual_size())
    }

    /// A zero matrix with the sparsity pattern of the Jacobian.
    pub fn create_jacobian(&self) -> CsrMatrix<f64> {
        self.pattern.create_matrix()
    }

    pub fn create_workspace(&self) -> FomWorkspace {
        FomWorkspace {
            triplets: Vec::new(),
            jacobian: self.create_jacobian(),
        }
    }

    pub fn velocity(&self, u: &DVector<f64>, t: f64) -> DVector<f64> {
        let mut f = self.create_velocity();
        self.velocity_into(u, t, &mut f);
        f
    }

    /// Evaluates the velocity at `(u, t)` into `f`.
    ///
    /// # Panics
    ///
    /// Panics if `u` does not have length [`state_size`](Self::state_size) or `f` does not
    /// have length [`residual_size`](Self::residual_size).
    pub fn velocity_into(&self, u: &DVector<f64>, t: f64, f: &mut DVector<f64>) {
        compute_velocity(&self.kernel(), u.as_slice(), t, f.as_mut_slice(), self.backend);
    }

    pub fn jacobian(&self, u: &DVector<f64>, t: f64) -> CsrMatrix<f64> {
        let mut jacobian = self.create_jacobian();
        let mut triplets = Vec::new();
        self.evaluate_jacobian(u, t, &mut jacobian, &mut triplets);
        jacobian
    }

    /// Evaluates the Jacobian at `(u, t)` into `jacobian`.
    ///
    /// With the sequential backend, the matrix is assembled afresh from triplets collected in
    /// the workspace. With the parallel backend, only the values of `jacobian` are refreshed;
    /// if `jacobian` does not have the pattern of the model, it is replaced by a matrix that does.
    ///
    /// # Panics
    ///
    /// Panics if `u` does not have length [`state_size`](Self::state_size).
    pub fn jacobian_into(&self, u: &DVector<f64>, t: f64, jacobian: &mut CsrMatrix<f64>, workspace: &mut FomWorkspace) {
        self.evaluate_jacobian(u, t, jacobian, &mut workspace.triplets);
    }

    fn evaluate_jacobian(&self, u: &DVector<f64>, t: f64, jacobian: &mut CsrMatrix<f64>, triplets: &mut Vec<Triplet>) {
        let kernel = self.kernel();
        match self.backend {
            ExecutionBackend::Sequential => {
                collect_jacobian_triplets(&kernel, u.as_slice(), t, triplets);
                *jacobian = assemble_csr_from_triplets(self.residual_size(), self.state_size(), triplets);
            }
            ExecutionBackend::Parallel => {
                if !self.pattern.is_pattern_of(jacobian) {
                    *jacobian = self.create_jacobian();
                }
                self.pattern
                    .refresh_values(&kernel, u.as_slice(), t, jacobian, ExecutionBackend::Parallel);
            }
        }
    }

    /// Computes the product `J(u, t) B`.
    pub fn apply_jacobian(&self, u: &DVector<f64>, b: &DMatrix<f64>, t: f64) -> DMatrix<f64> {
        let mut result = DMatrix::zeros(self.residual_size(), b.ncols());
        let mut workspace = self.create_workspace();
        self.apply_jacobian_into(u, b, t, &mut result, &mut workspace);
        result
    }

    /// Computes the product `J(u, t) B` into `result`.
    ///
    /// The result is identical to evaluating the Jacobian with [`jacobian`](Self::jacobian)
    /// and multiplying it with `b`.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions of `u`, `b` and `result` are not compatible with the model.
    pub fn apply_jacobian_into(
        &self,
        u: &DVector<f64>,
        b: &DMatrix<f64>,
        t: f64,
        result: &mut DMatrix<f64>,
        workspace: &mut FomWorkspace,
    ) {
        assert_eq!(b.nrows(), self.state_size(), "B must have one row per state dof");
        assert_eq!(
            result.shape(),
            (self.residual_size(), b.ncols()),
            "Result must have one row per residual dof and as many columns as B"
        );
        let FomWorkspace { triplets, jacobian } = workspace;
        self.evaluate_jacobian(u, t, jacobian, triplets);
        // The output may contain non-finite values, which a zero beta does not clear
        result.fill(0.0);
        spmm_csr_dense(0.0, &mut *result, 1.0, Op::NoOp(&*jacobian), Op::NoOp(b));
    }
}
