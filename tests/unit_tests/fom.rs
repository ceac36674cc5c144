use adr_rom::assembly::ExecutionBackend;
use adr_rom::dof_index;
use adr_rom::fom::{Adr2dFom, FomWorkspace};
use adr_rom::io::{save_mesh_to_file, MeshLoadError};
use adr_rom::mesh::procedural::{create_periodic_mesh, create_sample_mesh, create_unit_square_periodic_mesh};
use adr_rom::nalgebra::{DMatrix, DVector};
use adr_rom::nalgebra_sparse::CsrMatrix;
use adr_rom::physics::{manufactured_solution, manufactured_solution_time_derivative, AdrPhysics, AdvectionField, SourceTerm};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq, prop_assert_matrix_eq};
use proptest::prelude::*;
use util::{assert_approx_matrix_eq, pseudo_random_matrix, pseudo_random_vector};

use crate::{positive_state, test_output_dir};

const BACKENDS: [ExecutionBackend; 2] = [ExecutionBackend::Sequential, ExecutionBackend::Parallel];

fn uniform_advection_fom(cells_per_dim: usize, backend: ExecutionBackend) -> Adr2dFom {
    let n = cells_per_dim;
    let mesh = create_periodic_mesh(n, n, n as f64, n as f64);
    let physics = AdrPhysics::new(AdvectionField::unit(), SourceTerm::Zero);
    Adr2dFom::new(mesh, physics, 0.01).with_backend(backend)
}

#[test]
fn uniform_state_is_steady_on_2x2_mesh() {
    for backend in BACKENDS {
        let fom = uniform_advection_fom(2, backend);
        assert_eq!(fom.mesh().dx(), 1.0);
        assert_eq!(fom.mesh().dy(), 1.0);
        assert_eq!(fom.state_size(), 12);
        assert_eq!(fom.residual_size(), 12);

        let u = DVector::repeat(fom.state_size(), 1.0);
        let f = fom.velocity(&u, 0.0);
        // The stencil weights cancel up to rounding
        assert_approx_matrix_eq!(&f, &DVector::<f64>::zeros(12), abstol = 1e-14);
    }
}

#[test]
fn initial_state_and_coordinates() {
    let mesh = create_periodic_mesh(3, 2, 3.0, 1.0);
    let fom = Adr2dFom::new(mesh.clone(), AdrPhysics::chemistry_abc(1.0), 0.1);
    assert_eq!(fom.state(), &DVector::<f64>::zeros(18));
    assert_eq!(fom.x(), mesh.x());
    assert_eq!(fom.y(), mesh.y());
    assert_eq!(fom.backend(), ExecutionBackend::Sequential);
    assert_eq!(fom.coefficients().diffusion(), 0.1);
}

#[test]
fn velocity_matches_hand_computed_stencil() {
    let diffusion = 0.05;
    let t = 0.3;
    let mesh = create_periodic_mesh(4, 3, 1.0, 1.0);
    let dx = mesh.dx();
    let dy = mesh.dy();
    let u = pseudo_random_vector(mesh.num_state_dofs(), 42);
    let physics = AdrPhysics::manufactured_solution(diffusion);

    for backend in BACKENDS {
        let fom = Adr2dFom::new(mesh.clone(), physics, diffusion).with_backend(backend);
        let f = fom.velocity(&u, t);
        for (k, stencil) in mesh.stencils().iter().enumerate() {
            let p = mesh.coordinates()[stencil.center()];
            let src = physics.source.evaluate(p.x, p.y, t, &Default::default());
            for d in 0..3 {
                let at = |gid: usize| u[dof_index(gid, d)];
                let (uc, uw, un, ue, us) = (
                    at(stencil.center()),
                    at(stencil.west()),
                    at(stencil.north()),
                    at(stencil.east()),
                    at(stencil.south()),
                );
                // Velocity (1, 1), central differences for advection and diffusion
                let advection = -(ue - uw) / (2.0 * dx) - (un - us) / (2.0 * dy);
                let laplacian = (uw - 2.0 * uc + ue) / (dx * dx) + (us - 2.0 * uc + un) / (dy * dy);
                let expected = advection + diffusion * laplacian + src[d];
                assert_scalar_eq!(f[dof_index(k, d)], expected, comp = abs, tol = 1e-10);
            }
        }
    }
}

fn manufactured_velocity_error(cells_per_dim: usize, diffusion: f64, t: f64) -> f64 {
    let mesh = create_unit_square_periodic_mesh(cells_per_dim);
    let fom = Adr2dFom::new(mesh, AdrPhysics::manufactured_solution(diffusion), diffusion);
    let mut u = DVector::zeros(fom.state_size());
    let mut expected = DVector::zeros(fom.residual_size());
    for (gid, p) in fom.mesh().coordinates().iter().enumerate() {
        let c = manufactured_solution(p.x, p.y, t);
        let dcdt = manufactured_solution_time_derivative(p.x, p.y, t);
        for d in 0..3 {
            u[dof_index(gid, d)] = c[d];
            expected[dof_index(gid, d)] = dcdt[d];
        }
    }
    (fom.velocity(&u, t) - expected).amax()
}

#[test]
fn manufactured_solution_velocity_converges_quadratically() {
    let coarse = manufactured_velocity_error(32, 0.01, 0.5);
    let fine = manufactured_velocity_error(64, 0.01, 0.5);
    assert!(fine < coarse);
    assert!(coarse / fine > 3.0, "Error ratio {} too small", coarse / fine);
}

#[test]
fn jacobian_of_uniform_problem_has_zero_row_sums() {
    for backend in BACKENDS {
        let fom = uniform_advection_fom(2, backend);
        let u = DVector::repeat(fom.state_size(), 1.0);
        let jacobian = fom.jacobian(&u, 0.0);
        assert_eq!(jacobian.nrows(), 12);
        assert_eq!(jacobian.ncols(), 12);
        let row_sums = &jacobian * &u;
        assert_approx_matrix_eq!(&row_sums, &DVector::<f64>::zeros(12), abstol = 1e-14);
    }
}

#[test]
fn backends_agree_exactly() {
    for (nx, ny) in [(1, 1), (2, 2), (1, 3), (5, 4)] {
        let mesh = create_periodic_mesh(nx, ny, 1.0, 1.0);
        let sequential = Adr2dFom::new(mesh.clone(), AdrPhysics::chemistry_abc(8.0), 0.02);
        let parallel = sequential.clone().with_backend(ExecutionBackend::Parallel);
        let u = positive_state(sequential.state_size(), (nx * ny) as u64);
        let b = pseudo_random_matrix(sequential.state_size(), 3, 1);

        assert_eq!(sequential.velocity(&u, 0.25), parallel.velocity(&u, 0.25));
        assert_eq!(sequential.jacobian(&u, 0.25), parallel.jacobian(&u, 0.25));
        assert_eq!(
            sequential.apply_jacobian(&u, &b, 0.25),
            parallel.apply_jacobian(&u, &b, 0.25)
        );
    }
}

#[test]
fn jacobian_into_reuses_or_replaces_matrix() {
    let mesh = create_unit_square_periodic_mesh(3);
    for backend in BACKENDS {
        let fom = Adr2dFom::new(mesh.clone(), AdrPhysics::chemistry_abc(2.0), 0.01).with_backend(backend);
        let u = positive_state(fom.state_size(), 5);
        let expected = fom.jacobian(&u, 0.0);

        let mut workspace = FomWorkspace::default();
        let mut jacobian = CsrMatrix::zeros(0, 0);
        fom.jacobian_into(&u, 0.0, &mut jacobian, &mut workspace);
        assert_eq!(jacobian, expected);

        // Repeated evaluation into the same matrix and workspace
        let mut jacobian = fom.create_jacobian();
        let mut workspace = fom.create_workspace();
        fom.jacobian_into(&u, 0.0, &mut jacobian, &mut workspace);
        fom.jacobian_into(&u, 0.0, &mut jacobian, &mut workspace);
        assert_eq!(jacobian, expected);
    }
}

#[test]
fn sample_mesh_model_reproduces_full_model_at_sample_cells() {
    let full_mesh = create_unit_square_periodic_mesh(5);
    let sample = create_sample_mesh(&full_mesh, &[0, 7, 13, 24]).unwrap();
    let physics = AdrPhysics::chemistry_abc(4.0);
    let full = Adr2dFom::new(full_mesh, physics, 0.01);
    let reduced = Adr2dFom::new(sample.mesh.clone(), physics, 0.01);
    assert!(reduced.residual_size() < reduced.state_size());

    let u_full = positive_state(full.state_size(), 17);
    let u_sample = sample.sample_to_full.restrict_state(&u_full).unwrap();
    let t = 0.5;

    let pairs = sample.sample_to_full.pairs();
    let f_full = full.velocity(&u_full, t);
    let f_sample = reduced.velocity(&u_sample, t);
    for (k, local) in reduced.mesh().residual_gids().enumerate() {
        let global = pairs[local].1;
        for d in 0..3 {
            assert_eq!(f_sample[dof_index(k, d)], f_full[dof_index(global, d)]);
        }
    }

    let j_full = full.jacobian(&u_full, t);
    let j_sample = reduced.jacobian(&u_sample, t);
    assert_eq!(j_sample.nnz(), 7 * reduced.residual_size());
    for (row, col, &value) in j_sample.triplet_iter() {
        let residual_gid = pairs[reduced.mesh().stencil(row / 3).center()].1;
        let full_row = dof_index(residual_gid, row % 3);
        let full_col = dof_index(pairs[col / 3].1, col % 3);
        let full_value = j_full
            .get_entry(full_row, full_col)
            .expect("Entry must be within bounds")
            .into_value();
        assert_eq!(value, full_value);
    }
}

#[test]
fn from_mesh_file_reports_missing_file() {
    let result = Adr2dFom::from_mesh_file("this/mesh/does/not/exist.dat", AdrPhysics::chemistry_abc(1.0), 0.1);
    let err = result.unwrap_err();
    let mesh_error = err
        .chain()
        .find_map(|e| e.downcast_ref::<MeshLoadError>())
        .expect("Error must originate from mesh loading");
    assert!(matches!(mesh_error, MeshLoadError::FileNotFound(_)));
}

#[test]
fn from_mesh_file_matches_in_memory_model() {
    let mesh = create_periodic_mesh(4, 2, 1.0, 0.5);
    let path = test_output_dir("fom").join("periodic_4x2.dat");
    save_mesh_to_file(&path, &mesh).unwrap();

    let physics = AdrPhysics::chemistry_abc(3.0);
    let loaded = Adr2dFom::from_mesh_file(&path, physics, 0.02).unwrap();
    let in_memory = Adr2dFom::new(mesh, physics, 0.02);
    assert_eq!(loaded.mesh(), in_memory.mesh());

    let u = positive_state(in_memory.state_size(), 2);
    assert_eq!(loaded.velocity(&u, 0.1), in_memory.velocity(&u, 0.1));
}

#[test]
fn apply_jacobian_overwrites_non_finite_output() {
    let fom = Adr2dFom::new(create_unit_square_periodic_mesh(3), AdrPhysics::chemistry_abc(1.0), 0.01);
    let u = positive_state(fom.state_size(), 0);
    let b = pseudo_random_matrix(fom.state_size(), 2, 0);
    let mut result = DMatrix::repeat(fom.residual_size(), 2, f64::NAN);
    let mut workspace = fom.create_workspace();
    fom.apply_jacobian_into(&u, &b, 0.0, &mut result, &mut workspace);
    assert_eq!(result, fom.apply_jacobian(&u, &b, 0.0));
}

proptest! {
    #[test]
    fn apply_jacobian_equals_materialized_product(
        seed in any::<u64>(),
        t in 0.0..2.0f64,
        ncols in 1..5usize,
        parallel in any::<bool>(),
    ) {
        let backend = if parallel { ExecutionBackend::Parallel } else { ExecutionBackend::Sequential };
        let mesh = create_periodic_mesh(3, 4, 1.0, 1.0);
        let fom = Adr2dFom::new(mesh, AdrPhysics::chemistry_abc(6.0), 0.01).with_backend(backend);
        let u = positive_state(fom.state_size(), seed);
        let b = pseudo_random_matrix(fom.state_size(), ncols, seed.wrapping_add(1));

        let applied = fom.apply_jacobian(&u, &b, t);
        let materialized = DMatrix::from(&fom.jacobian(&u, t)) * &b;
        prop_assert_matrix_eq!(applied, materialized, comp = abs, tol = 1e-12);
    }

    #[test]
    fn velocity_depends_only_on_stencil_cells(
        k in 0..25usize,
        perturbed_gid in 0..25usize,
        species in 0..3usize,
        seed in any::<u64>(),
        parallel in any::<bool>(),
    ) {
        let backend = if parallel { ExecutionBackend::Parallel } else { ExecutionBackend::Sequential };
        let mesh = create_unit_square_periodic_mesh(5);
        prop_assume!(!mesh.stencil(k).gids().contains(&perturbed_gid));
        let fom = Adr2dFom::new(mesh, AdrPhysics::chemistry_abc(6.0), 0.01).with_backend(backend);

        let u = positive_state(fom.state_size(), seed);
        let mut u_perturbed = u.clone();
        u_perturbed[dof_index(perturbed_gid, species)] += 0.75;

        let f = fom.velocity(&u, 0.5);
        let f_perturbed = fom.velocity(&u_perturbed, 0.5);
        prop_assert_eq!(f.rows(dof_index(k, 0), 3), f_perturbed.rows(dof_index(k, 0), 3));
    }
}

#[test]
fn apply_jacobian_of_identity_block_recovers_jacobian() {
    let fom = Adr2dFom::new(create_periodic_mesh(2, 3, 1.0, 1.0), AdrPhysics::chemistry_abc(2.0), 0.03);
    let u = positive_state(fom.state_size(), 9);
    let identity = DMatrix::identity(fom.state_size(), fom.state_size());
    let applied = fom.apply_jacobian(&u, &identity, 1.5);
    assert_matrix_eq!(applied, DMatrix::from(&fom.jacobian(&u, 1.5)), comp = abs, tol = 0.0);
}
