use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Poor man's approx assertion for matrices and vectors
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

/// Deterministic pseudo-random vector with entries in `[-1, 1)`.
pub fn pseudo_random_vector(len: usize, seed: u64) -> DVector<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    DVector::from_fn(len, |_, _| rng.gen_range(-1.0..1.0))
}

/// Deterministic pseudo-random matrix with entries in `[-1, 1)`.
pub fn pseudo_random_matrix(nrows: usize, ncols: usize, seed: u64) -> DMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    DMatrix::from_fn(nrows, ncols, |_, _| rng.gen_range(-1.0..1.0))
}
