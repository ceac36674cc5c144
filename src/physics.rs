//! Pointwise physics: advection fields and reaction/source terms.
//!
//! All evaluators are pure functions of the position `(x, y)`, the time `t` and the local
//! state `u = (u0, u1, u2)` of a single cell.
use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Advection velocity field.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum AdvectionField {
    /// A spatially constant field.
    Uniform { vx: f64, vy: f64 },
    /// Superposition of four Gaussian vortices, scaled by an amplitude of 15.
    FourEddy,
    /// Cellular flow `(-π sin(πx) cos(πy), π cos(πx) sin(πy))`.
    CellularFlow,
    /// The constant field `(1, 1)` matching [`SourceTerm::ManufacturedSolution`].
    ManufacturedSolution,
}

const FOUR_EDDY_AMPLITUDE: f64 = 15.0;
const FOUR_EDDY_CENTERS: [[f64; 2]; 4] = [[0.75, 0.25], [0.25, 0.25], [0.35, 0.7], [0.85, 0.8]];
const FOUR_EDDY_RADII: [f64; 4] = [0.1, 0.05, 0.07, 0.085];
const FOUR_EDDY_SIGNS: [f64; 4] = [1.0, -1.0, -1.0, -1.0];

impl AdvectionField {
    /// The field with unit velocity in both directions.
    pub fn unit() -> Self {
        Self::Uniform { vx: 1.0, vy: 1.0 }
    }

    pub fn evaluate(&self, x: f64, y: f64, _t: f64, _u: &Vector3<f64>) -> Vector2<f64> {
        match *self {
            Self::Uniform { vx, vy } => Vector2::new(vx, vy),
            Self::FourEddy => {
                let mut v = Vector2::zeros();
                for ((center, radius), sign) in FOUR_EDDY_CENTERS
                    .iter()
                    .zip(&FOUR_EDDY_RADII)
                    .zip(&FOUR_EDDY_SIGNS)
                {
                    let dx = x - center[0];
                    let dy = y - center[1];
                    let two_r_sq_inv = 1.0 / (2.0 * radius * radius);
                    let decay = (-(dx * dx + dy * dy) * two_r_sq_inv).exp();
                    v.x += sign * decay * dy;
                    v.y += -sign * decay * dx;
                }
                v * FOUR_EDDY_AMPLITUDE
            }
            Self::CellularFlow => Vector2::new(
                -PI * (PI * x).sin() * (PI * y).cos(),
                PI * (PI * x).cos() * (PI * y).sin(),
            ),
            Self::ManufacturedSolution => Vector2::new(1.0, 1.0),
        }
    }
}

/// Source (reaction) term.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceTerm {
    Zero,
    /// Forcing manufactured from [`manufactured_solution`] for the given diffusion coefficient
    /// and the advection field [`AdvectionField::ManufacturedSolution`].
    ManufacturedSolution { diffusion: f64 },
    /// Reaction `A + B -> C` with rate constant `rate`, plus external injection of species
    /// 0 and 1 during `t < 1`.
    ChemistryAbc { rate: f64 },
}

/// Radius of the disk in which species 1 is injected.
pub const CHEMISTRY_INJECTION_RADIUS: f64 = 0.15;
/// Centre of the disk in which species 1 is injected.
pub const CHEMISTRY_INJECTION_ORIGIN: [f64; 2] = [0.55, 0.35];
/// Injection rate of species 1 inside the injection disk.
pub const CHEMISTRY_INJECTION_RATE: f64 = 0.05;
/// Injection stops at this time.
pub const CHEMISTRY_INJECTION_END_TIME: f64 = 1.0;

impl SourceTerm {
    pub fn evaluate(&self, x: f64, y: f64, t: f64, u: &Vector3<f64>) -> Vector3<f64> {
        match *self {
            Self::Zero => Vector3::zeros(),
            Self::ManufacturedSolution { diffusion } => manufactured_source(x, y, t, diffusion),
            Self::ChemistryAbc { rate } => {
                let reaction = rate * u[0] * u[1];
                let mut src = Vector3::new(-reaction, -reaction, reaction - rate * u[2]);
                if t < CHEMISTRY_INJECTION_END_TIME {
                    src[0] += (4.0 * PI * x).sin() * (4.0 * PI * y).cos();
                    let dx = x - CHEMISTRY_INJECTION_ORIGIN[0];
                    let dy = y - CHEMISTRY_INJECTION_ORIGIN[1];
                    if (dx * dx + dy * dy).sqrt() <= CHEMISTRY_INJECTION_RADIUS {
                        src[1] += CHEMISTRY_INJECTION_RATE;
                    }
                }
                src
            }
        }
    }

    /// The Jacobian `∂src_i / ∂u_j`.
    pub fn jacobian(&self, _x: f64, _y: f64, _t: f64, u: &Vector3<f64>) -> Matrix3<f64> {
        match *self {
            Self::Zero | Self::ManufacturedSolution { .. } => Matrix3::zeros(),
            Self::ChemistryAbc { rate } => {
                #[rustfmt::skip]
                let jacobian = Matrix3::new(
                    -rate * u[1], -rate * u[0],  0.0,
                    -rate * u[1], -rate * u[0],  0.0,
                     rate * u[1],  rate * u[0], -rate,
                );
                jacobian
            }
        }
    }
}

/// The advection field and source term of an ADR problem.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdrPhysics {
    pub advection: AdvectionField,
    pub source: SourceTerm,
}

impl AdrPhysics {
    pub fn new(advection: AdvectionField, source: SourceTerm) -> Self {
        Self { advection, source }
    }

    /// Physics of the manufactured-solution verification problem.
    pub fn manufactured_solution(diffusion: f64) -> Self {
        Self::new(
            AdvectionField::ManufacturedSolution,
            SourceTerm::ManufacturedSolution { diffusion },
        )
    }

    /// Physics of the `A + B -> C` chemistry problem, advected by the four-eddy field.
    pub fn chemistry_abc(rate: f64) -> Self {
        Self::new(AdvectionField::FourEddy, SourceTerm::ChemistryAbc { rate })
    }
}

/// The exact solution the manufactured source term is built from:
///
/// ```text
/// c0 = t sin(2πx) cos(4πy)
/// c1 = t sin(4πx) sin(4πy)
/// c2 = t sin(8πx) cos(2πy)
/// ```
pub fn manufactured_solution(x: f64, y: f64, t: f64) -> Vector3<f64> {
    Vector3::new(
        t * (2.0 * PI * x).sin() * (4.0 * PI * y).cos(),
        t * (4.0 * PI * x).sin() * (4.0 * PI * y).sin(),
        t * (8.0 * PI * x).sin() * (2.0 * PI * y).cos(),
    )
}

/// Time derivative of [`manufactured_solution`].
pub fn manufactured_solution_time_derivative(x: f64, y: f64, _t: f64) -> Vector3<f64> {
    manufactured_solution(x, y, 1.0)
}

fn manufactured_source(x: f64, y: f64, t: f64, d: f64) -> Vector3<f64> {
    let pi2 = 2.0 * PI;
    let pi4 = 4.0 * PI;
    let pi8 = 8.0 * PI;
    let four_pi_sq = 4.0 * PI * PI;
    let sixteen_pi_sq = 16.0 * PI * PI;
    let sixty_four_pi_sq = 64.0 * PI * PI;

    let (sin2pix, cos2pix) = (pi2 * x).sin_cos();
    let (sin2piy, cos2piy) = (pi2 * y).sin_cos();
    let (sin4pix, cos4pix) = (pi4 * x).sin_cos();
    let (sin4piy, cos4piy) = (pi4 * y).sin_cos();
    let (sin8pix, cos8pix) = (pi8 * x).sin_cos();

    // Each component is dc/dt + dc/dx + dc/dy - D (d2c/dx2 + d2c/dy2)
    let dc0dt = sin2pix * cos4piy;
    let dc0dx = pi2 * cos2pix * t * cos4piy;
    let dc0dy = -pi4 * sin2pix * t * sin4piy;
    let dc0dxx = -four_pi_sq * sin2pix * t * cos4piy;
    let dc0dyy = -sixteen_pi_sq * sin2pix * t * cos4piy;

    let dc1dt = sin4pix * sin4piy;
    let dc1dx = pi4 * cos4pix * t * sin4piy;
    let dc1dy = pi4 * sin4pix * t * cos4piy;
    let dc1dxx = -sixteen_pi_sq * sin4pix * t * sin4piy;
    let dc1dyy = -sixteen_pi_sq * sin4pix * t * sin4piy;

    let dc2dt = sin8pix * cos2piy;
    let dc2dx = pi8 * cos8pix * t * cos2piy;
    let dc2dy = -pi2 * sin8pix * t * sin2piy;
    let dc2dxx = -sixty_four_pi_sq * sin8pix * t * cos2piy;
    let dc2dyy = -four_pi_sq * sin8pix * t * cos2piy;

    Vector3::new(
        dc0dt + dc0dx + dc0dy - d * dc0dxx - d * dc0dyy,
        dc1dt + dc1dx + dc1dy - d * dc1dxx - d * dc1dyy,
        dc2dt + dc2dx + dc2dy - d * dc2dxx - d * dc2dyy,
    )
}
