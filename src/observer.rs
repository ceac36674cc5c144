//! Collection of state snapshots during time integration.
use crate::io::save_ascii_matrix;
use eyre::eyre;
use nalgebra::{DMatrix, DVector};
use std::path::Path;

/// Stores every `frequency`-th state of a time integration as a column of a snapshot matrix.
///
/// The initial state (step 0) is never stored.
#[derive(Debug, Clone)]
pub struct SnapshotCollector {
    snapshots: DMatrix<f64>,
    reference: DVector<f64>,
    subtract_reference: bool,
    frequency: usize,
    count: usize,
}

impl SnapshotCollector {
    /// Creates a collector for a run with `num_steps` time steps.
    ///
    /// Returns an error if `frequency` is zero or does not divide `num_steps`.
    pub fn new(num_steps: usize, num_dofs: usize, reference: DVector<f64>, frequency: usize) -> eyre::Result<Self> {
        if frequency == 0 {
            return Err(eyre!("snapshot frequency must be positive"));
        }
        if num_steps % frequency != 0 {
            return Err(eyre!(
                "snapshot frequency {frequency} is not a divisor of the number of steps {num_steps}"
            ));
        }
        if reference.len() != num_dofs {
            return Err(eyre!(
                "reference state has length {}, expected {num_dofs}",
                reference.len()
            ));
        }
        Ok(Self {
            snapshots: DMatrix::zeros(num_dofs, num_steps / frequency),
            reference,
            subtract_reference: false,
            frequency,
            count: 0,
        })
    }

    /// Store the difference between each state and the reference state instead of the state.
    pub fn subtract_reference(mut self) -> Self {
        self.subtract_reference = true;
        self
    }

    /// Observes the state `x` at time step `step`.
    ///
    /// # Panics
    ///
    /// Panics if more snapshots are observed than the collector has room for, or if `x` has
    /// the wrong length.
    pub fn observe(&mut self, step: usize, _t: f64, x: &DVector<f64>) {
        if step > 0 && step % self.frequency == 0 {
            assert!(
                self.count < self.snapshots.ncols(),
                "Observed more snapshots than the number of steps allows"
            );
            let mut column = self.snapshots.column_mut(self.count);
            column.copy_from(x);
            if self.subtract_reference {
                column -= &self.reference;
            }
            self.count += 1;
        }
    }

    /// The snapshot matrix, with one column per stored snapshot.
    pub fn snapshots(&self) -> &DMatrix<f64> {
        &self.snapshots
    }

    /// Number of snapshots stored so far.
    pub fn num_collected(&self) -> usize {
        self.count
    }

    pub fn save_snapshots(&self, path: impl AsRef<Path>) -> eyre::Result<()> {
        save_ascii_matrix(path, &self.snapshots)
    }
}
