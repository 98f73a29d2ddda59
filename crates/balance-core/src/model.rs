//! Linear(ized) state-space description shared by plants and controllers.

use nalgebra::{DMatrix, DVector};

use crate::error::DimensionError;

// ---------------------------------------------------------------------------
// StateLayout
// ---------------------------------------------------------------------------

/// Which entries of a plant's state vector carry which physical quantity.
///
/// Controllers use this instead of asking the plant for its name: the PID
/// and reference-gain terms only exist when a position channel exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateLayout {
    /// Index of the pendulum angle (rad).
    pub angle: usize,
    /// Index of the pendulum angular rate (rad/s).
    pub angular_rate: usize,
    /// Index of the cart position (m), if the plant has one.
    pub position: Option<usize>,
    /// Index of the cart velocity (m/s), if the plant has one.
    pub velocity: Option<usize>,
}

impl StateLayout {
    /// Layout `[angle, angular_rate]`.
    pub const fn angle_only() -> Self {
        Self {
            angle: 0,
            angular_rate: 1,
            position: None,
            velocity: None,
        }
    }

    /// Layout `[position, velocity, angle, angular_rate]`.
    pub const fn cart_and_angle() -> Self {
        Self {
            angle: 2,
            angular_rate: 3,
            position: Some(0),
            velocity: Some(1),
        }
    }

    /// Whether a position reference can be tracked.
    pub const fn has_position(&self) -> bool {
        self.position.is_some()
    }
}

// ---------------------------------------------------------------------------
// LinearModel
// ---------------------------------------------------------------------------

/// Continuous and Euler-discretized single-input linear model of a plant.
///
/// ```text
/// ẋ = A_c x + B_c u            (continuous)
/// x⁺ = A_d x + B_d u           (A_d = I + A_c dt, B_d = B_c dt)
/// y = C x
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct LinearModel {
    a_cont: DMatrix<f64>,
    b_cont: DMatrix<f64>,
    a_disc: DMatrix<f64>,
    b_disc: DMatrix<f64>,
    measurement: DMatrix<f64>,
    dt: f64,
    layout: StateLayout,
}

impl LinearModel {
    /// Build a model from its continuous matrices; the discrete pair is
    /// derived with [`discretize_euler`].
    pub fn new(
        a_cont: DMatrix<f64>,
        b_cont: DMatrix<f64>,
        measurement: DMatrix<f64>,
        dt: f64,
        layout: StateLayout,
    ) -> Result<Self, DimensionError> {
        let n = a_cont.nrows();
        if a_cont.ncols() != n {
            return Err(DimensionError {
                expected: n,
                got: a_cont.ncols(),
            });
        }
        if b_cont.nrows() != n {
            return Err(DimensionError {
                expected: n,
                got: b_cont.nrows(),
            });
        }
        if measurement.ncols() != n {
            return Err(DimensionError {
                expected: n,
                got: measurement.ncols(),
            });
        }

        let (a_disc, b_disc) = discretize_euler(&a_cont, &b_cont, dt);
        Ok(Self {
            a_cont,
            b_cont,
            a_disc,
            b_disc,
            measurement,
            dt,
            layout,
        })
    }

    /// State dimension `n`.
    pub fn state_dim(&self) -> usize {
        self.a_cont.nrows()
    }

    /// Input dimension (1 for every plant in this workspace).
    pub fn input_dim(&self) -> usize {
        self.b_cont.ncols()
    }

    pub const fn a_cont(&self) -> &DMatrix<f64> {
        &self.a_cont
    }

    pub const fn b_cont(&self) -> &DMatrix<f64> {
        &self.b_cont
    }

    pub const fn a_disc(&self) -> &DMatrix<f64> {
        &self.a_disc
    }

    pub const fn b_disc(&self) -> &DMatrix<f64> {
        &self.b_disc
    }

    /// Measurement matrix `C`.
    pub const fn measurement(&self) -> &DMatrix<f64> {
        &self.measurement
    }

    pub const fn dt(&self) -> f64 {
        self.dt
    }

    pub const fn layout(&self) -> StateLayout {
        self.layout
    }

    /// One linear discrete step: `A_d x + B_d u`.
    pub fn propagate(&self, x: &DVector<f64>, u: f64) -> DVector<f64> {
        &self.a_disc * x + self.b_disc.column(0) * u
    }

    /// Check that `x` has the model's state dimension.
    pub fn check_state(&self, x: &DVector<f64>) -> Result<(), DimensionError> {
        if x.len() == self.state_dim() {
            Ok(())
        } else {
            Err(DimensionError {
                expected: self.state_dim(),
                got: x.len(),
            })
        }
    }
}

/// Discretize using first-order Euler.
///
/// A_d = I + A_c dt,  B_d = B_c dt
pub fn discretize_euler(
    a_c: &DMatrix<f64>,
    b_c: &DMatrix<f64>,
    dt: f64,
) -> (DMatrix<f64>, DMatrix<f64>) {
    let n = a_c.nrows();
    let a_d = DMatrix::identity(n, n) + a_c * dt;
    let b_d = b_c * dt;
    (a_d, b_d)
}

/// Square diagonal matrix from a weight vector.
pub fn diagonal(weights: &[f64]) -> DMatrix<f64> {
    DMatrix::from_diagonal(&DVector::from_column_slice(weights))
}
