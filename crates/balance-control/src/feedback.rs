//! Static state feedback `u = −K x + x_d K_r` from pole placement or LQR.

use balance_core::error::{ControlError, DimensionError};
use balance_core::model::LinearModel;
use balance_core::traits::{Controller, PolePlacer, RiccatiSolver};
use balance_core::types::Command;
use nalgebra::{Complex, DMatrix, DVector};
use tracing::debug;

use crate::config::LqrConfig;
use crate::riccati::lqr;

/// How the gain was designed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackDesign {
    PolePlacement,
    Lqr,
}

impl FeedbackDesign {
    pub const fn name(self) -> &'static str {
        match self {
            Self::PolePlacement => "Pole placement",
            Self::Lqr => "LQR",
        }
    }
}

/// Infinite-horizon state feedback on the continuous model.
///
/// For plants with a position channel a reference gain scales the setpoint
/// so that the measured position settles at it.
#[derive(Clone, Debug)]
pub struct StateFeedback {
    design: FeedbackDesign,
    gain: DVector<f64>,
    reference_gain: Option<f64>,
    desired_position: f64,
}

impl StateFeedback {
    /// Place the closed-loop poles of `(A_c, B_c)`.
    pub fn pole_placement(
        model: &LinearModel,
        poles: &[Complex<f64>],
        placer: &dyn PolePlacer,
    ) -> Result<Self, ControlError> {
        let k = placer.place(model.a_cont(), model.b_cont(), poles)?;
        Self::from_gain(model, &k, FeedbackDesign::PolePlacement)
    }

    /// Continuous LQR gain `K = R⁻¹BᵀX`.
    pub fn lqr(
        model: &LinearModel,
        config: &LqrConfig,
        solver: &dyn RiccatiSolver,
    ) -> Result<Self, ControlError> {
        let q = config.q_matrix(model.state_dim())?;
        let r = config.r_matrix()?;
        let k = lqr(solver, model.a_cont(), model.b_cont(), &q, &r)?;
        Self::from_gain(model, &k, FeedbackDesign::Lqr)
    }

    /// Wrap a precomputed 1×n gain.
    pub fn from_gain(
        model: &LinearModel,
        k: &DMatrix<f64>,
        design: FeedbackDesign,
    ) -> Result<Self, ControlError> {
        let n = model.state_dim();
        if k.shape() != (1, n) {
            return Err(DimensionError {
                expected: n,
                got: k.ncols(),
            }
            .into());
        }
        if k.iter().any(|v| !v.is_finite()) {
            return Err(ControlError::Singular("feedback gain"));
        }

        let reference_gain = if model.layout().has_position() {
            Some(reference_gain(model, k)?)
        } else {
            None
        };
        debug!(design = design.name(), gain = ?k.as_slice(), ?reference_gain, "state feedback designed");

        Ok(Self {
            design,
            gain: k.row(0).transpose(),
            reference_gain,
            desired_position: 0.0,
        })
    }

    pub const fn design(&self) -> FeedbackDesign {
        self.design
    }

    /// `K` as a column vector.
    pub const fn gain(&self) -> &DVector<f64> {
        &self.gain
    }

    pub const fn reference_gain(&self) -> Option<f64> {
        self.reference_gain
    }
}

/// `K_r = −1 / (C₀ (A − BK)⁻¹ B)` with `C₀` the first measurement row.
pub fn reference_gain(model: &LinearModel, k: &DMatrix<f64>) -> Result<f64, ControlError> {
    let (a, b) = (model.a_cont(), model.b_cont());
    let a_cl = a - b * k;
    let a_cl_inv = a_cl
        .try_inverse()
        .ok_or(ControlError::Singular("closed-loop system matrix"))?;
    let c0 = model.measurement().row(0);
    let dc_gain = (c0 * a_cl_inv * b)[(0, 0)];
    if !dc_gain.is_finite() || dc_gain.abs() < f64::EPSILON {
        return Err(ControlError::Singular("DC gain"));
    }
    Ok(-1.0 / dc_gain)
}

impl Controller for StateFeedback {
    fn name(&self) -> &str {
        self.design.name()
    }

    fn set_desired_position(&mut self, position: f64) {
        self.desired_position = position;
    }

    fn desired_position(&self) -> f64 {
        self.desired_position
    }

    fn control(&self, state: &DVector<f64>) -> Command {
        let mut u = -self.gain.dot(state);
        if let Some(kr) = self.reference_gain {
            u += self.desired_position * kr;
        }
        Command::new(u)
    }
}
