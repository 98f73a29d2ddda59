//! Unconstrained finite-horizon LQ control on the discrete model.
//!
//! Minimizing `Σ xₖᵀQxₖ + uₖᵀRuₖ` (with `P` on the last state) over the
//! batch prediction `X = Â x₀ + C̄ U` gives
//!
//! ```text
//! H = C̄ᵀ Q̄ C̄ + R̄,   Fᵀ = Âᵀ Q̄ C̄,   U* = −H⁻¹ F x₀
//! ```
//!
//! Only `U*[0]` is applied. `H` is factorized once at construction and the
//! first row of `−H⁻¹F` is cached, so a control call is one dot product.

use balance_core::error::ControlError;
use balance_core::model::LinearModel;
use balance_core::traits::Controller;
use balance_core::types::Command;
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use tracing::debug;

use crate::config::{HorizonConfig, TerminalWeight, weight_matrix};
use crate::prediction::{Prediction, input_weights, stage_weights};
use crate::riccati::solve_dare;

/// Stacked cost matrices `Q̄` and `R̄` for a horizon configuration.
#[derive(Clone, Debug)]
pub struct HorizonWeights {
    pub q_bar: DMatrix<f64>,
    pub r_bar: DMatrix<f64>,
    /// Resolved terminal weight `P`.
    pub terminal: DMatrix<f64>,
}

impl HorizonWeights {
    /// Resolve the weights of `config` against the discrete model.
    pub fn build(model: &LinearModel, config: &HorizonConfig) -> Result<Self, ControlError> {
        config.validate()?;
        let n = model.state_dim();
        let q = config.q_matrix(n)?;
        let r = config.r_matrix()?;
        let terminal = match &config.terminal {
            TerminalWeight::Diagonal(p) => weight_matrix(p, n)?,
            TerminalWeight::Riccati => solve_dare(model.a_disc(), model.b_disc(), &q, &r)?,
        };
        Ok(Self {
            q_bar: stage_weights(&q, &terminal, config.horizon),
            r_bar: input_weights(&r, config.horizon),
            terminal,
        })
    }
}

/// Finite-horizon LQ controller.
#[derive(Clone, Debug)]
pub struct FiniteHorizon {
    horizon: usize,
    prediction: Prediction,
    hessian: Cholesky<f64, Dyn>,
    f_trans: DMatrix<f64>,
    /// First row of `−H⁻¹F`.
    first_gain: DVector<f64>,
    desired_position: f64,
}

impl FiniteHorizon {
    pub fn new(model: &LinearModel, config: &HorizonConfig) -> Result<Self, ControlError> {
        let weights = HorizonWeights::build(model, config)?;
        let prediction = Prediction::direct(model.a_disc(), model.b_disc(), config.horizon);

        let qc = &weights.q_bar * &prediction.c_bar;
        let h = prediction.c_bar.transpose() * &qc + &weights.r_bar;
        let f_trans = prediction.a_hat.transpose() * &qc;

        let hessian = h.cholesky().ok_or(ControlError::Singular("H"))?;
        let gains = -hessian.solve(&f_trans.transpose());
        let first_gain = gains.row(0).transpose();
        if first_gain.iter().any(|v| !v.is_finite()) {
            return Err(ControlError::Singular("H"));
        }
        debug!(horizon = config.horizon, gain = ?first_gain.as_slice(), "finite-horizon gain cached");

        Ok(Self {
            horizon: config.horizon,
            prediction,
            hessian,
            f_trans,
            first_gain,
            desired_position: 0.0,
        })
    }

    pub const fn horizon(&self) -> usize {
        self.horizon
    }

    pub const fn prediction(&self) -> &Prediction {
        &self.prediction
    }

    /// Equivalent static gain: the applied command is `first_gain · x`.
    pub const fn first_gain(&self) -> &DVector<f64> {
        &self.first_gain
    }

    /// Full optimal input sequence `U* = −H⁻¹ F x₀`.
    pub fn plan(&self, x0: &DVector<f64>) -> DVector<f64> {
        let f_x0 = self.f_trans.transpose() * x0;
        -self.hessian.solve(&f_x0)
    }
}

impl Controller for FiniteHorizon {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "Finite horizon"
    }

    /// Stored only; the cost regulates to the origin.
    fn set_desired_position(&mut self, position: f64) {
        self.desired_position = position;
    }

    fn desired_position(&self) -> f64 {
        self.desired_position
    }

    fn control(&self, state: &DVector<f64>) -> Command {
        Command::new(self.first_gain.dot(state))
    }
}
