//! Inverted pendulum on a force-driven cart.
//!
//! State: `[x, ẋ, θ, θ̇]` with θ measured from upright. Input: horizontal
//! force on the cart (N).

use balance_core::config::SimConfig;
use balance_core::error::{BalanceError, ConfigError, DimensionError};
use balance_core::model::{LinearModel, StateLayout};
use balance_core::traits::Plant;
use balance_core::types::StepOutcome;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::episode::{
    Bounds, DEFAULT_ANGLE_THRESHOLD, DEFAULT_POSITION_THRESHOLD, EpisodeTracker,
};
use crate::validate_positive;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_bob_mass() -> f64 {
    0.5
}
const fn default_cart_mass() -> f64 {
    1.0
}
const fn default_length() -> f64 {
    0.5
}
const fn default_gravity() -> f64 {
    9.81
}
const fn default_pendulum_damping() -> f64 {
    0.5
}
const fn default_cart_damping() -> f64 {
    1.0
}
const fn default_cart_width() -> f64 {
    0.1
}
const fn default_cart_height() -> f64 {
    0.2
}
const fn default_position_threshold() -> f64 {
    DEFAULT_POSITION_THRESHOLD
}
const fn default_angle_threshold() -> f64 {
    DEFAULT_ANGLE_THRESHOLD
}

// ---------------------------------------------------------------------------
// CartPendulumParams
// ---------------------------------------------------------------------------

/// Physical parameters of the cart-pendulum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartPendulumParams {
    /// Mass of the bob (kg).
    #[serde(default = "default_bob_mass")]
    pub bob_mass: f64,
    /// Mass of the cart (kg).
    #[serde(default = "default_cart_mass")]
    pub cart_mass: f64,
    /// Pendulum length (m).
    #[serde(default = "default_length")]
    pub length: f64,
    /// Gravitational acceleration (m/s^2).
    #[serde(default = "default_gravity")]
    pub gravity: f64,
    /// Pendulum damping (Ns/m).
    #[serde(default = "default_pendulum_damping")]
    pub pendulum_damping: f64,
    /// Cart damping (Ns/m).
    #[serde(default = "default_cart_damping")]
    pub cart_damping: f64,
    /// Cart width (m), for renderers.
    #[serde(default = "default_cart_width")]
    pub cart_width: f64,
    /// Cart height (m), for renderers.
    #[serde(default = "default_cart_height")]
    pub cart_height: f64,
    /// Episode fails when |x| exceeds this (m).
    #[serde(default = "default_position_threshold")]
    pub position_threshold: f64,
    /// Episode fails when |θ| exceeds this (rad).
    #[serde(default = "default_angle_threshold")]
    pub angle_threshold: f64,
}

impl Default for CartPendulumParams {
    fn default() -> Self {
        Self {
            bob_mass: default_bob_mass(),
            cart_mass: default_cart_mass(),
            length: default_length(),
            gravity: default_gravity(),
            pendulum_damping: default_pendulum_damping(),
            cart_damping: default_cart_damping(),
            cart_width: default_cart_width(),
            cart_height: default_cart_height(),
            position_threshold: default_position_threshold(),
            angle_threshold: default_angle_threshold(),
        }
    }
}

impl CartPendulumParams {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_positive("bob_mass", self.bob_mass)?;
        validate_positive("cart_mass", self.cart_mass)?;
        validate_positive("length", self.length)?;
        validate_positive("position_threshold", self.position_threshold)?;
        validate_positive("angle_threshold", self.angle_threshold)?;
        Ok(())
    }

    /// Linearization about upright with force input.
    pub fn linearize(&self) -> (DMatrix<f64>, DMatrix<f64>) {
        let (m, cm, l, g) = (self.bob_mass, self.cart_mass, self.length, self.gravity);
        let (b_theta, b_x) = (self.pendulum_damping, self.cart_damping);
        #[rustfmt::skip]
        let a = DMatrix::from_row_slice(4, 4, &[
            0.0, 1.0, 0.0, 0.0,
            0.0, -b_theta, -g * m / cm, 0.0,
            0.0, 0.0, 0.0, 1.0,
            0.0, b_theta / l, (m + cm) * g / (cm * l), -b_x,
        ]);
        let b = DMatrix::from_column_slice(4, 1, &[0.0, 1.0 / cm, 0.0, -1.0 / (cm * l)]);
        (a, b)
    }

    /// Linearization about upright when a stepper motor sets the cart
    /// acceleration directly.
    pub fn linearize_stepper(&self) -> (DMatrix<f64>, DMatrix<f64>) {
        let (l, g) = (self.length, self.gravity);
        #[rustfmt::skip]
        let a = DMatrix::from_row_slice(4, 4, &[
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
            0.0, 0.0, g / l, 0.0,
        ]);
        let b = DMatrix::from_column_slice(4, 1, &[0.0, 1.0, 0.0, -1.0 / l]);
        (a, b)
    }

    /// Measurement matrix: cart position and pendulum angle.
    pub fn measurement() -> DMatrix<f64> {
        #[rustfmt::skip]
        let c = DMatrix::from_row_slice(2, 4, &[
            1.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
        ]);
        c
    }

    pub const fn bounds(&self) -> Bounds {
        Bounds {
            angle: self.angle_threshold,
            position: Some(self.position_threshold),
        }
    }
}

// ---------------------------------------------------------------------------
// CartPendulum
// ---------------------------------------------------------------------------

/// Cart-pendulum plant.
#[derive(Clone, Debug)]
pub struct CartPendulum {
    params: CartPendulumParams,
    model: LinearModel,
    stepper_model: LinearModel,
    state: DVector<f64>,
    time_elapsed: f64,
    episode: EpisodeTracker,
}

impl CartPendulum {
    pub const STATE_DIM: usize = 4;

    pub fn new(params: CartPendulumParams, sim: &SimConfig) -> Result<Self, BalanceError> {
        params.validate()?;
        sim.validate()?;
        let dt = sim.dt();

        let (a, b) = params.linearize();
        let model = LinearModel::new(
            a,
            b,
            CartPendulumParams::measurement(),
            dt,
            StateLayout::cart_and_angle(),
        )?;

        let (a_step, b_step) = params.linearize_stepper();
        let stepper_model = LinearModel::new(
            a_step,
            b_step,
            CartPendulumParams::measurement(),
            dt,
            StateLayout::cart_and_angle(),
        )?;

        Ok(Self {
            params,
            model,
            stepper_model,
            state: DVector::zeros(Self::STATE_DIM),
            time_elapsed: 0.0,
            episode: EpisodeTracker::new(),
        })
    }

    pub const fn params(&self) -> &CartPendulumParams {
        &self.params
    }

    /// Linear model for a stepper-driven cart (input = cart acceleration).
    pub const fn stepper_model(&self) -> &LinearModel {
        &self.stepper_model
    }

    pub const fn episode(&self) -> &EpisodeTracker {
        &self.episode
    }
}

impl Plant for CartPendulum {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "Pendulum"
    }

    fn state(&self) -> &DVector<f64> {
        &self.state
    }

    fn set_state(&mut self, state: DVector<f64>) -> Result<(), DimensionError> {
        self.model.check_state(&state)?;
        self.state = state;
        Ok(())
    }

    fn model(&self) -> &LinearModel {
        &self.model
    }

    /// Nonlinear cart-pendulum dynamics.
    ///
    /// The damping terms read the plant's stored state rather than `state`.
    fn dynamics(&self, state: &DVector<f64>, u: f64) -> DVector<f64> {
        let p = &self.params;
        let (m, cm, l, g) = (p.bob_mass, p.cart_mass, p.length, p.gravity);
        let theta = state[2];
        let (sin_t, cos_t) = (theta.sin(), theta.cos());

        let mut ds = DVector::zeros(Self::STATE_DIM);
        ds[0] = state[1];
        ds[1] = (u + m * l * state[3].powi(2) * sin_t + m * g * cos_t * sin_t)
            / (cm + m - m * cos_t.powi(2))
            - p.cart_damping * self.state[1];
        ds[2] = state[3];
        ds[3] = (-cos_t / l) * ds[1] + (g / l) * sin_t - p.pendulum_damping * self.state[3];
        ds
    }

    fn step_continuous(&mut self, u: f64) {
        let dt = self.model.dt();
        let ds = self.dynamics(&self.state, u);

        // Rates first, then positions from the new rates.
        let mut next = DVector::zeros(Self::STATE_DIM);
        next[1] = self.state[1] + ds[1] * dt;
        next[0] = self.state[0] + next[1] * dt;
        next[3] = self.state[3] + ds[3] * dt;
        next[2] = self.state[2] + next[3] * dt;

        self.state = next;
        self.time_elapsed += dt;
    }

    fn step_discrete(&mut self, u: f64) {
        self.state = self.model.propagate(&self.state, u);
        self.time_elapsed += self.model.dt();
    }

    fn step_with_termination(&mut self, u: f64) -> StepOutcome {
        self.step_continuous(u);
        let violated = self.params.bounds().violated(&self.state, self.model.layout());
        self.episode.record(violated)
    }

    fn reset_episode(&mut self) {
        self.episode.reset();
    }

    fn time_elapsed(&self) -> f64 {
        self.time_elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use balance_core::types::EpisodeSignal;

    fn pendulum() -> CartPendulum {
        CartPendulum::new(CartPendulumParams::default(), &SimConfig::default()).unwrap()
    }

    #[test]
    fn discrete_matrices_are_euler() {
        let plant = pendulum();
        let model = plant.model();
        let dt = 0.01;
        let expected_a = DMatrix::identity(4, 4) + model.a_cont() * dt;
        assert_eq!(model.a_disc(), &expected_a);
        assert_eq!(model.b_disc(), &(model.b_cont() * dt));
    }

    #[test]
    fn linearization_entries() {
        let plant = pendulum();
        let a = plant.model().a_cont();
        let b = plant.model().b_cont();
        assert_relative_eq!(a[(1, 1)], -0.5);
        assert_relative_eq!(a[(1, 2)], -9.81 * 0.5);
        assert_relative_eq!(a[(3, 1)], 1.0);
        assert_relative_eq!(a[(3, 2)], 1.5 * 9.81 / 0.5);
        assert_relative_eq!(a[(3, 3)], -1.0);
        assert_relative_eq!(b[(1, 0)], 1.0);
        assert_relative_eq!(b[(3, 0)], -2.0);
    }

    #[test]
    fn set_state_roundtrip() {
        let mut plant = pendulum();
        let x = DVector::from_vec(vec![-0.3, 0.0, 0.1, 0.0]);
        plant.set_state(x.clone()).unwrap();
        assert_eq!(plant.state(), &x);
        assert!(plant.time_elapsed().abs() < f64::EPSILON);
    }

    #[test]
    fn set_state_rejects_wrong_dimension() {
        let mut plant = pendulum();
        let err = plant.set_state(DVector::zeros(2)).unwrap_err();
        assert_eq!(
            err,
            DimensionError {
                expected: 4,
                got: 2
            }
        );
        assert_eq!(plant.state().len(), 4);
    }

    #[test]
    fn upright_equilibrium_is_stationary() {
        let mut plant = pendulum();
        for _ in 0..100 {
            plant.step_continuous(0.0);
        }
        assert_eq!(plant.state(), &DVector::zeros(4));
        assert_relative_eq!(plant.time_elapsed(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn dynamics_hand_computed() {
        let mut plant = pendulum();
        plant
            .set_state(DVector::from_vec(vec![0.0, 0.2, 0.1, -0.3]))
            .unwrap();
        let state = plant.state().clone();
        let ds = plant.dynamics(&state, 1.0);

        let (s, c) = (0.1_f64.sin(), 0.1_f64.cos());
        let v_dot = (1.0 + 0.5 * 0.5 * 0.09 * s + 0.5 * 9.81 * c * s) / (1.5 - 0.5 * c * c)
            - 1.0 * 0.2;
        let w_dot = (-c / 0.5) * v_dot + (9.81 / 0.5) * s - 0.5 * (-0.3);
        assert_relative_eq!(ds[0], 0.2);
        assert_relative_eq!(ds[1], v_dot, epsilon = 1e-12);
        assert_relative_eq!(ds[2], -0.3);
        assert_relative_eq!(ds[3], w_dot, epsilon = 1e-12);
    }

    #[test]
    fn damping_reads_stored_state_not_argument() {
        // Same argument, different stored state: only the damping terms move.
        let arg = DVector::from_vec(vec![0.0, 1.0, 0.0, 1.0]);
        let mut plant = pendulum();
        let resting = plant.dynamics(&arg, 0.0);

        plant
            .set_state(DVector::from_vec(vec![0.0, 2.0, 0.0, 3.0]))
            .unwrap();
        let moving = plant.dynamics(&arg, 0.0);

        assert_relative_eq!(moving[1] - resting[1], -1.0 * 2.0, epsilon = 1e-12);
        // ω̇ picks up the v̇ change through the coupling term as well.
        assert_relative_eq!(
            moving[3] - resting[3],
            (-1.0 / 0.5) * (-2.0) - 0.5 * 3.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn semi_implicit_euler_uses_new_rates() {
        let mut plant = pendulum();
        plant
            .set_state(DVector::from_vec(vec![0.0, 0.0, 0.05, 0.0]))
            .unwrap();
        let before = plant.state().clone();
        let ds = plant.dynamics(&before, 0.5);
        plant.step_continuous(0.5);

        let v = before[1] + ds[1] * 0.01;
        let w = before[3] + ds[3] * 0.01;
        assert_relative_eq!(plant.state()[1], v, epsilon = 1e-15);
        assert_relative_eq!(plant.state()[0], before[0] + v * 0.01, epsilon = 1e-15);
        assert_relative_eq!(plant.state()[3], w, epsilon = 1e-15);
        assert_relative_eq!(plant.state()[2], before[2] + w * 0.01, epsilon = 1e-15);
    }

    #[test]
    fn step_discrete_applies_linear_model() {
        let mut plant = pendulum();
        let x = DVector::from_vec(vec![0.1, 0.0, 0.05, 0.0]);
        plant.set_state(x.clone()).unwrap();
        plant.step_discrete(2.0);
        let expected =
            plant.model().a_disc() * &x + plant.model().b_disc() * DVector::from_element(1, 2.0);
        assert_relative_eq!(plant.state(), &expected, epsilon = 1e-12);
    }

    #[test]
    fn uncontrolled_pendulum_falls_and_terminates() {
        let mut plant = pendulum();
        plant
            .set_state(DVector::from_vec(vec![0.0, 0.0, 0.1, 0.0]))
            .unwrap();
        let mut signals = Vec::new();
        for _ in 0..500 {
            signals.push(plant.step_with_termination(0.0).signal);
        }
        let just = signals
            .iter()
            .filter(|s| **s == EpisodeSignal::JustTerminated)
            .count();
        assert_eq!(just, 1);
        assert_eq!(signals.last(), Some(&EpisodeSignal::AlreadyTerminated));
    }

    #[test]
    fn stepper_model_structure() {
        let plant = pendulum();
        let stepper = plant.stepper_model();
        assert_relative_eq!(stepper.a_cont()[(3, 2)], 9.81 / 0.5);
        assert_relative_eq!(stepper.b_cont()[(3, 0)], -2.0);
        assert_relative_eq!(stepper.a_disc()[(0, 1)], 0.01);
    }

    #[test]
    fn params_reject_non_positive_mass() {
        let params = CartPendulumParams {
            cart_mass: 0.0,
            ..CartPendulumParams::default()
        };
        assert!(CartPendulum::new(params, &SimConfig::default()).is_err());
    }

    #[test]
    fn params_toml_defaults() {
        let params: CartPendulumParams = toml::from_str("length = 1.0").unwrap();
        assert_relative_eq!(params.length, 1.0);
        assert_relative_eq!(params.cart_mass, 1.0);
        assert_relative_eq!(params.angle_threshold, DEFAULT_ANGLE_THRESHOLD);
    }
}
