//! Self-balancing two-wheeled robot, modeled as an inverted pendulum on a
//! wheel axle.
//!
//! State: `[θ, θ̇]`. Input: normalized wheel acceleration command.

use balance_core::config::SimConfig;
use balance_core::error::{BalanceError, ConfigError, DimensionError};
use balance_core::model::{LinearModel, StateLayout};
use balance_core::traits::Plant;
use balance_core::types::StepOutcome;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::episode::{Bounds, DEFAULT_ANGLE_THRESHOLD, EpisodeTracker};
use crate::validate_positive;

const fn default_mass() -> f64 {
    0.5
}
const fn default_length() -> f64 {
    0.5
}
const fn default_gravity() -> f64 {
    9.81
}
const fn default_damping() -> f64 {
    0.5
}
const fn default_angle_threshold() -> f64 {
    DEFAULT_ANGLE_THRESHOLD
}

/// Physical parameters of the balancing robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotParams {
    /// Body mass (kg). Descriptive only: the point-mass model on the axle
    /// does not depend on it.
    #[serde(default = "default_mass")]
    pub mass: f64,
    /// Distance from axle to center of mass (m).
    #[serde(default = "default_length")]
    pub length: f64,
    /// Gravitational acceleration (m/s^2).
    #[serde(default = "default_gravity")]
    pub gravity: f64,
    /// Angular damping.
    #[serde(default = "default_damping")]
    pub damping: f64,
    /// Episode fails when |θ| exceeds this (rad).
    #[serde(default = "default_angle_threshold")]
    pub angle_threshold: f64,
}

impl Default for RobotParams {
    fn default() -> Self {
        Self {
            mass: default_mass(),
            length: default_length(),
            gravity: default_gravity(),
            damping: default_damping(),
            angle_threshold: default_angle_threshold(),
        }
    }
}

impl RobotParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_positive("mass", self.mass)?;
        validate_positive("length", self.length)?;
        validate_positive("angle_threshold", self.angle_threshold)?;
        Ok(())
    }

    /// Builder: drop the angular damping.
    #[must_use]
    pub const fn undamped(mut self) -> Self {
        self.damping = 0.0;
        self
    }

    /// Linearization about upright.
    pub fn linearize(&self) -> (DMatrix<f64>, DMatrix<f64>) {
        let (l, g) = (self.length, self.gravity);
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, g / l, 0.0]);
        let b = DMatrix::from_column_slice(2, 1, &[0.0, -1.0 / l]);
        (a, b)
    }

    /// Measurement matrix: the tilt angle.
    pub fn measurement() -> DMatrix<f64> {
        DMatrix::from_row_slice(1, 2, &[1.0, 0.0])
    }

    pub const fn bounds(&self) -> Bounds {
        Bounds {
            angle: self.angle_threshold,
            position: None,
        }
    }
}

/// Balancing robot plant.
#[derive(Clone, Debug)]
pub struct BalancingRobot {
    params: RobotParams,
    model: LinearModel,
    state: DVector<f64>,
    time_elapsed: f64,
    episode: EpisodeTracker,
}

impl BalancingRobot {
    pub const STATE_DIM: usize = 2;

    pub fn new(params: RobotParams, sim: &SimConfig) -> Result<Self, BalanceError> {
        params.validate()?;
        sim.validate()?;
        let (a, b) = params.linearize();
        let model = LinearModel::new(
            a,
            b,
            RobotParams::measurement(),
            sim.dt(),
            StateLayout::angle_only(),
        )?;
        Ok(Self {
            params,
            model,
            state: DVector::zeros(Self::STATE_DIM),
            time_elapsed: 0.0,
            episode: EpisodeTracker::new(),
        })
    }

    pub const fn params(&self) -> &RobotParams {
        &self.params
    }

    pub const fn episode(&self) -> &EpisodeTracker {
        &self.episode
    }
}

impl Plant for BalancingRobot {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "Robot"
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

    /// Nonlinear robot dynamics; damping reads the stored rate.
    fn dynamics(&self, state: &DVector<f64>, u: f64) -> DVector<f64> {
        let p = &self.params;
        let theta = state[0];
        let mut ds = DVector::zeros(Self::STATE_DIM);
        ds[0] = state[1];
        ds[1] = (p.gravity / p.length) * theta.sin() - (u / p.length) * theta.cos()
            - p.damping * self.state[1];
        ds
    }

    fn step_continuous(&mut self, u: f64) {
        let dt = self.model.dt();
        let ds = self.dynamics(&self.state, u);

        let mut next = DVector::zeros(Self::STATE_DIM);
        next[1] = self.state[1] + ds[1] * dt;
        next[0] = self.state[0] + next[1] * dt;

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

    fn robot(params: RobotParams) -> BalancingRobot {
        BalancingRobot::new(params, &SimConfig::default()).unwrap()
    }

    #[test]
    fn linear_model() {
        let plant = robot(RobotParams::default());
        let model = plant.model();
        assert_relative_eq!(model.a_cont()[(1, 0)], 9.81 / 0.5);
        assert_relative_eq!(model.b_cont()[(1, 0)], -2.0);
        assert_relative_eq!(model.a_disc()[(1, 0)], 9.81 / 0.5 * 0.01);
        assert_relative_eq!(model.b_disc()[(1, 0)], -0.02);
        assert!(!model.layout().has_position());
    }

    #[test]
    fn mass_does_not_enter_the_model() {
        let light = robot(RobotParams::default());
        let heavy = robot(RobotParams {
            mass: 5.0,
            ..RobotParams::default()
        });
        assert_eq!(light.model().a_cont(), heavy.model().a_cont());
        assert_eq!(light.model().b_cont(), heavy.model().b_cont());
        let x = DVector::from_vec(vec![0.1, 0.2]);
        assert_eq!(light.dynamics(&x, 0.3), heavy.dynamics(&x, 0.3));
    }

    #[test]
    fn set_state_roundtrip() {
        let mut plant = robot(RobotParams::default());
        let x = DVector::from_vec(vec![0.1, -0.25]);
        plant.set_state(x.clone()).unwrap();
        assert_eq!(plant.state(), &x);
    }

    #[test]
    fn set_state_rejects_wrong_dimension() {
        let mut plant = robot(RobotParams::default());
        assert!(plant.set_state(DVector::zeros(4)).is_err());
    }

    #[test]
    fn undamped_fall_terminates_exactly_once() {
        let mut plant = robot(RobotParams::default().undamped());
        plant.set_state(DVector::from_vec(vec![0.1, 0.0])).unwrap();

        let mut just_terminated = 0;
        let mut steps_to_fall = None;
        for step in 0..200 {
            let out = plant.step_with_termination(0.0);
            match out.signal {
                EpisodeSignal::Alive => {
                    assert!(steps_to_fall.is_none());
                    assert_relative_eq!(out.reward, 1.0);
                }
                EpisodeSignal::JustTerminated => {
                    just_terminated += 1;
                    steps_to_fall = Some(step);
                    assert_relative_eq!(out.reward, 1.0);
                    assert!(plant.state()[0] > DEFAULT_ANGLE_THRESHOLD);
                }
                EpisodeSignal::AlreadyTerminated => {
                    assert!(steps_to_fall.is_some());
                    assert!(out.reward.abs() < f64::EPSILON);
                }
            }
        }
        assert_eq!(just_terminated, 1);
        assert!(steps_to_fall.is_some());
    }

    #[test]
    fn damping_reads_stored_state_not_argument() {
        let mut plant = robot(RobotParams::default());
        let arg = DVector::from_vec(vec![0.0, 1.0]);
        let at_rest = plant.dynamics(&arg, 0.0);
        plant.set_state(DVector::from_vec(vec![0.0, 4.0])).unwrap();
        let spinning = plant.dynamics(&arg, 0.0);
        assert_relative_eq!(spinning[1] - at_rest[1], -0.5 * 4.0, epsilon = 1e-12);
        assert_relative_eq!(spinning[0], at_rest[0]);
    }

    #[test]
    fn input_pushes_against_tilt() {
        let plant = robot(RobotParams::default());
        let state = DVector::from_vec(vec![0.0, 0.0]);
        let ds = plant.dynamics(&state, 1.0);
        assert_relative_eq!(ds[1], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn step_discrete_matches_linear_model() {
        let mut plant = robot(RobotParams::default());
        plant.set_state(DVector::from_vec(vec![0.05, 0.0])).unwrap();
        plant.step_discrete(0.0);
        assert_relative_eq!(plant.state()[0], 0.05, epsilon = 1e-15);
        assert_relative_eq!(plant.state()[1], 9.81 / 0.5 * 0.01 * 0.05, epsilon = 1e-15);
        assert_relative_eq!(plant.time_elapsed(), 0.01);
    }
}
