//! Simulated balancing plants: a cart-pendulum and a two-wheeled robot.
//!
//! Both plants own their physical parameters, a linearized
//! [`LinearModel`](balance_core::model::LinearModel) discretized with the
//! sampling period from [`SimConfig`](balance_core::config::SimConfig), and
//! the nonlinear dynamics used as ground truth by the simulator.

pub mod cart_pendulum;
pub mod episode;
pub mod robot;

pub use cart_pendulum::{CartPendulum, CartPendulumParams};
pub use episode::{Bounds, EpisodeTracker};
pub use robot::{BalancingRobot, RobotParams};

use balance_core::error::ConfigError;

/// Reject non-positive or non-finite physical parameters.
pub(crate) fn validate_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: field.into(),
            message: format!("must be positive, got {value}"),
        })
    }
}
