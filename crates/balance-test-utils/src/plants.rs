//! Standard plant fixtures at the default 100 Hz control rate.

use balance_core::config::SimConfig;
use balance_core::traits::Plant;
use balance_plant::{BalancingRobot, CartPendulum, CartPendulumParams, RobotParams};
use nalgebra::DVector;

pub fn sim_config() -> SimConfig {
    SimConfig::default()
}

/// Cart-pendulum with default parameters, at rest upright.
pub fn cart_pendulum() -> CartPendulum {
    CartPendulum::new(CartPendulumParams::default(), &sim_config())
        .expect("default cart-pendulum parameters are valid")
}

/// Cart-pendulum starting from `state`.
pub fn cart_pendulum_at(state: &[f64]) -> CartPendulum {
    let mut plant = cart_pendulum();
    plant
        .set_state(DVector::from_column_slice(state))
        .expect("cart-pendulum state has four entries");
    plant
}

/// Balancing robot with default parameters, at rest upright.
pub fn robot() -> BalancingRobot {
    BalancingRobot::new(RobotParams::default(), &sim_config())
        .expect("default robot parameters are valid")
}

/// Robot starting from `state`.
pub fn robot_at(state: &[f64]) -> BalancingRobot {
    let mut plant = robot();
    plant
        .set_state(DVector::from_column_slice(state))
        .expect("robot state has two entries");
    plant
}

/// Undamped robot starting from `state`.
pub fn undamped_robot_at(state: &[f64]) -> BalancingRobot {
    let mut plant = BalancingRobot::new(RobotParams::default().undamped(), &sim_config())
        .expect("undamped robot parameters are valid");
    plant
        .set_state(DVector::from_column_slice(state))
        .expect("robot state has two entries");
    plant
}
