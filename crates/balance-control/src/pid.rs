//! Two summed PD loops: angle, and cart position when the plant has one.

use balance_core::model::StateLayout;
use balance_core::traits::Controller;
use balance_core::types::Command;
use nalgebra::DVector;

use crate::config::PidGains;

/// PD controller on the pendulum angle plus, for cart plants, the cart
/// position.
///
/// ```text
/// u = Kp_θ·θ + Kd_θ·θ̇ [+ Kp_x·(x − x_d) + Kd_x·ẋ]
/// ```
#[derive(Clone, Debug)]
pub struct Pid {
    gains: PidGains,
    layout: StateLayout,
    desired_position: f64,
}

impl Pid {
    pub const fn new(gains: PidGains, layout: StateLayout) -> Self {
        Self {
            gains,
            layout,
            desired_position: 0.0,
        }
    }

    pub const fn gains(&self) -> &PidGains {
        &self.gains
    }
}

impl Controller for Pid {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "PID"
    }

    fn set_desired_position(&mut self, position: f64) {
        self.desired_position = position;
    }

    fn desired_position(&self) -> f64 {
        self.desired_position
    }

    fn control(&self, state: &DVector<f64>) -> Command {
        let g = &self.gains;
        let layout = self.layout;
        let mut u = g.kp_angle * state[layout.angle] + g.kd_angle * state[layout.angular_rate];
        if let (Some(pos), Some(vel)) = (layout.position, layout.velocity) {
            u += g.kp_position * (state[pos] - self.desired_position)
                + g.kd_position * state[vel];
        }
        Command::new(u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cart_law_sums_both_loops() {
        let mut pid = Pid::new(PidGains::default(), StateLayout::cart_and_angle());
        pid.set_desired_position(0.3);
        let state = DVector::from_vec(vec![0.1, -0.2, 0.05, 0.4]);
        let u = pid.control(&state).value;
        let expected = 50.0 * 0.05 + 15.0 * 0.4 + 5.0 * (0.1 - 0.3) + 4.8 * -0.2;
        assert_relative_eq!(u, expected, epsilon = 1e-12);
    }

    #[test]
    fn robot_law_ignores_setpoint() {
        let mut pid = Pid::new(PidGains::default(), StateLayout::angle_only());
        let state = DVector::from_vec(vec![0.1, -0.3]);
        let before = pid.control(&state).value;
        pid.set_desired_position(5.0);
        assert_relative_eq!(pid.control(&state).value, before);
        assert_relative_eq!(before, 50.0 * 0.1 + 15.0 * -0.3, epsilon = 1e-12);
    }

    #[test]
    fn upright_at_setpoint_is_zero() {
        let mut pid = Pid::new(PidGains::default(), StateLayout::cart_and_angle());
        pid.set_desired_position(1.0);
        let state = DVector::from_vec(vec![1.0, 0.0, 0.0, 0.0]);
        assert!(pid.control(&state).value.abs() < 1e-12);
        assert!(!pid.control(&state).is_fallback());
    }
}
