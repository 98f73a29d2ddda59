//! Integration test: scenarios run end to end on the nonlinear plants.
//!
//! Each test builds a plant and controller from a scenario, runs the
//! simulator and checks the recorded trajectory:
//! 1. Pole placement balances the cart-pendulum from a 0.1 rad tilt
//! 2. LQR moves the cart to the setpoint without dropping the pendulum
//! 3. PID keeps the cart-pendulum episode alive
//! 4. Finite horizon and MPC balance the robot
//! 5. Open-loop episodes terminate and CSV export matches the frame count

use approx::assert_relative_eq;
use balance_control::{ControllerConfig, ControllerKind};
use balance_sim::{PlantConfig, PlantKind, Scenario};

fn angle_bound(trajectory: &balance_sim::Trajectory, angle: usize) -> f64 {
    trajectory
        .channel(angle)
        .into_iter()
        .fold(0.0, |worst: f64, v| worst.max(v.abs()))
}

#[test]
fn pole_placement_balances_cart_pendulum() {
    let scenario: Scenario = r#"
        [sim]
        frames = 1000

        [plant]
        kind = "cart_pendulum"
        initial_state = [0.0, 0.0, 0.1, 0.0]

        [controller]
        kind = "pole_placement"
    "#
    .parse()
    .unwrap();

    let mut sim = scenario.build().unwrap();
    let trajectory = sim.run();

    assert_eq!(trajectory.len(), 1000);
    assert_relative_eq!(trajectory.time[999], 9.99, epsilon = 1e-9);
    assert!(angle_bound(&trajectory, 2) < 0.2);
    let last = trajectory.final_state().unwrap();
    assert!(last[2].abs() < 0.01, "final angle {}", last[2]);
    assert!(last[0].abs() < 0.01, "final position {}", last[0]);
    assert_eq!(sim.stats().ticks, 1000);
    assert_eq!(sim.stats().solver_fallbacks, 0);
}

#[test]
fn lqr_moves_cart_to_setpoint() {
    let mut scenario = Scenario::new(
        PlantConfig::new(PlantKind::CartPendulum),
        Some(ControllerConfig::new(ControllerKind::Lqr).with_desired_position(0.3)),
    );
    scenario.sim.frames = 1500;

    let mut sim = scenario.build().unwrap();
    let result = sim.run_episode();

    assert!(!result.terminated);
    let trajectory = result.trajectory;
    assert!(trajectory.setpoints.iter().all(|s| (*s - 0.3).abs() < f64::EPSILON));
    assert_relative_eq!(trajectory.final_state().unwrap()[0], 0.3, epsilon = 0.02);
}

#[test]
fn pid_keeps_cart_pendulum_episode_alive() {
    let scenario = Scenario::new(
        PlantConfig::new(PlantKind::CartPendulum).with_initial_state(&[0.0, 0.0, 0.1, 0.0]),
        Some(ControllerConfig::new(ControllerKind::Pid)),
    );
    let mut sim = scenario.build().unwrap();
    let result = sim.run_episode();

    assert!(!result.terminated);
    assert_relative_eq!(result.reward, 1000.0);
    assert!(result.trajectory.final_state().unwrap()[2].abs() < 0.05);
}

#[test]
fn finite_horizon_balances_robot() {
    let scenario = Scenario::new(
        PlantConfig::new(PlantKind::Robot).with_initial_state(&[0.1, 0.0]),
        Some(ControllerConfig::new(ControllerKind::FiniteHorizon)),
    );
    let mut sim = scenario.build().unwrap();
    let trajectory = sim.run();

    assert!(angle_bound(&trajectory, 0) <= 0.1 + 1e-12);
    assert!(trajectory.final_state().unwrap()[0].abs() < 1e-6);
}

#[test]
fn mpc_balances_robot() {
    let mut scenario = Scenario::new(
        PlantConfig::new(PlantKind::Robot).with_initial_state(&[0.1, 0.0]),
        Some(ControllerConfig::new(ControllerKind::Mpc)),
    );
    scenario.sim.frames = 300;

    let mut sim = scenario.build().unwrap();
    let trajectory = sim.run();

    assert_eq!(trajectory.len(), 300);
    assert_eq!(sim.stats().solver_fallbacks, 0);
    assert!(trajectory.controls.iter().all(|u| u.abs() <= 10.0 + 1e-6));
    assert!(trajectory.final_state().unwrap()[0].abs() < 0.01);
}

#[test]
fn open_loop_episode_terminates() {
    let scenario: Scenario = r#"
        [plant]
        kind = "robot"
        initial_state = [0.1, 0.0]
        [plant.robot]
        damping = 0.0
    "#
    .parse()
    .unwrap();

    let mut sim = scenario.build().unwrap();
    let result = sim.run_episode();

    assert!(result.terminated);
    assert!(result.trajectory.len() < 1000);
    #[allow(clippy::cast_precision_loss)]
    let steps = result.trajectory.len() as f64;
    assert_relative_eq!(result.reward, steps);
    assert_eq!(sim.stats().ticks, 0);
}

#[test]
fn csv_export_has_one_row_per_frame() {
    let mut scenario = Scenario::new(
        PlantConfig::new(PlantKind::CartPendulum).with_initial_state(&[0.0, 0.0, 0.05, 0.0]),
        Some(ControllerConfig::new(ControllerKind::PolePlacement).with_desired_position(0.2)),
    );
    scenario.sim.frames = 50;

    let trajectory = scenario.build().unwrap().run();
    let csv = trajectory.to_csv();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("time,x,x_dot,theta,theta_dot,u,setpoint"));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 50);
    assert!(rows[0].starts_with("0,"));
    assert!(rows.iter().all(|row| row.ends_with(",0.2")));
    assert!(rows.iter().all(|row| row.split(',').count() == 7));
}

#[test]
fn shipped_scenarios_build() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../scenarios");
    for name in [
        "cart_open_loop.toml",
        "cart_mpc.toml",
        "cart_lqr_tracking.toml",
        "robot_finite_horizon.toml",
    ] {
        let scenario = Scenario::from_file(dir.join(name)).unwrap();
        let sim = scenario.build().unwrap();
        assert_eq!(sim.frames(), scenario.sim.frames, "{name}");
    }
}
