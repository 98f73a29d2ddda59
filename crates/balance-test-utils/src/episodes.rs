//! Episode helpers for plants driven by a controller.

use balance_core::traits::{Controller, Plant};
use balance_core::types::EpisodeSignal;

/// Step `plant` under `controller` until the episode terminates or
/// `max_steps` is reached. Returns the number of steps taken.
pub fn run_until_done(
    plant: &mut dyn Plant,
    controller: &dyn Controller,
    max_steps: usize,
) -> usize {
    for i in 0..max_steps {
        let u = controller.control(plant.state()).value;
        if plant.step_with_termination(u).signal == EpisodeSignal::JustTerminated {
            return i + 1;
        }
    }
    max_steps
}

/// Largest |angle| over `n` closed-loop steps.
pub fn max_abs_angle(plant: &mut dyn Plant, controller: &dyn Controller, n: usize) -> f64 {
    let angle = plant.layout().angle;
    let mut worst = plant.state()[angle].abs();
    for _ in 0..n {
        let u = controller.control(plant.state()).value;
        plant.step_continuous(u);
        worst = worst.max(plant.state()[angle].abs());
    }
    worst
}
