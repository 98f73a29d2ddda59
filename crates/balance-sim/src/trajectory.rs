//! Recorded closed-loop trajectory and its CSV export.

use std::fmt::Write as _;
use std::io;
use std::path::Path;

use balance_core::model::StateLayout;
use nalgebra::DVector;

/// Column label of every state entry, in state order.
pub fn state_labels(layout: StateLayout, state_dim: usize) -> Vec<String> {
    (0..state_dim)
        .map(|i| {
            let label = if Some(i) == layout.position {
                "x"
            } else if Some(i) == layout.velocity {
                "x_dot"
            } else if i == layout.angle {
                "theta"
            } else if i == layout.angular_rate {
                "theta_dot"
            } else {
                return format!("s{i}");
            };
            label.to_owned()
        })
        .collect()
}

/// Parallel per-frame sequences recorded by the simulator.
///
/// `time[i] = i·dt`; `states[i]` is the state after frame `i` and
/// `controls[i]` the command applied during it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectory {
    pub labels: Vec<String>,
    pub time: Vec<f64>,
    pub states: Vec<DVector<f64>>,
    pub controls: Vec<f64>,
    pub setpoints: Vec<f64>,
}

impl Trajectory {
    pub fn with_capacity(labels: Vec<String>, frames: usize) -> Self {
        Self {
            labels,
            time: Vec::with_capacity(frames),
            states: Vec::with_capacity(frames),
            controls: Vec::with_capacity(frames),
            setpoints: Vec::with_capacity(frames),
        }
    }

    pub fn push(&mut self, time: f64, state: DVector<f64>, control: f64, setpoint: f64) {
        self.time.push(time);
        self.states.push(state);
        self.controls.push(control);
        self.setpoints.push(setpoint);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn final_state(&self) -> Option<&DVector<f64>> {
        self.states.last()
    }

    /// One state entry over time.
    pub fn channel(&self, index: usize) -> Vec<f64> {
        self.states.iter().map(|s| s[index]).collect()
    }

    /// Render as CSV with header `time,<state labels>,u,setpoint`.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str("time");
        for label in &self.labels {
            out.push(',');
            out.push_str(label);
        }
        out.push_str(",u,setpoint\n");

        let rows = self
            .time
            .iter()
            .zip(&self.states)
            .zip(&self.controls)
            .zip(&self.setpoints);
        for (((t, state), u), setpoint) in rows {
            // Writing to a String cannot fail.
            let _ = write!(out, "{t}");
            for v in state {
                let _ = write!(out, ",{v}");
            }
            let _ = writeln!(out, ",{u},{setpoint}");
        }
        out
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.to_csv())
    }
}
