use thiserror::Error;

/// Top-level error type for the balance workspace.
#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Dimension error: {0}")]
    Dimension(#[from] DimensionError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid control_freq: {0} (must be > 0)")]
    InvalidControlFreq(f64),

    #[error("Invalid frame count: {0} (must be > 0)")]
    InvalidFrames(usize),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// State vector shape mismatch.
///
/// Copy so it can be returned from hot paths without allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("State dimension mismatch: expected {expected}, got {got}")]
pub struct DimensionError {
    pub expected: usize,
    pub got: usize,
}

/// Controller construction errors. Always fatal for the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("Singular matrix: {0}")]
    Singular(&'static str),

    #[error("System is not controllable: controllability rank {rank} < {expected}")]
    Uncontrollable { rank: usize, expected: usize },

    #[error("Invalid pole set: {0}")]
    InvalidPoles(String),

    #[error("Riccati solve failed: {0}")]
    RiccatiFailed(String),

    #[error(transparent)]
    Dimension(#[from] DimensionError),

    #[error("Invalid controller configuration: {0}")]
    InvalidConfig(String),
}

/// Per-tick quadratic program failures.
///
/// Non-fatal: the MPC falls back to a zero command and reports this.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("QP infeasible: {0}")]
    Infeasible(String),

    #[error("QP did not converge: {0}")]
    NotConverged(String),

    #[error("QP setup failed: {0}")]
    Setup(String),
}
