//! Error types for disc flight simulation.
//!
//! Every fallible public operation returns [`SimResult`]. Near-zero vector
//! norms met while building the disc frame are never errors: they are
//! replaced locally by a fallback direction (see `equations`).

use serde::Serialize;
use thiserror::Error;

use crate::coefficients::CoefficientModel;
use crate::ode::SolverOptions;
use crate::state::KinematicState;

/// Result type alias for simulation operations.
pub type SimResult<T> = Result<T, SimError>;

/// Unified error type for the crate.
#[derive(Debug, Error)]
pub enum SimError {
    /// Unknown coefficient name, or a write to a read-only coefficient.
    #[error("invalid coefficient name '{name}'")]
    InvalidCoefficient {
        /// The offending name as supplied by the caller.
        name: String,
    },

    /// No preset disc with this name.
    #[error("unknown disc '{name}'")]
    UnknownDisc {
        /// Requested preset name.
        name: String,
    },

    /// Environment parameters that cannot describe a physical atmosphere.
    #[error("invalid environment: {message}")]
    InvalidEnvironment {
        /// What was wrong.
        message: String,
    },

    /// Boundary request that cannot be turned into a simulation run.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What was wrong.
        message: String,
    },

    /// The solver could not finish the requested span, even after the retry.
    #[error("integration failed: {message}")]
    IntegrationFailure {
        /// Solver diagnostic of the last attempt.
        message: String,
        /// Inputs of the failed run, for diagnosis.
        context: Box<FailureContext>,
    },

    /// Tabular export failed.
    #[error("dataframe error: {0}")]
    DataFrame(#[from] polars::error::PolarsError),
}

impl SimError {
    /// Create an invalid coefficient error.
    pub fn invalid_coefficient(name: impl Into<String>) -> Self {
        Self::InvalidCoefficient { name: name.into() }
    }

    /// Create an invalid environment error.
    pub fn invalid_environment(message: impl Into<String>) -> Self {
        Self::InvalidEnvironment {
            message: message.into(),
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Whether this error came out of the numerical solver.
    pub fn is_integration_failure(&self) -> bool {
        matches!(self, Self::IntegrationFailure { .. })
    }
}

/// Snapshot of the environment attached to failures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentSnapshot {
    /// Air density (kg/m³).
    pub air_density: f64,
    /// Gravitational acceleration magnitude (m/s²).
    pub g: f64,
    /// Unit gravity direction.
    pub gravity_direction: [f64; 3],
    /// Wind velocity sampled at the release point and start time.
    pub wind_at_release: [f64; 3],
    /// Whether ground contact was simulated.
    pub ground_play: bool,
}

/// Full input context of a failed trajectory computation.
#[derive(Debug, Clone, Serialize)]
pub struct FailureContext {
    /// Coefficient set in use.
    pub coefficients: CoefficientModel,
    /// Environment in use.
    pub environment: EnvironmentSnapshot,
    /// State the failed segment started from.
    pub initial_state: KinematicState,
    /// Requested time span `(t0, t1)`.
    pub time_span: (f64, f64),
    /// Solver configuration.
    pub options: SolverOptions,
}
