//! Flight simulation of spinning flying discs.
//!
//! This library provides:
//! - A named aerodynamic/mass coefficient set per disc design, with presets
//! - Piecewise lift, drag and pitching-moment curves over angle of attack
//! - Rigid-body equations of motion with optional ground contact
//! - Adaptive Runge-Kutta integration with an at-rest terminal event
//! - Boundary records, one-second streaming, metrics and fitting objectives
//!
//! # Example
//!
//! ```no_run
//! use disc_flight::{ReleaseConditions, FlightSimulator, KinematicState, SolverOptions};
//!
//! let release = ReleaseConditions { speed: 24.0, spin: -120.0, ..Default::default() };
//! let initial = KinematicState::from_release(&release);
//! let options = SolverOptions::default().with_max_step(disc_flight::max_step_for_spin(release.spin));
//! let trajectory = FlightSimulator::default().compute_trajectory(&initial, None, &options)?;
//! println!("{} samples", trajectory.len());
//! # Ok::<(), disc_flight::SimError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::doc_markdown)]

pub mod aerodynamics;
pub mod coefficients;
pub mod contact;
pub mod environment;
pub mod equations;
pub mod error;
pub mod loss;
pub mod metrics;
pub mod ode;
pub mod presets;
pub mod request;
pub mod state;
pub mod stream;
pub mod trajectory;
pub mod vector;

pub use coefficients::{Coefficient, CoefficientModel};
pub use contact::{ContactModel, SpringDragContact};
pub use environment::{ConstantWind, Environment, WindField};
pub use equations::EquationsOfMotion;
pub use error::{SimError, SimResult};
pub use loss::{HuberLoss, LossFunction, MaxErrorLoss, ObservedFlight, RmseLoss};
pub use metrics::FlightMetrics;
pub use ode::{Method, SolverOptions};
pub use request::{PreparedThrow, ThrowRequest};
pub use state::{KinematicState, ReleaseConditions};
pub use stream::{FlightStream, StreamFrame};
pub use trajectory::{FlightSimulator, Trajectory, TrajectoryRecord, max_step_for_spin};
pub use vector::{Quaternion, Vec3};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
