//! Trajectory integration and the resulting flight record.
//!
//! [`FlightSimulator`] owns one disc, one environment and one contact
//! response. Each call integrates a fresh copy of the state, so a simulator
//! can be shared across threads; calibration code that changes coefficients
//! needs `&mut` access and therefore cannot race an in-flight run.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, error, warn};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::coefficients::CoefficientModel;
use crate::contact::{ContactModel, SpringDragContact};
use crate::environment::Environment;
use crate::equations::{EquationsOfMotion, angle_of_attack};
use crate::error::{FailureContext, SimError, SimResult};
use crate::ode::{EventFn, OdeError, OdeSolution, SolverOptions, SolverStats, Termination, solve_ivp};
use crate::state::{KinematicState, STATE_LEN, StateVector};
use crate::vector::Quaternion;

/// Flight duration used when no span is given (s).
pub const DEFAULT_FLIGHT_TIME: f64 = 7.0;

/// Speed below which a disc without ground contact counts as at rest (m/s).
pub const REST_SPEED: f64 = 0.001;

/// Step cap for slowly spinning discs (s).
pub const DEFAULT_MAX_STEP: f64 = 0.1;

/// Spin frequency above which the step cap follows the spin (Hz).
pub const SPIN_FREQUENCY_THRESHOLD: f64 = 4.5;

/// Fraction of a revolution allowed per step above the threshold.
pub const STEP_REVOLUTION_FRACTION: f64 = 0.45;

/// Largest step that keeps sampled spin direction unambiguous.
///
/// Above [`SPIN_FREQUENCY_THRESHOLD`] a step covers at most
/// [`STEP_REVOLUTION_FRACTION`] of a revolution.
pub fn max_step_for_spin(spin_rate: f64) -> f64 {
    let hz = spin_rate.abs() / (2.0 * PI);
    if hz > SPIN_FREQUENCY_THRESHOLD {
        STEP_REVOLUTION_FRACTION / hz
    } else {
        DEFAULT_MAX_STEP
    }
}

/// One output point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectorySample {
    /// Time (s).
    pub t: f64,
    /// Integrated state, exactly as emitted by the solver.
    pub state: KinematicState,
    /// Attitude including the spin phase.
    pub plate_orientation: Quaternion,
    /// Roll angle (rad).
    pub phi: f64,
    /// Pitch angle (rad).
    pub theta: f64,
    /// Angle of attack (rad).
    pub angle_of_attack: f64,
}

impl TrajectorySample {
    /// Derive the output quantities for a solver point.
    pub fn new(t: f64, y: &StateVector, environment: &Environment) -> Self {
        let state = KinematicState::from_array(y);
        let attitude = state.attitude();
        let plate_orientation = attitude.mul(&Quaternion::about_z(state.gamma));
        let (phi, theta) = plate_orientation.roll_pitch();
        let air_velocity = state.velocity.sub(&environment.wind_velocity(t, &state.position));
        Self {
            t,
            state,
            plate_orientation,
            phi,
            theta,
            angle_of_attack: angle_of_attack(&attitude, &air_velocity),
        }
    }
}

/// Per-sample quantity exported by [`Trajectory::column`]. Variants are
/// named after their column, see [`Column::name`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    T,
    X,
    Y,
    Z,
    Vx,
    Vy,
    Vz,
    Qx,
    Qy,
    Qz,
    Qw,
    Dphi,
    Dtheta,
    Dgamma,
    Phi,
    Theta,
    Aoa,
    Gamma,
}

impl Column {
    /// All columns in export order.
    pub const ALL: [Column; 18] = [
        Column::T,
        Column::X,
        Column::Y,
        Column::Z,
        Column::Vx,
        Column::Vy,
        Column::Vz,
        Column::Qx,
        Column::Qy,
        Column::Qz,
        Column::Qw,
        Column::Dphi,
        Column::Dtheta,
        Column::Dgamma,
        Column::Phi,
        Column::Theta,
        Column::Aoa,
        Column::Gamma,
    ];

    /// Column name in exported tables.
    pub const fn name(&self) -> &'static str {
        match self {
            Column::T => "t",
            Column::X => "x",
            Column::Y => "y",
            Column::Z => "z",
            Column::Vx => "vx",
            Column::Vy => "vy",
            Column::Vz => "vz",
            Column::Qx => "qx",
            Column::Qy => "qy",
            Column::Qz => "qz",
            Column::Qw => "qw",
            Column::Dphi => "dphi",
            Column::Dtheta => "dtheta",
            Column::Dgamma => "dgamma",
            Column::Phi => "phi",
            Column::Theta => "theta",
            Column::Aoa => "aoa",
            Column::Gamma => "gamma",
        }
    }

    fn value(&self, sample: &TrajectorySample) -> f64 {
        let s = &sample.state;
        match self {
            Column::T => sample.t,
            Column::X => s.position.x,
            Column::Y => s.position.y,
            Column::Z => s.position.z,
            Column::Vx => s.velocity.x,
            Column::Vy => s.velocity.y,
            Column::Vz => s.velocity.z,
            Column::Qx => s.orientation.x,
            Column::Qy => s.orientation.y,
            Column::Qz => s.orientation.z,
            Column::Qw => s.orientation.w,
            Column::Dphi => s.dphi,
            Column::Dtheta => s.dtheta,
            Column::Dgamma => s.dgamma,
            Column::Phi => sample.phi,
            Column::Theta => sample.theta,
            Column::Aoa => sample.angle_of_attack,
            Column::Gamma => s.gamma,
        }
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown trajectory column '{s}'"))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Boundary record of a trajectory segment.
///
/// Field names and layout are fixed for downstream consumers. An empty
/// record terminates a stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    /// Positions.
    pub p: Vec<[f64; 3]>,
    /// Times.
    pub t: Vec<f64>,
    /// Velocities.
    pub v: Vec<[f64; 3]>,
    /// Plate orientation, quaternion x component.
    pub qx: Vec<f64>,
    /// Plate orientation, quaternion y component.
    pub qy: Vec<f64>,
    /// Plate orientation, quaternion z component.
    pub qz: Vec<f64>,
    /// Plate orientation, quaternion scalar component.
    pub qw: Vec<f64>,
    /// Spin phase plus the caller's offset.
    pub gamma: Vec<f64>,
}

impl TrajectoryRecord {
    /// The end-of-flight terminator.
    pub fn terminator() -> Self {
        Self::default()
    }

    /// Whether this record carries no samples.
    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Remove the first sample, which repeats the previous segment's last.
    pub(crate) fn drop_seam(&mut self) {
        if self.is_empty() {
            return;
        }
        self.p.remove(0);
        self.t.remove(0);
        self.v.remove(0);
        self.qx.remove(0);
        self.qy.remove(0);
        self.qz.remove(0);
        self.qw.remove(0);
        self.gamma.remove(0);
    }
}

/// Ordered samples of one or more integration segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    samples: Vec<TrajectorySample>,
    termination: Termination,
    stats: SolverStats,
}

impl Trajectory {
    fn from_solution(solution: &OdeSolution<STATE_LEN>, environment: &Environment) -> Self {
        let samples = solution
            .t
            .iter()
            .zip(&solution.y)
            .map(|(t, y)| TrajectorySample::new(*t, y, environment))
            .collect();
        Self {
            samples,
            termination: solution.termination,
            stats: solution.stats,
        }
    }

    /// All samples in time order.
    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Earliest sample.
    pub fn first(&self) -> Option<&TrajectorySample> {
        self.samples.first()
    }

    /// Latest sample.
    pub fn last(&self) -> Option<&TrajectorySample> {
        self.samples.last()
    }

    /// State of the last sample.
    pub fn final_state(&self) -> Option<KinematicState> {
        self.last().map(|s| s.state)
    }

    /// How the latest segment ended.
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Whether the at-rest event ended the latest segment.
    pub fn terminated_by_event(&self) -> bool {
        matches!(self.termination, Termination::Event(_))
    }

    /// Solver work, summed over appended segments.
    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    /// Sample times.
    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.t).collect()
    }

    /// One quantity across all samples.
    pub fn column(&self, column: Column) -> Array1<f64> {
        self.samples.iter().map(|s| column.value(s)).collect()
    }

    /// Concatenate a segment resumed from this trajectory's last sample.
    /// The duplicated seam sample is dropped.
    pub fn append(&mut self, next: Trajectory) {
        let seam = match (self.samples.last(), next.samples.first()) {
            (Some(last), Some(first)) => last.t == first.t && last.state == first.state,
            _ => false,
        };
        let skip = usize::from(seam);
        self.samples.extend(next.samples.into_iter().skip(skip));
        self.termination = next.termination;
        self.stats.rhs_evaluations += next.stats.rhs_evaluations;
        self.stats.accepted_steps += next.stats.accepted_steps;
        self.stats.rejected_steps += next.stats.rejected_steps;
    }

    /// Boundary record with `phase_offset` added to every spin phase.
    pub fn to_record(&self, phase_offset: f64) -> TrajectoryRecord {
        let mut record = TrajectoryRecord::default();
        for sample in &self.samples {
            let s = &sample.state;
            record.p.push(s.position.to_array());
            record.t.push(sample.t);
            record.v.push(s.velocity.to_array());
            record.qx.push(s.orientation.x);
            record.qy.push(s.orientation.y);
            record.qz.push(s.orientation.z);
            record.qw.push(s.orientation.w);
            record.gamma.push(s.gamma + phase_offset);
        }
        record
    }

    /// Every column as a table, one row per sample.
    pub fn to_dataframe(&self) -> SimResult<DataFrame> {
        let c = |column: Column| self.column(column).to_vec();
        let df = df!(
            "t" => c(Column::T),
            "x" => c(Column::X),
            "y" => c(Column::Y),
            "z" => c(Column::Z),
            "vx" => c(Column::Vx),
            "vy" => c(Column::Vy),
            "vz" => c(Column::Vz),
            "qx" => c(Column::Qx),
            "qy" => c(Column::Qy),
            "qz" => c(Column::Qz),
            "qw" => c(Column::Qw),
            "dphi" => c(Column::Dphi),
            "dtheta" => c(Column::Dtheta),
            "dgamma" => c(Column::Dgamma),
            "phi" => c(Column::Phi),
            "theta" => c(Column::Theta),
            "aoa" => c(Column::Aoa),
            "gamma" => c(Column::Gamma),
        )?;
        Ok(df)
    }
}

/// Integrates disc flights.
#[derive(Debug, Clone)]
pub struct FlightSimulator {
    coefficients: CoefficientModel,
    environment: Environment,
    contact: Arc<dyn ContactModel>,
}

impl Default for FlightSimulator {
    fn default() -> Self {
        Self::new(CoefficientModel::default(), Environment::default())
    }
}

impl FlightSimulator {
    /// Simulator with spring-drag ground contact.
    pub fn new(coefficients: CoefficientModel, environment: Environment) -> Self {
        Self {
            coefficients,
            environment,
            contact: Arc::new(SpringDragContact::default()),
        }
    }

    /// Replace the ground contact response.
    pub fn with_contact_model(mut self, contact: impl ContactModel + 'static) -> Self {
        self.contact = Arc::new(contact);
        self
    }

    /// Disc coefficients in use.
    pub fn coefficients(&self) -> &CoefficientModel {
        &self.coefficients
    }

    /// Exclusive access for calibration between runs.
    pub fn coefficients_mut(&mut self) -> &mut CoefficientModel {
        &mut self.coefficients
    }

    /// Environment in use.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Equations of motion bound to this simulator.
    pub fn equations(&self) -> EquationsOfMotion<'_> {
        EquationsOfMotion::new(&self.coefficients, &self.environment, self.contact.as_ref())
    }

    /// Integrate from `initial` over `t_span` (default `(0, 7)`).
    ///
    /// Without ground contact the run stops early once the disc is at rest.
    /// Without an explicit `max_step` the step is capped from the initial
    /// spin rate (see [`max_step_for_spin`]). A solver failure is retried
    /// once with identical inputs; a second failure is returned with the full
    /// input context.
    pub fn compute_trajectory(
        &self,
        initial: &KinematicState,
        t_span: Option<(f64, f64)>,
        options: &SolverOptions,
    ) -> SimResult<Trajectory> {
        let span = t_span.unwrap_or((0.0, DEFAULT_FLIGHT_TIME));
        let options = &SolverOptions {
            max_step: Some(options.max_step.unwrap_or_else(|| max_step_for_spin(initial.dgamma))),
            ..*options
        };
        match self.integrate(initial, span, options) {
            Ok(trajectory) => Ok(trajectory),
            Err(first) => {
                warn!("integration over {span:?} failed ({first}), retrying once");
                self.integrate(initial, span, options)
                    .map_err(|second| self.integration_failure(second, initial, span, options))
            }
        }
    }

    /// Continue `previous` for `duration` more seconds from its last sample.
    ///
    /// The new segment starts from the stored state bit for bit; its first
    /// sample duplicates the previous last sample (see [`Trajectory::append`]).
    pub fn resume(&self, previous: &Trajectory, duration: f64, options: &SolverOptions) -> SimResult<Trajectory> {
        let last = previous
            .last()
            .ok_or_else(|| SimError::invalid_request("cannot resume an empty trajectory"))?;
        self.compute_trajectory(&last.state, Some((last.t, last.t + duration)), options)
    }

    fn integrate(
        &self,
        initial: &KinematicState,
        span: (f64, f64),
        options: &SolverOptions,
    ) -> Result<Trajectory, OdeError> {
        let equations = self.equations();
        let at_rest = |_t: f64, y: &StateVector| (y[3] * y[3] + y[4] * y[4] + y[5] * y[5]).sqrt() - REST_SPEED;
        let event: Option<EventFn<'_, STATE_LEN>> = if self.environment.ground_play() {
            None
        } else {
            Some(&at_rest)
        };

        let solution = solve_ivp(&equations, span, initial.to_array(), options, event)?;
        let stats = solution.stats;
        debug!(
            "integrated {:?}: {} samples, {} rhs evaluations, {} accepted / {} rejected steps, {:?}",
            span,
            solution.t.len(),
            stats.rhs_evaluations,
            stats.accepted_steps,
            stats.rejected_steps,
            solution.termination
        );
        Ok(Trajectory::from_solution(&solution, &self.environment))
    }

    fn integration_failure(
        &self,
        cause: OdeError,
        initial: &KinematicState,
        span: (f64, f64),
        options: &SolverOptions,
    ) -> SimError {
        let context = FailureContext {
            coefficients: self.coefficients.clone(),
            environment: self.environment.snapshot(span.0, &initial.position),
            initial_state: *initial,
            time_span: span,
            options: *options,
        };
        let rendered = serde_json::to_string(&context).unwrap_or_else(|_| format!("{context:?}"));
        error!("failed to compute trajectory: {cause}, context: {rendered}");
        SimError::IntegrationFailure {
            message: cause.to_string(),
            context: Box::new(context),
        }
    }
}
