//! Throw requests as received at the service boundary.
//!
//! A [`ThrowRequest`] is plain data, usually decoded from JSON. [`ThrowRequest::prepare`]
//! validates it and builds everything a run needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coefficients::CoefficientModel;
use crate::environment::{ConstantWind, DEFAULT_AIR_DENSITY, DEFAULT_GRAVITY, Environment};
use crate::error::{SimError, SimResult};
use crate::ode::SolverOptions;
use crate::presets;
use crate::state::{KinematicState, ReleaseConditions};
use crate::stream::FlightStream;
use crate::trajectory::{FlightSimulator, Trajectory, TrajectoryRecord, max_step_for_spin};
use crate::vector::Vec3;

/// Longest flight a request may ask for (s).
pub const MAX_FLIGHT_SECONDS: f64 = 15.0;

/// Relative tolerance for boundary requests.
pub const REQUEST_RTOL: f64 = 5e-4;

/// Absolute tolerance for boundary requests.
pub const REQUEST_ATOL: f64 = 1e-7;

/// Disc selection: a preset name or coefficient overrides on the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiscSpec {
    /// One of [`presets::NAMES`].
    Preset(String),
    /// Coefficient name to value; `CD0` is accepted.
    Coefficients(BTreeMap<String, f64>),
}

impl Default for DiscSpec {
    fn default() -> Self {
        DiscSpec::Preset("ultrastar".to_string())
    }
}

impl DiscSpec {
    /// Resolve into a coefficient set.
    pub fn model(&self) -> SimResult<CoefficientModel> {
        match self {
            DiscSpec::Preset(name) => presets::by_name(name),
            DiscSpec::Coefficients(overrides) => CoefficientModel::from_overrides(overrides.iter().map(|(k, v)| (k, *v))),
        }
    }
}

/// One throw to simulate. Angles are in degrees except `wind_angle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrowRequest {
    /// Disc to throw.
    pub disc: DiscSpec,
    /// Launch speed (m/s).
    pub v: f64,
    /// Spin rate (rad/s); negative is clockwise seen from above.
    pub spin: f64,
    /// Launch angle above horizontal.
    pub uphill_degrees: f64,
    /// Roll toward the spin side.
    pub hyzer_degrees: f64,
    /// Leading edge above the launch direction.
    pub nose_up_degrees: f64,
    /// Release height (m).
    pub z: f64,
    /// Initial roll rate (rad/s).
    pub wx: f64,
    /// Initial pitch rate (rad/s).
    pub wy: f64,
    /// Offset added to every reported spin phase (rad).
    pub gamma: f64,
    /// Wind speed (m/s).
    pub wind_speed: f64,
    /// Direction the wind blows toward (rad); 0 is a tail wind, π/2 blows
    /// right to left.
    pub wind_angle: f64,
    /// Air density (kg/m³).
    pub air_density: f64,
    /// Simulate ground contact instead of stopping at rest.
    pub ground_play: bool,
    /// Requested flight length (s), capped at [`MAX_FLIGHT_SECONDS`].
    pub flight_max_seconds: f64,
    /// Relative solver tolerance.
    pub rtol: f64,
    /// Absolute solver tolerance.
    pub atol: f64,
}

impl Default for ThrowRequest {
    fn default() -> Self {
        let release = ReleaseConditions::default();
        Self {
            disc: DiscSpec::default(),
            v: release.speed,
            spin: release.spin,
            uphill_degrees: release.uphill_degrees,
            hyzer_degrees: release.hyzer_degrees,
            nose_up_degrees: release.nose_up_degrees,
            z: release.z,
            wx: release.wx,
            wy: release.wy,
            gamma: 0.0,
            wind_speed: 0.0,
            wind_angle: 0.0,
            air_density: DEFAULT_AIR_DENSITY,
            ground_play: false,
            flight_max_seconds: MAX_FLIGHT_SECONDS,
            rtol: REQUEST_RTOL,
            atol: REQUEST_ATOL,
        }
    }
}

impl ThrowRequest {
    /// Decode a JSON request body.
    pub fn from_json(body: &str) -> SimResult<Self> {
        serde_json::from_str(body).map_err(|e| SimError::invalid_request(format!("malformed request: {e}")))
    }

    /// Release kinematics of this request.
    pub fn release(&self) -> ReleaseConditions {
        ReleaseConditions {
            speed: self.v,
            spin: self.spin,
            uphill_degrees: self.uphill_degrees,
            hyzer_degrees: self.hyzer_degrees,
            nose_up_degrees: self.nose_up_degrees,
            z: self.z,
            wx: self.wx,
            wy: self.wy,
        }
    }

    fn validate(&self) -> SimResult<()> {
        let fields = [
            ("v", self.v),
            ("spin", self.spin),
            ("uphill_degrees", self.uphill_degrees),
            ("hyzer_degrees", self.hyzer_degrees),
            ("nose_up_degrees", self.nose_up_degrees),
            ("z", self.z),
            ("wx", self.wx),
            ("wy", self.wy),
            ("gamma", self.gamma),
            ("wind_speed", self.wind_speed),
            ("wind_angle", self.wind_angle),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| !value.is_finite()) {
            return Err(SimError::invalid_request(format!("{name} must be finite")));
        }
        if !(self.flight_max_seconds > 0.0) {
            return Err(SimError::invalid_request(format!(
                "flight_max_seconds must be positive, got {}",
                self.flight_max_seconds
            )));
        }
        if !(self.rtol > 0.0 && self.atol > 0.0) {
            return Err(SimError::invalid_request(format!(
                "tolerances must be positive, got rtol = {}, atol = {}",
                self.rtol, self.atol
            )));
        }
        Ok(())
    }

    /// Validate and build the run.
    pub fn prepare(&self) -> SimResult<PreparedThrow> {
        self.validate()?;
        let coefficients = self.disc.model()?;
        let environment = Environment::new(self.air_density, DEFAULT_GRAVITY, Vec3::new(0.0, 0.0, -1.0))?
            .with_wind(ConstantWind::from_speed_angle(self.wind_speed, self.wind_angle))
            .with_ground_play(self.ground_play);

        let initial = KinematicState::from_release(&self.release());
        let options = SolverOptions::default()
            .with_tolerances(self.rtol, self.atol)
            .with_max_step(max_step_for_spin(self.spin));

        Ok(PreparedThrow {
            simulator: FlightSimulator::new(coefficients, environment),
            initial,
            options,
            duration: self.flight_max_seconds.min(MAX_FLIGHT_SECONDS),
            phase_offset: self.gamma,
        })
    }
}

/// A validated throw ready to run.
#[derive(Debug, Clone)]
pub struct PreparedThrow {
    simulator: FlightSimulator,
    initial: KinematicState,
    options: SolverOptions,
    duration: f64,
    phase_offset: f64,
}

impl PreparedThrow {
    /// Simulator configured for the throw.
    pub fn simulator(&self) -> &FlightSimulator {
        &self.simulator
    }

    /// Release state.
    pub fn initial_state(&self) -> &KinematicState {
        &self.initial
    }

    /// Solver options, including the spin-derived step cap.
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Flight length after the ceiling (s).
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Offset added to reported spin phases.
    pub fn phase_offset(&self) -> f64 {
        self.phase_offset
    }

    /// Whole flight as a trajectory.
    pub fn trajectory(&self) -> SimResult<Trajectory> {
        self.simulator
            .compute_trajectory(&self.initial, Some((0.0, self.duration)), &self.options)
    }

    /// Whole flight as one boundary record.
    pub fn run(&self) -> SimResult<TrajectoryRecord> {
        Ok(self.trajectory()?.to_record(self.phase_offset))
    }

    /// Flight in one-second segments followed by a terminator.
    pub fn stream(&self) -> FlightStream {
        FlightStream::new(
            self.simulator.clone(),
            self.initial,
            self.duration,
            self.options,
            self.phase_offset,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamFrame;
    use approx::assert_relative_eq;

    #[test]
    fn test_decode_with_defaults() {
        let request = ThrowRequest::from_json(r#"{"disc": "wraith", "v": 24.0, "spin": -120.0}"#).unwrap();
        assert_eq!(request.disc, DiscSpec::Preset("wraith".to_string()));
        assert_eq!(request.z, 1.0);
        assert_eq!(request.rtol, REQUEST_RTOL);
        assert_eq!(request.atol, REQUEST_ATOL);
        assert_eq!(request.flight_max_seconds, MAX_FLIGHT_SECONDS);
        assert!(!request.ground_play);
    }

    #[test]
    fn test_decode_coefficient_overrides() {
        let request = ThrowRequest::from_json(r#"{"disc": {"PL0": 0.2, "CD0": 0.06}}"#).unwrap();
        let model = request.disc.model().unwrap();
        assert_eq!(model.get_value("PL0").unwrap(), 0.2);
        let alpha_0 = model.alpha_0();
        assert_relative_eq!(model.get_value("PD0").unwrap(), 0.06 - 1.9 * alpha_0 * alpha_0, epsilon = 1e-12);
    }

    #[test]
    fn test_malformed_and_invalid_requests() {
        assert!(matches!(ThrowRequest::from_json("{"), Err(SimError::InvalidRequest { .. })));
        assert!(matches!(
            ThrowRequest::from_json(r#"{"disc": "frisbee"}"#).unwrap().prepare(),
            Err(SimError::UnknownDisc { .. })
        ));
        let bad = ThrowRequest {
            v: f64::NAN,
            ..ThrowRequest::default()
        };
        assert!(matches!(bad.prepare(), Err(SimError::InvalidRequest { .. })));
        let bad = ThrowRequest {
            flight_max_seconds: 0.0,
            ..ThrowRequest::default()
        };
        assert!(matches!(bad.prepare(), Err(SimError::InvalidRequest { .. })));
        let bad = ThrowRequest {
            air_density: -1.0,
            ..ThrowRequest::default()
        };
        assert!(matches!(bad.prepare(), Err(SimError::InvalidEnvironment { .. })));
    }

    #[test]
    fn test_prepare_applies_ceiling_and_spin_step() {
        let request = ThrowRequest {
            spin: -150.0,
            flight_max_seconds: 40.0,
            ..ThrowRequest::default()
        };
        let prepared = request.prepare().unwrap();
        assert_eq!(prepared.duration(), MAX_FLIGHT_SECONDS);
        let max_step = prepared.options().max_step.unwrap();
        assert_relative_eq!(max_step, 0.45 / (150.0 / (2.0 * std::f64::consts::PI)));
        assert!(max_step < 0.1);
    }

    #[test]
    fn test_run_and_stream_agree() {
        let request = ThrowRequest {
            v: 20.0,
            spin: -100.0,
            gamma: 0.5,
            flight_max_seconds: 2.0,
            ..ThrowRequest::default()
        };
        let prepared = request.prepare().unwrap();
        let record = prepared.run().unwrap();
        assert_eq!(record.gamma[0], 0.5);
        assert_eq!(*record.t.last().unwrap(), 2.0);

        let frames: Vec<_> = prepared.stream().map(|f| f.unwrap()).collect();
        assert_eq!(frames.last(), Some(&StreamFrame::End));
        let streamed: usize = frames
            .into_iter()
            .map(|f| f.into_record().t.len())
            .sum();
        assert!(streamed > 0);
    }
}
