//! Objectives comparing a simulated flight with an observed one.
//!
//! These are the black-box objectives a coefficient or release search
//! minimizes. The simulated positions are interpolated linearly at the
//! observed times; observations outside the simulated span are compared with
//! the nearest end sample.

use ndarray::Array1;

use crate::error::{SimError, SimResult};
use crate::trajectory::Trajectory;
use crate::vector::Vec3;

/// One tracked position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedSample {
    /// Time (s).
    pub t: f64,
    /// Tracked position (m).
    pub position: Vec3,
}

/// A tracked flight with strictly increasing times.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedFlight {
    samples: Vec<ObservedSample>,
}

impl ObservedFlight {
    /// Validate and wrap tracked samples.
    pub fn new(samples: Vec<ObservedSample>) -> SimResult<Self> {
        if samples.is_empty() {
            return Err(SimError::invalid_request("observed flight has no samples"));
        }
        if samples
            .iter()
            .any(|s| !s.t.is_finite() || !s.position.is_finite())
        {
            return Err(SimError::invalid_request("observed flight contains non-finite values"));
        }
        if samples.windows(2).any(|w| w[1].t <= w[0].t) {
            return Err(SimError::invalid_request("observed times must be strictly increasing"));
        }
        Ok(Self { samples })
    }

    /// Build from parallel columns.
    pub fn from_columns(t: &[f64], x: &[f64], y: &[f64], z: &[f64]) -> SimResult<Self> {
        if t.len() != x.len() || t.len() != y.len() || t.len() != z.len() {
            return Err(SimError::invalid_request("all observed columns must have the same length"));
        }
        let samples = t
            .iter()
            .zip(x.iter().zip(y.iter().zip(z)))
            .map(|(t, (x, (y, z)))| ObservedSample {
                t: *t,
                position: Vec3::new(*x, *y, *z),
            })
            .collect();
        Self::new(samples)
    }

    /// Samples in time order.
    pub fn samples(&self) -> &[ObservedSample] {
        &self.samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false for a validated flight.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Simulated position at time `t`, interpolated linearly between samples.
pub fn position_at(trajectory: &Trajectory, t: f64) -> Option<Vec3> {
    let samples = trajectory.samples();
    let first = samples.first()?;
    let last = samples.last()?;
    if t <= first.t {
        return Some(first.state.position);
    }
    if t >= last.t {
        return Some(last.state.position);
    }
    let i = samples.partition_point(|s| s.t <= t);
    let (a, b) = (&samples[i - 1], &samples[i]);
    let s = (t - a.t) / (b.t - a.t);
    let pa = a.state.position;
    Some(pa.add(&b.state.position.sub(&pa).mul(s)))
}

/// Position error (m) at every observed time.
pub fn residuals(simulated: &Trajectory, observed: &ObservedFlight) -> SimResult<Array1<f64>> {
    observed
        .samples()
        .iter()
        .map(|o| {
            position_at(simulated, o.t)
                .map(|p| p.sub(&o.position).magnitude())
                .ok_or_else(|| SimError::invalid_request("simulated trajectory is empty"))
        })
        .collect::<SimResult<Vec<f64>>>()
        .map(Array1::from)
}

/// Scalar mismatch between a simulated and an observed flight.
pub trait LossFunction {
    /// Loss of `simulated` against `observed`.
    fn compute_loss(&self, simulated: &Trajectory, observed: &ObservedFlight) -> SimResult<f64>;

    /// Loss scaled by `weight`, for balancing several tracks.
    fn compute_weighted_loss(&self, simulated: &Trajectory, observed: &ObservedFlight, weight: f64) -> SimResult<f64> {
        Ok(self.compute_loss(simulated, observed)? * weight)
    }
}

/// Root mean square position error.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RmseLoss;

impl LossFunction for RmseLoss {
    fn compute_loss(&self, simulated: &Trajectory, observed: &ObservedFlight) -> SimResult<f64> {
        let r = residuals(simulated, observed)?;
        Ok(r.mapv(|e| e * e).mean().unwrap_or(0.0).sqrt())
    }
}

/// Largest position error.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaxErrorLoss;

impl LossFunction for MaxErrorLoss {
    fn compute_loss(&self, simulated: &Trajectory, observed: &ObservedFlight) -> SimResult<f64> {
        let r = residuals(simulated, observed)?;
        Ok(r.fold(0.0, |a, b| a.max(*b)))
    }
}

/// Mean Huber loss of the position errors: quadratic up to `delta`, linear
/// beyond.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HuberLoss {
    /// Error (m) where the loss turns linear.
    pub delta: f64,
}

impl Default for HuberLoss {
    fn default() -> Self {
        Self { delta: 1.0 }
    }
}

impl HuberLoss {
    /// Huber loss with the given threshold.
    pub fn new(delta: f64) -> Self {
        Self { delta }
    }
}

impl LossFunction for HuberLoss {
    fn compute_loss(&self, simulated: &Trajectory, observed: &ObservedFlight) -> SimResult<f64> {
        let delta = self.delta;
        let r = residuals(simulated, observed)?;
        let losses = r.mapv(|e| if e <= delta { 0.5 * e * e } else { delta * (e - 0.5 * delta) });
        Ok(losses.mean().unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ode::SolverOptions;
    use crate::state::KinematicState;
    use crate::trajectory::FlightSimulator;
    use approx::assert_relative_eq;

    fn simulated() -> Trajectory {
        let initial = KinematicState {
            velocity: Vec3::new(20.0, 0.0, 1.0),
            dgamma: -100.0,
            ..KinematicState::default()
        };
        FlightSimulator::default()
            .compute_trajectory(&initial, Some((0.0, 1.0)), &SolverOptions::default().with_max_step(0.02))
            .unwrap()
    }

    fn observed_from(trajectory: &Trajectory, shift: Vec3) -> ObservedFlight {
        let samples = (0..=10)
            .map(|i| {
                let t = i as f64 * 0.1;
                ObservedSample {
                    t,
                    position: position_at(trajectory, t).unwrap().add(&shift),
                }
            })
            .collect();
        ObservedFlight::new(samples).unwrap()
    }

    #[test]
    fn test_position_at_interpolates_and_clamps() {
        let trajectory = simulated();
        let first = trajectory.first().unwrap();
        let last = trajectory.last().unwrap();
        assert_eq!(position_at(&trajectory, -1.0), Some(first.state.position));
        assert_eq!(position_at(&trajectory, 5.0), Some(last.state.position));

        let samples = trajectory.samples();
        let (a, b) = (&samples[3], &samples[4]);
        let mid = position_at(&trajectory, 0.5 * (a.t + b.t)).unwrap();
        assert_relative_eq!(mid.x, 0.5 * (a.state.position.x + b.state.position.x), epsilon = 1e-12);
    }

    #[test]
    fn test_losses_of_exact_match_are_zero() {
        let trajectory = simulated();
        let observed = observed_from(&trajectory, Vec3::zero());
        assert_relative_eq!(RmseLoss.compute_loss(&trajectory, &observed).unwrap(), 0.0);
        assert_relative_eq!(MaxErrorLoss.compute_loss(&trajectory, &observed).unwrap(), 0.0);
        assert_relative_eq!(HuberLoss::default().compute_loss(&trajectory, &observed).unwrap(), 0.0);
    }

    #[test]
    fn test_constant_offset() {
        let trajectory = simulated();
        let observed = observed_from(&trajectory, Vec3::new(0.0, 3.0, 4.0));
        assert_relative_eq!(RmseLoss.compute_loss(&trajectory, &observed).unwrap(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(MaxErrorLoss.compute_loss(&trajectory, &observed).unwrap(), 5.0, epsilon = 1e-9);
        // linear branch: delta * (e - delta / 2)
        assert_relative_eq!(
            HuberLoss::new(2.0).compute_loss(&trajectory, &observed).unwrap(),
            2.0 * (5.0 - 1.0),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            RmseLoss.compute_weighted_loss(&trajectory, &observed, 0.5).unwrap(),
            2.5,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_invalid_observations() {
        assert!(ObservedFlight::new(Vec::new()).is_err());
        assert!(ObservedFlight::from_columns(&[0.0, 0.1], &[0.0], &[0.0, 0.0], &[0.0, 0.0]).is_err());
        assert!(ObservedFlight::from_columns(&[0.1, 0.1], &[0.0, 1.0], &[0.0, 0.0], &[0.0, 0.0]).is_err());
        assert!(ObservedFlight::from_columns(&[0.0, 0.1], &[0.0, f64::NAN], &[0.0, 0.0], &[0.0, 0.0]).is_err());
        let observed = ObservedFlight::from_columns(&[0.0, 0.1], &[0.0, 1.0], &[0.0, 0.0], &[1.0, 1.0]).unwrap();
        assert_eq!(observed.len(), 2);
    }
}
