//! Flight metrics derived from a computed trajectory.
//!
//! Velocities come straight from the integrated state; only the energy rate
//! is differentiated numerically.

use std::collections::HashMap;

use ndarray::{Array1, Zip};

use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::trajectory::{Column, Trajectory};
use crate::vector::Vec3;

/// Where and when the disc first comes down through `z = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landing {
    /// Time (s).
    pub t: f64,
    /// Downrange position (m).
    pub x: f64,
    /// Lateral position (m).
    pub y: f64,
}

/// Per-sample columns and scalar summaries of one flight.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightMetrics {
    /// Time (s)
    pub t: Array1<f64>,
    /// Downrange position (m)
    pub x: Array1<f64>,
    /// Lateral position (m)
    pub y: Array1<f64>,
    /// Altitude (m)
    pub z: Array1<f64>,
    /// Speed magnitude
    pub speed: Array1<f64>,
    /// Horizontal speed
    pub speed_xy: Array1<f64>,
    /// Kinetic energy per unit mass
    pub kinetic_energy: Array1<f64>,
    /// Potential energy per unit mass, zero at the origin
    pub potential_energy: Array1<f64>,
    /// Total energy per unit mass
    pub total_energy: Array1<f64>,
    /// Rate of change of the total energy
    pub energy_rate: Array1<f64>,
}

impl FlightMetrics {
    /// Compute metrics for a trajectory flown in `environment`.
    pub fn from_trajectory(trajectory: &Trajectory, environment: &Environment) -> SimResult<Self> {
        if trajectory.is_empty() {
            return Err(SimError::invalid_request("cannot compute metrics of an empty trajectory"));
        }

        let t = trajectory.column(Column::T);
        let x = trajectory.column(Column::X);
        let y = trajectory.column(Column::Y);
        let z = trajectory.column(Column::Z);
        let vx = trajectory.column(Column::Vx);
        let vy = trajectory.column(Column::Vy);
        let vz = trajectory.column(Column::Vz);

        let speed_xy = Zip::from(&vx).and(&vy).map_collect(|vx, vy| vx.hypot(*vy));
        let speed = Zip::from(&speed_xy).and(&vz).map_collect(|h, vz| h.hypot(*vz));
        let kinetic_energy = speed.mapv(|v| 0.5 * v * v);

        // work against gravity along its direction
        let down = environment.gravity_direction();
        let g = environment.g();
        let potential_energy = Zip::from(&x)
            .and(&y)
            .and(&z)
            .map_collect(|x, y, z| -g * down.dot(&Vec3::new(*x, *y, *z)));
        let total_energy = &kinetic_energy + &potential_energy;
        let energy_rate = gradient(&total_energy, &t);

        Ok(Self {
            t,
            x,
            y,
            z,
            speed,
            speed_xy,
            kinetic_energy,
            potential_energy,
            total_energy,
            energy_rate,
        })
    }

    /// Total flight time.
    pub fn flight_time(&self) -> f64 {
        last(&self.t) - self.t[0]
    }

    /// Straight-line horizontal distance from release to the last sample.
    pub fn horizontal_distance(&self) -> f64 {
        let dx = last(&self.x) - self.x[0];
        let dy = last(&self.y) - self.y[0];
        dx.hypot(dy)
    }

    /// Sideways displacement at the last sample (m); positive is left of a
    /// throw along +x.
    pub fn lateral_drift(&self) -> f64 {
        last(&self.y) - self.y[0]
    }

    /// Highest sampled altitude.
    pub fn max_height(&self) -> f64 {
        self.z.fold(f64::NEG_INFINITY, |a, b| a.max(*b))
    }

    /// Highest sampled speed.
    pub fn max_speed(&self) -> f64 {
        self.speed.fold(f64::NEG_INFINITY, |a, b| a.max(*b))
    }

    /// Mean sampled speed.
    pub fn mean_speed(&self) -> f64 {
        self.speed.mean().unwrap_or(0.0)
    }

    /// Peak kinetic energy per unit mass.
    pub fn peak_kinetic_energy(&self) -> f64 {
        self.kinetic_energy.fold(0.0, |a, b| a.max(*b))
    }

    /// Mean energy rate (W/kg); negative means dissipation.
    pub fn mean_energy_dissipation(&self) -> f64 {
        self.energy_rate.mean().unwrap_or(0.0)
    }

    /// First downward crossing of the ground plane, interpolated linearly
    /// between samples.
    pub fn landing(&self) -> Option<Landing> {
        (1..self.z.len()).find_map(|i| {
            let (z0, z1) = (self.z[i - 1], self.z[i]);
            if z0 > 0.0 && z1 <= 0.0 {
                let s = z0 / (z0 - z1);
                let lerp = |a: &Array1<f64>| a[i - 1] + s * (a[i] - a[i - 1]);
                Some(Landing {
                    t: lerp(&self.t),
                    x: lerp(&self.x),
                    y: lerp(&self.y),
                })
            } else {
                None
            }
        })
    }

    /// Summary statistics by name.
    pub fn summary(&self) -> HashMap<String, f64> {
        let mut summary = HashMap::new();
        summary.insert("n_points".to_string(), self.t.len() as f64);
        summary.insert("flight_time".to_string(), self.flight_time());
        summary.insert("horizontal_distance".to_string(), self.horizontal_distance());
        summary.insert("lateral_drift".to_string(), self.lateral_drift());
        summary.insert("max_height".to_string(), self.max_height());
        summary.insert("max_speed".to_string(), self.max_speed());
        summary.insert("mean_speed".to_string(), self.mean_speed());
        summary.insert("peak_kinetic_energy".to_string(), self.peak_kinetic_energy());
        summary.insert("mean_energy_dissipation".to_string(), self.mean_energy_dissipation());
        if let Some(landing) = self.landing() {
            summary.insert("landing_time".to_string(), landing.t);
            summary.insert("landing_x".to_string(), landing.x);
            summary.insert("landing_y".to_string(), landing.y);
        }
        summary
    }
}

fn last(values: &Array1<f64>) -> f64 {
    values[values.len() - 1]
}

/// Derivative of `values` over `t`: one-sided at the ends, averaged
/// neighbouring slopes inside.
fn gradient(values: &Array1<f64>, t: &Array1<f64>) -> Array1<f64> {
    let n = values.len();
    if n < 2 {
        return Array1::zeros(n);
    }
    let slope = |i: usize| (values[i + 1] - values[i]) / (t[i + 1] - t[i]);
    Array1::from_shape_fn(n, |i| {
        if i == 0 {
            slope(0)
        } else if i == n - 1 {
            slope(n - 2)
        } else {
            0.5 * (slope(i - 1) + slope(i))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::CoefficientModel;
    use crate::ode::SolverOptions;
    use crate::state::KinematicState;
    use crate::trajectory::{FlightSimulator, max_step_for_spin};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn projectile() -> (Trajectory, Environment) {
        let model = CoefficientModel::from_overrides([
            ("PL0", 0.0),
            ("PLa", 0.0),
            ("PD0", 0.0),
            ("PDa", 0.0),
            ("PTy0", 0.0),
            ("PTya", 0.0),
        ])
        .unwrap();
        let environment = Environment::default();
        let sim = FlightSimulator::new(model, environment.clone());
        let initial = KinematicState {
            velocity: Vec3::new(10.0, 1.0, 5.0),
            dgamma: 0.0,
            ..KinematicState::default()
        };
        let options = SolverOptions::default().with_tolerances(1e-10, 1e-12).with_max_step(0.05);
        let trajectory = sim.compute_trajectory(&initial, Some((0.0, 1.5)), &options).unwrap();
        (trajectory, environment)
    }

    #[test]
    fn test_gradient_of_linear_data() {
        let t = array![0.0, 0.1, 0.3, 0.6];
        let v = t.mapv(|t| 3.0 * t + 1.0);
        let d = gradient(&v, &t);
        for value in d.iter() {
            assert_relative_eq!(*value, 3.0, epsilon = 1e-12);
        }
        assert_eq!(gradient(&array![1.0], &array![0.0]).len(), 1);
    }

    #[test]
    fn test_projectile_conserves_energy() {
        let (trajectory, environment) = projectile();
        let metrics = FlightMetrics::from_trajectory(&trajectory, &environment).unwrap();

        let e0 = metrics.total_energy[0];
        assert_relative_eq!(e0, 0.5 * 126.0 + 9.81, epsilon = 1e-9);
        for e in metrics.total_energy.iter() {
            assert_relative_eq!(*e, e0, epsilon = 1e-6);
        }
        assert!(metrics.mean_energy_dissipation().abs() < 1e-4);
        assert_relative_eq!(metrics.max_height(), 1.0 + 25.0 / (2.0 * 9.81), epsilon = 5e-3);
        assert_relative_eq!(metrics.flight_time(), 1.5);
        assert_relative_eq!(metrics.lateral_drift(), 1.5, epsilon = 1e-8);
    }

    #[test]
    fn test_landing_is_interpolated() {
        let (trajectory, environment) = projectile();
        let metrics = FlightMetrics::from_trajectory(&trajectory, &environment).unwrap();

        // 1 + 5t - g t²/2 = 0
        let g: f64 = 9.81;
        let t_land = (5.0 + (25.0 + 2.0 * g).sqrt()) / g;
        let landing = metrics.landing().unwrap();
        assert_relative_eq!(landing.t, t_land, epsilon = 1e-3);
        assert_relative_eq!(landing.x, 10.0 * t_land, epsilon = 1e-2);
        assert_relative_eq!(landing.y, t_land, epsilon = 1e-3);

        let summary = metrics.summary();
        assert!(summary.contains_key("landing_time"));
        assert_eq!(summary["n_points"], trajectory.len() as f64);
    }

    #[test]
    fn test_default_throw_dissipates() {
        let sim = FlightSimulator::default();
        let initial = KinematicState {
            velocity: Vec3::new(20.0, 0.0, 2.0),
            dgamma: -100.0,
            ..KinematicState::default()
        };
        let options = SolverOptions::default().with_max_step(max_step_for_spin(-100.0));
        let trajectory = sim.compute_trajectory(&initial, Some((0.0, 2.0)), &options).unwrap();
        let metrics = FlightMetrics::from_trajectory(&trajectory, sim.environment()).unwrap();

        assert!(metrics.mean_energy_dissipation() < 0.0);
        assert!(metrics.horizontal_distance() > 20.0);
    }
}
