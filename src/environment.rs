//! Ambient conditions of a flight: air, gravity, wind and the ground.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EnvironmentSnapshot, SimError, SimResult};
use crate::vector::Vec3;

/// Sea-level air density at 15 °C (kg/m³).
pub const DEFAULT_AIR_DENSITY: f64 = 1.225;

/// Standard gravitational acceleration (m/s²).
pub const DEFAULT_GRAVITY: f64 = 9.81;

/// Source of wind velocity at a point in space and time.
///
/// Implementations must be pure functions of `(t, position)`; one field is
/// shared by every derivative evaluation of a run, and by concurrent runs.
pub trait WindField: fmt::Debug + Send + Sync {
    /// Wind velocity (m/s) at time `t` and world position `position`.
    fn velocity(&self, t: f64, position: &Vec3) -> Vec3;
}

/// Uniform, steady wind.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConstantWind {
    /// Wind velocity (m/s).
    pub velocity: Vec3,
}

impl ConstantWind {
    /// Wind with the given velocity.
    pub const fn new(velocity: Vec3) -> Self {
        Self { velocity }
    }

    /// Horizontal wind of `speed` m/s blowing toward `angle` radians from +x.
    ///
    /// For a throw along +x, `0` is a tail wind and `π/2` blows right to left.
    pub fn from_speed_angle(speed: f64, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(Vec3::new(cos * speed, sin * speed, 0.0))
    }
}

impl WindField for ConstantWind {
    fn velocity(&self, _t: f64, _position: &Vec3) -> Vec3 {
        self.velocity
    }
}

/// Immutable description of the flight environment.
#[derive(Debug, Clone)]
pub struct Environment {
    air_density: f64,
    g: f64,
    gravity_direction: Vec3,
    wind: Arc<dyn WindField>,
    ground_play: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            air_density: DEFAULT_AIR_DENSITY,
            g: DEFAULT_GRAVITY,
            gravity_direction: Vec3::new(0.0, 0.0, -1.0),
            wind: Arc::new(ConstantWind::default()),
            ground_play: false,
        }
    }
}

impl Environment {
    /// Environment without wind or ground contact.
    ///
    /// `gravity_direction` is normalized; a zero vector, a non-positive air
    /// density or a non-positive `g` is rejected.
    pub fn new(air_density: f64, g: f64, gravity_direction: Vec3) -> SimResult<Self> {
        if !(air_density.is_finite() && air_density > 0.0) {
            return Err(SimError::invalid_environment(format!(
                "air density must be positive, got {air_density}"
            )));
        }
        if !(g.is_finite() && g > 0.0) {
            return Err(SimError::invalid_environment(format!(
                "gravitational acceleration must be positive, got {g}"
            )));
        }
        let gravity_direction = gravity_direction
            .normalized()
            .filter(Vec3::is_finite)
            .ok_or_else(|| SimError::invalid_environment("gravity direction has zero length"))?;
        Ok(Self {
            air_density,
            g,
            gravity_direction,
            ..Self::default()
        })
    }

    /// Replace the wind field.
    pub fn with_wind(mut self, wind: impl WindField + 'static) -> Self {
        self.wind = Arc::new(wind);
        self
    }

    /// Replace the wind field with a shared one.
    pub fn with_shared_wind(mut self, wind: Arc<dyn WindField>) -> Self {
        self.wind = wind;
        self
    }

    /// Enable or disable ground contact forces.
    pub fn with_ground_play(mut self, enabled: bool) -> Self {
        self.ground_play = enabled;
        self
    }

    /// Air density (kg/m³).
    pub fn air_density(&self) -> f64 {
        self.air_density
    }

    /// Gravitational acceleration magnitude (m/s²).
    pub fn g(&self) -> f64 {
        self.g
    }

    /// Unit vector along gravity.
    pub fn gravity_direction(&self) -> Vec3 {
        self.gravity_direction
    }

    /// Whether ground contact is simulated.
    pub fn ground_play(&self) -> bool {
        self.ground_play
    }

    /// Wind velocity at `(t, position)`.
    pub fn wind_velocity(&self, t: f64, position: &Vec3) -> Vec3 {
        self.wind.velocity(t, position)
    }

    /// Gravity force on a body of mass `mass`.
    pub fn gravity_force(&self, mass: f64) -> Vec3 {
        self.gravity_direction.mul(mass * self.g)
    }

    /// Serializable summary, with the wind sampled at `(t, position)`.
    pub fn snapshot(&self, t: f64, position: &Vec3) -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            air_density: self.air_density,
            g: self.g,
            gravity_direction: self.gravity_direction.to_array(),
            wind_at_release: self.wind_velocity(t, position).to_array(),
            ground_play: self.ground_play,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts;

    /// Wind growing linearly with height and time.
    #[derive(Debug)]
    struct ShearWind;

    impl WindField for ShearWind {
        fn velocity(&self, t: f64, position: &Vec3) -> Vec3 {
            Vec3::new(position.z * 2.0 + t, 0.0, 0.0)
        }
    }

    #[test]
    fn test_defaults() {
        let env = Environment::default();
        assert_eq!(env.air_density(), 1.225);
        assert_eq!(env.g(), 9.81);
        assert_eq!(env.gravity_direction(), Vec3::new(0.0, 0.0, -1.0));
        assert!(!env.ground_play());
        assert_eq!(env.wind_velocity(3.0, &Vec3::new(5.0, 1.0, 2.0)), Vec3::zero());
    }

    #[test]
    fn test_gravity_direction_is_normalized() {
        let env = Environment::new(1.0, 9.81, Vec3::new(0.0, 0.0, -4.0)).unwrap();
        assert_relative_eq!(env.gravity_direction().magnitude(), 1.0);
        let force = env.gravity_force(0.175);
        assert_relative_eq!(force.z, -0.175 * 9.81);
    }

    #[test]
    fn test_invalid_environment() {
        assert!(Environment::new(1.225, 9.81, Vec3::zero()).is_err());
        assert!(Environment::new(0.0, 9.81, Vec3::up()).is_err());
        assert!(Environment::new(1.225, -1.0, Vec3::up()).is_err());
        assert!(Environment::new(f64::NAN, 9.81, Vec3::up()).is_err());
    }

    #[test]
    fn test_constant_wind_from_speed_angle() {
        let tail = ConstantWind::from_speed_angle(3.0, 0.0);
        assert_relative_eq!(tail.velocity.x, 3.0);
        let cross = ConstantWind::from_speed_angle(2.0, consts::FRAC_PI_2);
        assert_relative_eq!(cross.velocity.x, 0.0, epsilon = 1e-15);
        assert_relative_eq!(cross.velocity.y, 2.0);
    }

    #[test]
    fn test_wind_field_sees_time_and_position() {
        let env = Environment::default().with_wind(ShearWind);
        let v = env.wind_velocity(1.0, &Vec3::new(0.0, 0.0, 1.5));
        assert_relative_eq!(v.x, 4.0);
        let snapshot = env.snapshot(0.0, &Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(snapshot.wind_at_release, [2.0, 0.0, 0.0]);
    }
}
