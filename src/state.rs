//! The integrated state of a disc and its construction from release inputs.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::vector::{Quaternion, Vec3};

/// Number of scalars in the integrated state.
pub const STATE_LEN: usize = 14;

/// Flat state layout shared with the solver:
/// `[x, y, z, vx, vy, vz, qx, qy, qz, qw, dphi, dtheta, dgamma, gamma]`.
pub type StateVector = [f64; STATE_LEN];

/// Position, velocity, attitude and body rates of the disc.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    /// World position (m).
    pub position: Vec3,
    /// World velocity (m/s).
    pub velocity: Vec3,
    /// Attitude of the flight plate.
    pub orientation: Quaternion,
    /// Roll rate about the body x axis (rad/s).
    pub dphi: f64,
    /// Pitch rate about the body y axis (rad/s).
    pub dtheta: f64,
    /// Spin rate about the body z axis (rad/s). Negative is clockwise seen
    /// from above.
    pub dgamma: f64,
    /// Accumulated spin phase (rad), for output only.
    pub gamma: f64,
}

impl Default for KinematicState {
    /// One metre up, 10 m/s along +x, level, spinning at about 10 rev/s.
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 1.0),
            velocity: Vec3::new(10.0, 0.0, 0.0),
            orientation: Quaternion::identity(),
            dphi: 0.0,
            dtheta: 0.0,
            dgamma: 62.0,
            gamma: 0.0,
        }
    }
}

impl KinematicState {
    /// Flatten into the solver layout.
    pub fn to_array(&self) -> StateVector {
        let [qx, qy, qz, qw] = self.orientation.to_xyzw();
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.velocity.x,
            self.velocity.y,
            self.velocity.z,
            qx,
            qy,
            qz,
            qw,
            self.dphi,
            self.dtheta,
            self.dgamma,
            self.gamma,
        ]
    }

    /// Rebuild from the solver layout. The quaternion is kept as stored so
    /// a round trip is exact; use [`KinematicState::attitude`] for a unit
    /// rotation.
    pub fn from_array(y: &StateVector) -> Self {
        Self {
            position: Vec3::new(y[0], y[1], y[2]),
            velocity: Vec3::new(y[3], y[4], y[5]),
            orientation: Quaternion::from_xyzw([y[6], y[7], y[8], y[9]]),
            dphi: y[10],
            dtheta: y[11],
            dgamma: y[12],
            gamma: y[13],
        }
    }

    /// Orientation as a unit rotation; degenerate quaternions become the
    /// identity.
    pub fn attitude(&self) -> Quaternion {
        self.orientation.normalized_or_identity()
    }

    /// Inertial speed (m/s).
    pub fn speed(&self) -> f64 {
        self.velocity.magnitude()
    }

    /// Spin frequency (Hz).
    pub fn spin_frequency(&self) -> f64 {
        self.dgamma.abs() / (2.0 * PI)
    }

    /// Body rates `[dphi, dtheta, dgamma]`.
    pub fn body_rates(&self) -> [f64; 3] {
        [self.dphi, self.dtheta, self.dgamma]
    }

    /// Build the release state of a throw.
    pub fn from_release(release: &ReleaseConditions) -> Self {
        let uphill = release.uphill_degrees.to_radians();
        let velocity = Vec3::new(uphill.cos() * release.speed, 0.0, uphill.sin() * release.speed);
        Self {
            position: Vec3::new(0.0, 0.0, release.z),
            velocity,
            orientation: release_orientation(&velocity, release.spin, release.hyzer_degrees, release.nose_up_degrees),
            dphi: release.wx,
            dtheta: release.wy,
            dgamma: release.spin,
            gamma: 0.0,
        }
    }
}

/// Release attitude from launch velocity and tilt angles in degrees.
///
/// Composed as `Ry(downhill) · Rx(anhyzer) · Ry(nose_down)` where
/// `downhill = atan2(-vz, vx)`, `anhyzer = hyzer · sign(spin)` and
/// `nose_down = -nose_up`. The order matters: roll is applied about the
/// launch direction, pitch about the tilted plate.
pub fn release_orientation(velocity: &Vec3, spin: f64, hyzer_degrees: f64, nose_up_degrees: f64) -> Quaternion {
    let downhill = (-velocity.z).atan2(velocity.x);
    let anhyzer = hyzer_degrees.to_radians() * 1f64.copysign(spin);
    let nose_down = -nose_up_degrees.to_radians();
    Quaternion::about_y(downhill)
        .mul(&Quaternion::about_x(anhyzer))
        .mul(&Quaternion::about_y(nose_down))
}

/// Release kinematics of a throw, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConditions {
    /// Launch speed (m/s).
    pub speed: f64,
    /// Spin rate (rad/s); negative is clockwise seen from above.
    pub spin: f64,
    /// Launch angle above horizontal.
    pub uphill_degrees: f64,
    /// Roll toward the spin side; flipped with the spin direction.
    pub hyzer_degrees: f64,
    /// Leading edge above the launch direction.
    pub nose_up_degrees: f64,
    /// Release height (m).
    pub z: f64,
    /// Initial roll rate (rad/s).
    pub wx: f64,
    /// Initial pitch rate (rad/s).
    pub wy: f64,
}

impl Default for ReleaseConditions {
    fn default() -> Self {
        Self {
            speed: 10.0,
            spin: 62.0,
            uphill_degrees: 0.0,
            hyzer_degrees: 0.0,
            nose_up_degrees: 0.0,
            z: 1.0,
            wx: 0.0,
            wy: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_array_round_trip_is_exact() {
        let state = KinematicState {
            position: Vec3::new(1.5, -2.0, 0.75),
            velocity: Vec3::new(20.0, 0.3, -1.1),
            orientation: Quaternion::from_xyzw([0.01, 0.2, -0.03, 0.97]),
            dphi: 0.4,
            dtheta: -0.2,
            dgamma: -120.0,
            gamma: 33.0,
        };
        assert_eq!(KinematicState::from_array(&state.to_array()), state);
    }

    #[test]
    fn test_degenerate_attitude_is_identity() {
        let state = KinematicState {
            orientation: Quaternion::new(0.0, 0.0, 0.0, 0.0),
            ..KinematicState::default()
        };
        assert_eq!(state.attitude(), Quaternion::identity());
    }

    #[test]
    fn test_default_state() {
        let state = KinematicState::default();
        assert_eq!(state.position.z, 1.0);
        assert_eq!(state.speed(), 10.0);
        assert_relative_eq!(state.spin_frequency(), 62.0 / (2.0 * PI));
    }

    #[test]
    fn test_release_round_trip_recovers_angles() {
        let release = ReleaseConditions {
            speed: 20.0,
            spin: -100.0,
            uphill_degrees: 15.0,
            hyzer_degrees: 5.0,
            nose_up_degrees: 2.0,
            ..ReleaseConditions::default()
        };
        let state = KinematicState::from_release(&release);
        let downhill = (-15.0f64).to_radians();
        let anhyzer = (-5.0f64).to_radians();
        let nose_down = (-2.0f64).to_radians();

        let expected = Quaternion::about_y(downhill)
            .mul(&Quaternion::about_x(anhyzer))
            .mul(&Quaternion::about_y(nose_down));
        let q = state.orientation;
        assert_relative_eq!(q.w, expected.w, epsilon = 1e-12);
        assert_relative_eq!(q.x, expected.x, epsilon = 1e-12);
        assert_relative_eq!(q.y, expected.y, epsilon = 1e-12);
        assert_relative_eq!(q.z, expected.z, epsilon = 1e-12);

        // Geometric decomposition: tilt of the plate normal relative to the
        // launch direction, then roll relative to the vertical plane.
        let plus_z = Vec3::up();
        let mut disc_normal = q.rotate(&plus_z);
        let end_direction = Vec3::new(downhill.cos(), 0.0, -downhill.sin());
        let dot = disc_normal.dot(&end_direction);
        let computed_nose = PI / 2.0 - dot.acos();
        disc_normal = disc_normal.sub(&end_direction.mul(dot)).normalized().unwrap();
        let full_hyzer = plus_z.cross(&end_direction).normalized().unwrap();
        let computed_anhyzer = PI / 2.0 - (-disc_normal.dot(&full_hyzer)).acos();

        assert_relative_eq!(computed_nose, nose_down, epsilon = 1e-7);
        assert_relative_eq!(computed_anhyzer, anhyzer, epsilon = 1e-7);
    }

    #[test]
    fn test_hyzer_sign_follows_spin() {
        let velocity = Vec3::new(20.0, 0.0, 0.0);
        let clockwise = release_orientation(&velocity, -50.0, 10.0, 0.0);
        let counter = release_orientation(&velocity, 50.0, 10.0, 0.0);
        let (phi_cw, _) = clockwise.roll_pitch();
        let (phi_ccw, _) = counter.roll_pitch();
        assert_relative_eq!(phi_cw, -phi_ccw, epsilon = 1e-12);
        assert_relative_eq!(phi_ccw, 10f64.to_radians(), epsilon = 1e-12);
    }
}
