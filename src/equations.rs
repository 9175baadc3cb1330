//! Equations of motion of a spinning disc.
//!
//! One evaluation runs three stages, each producing an explicit record:
//! [`FrameQuantities`] (unit vectors and angle of attack), [`Forces`] and
//! [`Torques`]. The derivative vector is assembled from the last two.
//!
//! Body rates `dphi`/`dtheta` are measured about the plate axes `xhat`/`yhat`
//! turned by the spin phase `gamma`. The quaternion only follows the wobble;
//! spin is carried by `dgamma` and `gamma`.
//!
//! Pitching moment is applied as a direct torque on the transverse rates,
//! and precession comes out of the rigid-body coupling terms. There is no
//! separate gyroscopic shortcut for fast spin.

use crate::coefficients::CoefficientModel;
use crate::contact::{ContactGeometry, ContactModel, GroundReaction};
use crate::environment::Environment;
use crate::ode::OdeSystem;
use crate::state::{KinematicState, STATE_LEN, StateVector};
use crate::vector::{NORM_EPSILON, Quaternion, Vec3};

/// Spin damping while the rim is in the ground (1/s).
pub const GROUND_SPIN_DAMPING: f64 = 0.1;

/// Unit vectors and flow angles for one state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameQuantities {
    /// Plate axis turned by the spin phase.
    pub xhat: Vec3,
    /// Plate axis turned by the spin phase.
    pub yhat: Vec3,
    /// Plate normal, toward the top of the disc.
    pub zhat: Vec3,
    /// Direction of the air-relative velocity.
    pub vhat: Vec3,
    /// Leading edge direction: air velocity projected onto the plate.
    pub fhat: Vec3,
    /// Left edge direction, `zhat × fhat`.
    pub lhat: Vec3,
    /// Angle of attack (rad).
    pub angle_of_attack: f64,
    /// Transverse angular velocity in the world frame.
    pub wobble: Vec3,
    /// Wobble plus spin about `zhat`.
    pub angular_velocity: Vec3,
}

impl FrameQuantities {
    /// Derive the frame from attitude, air-relative velocity, body rates
    /// and spin phase.
    pub fn new(orientation: &Quaternion, air_velocity: &Vec3, rates: [f64; 3], gamma: f64) -> Self {
        let zhat = orientation.rotate(&Vec3::up());
        let vhat = air_velocity.normalized_or(Vec3::unit_x());

        let v_dot_zhat = air_velocity.dot(&zhat);
        let in_plane = air_velocity.sub(&zhat.mul(v_dot_zhat));
        let in_plane_speed = in_plane.magnitude();
        let (fhat, angle_of_attack) = if in_plane_speed > NORM_EPSILON {
            (in_plane.mul(1.0 / in_plane_speed), -(v_dot_zhat / in_plane_speed).atan())
        } else {
            (vhat, 0.0)
        };
        let lhat = zhat.cross(&fhat);

        let xhat = orientation.rotate(&Vec3::unit_x()).rotate_around(&zhat, gamma);
        let yhat = orientation.rotate(&Vec3::unit_y()).rotate_around(&zhat, gamma);

        let [dphi, dtheta, dgamma] = rates;
        let wobble = xhat.mul(dphi).add(&yhat.mul(dtheta));
        let angular_velocity = wobble.add(&zhat.mul(dgamma));

        Self {
            xhat,
            yhat,
            zhat,
            vhat,
            fhat,
            lhat,
            angle_of_attack,
            wobble,
            angular_velocity,
        }
    }
}

/// Angle of attack for an attitude and air-relative velocity.
pub fn angle_of_attack(orientation: &Quaternion, air_velocity: &Vec3) -> f64 {
    FrameQuantities::new(orientation, air_velocity, [0.0; 3], 0.0).angle_of_attack
}

/// Forces on the disc (N).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forces {
    /// Dynamic pressure times planform area.
    pub amplitude: f64,
    /// Lift, perpendicular to the air velocity.
    pub lift: Vec3,
    /// Drag, against the air velocity.
    pub drag: Vec3,
    /// Magnus side force along `lhat`.
    pub side: Vec3,
    /// Weight.
    pub gravity: Vec3,
    /// Ground reaction.
    pub ground: GroundReaction,
    /// Sum of all forces.
    pub total: Vec3,
    /// `total / mass`.
    pub acceleration: Vec3,
}

/// Torques and the resulting attitude and rate derivatives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Torques {
    /// Dynamic pressure times planform area times diameter.
    pub amplitude: f64,
    /// Pitching torque, about `-lhat`.
    pub pitching: Vec3,
    /// Rolling torque, about `fhat`.
    pub rolling: Vec3,
    /// Ground reaction torque.
    pub ground: Vec3,
    /// Attitude rate `½ (0, wobble) ⊗ q`.
    pub quaternion_rate: Quaternion,
    /// Derivatives of `[dphi, dtheta, dgamma]`.
    pub angular_acceleration: [f64; 3],
}

/// Every intermediate of one derivative evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Unit vectors and angle of attack.
    pub frame: FrameQuantities,
    /// Forces.
    pub forces: Forces,
    /// Torques.
    pub torques: Torques,
    /// State derivative in solver layout.
    pub derivative: StateVector,
}

/// Equations of motion for one disc in one environment.
#[derive(Debug, Clone, Copy)]
pub struct EquationsOfMotion<'a> {
    coefficients: &'a CoefficientModel,
    environment: &'a Environment,
    contact: &'a dyn ContactModel,
}

impl<'a> EquationsOfMotion<'a> {
    /// Bind coefficients, environment and contact response.
    pub fn new(coefficients: &'a CoefficientModel, environment: &'a Environment, contact: &'a dyn ContactModel) -> Self {
        Self {
            coefficients,
            environment,
            contact,
        }
    }

    /// Full evaluation at time `t`.
    pub fn evaluate(&self, t: f64, state: &KinematicState) -> Evaluation {
        let orientation = state.attitude();
        let wind = self.environment.wind_velocity(t, &state.position);
        let air_velocity = state.velocity.sub(&wind);

        let frame = FrameQuantities::new(&orientation, &air_velocity, state.body_rates(), state.gamma);
        let forces = self.forces(state, &air_velocity, &frame);
        let torques = self.torques(state, &orientation, &air_velocity, &frame, &forces);

        let v = state.velocity;
        let a = forces.acceleration;
        let dq = torques.quaternion_rate;
        let [ddphi, ddtheta, ddgamma] = torques.angular_acceleration;
        let derivative = [
            v.x, v.y, v.z, a.x, a.y, a.z, dq.x, dq.y, dq.z, dq.w, ddphi, ddtheta, ddgamma, state.dgamma,
        ];

        Evaluation {
            frame,
            forces,
            torques,
            derivative,
        }
    }

    fn forces(&self, state: &KinematicState, air_velocity: &Vec3, frame: &FrameQuantities) -> Forces {
        let model = self.coefficients;
        let aoa = frame.angle_of_attack;
        let speed = air_velocity.magnitude();
        let amplitude = 0.5 * self.environment.air_density() * air_velocity.magnitude_sq() * model.area();

        let lift_direction = frame.zhat.reject_from(&frame.vhat);
        let lift_direction = lift_direction.normalized().unwrap_or(lift_direction);

        let lift = lift_direction.mul(model.lift_coefficient(aoa) * amplitude);
        let drag = frame.vhat.neg().mul(model.drag_coefficient(aoa) * amplitude);
        let side = frame
            .lhat
            .mul(model.side_force_coefficient(aoa, speed, state.dgamma) * amplitude);
        let gravity = self.environment.gravity_force(model.mass());

        let ground = if self.environment.ground_play() {
            let geometry = ContactGeometry {
                position: state.position,
                velocity: state.velocity,
                zhat: frame.zhat,
                spin_rate: state.dgamma,
                angular_velocity: frame.angular_velocity,
            };
            self.contact.reaction(&geometry, model, self.environment.g())
        } else {
            GroundReaction::airborne(Vec3::zero())
        };

        let total = lift.add(&drag).add(&side).add(&gravity).add(&ground.force());
        Forces {
            amplitude,
            lift,
            drag,
            side,
            gravity,
            ground,
            total,
            acceleration: total.mul(1.0 / model.mass()),
        }
    }

    fn torques(
        &self,
        state: &KinematicState,
        orientation: &Quaternion,
        air_velocity: &Vec3,
        frame: &FrameQuantities,
        forces: &Forces,
    ) -> Torques {
        let model = self.coefficients;
        let aoa = frame.angle_of_attack;
        let amplitude = 0.5
            * self.environment.air_density()
            * air_velocity.magnitude_sq()
            * model.diameter()
            * model.area();

        let quaternion_rate = if frame.wobble.magnitude() < NORM_EPSILON {
            Quaternion::new(0.0, 0.0, 0.0, 0.0)
        } else {
            Quaternion::pure(&frame.wobble).mul(orientation).scale(0.5)
        };

        let i_xx = model.i_xx();
        let i_zz = model.i_zz();
        let [wx, wy, wz] = state.body_rates();

        // aerodynamic damping
        let mut acc = [
            wx * model.roll_damping() / i_xx * amplitude,
            wy * model.pitch_damping() / i_xx * amplitude,
            wz * model.spin_damping() / i_zz * amplitude,
        ];

        if forces.ground.in_contact() {
            acc[2] -= wz * GROUND_SPIN_DAMPING;
        }

        // rigid-body coupling of the transverse rates through the spin
        acc[0] += wy * wz * (i_xx - i_zz) / i_xx;
        acc[1] += wx * wz * (i_zz - i_xx) / i_xx;

        let ground = forces.ground.torque();
        acc[0] += ground.dot(&frame.xhat) / i_xx;
        acc[1] += ground.dot(&frame.yhat) / i_xx;
        acc[2] += ground.dot(&frame.zhat) / i_zz;

        let pitching = frame.lhat.mul(-model.pitching_moment(aoa) * amplitude);
        let rolling = frame
            .fhat
            .mul(model.rolling_moment(aoa, air_velocity.magnitude(), wz) * amplitude);
        for torque in [pitching, rolling] {
            acc[0] += torque.dot(&frame.xhat) / i_xx;
            acc[1] += torque.dot(&frame.yhat) / i_xx;
        }

        Torques {
            amplitude,
            pitching,
            rolling,
            ground,
            quaternion_rate,
            angular_acceleration: acc,
        }
    }
}

impl OdeSystem<STATE_LEN> for EquationsOfMotion<'_> {
    fn rhs(&self, t: f64, y: &StateVector) -> StateVector {
        self.evaluate(t, &KinematicState::from_array(y)).derivative
    }
}
