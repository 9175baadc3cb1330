//! Ground contact response.
//!
//! The ground is the plane `z = 0`. A [`ContactModel`] turns the disc pose
//! into a reaction force at the lowest point of the rim. Only the
//! spring-drag response is implemented; its rolling regime is detected and
//! reported but not yet applied.

use std::fmt;

use crate::coefficients::CoefficientModel;
use crate::vector::Vec3;

/// Height of the ground plane (m).
pub const GROUND_HEIGHT: f64 = 0.0;

/// Kinematics of the disc relevant to contact.
#[derive(Debug, Clone, Copy)]
pub struct ContactGeometry {
    /// Centre of mass position.
    pub position: Vec3,
    /// Centre of mass velocity.
    pub velocity: Vec3,
    /// Plate normal.
    pub zhat: Vec3,
    /// Spin rate about `zhat` (rad/s).
    pub spin_rate: f64,
    /// Full angular velocity in the world frame.
    pub angular_velocity: Vec3,
}

/// Contact state classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactRegime {
    /// Rim above the ground.
    Airborne,
    /// Rim in the ground and sliding.
    Sliding,
    /// Rim in the ground and nearly stationary. The energies are computed
    /// for a rolling friction model that is not applied yet; the sliding
    /// force is used unchanged.
    Rolling {
        /// Rotational kinetic energy about the spin axis (J).
        spin_energy: f64,
        /// Translational kinetic energy (J).
        translational_energy: f64,
    },
}

/// Ground reaction at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundReaction {
    /// Spring (normal) part of the force.
    pub spring: Vec3,
    /// Friction part of the force.
    pub friction: Vec3,
    /// Lowest rim point relative to the centre of mass.
    pub contact_point: Vec3,
    /// Contact classification.
    pub regime: ContactRegime,
}

impl GroundReaction {
    /// No contact, with the rim point still reported.
    pub fn airborne(contact_point: Vec3) -> Self {
        Self {
            spring: Vec3::zero(),
            friction: Vec3::zero(),
            contact_point,
            regime: ContactRegime::Airborne,
        }
    }

    /// Total reaction force.
    pub fn force(&self) -> Vec3 {
        self.spring.add(&self.friction)
    }

    /// Torque of the reaction about the centre of mass.
    pub fn torque(&self) -> Vec3 {
        self.contact_point.cross(&self.force())
    }

    /// Whether the ground pushes on the disc.
    pub fn in_contact(&self) -> bool {
        self.force().magnitude_sq() > 0.0
    }
}

/// Strategy computing the ground reaction.
pub trait ContactModel: fmt::Debug + Send + Sync {
    /// Reaction for the given pose under gravity `g`.
    fn reaction(&self, geometry: &ContactGeometry, coefficients: &CoefficientModel, g: f64) -> GroundReaction;
}

/// Penalty spring along +z plus Coulomb-like friction at the rim.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringDragContact {
    /// Normal force per metre of penetration, in multiples of the disc weight.
    pub stiffness: f64,
    /// Friction coefficient against the normal force.
    pub friction: f64,
    /// Depth of the rim edge below the centre plane (m).
    pub edge_depth: f64,
    /// Horizontal rim speed below which contact counts as rolling (m/s).
    pub rolling_speed: f64,
}

impl Default for SpringDragContact {
    fn default() -> Self {
        Self {
            stiffness: 100.0,
            friction: 0.5,
            edge_depth: 0.003,
            rolling_speed: 0.25,
        }
    }
}

impl SpringDragContact {
    /// Lowest rim point relative to the centre for a plate with normal `zhat`.
    /// A level plate has no unique lowest point; the centre is used.
    pub fn lowest_point(&self, zhat: &Vec3, diameter: f64) -> Vec3 {
        match Vec3::up().reject_from(zhat).normalized() {
            Some(uphill) => uphill
                .neg()
                .mul(diameter / 2.0)
                .add(&zhat.mul(-self.edge_depth)),
            None => Vec3::zero(),
        }
    }
}

impl ContactModel for SpringDragContact {
    fn reaction(&self, geometry: &ContactGeometry, coefficients: &CoefficientModel, g: f64) -> GroundReaction {
        let up = Vec3::up();
        let contact_point = self.lowest_point(&geometry.zhat, coefficients.diameter());
        let edge_height = geometry.position.add(&contact_point).z - GROUND_HEIGHT;
        if edge_height >= 0.0 {
            return GroundReaction::airborne(contact_point);
        }

        let normal = coefficients.mass() * self.stiffness * -edge_height * g;
        let spring = up.mul(normal);

        let edge_velocity = geometry
            .velocity
            .add(&geometry.zhat.mul(geometry.spin_rate).cross(&contact_point));
        let horizontal = edge_velocity.reject_from(&up);
        let mut drag_direction = horizontal.neg();
        let drag_speed = drag_direction.magnitude();
        if drag_speed > 1.0 {
            drag_direction = drag_direction.mul(1.0 / drag_speed);
        }
        let friction = drag_direction.mul(normal * self.friction);

        let regime = if horizontal.magnitude() < self.rolling_speed {
            ContactRegime::Rolling {
                spin_energy: 0.5 * geometry.angular_velocity.magnitude_sq() * coefficients.i_zz(),
                translational_energy: 0.5 * geometry.velocity.magnitude_sq() * coefficients.mass(),
            }
        } else {
            ContactRegime::Sliding
        };

        GroundReaction {
            spring,
            friction,
            contact_point,
            regime,
        }
    }
}
