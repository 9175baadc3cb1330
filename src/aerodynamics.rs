//! Aerodynamic coefficient functions of a [`CoefficientModel`].
//!
//! Every function here is pure in `(coefficients, alpha)` or
//! `(coefficients, alpha, speed, spin)`. Angles are radians. The piecewise
//! branches are split at the named angles below; lift and drag are
//! continuous across each of them.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::coefficients::CoefficientModel;

/// Angle of attack at which the disc stalls nose-up.
pub const STALL_ANGLE: f64 = FRAC_PI_4;

/// Angle of attack at which the disc stalls nose-down (-40°).
pub const NEGATIVE_STALL_ANGLE: f64 = -40.0 * PI / 180.0;

/// Negative-side drag curvature relative to `PDa` (glide dependent).
pub const NEGATIVE_DRAG_FACTOR: f64 = 0.75;

/// Drag at 90° is this multiple of the drag at [`NOSE_UP_DRAG_REFERENCE`].
const FULL_NOSE_UP_DRAG_SCALE: f64 = 1.5;
const NOSE_UP_DRAG_REFERENCE: f64 = 40.0 * PI / 180.0;

/// Drag at -90° is this multiple of the drag at [`NOSE_DOWN_DRAG_REFERENCE`].
const FULL_NOSE_DOWN_DRAG_SCALE: f64 = FULL_NOSE_UP_DRAG_SCALE * NEGATIVE_DRAG_FACTOR;
const NOSE_DOWN_DRAG_REFERENCE: f64 = 30.0 * PI / 180.0;

/// Angle over which the underside cavity reduces the pitching moment.
pub const CAVITY_ANGLE: f64 = 0.28;

/// Below -30° the pitching moment blends linearly to zero at -90°.
const PITCH_REFLECT_LIMIT: f64 = 30.0 * PI / 180.0;
/// Past stall the pitching moment holds its value at 15°.
const PITCH_STALL_REFERENCE: f64 = 15.0 * PI / 180.0;
/// From 80° the pitching moment ramps to zero at 90°.
const PITCH_RAMP_START: f64 = 80.0 * PI / 180.0;

/// Below this air speed there is no side force.
pub const SIDE_FORCE_MIN_SPEED: f64 = 0.1;

/// Fold an angle of attack into `[-π/2, π/2]`.
///
/// The angle is wrapped into `[-π, π]` first, then values beyond ±π/2 are
/// reflected about ±π/2 (flying upside down looks like the mirrored angle).
pub fn normalize_alpha(alpha: f64) -> f64 {
    if !alpha.is_finite() {
        return alpha;
    }
    let mut alpha = alpha;
    if !(-PI..=PI).contains(&alpha) {
        alpha = (alpha + PI).rem_euclid(2.0 * PI) - PI;
    }
    if alpha > FRAC_PI_2 {
        PI - alpha
    } else if alpha < -FRAC_PI_2 {
        -PI - alpha
    } else {
        alpha
    }
}

impl CoefficientModel {
    /// Lift coefficient.
    ///
    /// Linear between 0 and stall. On the negative side a quadratic whose
    /// minimum sits at the negative stall angle; below it the angle is
    /// compressed toward the zero-lift angle. Past stall a linear tail
    /// falls to zero at 90°.
    pub fn lift_coefficient(&self, alpha: f64) -> f64 {
        let alpha = normalize_alpha(alpha);
        let (pl0, pla) = self.lift_terms();

        if alpha < 0.0 {
            let a = -pla / (2.0 * NEGATIVE_STALL_ANGLE);
            let x = if alpha < NEGATIVE_STALL_ANGLE {
                let scale = (self.alpha_0() - NEGATIVE_STALL_ANGLE) / (NEGATIVE_STALL_ANGLE + FRAC_PI_2);
                NEGATIVE_STALL_ANGLE - (NEGATIVE_STALL_ANGLE - alpha) * scale
            } else {
                alpha
            };
            a * x * x + pla * x + pl0
        } else if alpha < STALL_ANGLE {
            pl0 + pla * alpha
        } else {
            let prestall = pl0 + pla * STALL_ANGLE;
            prestall * (FRAC_PI_2 - alpha) / (FRAC_PI_2 - STALL_ANGLE)
        }
    }

    /// Drag coefficient.
    pub fn drag_coefficient(&self, alpha: f64) -> f64 {
        let alpha = normalize_alpha(alpha);

        if alpha < NEGATIVE_STALL_ANGLE {
            let prestall = self.quadratic_drag(NEGATIVE_STALL_ANGLE);
            let full_nose_down = FULL_NOSE_DOWN_DRAG_SCALE * self.quadratic_drag(NOSE_DOWN_DRAG_REFERENCE);
            let fraction = (NEGATIVE_STALL_ANGLE - alpha) / (NEGATIVE_STALL_ANGLE + FRAC_PI_2);
            prestall + fraction * (full_nose_down - prestall)
        } else if alpha <= STALL_ANGLE {
            self.quadratic_drag(alpha)
        } else {
            let prestall = self.quadratic_drag(STALL_ANGLE);
            let full_nose_up = FULL_NOSE_UP_DRAG_SCALE * self.quadratic_drag(NOSE_UP_DRAG_REFERENCE);
            let fraction = (alpha - STALL_ANGLE) / (FRAC_PI_2 - STALL_ANGLE);
            prestall + fraction * (full_nose_up - prestall)
        }
    }

    /// Pre-stall drag: quadratic in the distance from the zero-lift angle,
    /// shallower on the negative side.
    fn quadratic_drag(&self, alpha: f64) -> f64 {
        let (pd0, pda) = self.drag_terms();
        let delta = alpha - self.alpha_0();
        if delta < 0.0 {
            pd0 + NEGATIVE_DRAG_FACTOR * pda * delta * delta
        } else {
            pd0 + pda * delta * delta
        }
    }

    /// Pitching moment coefficient (turn and fade through precession).
    ///
    /// Negative angles mirror the positive side about `2·PTy0`; below -30°
    /// the mirrored value is blended linearly to zero at -90°.
    pub fn pitching_moment(&self, alpha: f64) -> f64 {
        let alpha = normalize_alpha(alpha);
        let (pty0, _, _) = self.pitch_terms();

        if alpha < -PITCH_REFLECT_LIMIT {
            let percent = (alpha + FRAC_PI_2) / (FRAC_PI_2 - PITCH_REFLECT_LIMIT);
            percent * (2.0 * pty0 - self.positive_pitching_moment(PITCH_REFLECT_LIMIT))
        } else if alpha < 0.0 {
            2.0 * pty0 - self.positive_pitching_moment(-alpha)
        } else {
            self.positive_pitching_moment(alpha)
        }
    }

    fn positive_pitching_moment(&self, alpha: f64) -> f64 {
        if alpha > PITCH_RAMP_START {
            let held = self.positive_pitching_moment(PITCH_STALL_REFERENCE);
            return (FRAC_PI_2 - alpha).to_degrees() * held / 10.0;
        }
        if alpha > STALL_ANGLE {
            return self.positive_pitching_moment(PITCH_STALL_REFERENCE);
        }

        let (pty0, ptya, cavity_factor) = self.pitch_terms();
        let cavity_scale = cavity_factor * 2.0 * CAVITY_ANGLE / PI;
        let cavity_adjust = if alpha <= CAVITY_ANGLE {
            -(PI * alpha / CAVITY_ANGLE / 2.0).sin() * ptya * cavity_scale
        } else {
            -ptya * cavity_scale
        };
        pty0 + ptya * alpha + cavity_adjust
    }

    /// Rolling moment coefficient.
    ///
    /// Reserved for advance-rate dependent effects; always zero for now.
    pub fn rolling_moment(&self, _alpha: f64, _speed: f64, _spin_rate: f64) -> f64 {
        0.0
    }

    /// Magnus side force coefficient.
    ///
    /// Zero outside the unstalled band and below [`SIDE_FORCE_MIN_SPEED`].
    /// Inside the band the coefficient is a zero placeholder until a
    /// spin-dependent formula is tuned against flight data.
    pub fn side_force_coefficient(&self, alpha: f64, speed: f64, _spin_rate: f64) -> f64 {
        if !(NEGATIVE_STALL_ANGLE..=STALL_ANGLE).contains(&alpha) {
            return 0.0;
        }
        if speed < SIDE_FORCE_MIN_SPEED {
            return 0.0;
        }
        0.0
    }
}
