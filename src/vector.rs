//! 3D vector and quaternion types for rigid-body flight calculations.
//!
//! Conventions: right-handed world frame with `+z` up. Quaternions are unit
//! Hamilton quaternions; `a.mul(&b)` applies `b` first, then `a`, and
//! [`Quaternion::rotate`] computes `q v q*`.

use serde::{Deserialize, Serialize};

/// Spacing of `f64` values at 1.0. Norms below this are treated as zero.
pub const NORM_EPSILON: f64 = f64::EPSILON;

/// 3D vector with utility methods for flight computations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
    /// Z component
    pub z: f64,
}

impl Vec3 {
    /// Creates a new vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector.
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Unit vector in X direction.
    pub const fn unit_x() -> Self {
        Self { x: 1.0, y: 0.0, z: 0.0 }
    }

    /// Unit vector in Y direction.
    pub const fn unit_y() -> Self {
        Self { x: 0.0, y: 1.0, z: 0.0 }
    }

    /// Unit vector in Z direction (up).
    pub const fn up() -> Self {
        Self { x: 0.0, y: 0.0, z: 1.0 }
    }

    /// Magnitude (length) of the vector.
    #[inline(always)]
    pub fn magnitude(&self) -> f64 {
        self.magnitude_sq().sqrt()
    }

    /// Squared magnitude (avoids sqrt, cheaper for comparisons).
    #[inline(always)]
    pub fn magnitude_sq(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Normalized vector, or `None` when the magnitude is negligible.
    pub fn normalized(&self) -> Option<Self> {
        let mag = self.magnitude();
        if mag <= NORM_EPSILON {
            None
        } else {
            Some(self.mul(1.0 / mag))
        }
    }

    /// Normalized vector, or `fallback` when the magnitude is negligible.
    pub fn normalized_or(&self, fallback: Self) -> Self {
        self.normalized().unwrap_or(fallback)
    }

    /// Dot product.
    #[inline(always)]
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product: self × other
    #[inline(always)]
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Element-wise addition.
    #[inline(always)]
    pub fn add(&self, other: &Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Element-wise subtraction.
    #[inline(always)]
    pub fn sub(&self, other: &Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Scalar multiplication.
    #[inline(always)]
    pub fn mul(&self, scalar: f64) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }

    /// Negated vector.
    #[inline(always)]
    pub fn neg(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }

    /// Component of `self` perpendicular to the unit vector `axis`.
    pub fn reject_from(&self, axis: &Self) -> Self {
        self.sub(&axis.mul(self.dot(axis)))
    }

    /// Rodrigues rotation: rotate around `axis` by angle `theta`.
    /// Returns `self` unchanged when the axis is degenerate.
    pub fn rotate_around(&self, axis: &Self, theta: f64) -> Self {
        let Some(k) = axis.normalized() else {
            return *self;
        };
        let (sin_theta, cos_theta) = theta.sin_cos();
        self.mul(cos_theta)
            .add(&k.cross(self).mul(sin_theta))
            .add(&k.mul(k.dot(self) * (1.0 - cos_theta)))
    }

    /// Angle between two vectors (in radians).
    /// Returns 0.0 if either vector has zero magnitude.
    pub fn angle_between(&self, other: &Self) -> f64 {
        let mag_self = self.magnitude();
        let mag_other = other.magnitude();
        if mag_self <= NORM_EPSILON || mag_other <= NORM_EPSILON {
            return 0.0;
        }
        let dot = self.dot(other) / (mag_self * mag_other);
        dot.clamp(-1.0, 1.0).acos()
    }

    /// Whether every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Convert to array.
    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Convert from array.
    pub fn from_array(arr: &[f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }
}

/// Quaternion for 3D rotations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    /// Scalar part
    pub w: f64,
    /// Vector part, x
    pub x: f64,
    /// Vector part, y
    pub y: f64,
    /// Vector part, z
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Creates a new quaternion.
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Identity quaternion (no rotation).
    pub const fn identity() -> Self {
        Self { w: 1.0, x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Builds a quaternion from scalar-last components `[x, y, z, w]`.
    pub fn from_xyzw(q: [f64; 4]) -> Self {
        Self::new(q[3], q[0], q[1], q[2])
    }

    /// Scalar-last components `[x, y, z, w]`.
    pub fn to_xyzw(&self) -> [f64; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Pure quaternion `(0, v)`.
    pub fn pure(v: &Vec3) -> Self {
        Self::new(0.0, v.x, v.y, v.z)
    }

    /// Creates a quaternion from axis-angle representation.
    /// Returns `None` for a zero-length axis.
    pub fn from_axis_angle(axis: &Vec3, theta: f64) -> Option<Self> {
        let axis_norm = axis.normalized()?;
        let (sin_half, cos_half) = (theta / 2.0).sin_cos();
        Some(Self::new(
            cos_half,
            axis_norm.x * sin_half,
            axis_norm.y * sin_half,
            axis_norm.z * sin_half,
        ))
    }

    /// Rotation vector (axis scaled by angle) to quaternion.
    pub fn from_rotation_vector(v: &Vec3) -> Self {
        Self::from_axis_angle(v, v.magnitude()).unwrap_or_else(Self::identity)
    }

    /// Rotation about the world X axis.
    pub fn about_x(theta: f64) -> Self {
        let (s, c) = (theta / 2.0).sin_cos();
        Self::new(c, s, 0.0, 0.0)
    }

    /// Rotation about the world Y axis.
    pub fn about_y(theta: f64) -> Self {
        let (s, c) = (theta / 2.0).sin_cos();
        Self::new(c, 0.0, s, 0.0)
    }

    /// Rotation about the world Z axis.
    pub fn about_z(theta: f64) -> Self {
        let (s, c) = (theta / 2.0).sin_cos();
        Self::new(c, 0.0, 0.0, s)
    }

    /// Multiply two quaternions (Hamilton product).
    pub fn mul(&self, other: &Self) -> Self {
        Self::new(
            self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        )
    }

    /// Multiply every component by a scalar.
    pub fn scale(&self, s: f64) -> Self {
        Self::new(self.w * s, self.x * s, self.y * s, self.z * s)
    }

    /// Rotate a vector by this (unit) quaternion.
    pub fn rotate(&self, v: &Vec3) -> Vec3 {
        // v' = v + w t + u × t with t = 2 u × v
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(v).mul(2.0);
        v.add(&t.mul(self.w)).add(&u.cross(&t))
    }

    /// Conjugate of quaternion.
    pub fn conjugate(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Magnitude (norm) of quaternion.
    pub fn magnitude(&self) -> f64 {
        self.magnitude_sq().sqrt()
    }

    /// Squared magnitude.
    pub fn magnitude_sq(&self) -> f64 {
        self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Normalized (unit) quaternion.
    pub fn normalized(&self) -> Option<Self> {
        let mag = self.magnitude();
        if mag <= NORM_EPSILON || !mag.is_finite() {
            None
        } else {
            Some(self.scale(1.0 / mag))
        }
    }

    /// Normalized quaternion, substituting the identity for degenerate input.
    pub fn normalized_or_identity(&self) -> Self {
        self.normalized().unwrap_or_else(Self::identity)
    }

    /// Roll and pitch `(phi, theta)` of the Z-Y-X decomposition
    /// `R = Rx(phi) · Ry(theta) · Rz(psi)`.
    ///
    /// Both angles depend only on where the body Z axis points, so a spin
    /// about that axis leaves them unchanged.
    pub fn roll_pitch(&self) -> (f64, f64) {
        let zhat = self.rotate(&Vec3::up());
        let theta = zhat.x.clamp(-1.0, 1.0).asin();
        let phi = (-zhat.y).atan2(zhat.z);
        (phi, theta)
    }

    /// Yaw `psi` of the same decomposition as [`Quaternion::roll_pitch`].
    pub fn yaw(&self) -> f64 {
        let xhat = self.rotate(&Vec3::unit_x());
        let yhat = self.rotate(&Vec3::unit_y());
        (-yhat.x).atan2(xhat.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts;

    #[test]
    fn test_vec3_magnitude() {
        let v = Vec3::new(3.0, 4.0, 0.0);
        assert_eq!(v.magnitude(), 5.0);
    }

    #[test]
    fn test_vec3_normalize() {
        let v = Vec3::new(3.0, 4.0, 0.0);
        let normalized = v.normalized().unwrap();
        assert_relative_eq!(normalized.magnitude(), 1.0);
        assert_relative_eq!(normalized.x, 0.6);
        assert_relative_eq!(normalized.y, 0.8);
    }

    #[test]
    fn test_vec3_normalize_degenerate() {
        let tiny = Vec3::new(1e-20, 0.0, 0.0);
        assert!(tiny.normalized().is_none());
        assert_eq!(tiny.normalized_or(Vec3::unit_x()), Vec3::unit_x());
    }

    #[test]
    fn test_vec3_cross() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(a.cross(&b), Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_vec3_dot() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a.dot(&b), 32.0);
    }

    #[test]
    fn test_vec3_rotate_around() {
        let v = Vec3::unit_x().rotate_around(&Vec3::up(), consts::FRAC_PI_2);
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_quaternion_identity() {
        let q = Quaternion::identity();
        assert_eq!(q.w, 1.0);
        assert_eq!(q.x, 0.0);
        assert_eq!(q.rotate(&Vec3::new(1.0, 2.0, 3.0)), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_quaternion_rotate() {
        let q = Quaternion::from_axis_angle(&Vec3::up(), consts::FRAC_PI_2).unwrap();
        let rotated = q.rotate(&Vec3::unit_x());
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(rotated.y, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_quaternion_composition_order() {
        // about_y(90°) after about_x(90°): y axis -> z -> x
        let q = Quaternion::about_y(consts::FRAC_PI_2).mul(&Quaternion::about_x(consts::FRAC_PI_2));
        let v = q.rotate(&Vec3::unit_y());
        assert_relative_eq!(v.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(v.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_quaternion_degenerate_normalizes_to_identity() {
        let q = Quaternion::new(0.0, 1e-300, 0.0, 0.0);
        assert_eq!(q.normalized_or_identity(), Quaternion::identity());
    }

    #[test]
    fn test_roll_pitch_ignores_spin() {
        let tilt = Quaternion::about_x(0.3).mul(&Quaternion::about_y(-0.2));
        let spun = tilt.mul(&Quaternion::about_z(1.7));
        let (phi, theta) = tilt.roll_pitch();
        let (phi_s, theta_s) = spun.roll_pitch();
        assert_relative_eq!(phi, 0.3, epsilon = 1e-12);
        assert_relative_eq!(theta, -0.2, epsilon = 1e-12);
        assert_relative_eq!(phi, phi_s, epsilon = 1e-12);
        assert_relative_eq!(theta, theta_s, epsilon = 1e-12);
        assert_relative_eq!(spun.yaw(), 1.7, epsilon = 1e-12);
    }

    #[test]
    fn test_xyzw_layout() {
        let q = Quaternion::from_xyzw([0.1, 0.2, 0.3, 0.9]);
        assert_eq!(q.w, 0.9);
        assert_eq!(q.to_xyzw(), [0.1, 0.2, 0.3, 0.9]);
    }
}
