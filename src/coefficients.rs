//! Aerodynamic, mass and geometry coefficients of one disc design.
//!
//! A [`CoefficientModel`] is a plain value: it is built once from the
//! ultrastar-style defaults plus caller overrides, then read by the force
//! model. Calibration code may perturb single coefficients through
//! [`CoefficientModel::set_value`]; the derived quantities (`area`,
//! `cavity_volume`, `alpha_0`) are kept consistent after every write.

use std::f64::consts;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{SimError, SimResult};

/// Convenience input naming the drag at zero angle of attack.
/// Accepted only at construction, where it is consumed into `PD0`.
pub const CD0_NAME: &str = "CD0";

/// Cavity factor applied when none is given.
pub const DEFAULT_CAVITY_FACTOR: f64 = 0.2;

/// Disc speed rating to pitching-moment cavity factor.
const CAVITY_FACTOR_TABLE: [(f64, f64); 7] = [
    (0.0, 1.0),
    (2.0, 0.8),
    (5.0, 0.48),
    (7.0, 0.4),
    (9.0, 0.35),
    (11.0, 0.3),
    (14.0, 0.2),
];

/// Cavity factor for a disc speed rating, linearly interpolated and clamped
/// to the ends of the table.
pub fn cavity_factor_for_speed(rating: f64) -> f64 {
    let (first_speed, first_factor) = CAVITY_FACTOR_TABLE[0];
    if rating.is_nan() || rating <= first_speed {
        return first_factor;
    }
    for pair in CAVITY_FACTOR_TABLE.windows(2) {
        let (s0, f0) = pair[0];
        let (s1, f1) = pair[1];
        if rating <= s1 {
            return f0 + (f1 - f0) * (rating - s0) / (s1 - s0);
        }
    }
    CAVITY_FACTOR_TABLE[CAVITY_FACTOR_TABLE.len() - 1].1
}

/// Name of a single coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coefficient {
    /// Lift at zero angle of attack.
    Pl0,
    /// Lift slope per radian.
    Pla,
    /// Drag at zero lift.
    Pd0,
    /// Drag curvature around the zero-lift angle.
    Pda,
    /// Pitching moment at zero angle of attack.
    Pty0,
    /// Pitching moment slope per radian.
    Ptya,
    /// Roll damping.
    Ptxwx,
    /// Pitch damping. Mirrors roll damping until set.
    Ptywy,
    /// Spin-down damping.
    Ptzwz,
    /// Rolling moment from spin (reserved).
    Ptxwz,
    /// Moment of inertia about the spin axis (kg·m²).
    IZz,
    /// Moment of inertia about a transverse axis (kg·m²).
    IXx,
    /// Mass (kg).
    Mass,
    /// Diameter (m).
    Diameter,
    /// Rim depth (m).
    RimDepth,
    /// Rim width (m).
    RimWidth,
    /// Disc height (m).
    Height,
    /// Scale of the pitching-moment cavity correction.
    CavityFactor,
    /// Planform area (derived).
    Area,
    /// Rim cavity volume (derived).
    CavityVolume,
    /// Zero-lift angle of attack (derived).
    Alpha0,
}

impl Coefficient {
    /// Every coefficient, writable ones first.
    pub const ALL: [Coefficient; 21] = [
        Coefficient::Pl0,
        Coefficient::Pla,
        Coefficient::Pd0,
        Coefficient::Pda,
        Coefficient::Pty0,
        Coefficient::Ptya,
        Coefficient::Ptxwx,
        Coefficient::Ptywy,
        Coefficient::Ptzwz,
        Coefficient::Ptxwz,
        Coefficient::IZz,
        Coefficient::IXx,
        Coefficient::Mass,
        Coefficient::Diameter,
        Coefficient::RimDepth,
        Coefficient::RimWidth,
        Coefficient::Height,
        Coefficient::CavityFactor,
        Coefficient::Area,
        Coefficient::CavityVolume,
        Coefficient::Alpha0,
    ];

    /// Canonical name, as accepted by [`FromStr`].
    pub const fn as_str(&self) -> &'static str {
        match self {
            Coefficient::Pl0 => "PL0",
            Coefficient::Pla => "PLa",
            Coefficient::Pd0 => "PD0",
            Coefficient::Pda => "PDa",
            Coefficient::Pty0 => "PTy0",
            Coefficient::Ptya => "PTya",
            Coefficient::Ptxwx => "PTxwx",
            Coefficient::Ptywy => "PTywy",
            Coefficient::Ptzwz => "PTzwz",
            Coefficient::Ptxwz => "PTxwz",
            Coefficient::IZz => "I_zz",
            Coefficient::IXx => "I_xx",
            Coefficient::Mass => "mass",
            Coefficient::Diameter => "diameter",
            Coefficient::RimDepth => "rim_depth",
            Coefficient::RimWidth => "rim_width",
            Coefficient::Height => "height",
            Coefficient::CavityFactor => "cavity_factor",
            Coefficient::Area => "area",
            Coefficient::CavityVolume => "cavity_volume",
            Coefficient::Alpha0 => "alpha_0",
        }
    }

    /// Derived coefficients are computed from the others and cannot be written.
    pub const fn is_derived(&self) -> bool {
        matches!(
            self,
            Coefficient::Area | Coefficient::CavityVolume | Coefficient::Alpha0
        )
    }
}

impl FromStr for Coefficient {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Coefficient::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| SimError::invalid_coefficient(s))
    }
}

impl fmt::Display for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coefficient set for one disc design.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientModel {
    #[serde(rename = "PL0")]
    pl0: f64,
    #[serde(rename = "PLa")]
    pla: f64,
    #[serde(rename = "PD0")]
    pd0: f64,
    #[serde(rename = "PDa")]
    pda: f64,
    #[serde(rename = "PTy0")]
    pty0: f64,
    #[serde(rename = "PTya")]
    ptya: f64,
    #[serde(rename = "PTxwx")]
    ptxwx: f64,
    #[serde(rename = "PTywy", skip_serializing_if = "Option::is_none")]
    ptywy: Option<f64>,
    #[serde(rename = "PTzwz")]
    ptzwz: f64,
    #[serde(rename = "PTxwz")]
    ptxwz: f64,
    #[serde(rename = "I_zz")]
    i_zz: f64,
    #[serde(rename = "I_xx")]
    i_xx: f64,
    mass: f64,
    diameter: f64,
    rim_depth: f64,
    rim_width: f64,
    height: f64,
    cavity_factor: f64,
    area: f64,
    cavity_volume: f64,
    alpha_0: f64,
}

impl Default for CoefficientModel {
    fn default() -> Self {
        Self::ultrastar()
    }
}

impl CoefficientModel {
    /// Ultrastar-style defaults.
    pub fn ultrastar() -> Self {
        let mut model = Self {
            pl0: 0.13,
            pla: 2.7,
            pd0: 0.08,
            pda: 1.9,
            pty0: -0.02,
            ptya: 0.13,
            ptxwx: -1.08e-3,
            ptywy: None,
            ptzwz: -3.4e-5,
            ptxwz: 0.0,
            i_zz: 0.002352,
            i_xx: 0.001219,
            mass: 0.175,
            diameter: 0.27,
            rim_depth: 0.02,
            rim_width: 0.007,
            height: 0.032,
            cavity_factor: DEFAULT_CAVITY_FACTOR,
            area: 0.0,
            cavity_volume: 0.0,
            alpha_0: 0.0,
        };
        model.update_derived();
        model
    }

    /// Build a model from the defaults plus `overrides`.
    ///
    /// Every key must name a writable coefficient, except `CD0`, which is
    /// turned into `PD0 = CD0 - PDa * alpha_0²` after all other overrides
    /// are applied.
    pub fn from_overrides<I, K>(overrides: I) -> SimResult<Self>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut model = Self::ultrastar();
        let mut cd0 = None;
        for (key, value) in overrides {
            let key = key.as_ref();
            if key == CD0_NAME {
                cd0 = Some(value);
                continue;
            }
            let coefficient = key.parse::<Coefficient>()?;
            model.write(coefficient, value)?;
        }
        model.update_derived();
        if let Some(cd0) = cd0 {
            model.pd0 = cd0 - model.pda * model.alpha_0 * model.alpha_0;
        }
        Ok(model)
    }

    /// Value of the coefficient called `name`.
    pub fn get_value(&self, name: &str) -> SimResult<f64> {
        Ok(self.get(name.parse()?))
    }

    /// Overwrite the coefficient called `name`.
    pub fn set_value(&mut self, name: &str, value: f64) -> SimResult<()> {
        self.set(name.parse()?, value)
    }

    /// Overwrite several coefficients, stopping at the first invalid name.
    pub fn set_values<I, K>(&mut self, values: I) -> SimResult<()>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        for (name, value) in values {
            self.set_value(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// Typed read.
    pub fn get(&self, coefficient: Coefficient) -> f64 {
        match coefficient {
            Coefficient::Pl0 => self.pl0,
            Coefficient::Pla => self.pla,
            Coefficient::Pd0 => self.pd0,
            Coefficient::Pda => self.pda,
            Coefficient::Pty0 => self.pty0,
            Coefficient::Ptya => self.ptya,
            Coefficient::Ptxwx => self.ptxwx,
            Coefficient::Ptywy => self.pitch_damping(),
            Coefficient::Ptzwz => self.ptzwz,
            Coefficient::Ptxwz => self.ptxwz,
            Coefficient::IZz => self.i_zz,
            Coefficient::IXx => self.i_xx,
            Coefficient::Mass => self.mass,
            Coefficient::Diameter => self.diameter,
            Coefficient::RimDepth => self.rim_depth,
            Coefficient::RimWidth => self.rim_width,
            Coefficient::Height => self.height,
            Coefficient::CavityFactor => self.cavity_factor,
            Coefficient::Area => self.area,
            Coefficient::CavityVolume => self.cavity_volume,
            Coefficient::Alpha0 => self.alpha_0,
        }
    }

    /// Typed write. Derived coefficients are rejected.
    pub fn set(&mut self, coefficient: Coefficient, value: f64) -> SimResult<()> {
        self.write(coefficient, value)?;
        self.update_derived();
        Ok(())
    }

    fn write(&mut self, coefficient: Coefficient, value: f64) -> SimResult<()> {
        let slot = match coefficient {
            Coefficient::Pl0 => &mut self.pl0,
            Coefficient::Pla => &mut self.pla,
            Coefficient::Pd0 => &mut self.pd0,
            Coefficient::Pda => &mut self.pda,
            Coefficient::Pty0 => &mut self.pty0,
            Coefficient::Ptya => &mut self.ptya,
            Coefficient::Ptxwx => &mut self.ptxwx,
            Coefficient::Ptywy => {
                self.ptywy = Some(value);
                return Ok(());
            }
            Coefficient::Ptzwz => &mut self.ptzwz,
            Coefficient::Ptxwz => &mut self.ptxwz,
            Coefficient::IZz => &mut self.i_zz,
            Coefficient::IXx => &mut self.i_xx,
            Coefficient::Mass => &mut self.mass,
            Coefficient::Diameter => &mut self.diameter,
            Coefficient::RimDepth => &mut self.rim_depth,
            Coefficient::RimWidth => &mut self.rim_width,
            Coefficient::Height => &mut self.height,
            Coefficient::CavityFactor => &mut self.cavity_factor,
            Coefficient::Area | Coefficient::CavityVolume | Coefficient::Alpha0 => {
                return Err(SimError::invalid_coefficient(coefficient.as_str()));
            }
        };
        *slot = value;
        Ok(())
    }

    fn update_derived(&mut self) {
        let radius = self.diameter / 2.0;
        self.area = consts::PI * radius * radius;
        let inner = radius - self.rim_width;
        self.cavity_volume = self.rim_depth * consts::PI * inner * inner;
        // A flat lift curve has no zero-lift angle; use zero.
        self.alpha_0 = if self.pla.abs() > f64::EPSILON {
            -self.pl0 / self.pla
        } else {
            0.0
        };
    }

    /// All coefficients by canonical name.
    pub fn values(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        Coefficient::ALL.iter().map(|c| (c.as_str(), self.get(*c)))
    }

    /// Mass (kg).
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Planform area (m²).
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Diameter (m).
    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    /// Spin-axis moment of inertia.
    pub fn i_zz(&self) -> f64 {
        self.i_zz
    }

    /// Transverse moment of inertia.
    pub fn i_xx(&self) -> f64 {
        self.i_xx
    }

    /// Zero-lift angle of attack (rad).
    pub fn alpha_0(&self) -> f64 {
        self.alpha_0
    }

    /// `PTxwx`.
    pub fn roll_damping(&self) -> f64 {
        self.ptxwx
    }

    /// `PTywy`, falling back to `PTxwx`.
    pub fn pitch_damping(&self) -> f64 {
        self.ptywy.unwrap_or(self.ptxwx)
    }

    /// `PTzwz`.
    pub fn spin_damping(&self) -> f64 {
        self.ptzwz
    }

    pub(crate) fn lift_terms(&self) -> (f64, f64) {
        (self.pl0, self.pla)
    }

    pub(crate) fn drag_terms(&self) -> (f64, f64) {
        (self.pd0, self.pda)
    }

    pub(crate) fn pitch_terms(&self) -> (f64, f64, f64) {
        (self.pty0, self.ptya, self.cavity_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_derived_values() {
        let model = CoefficientModel::default();
        assert_relative_eq!(model.area(), consts::PI * 0.135 * 0.135);
        assert_relative_eq!(model.alpha_0(), -0.13 / 2.7);
        assert_relative_eq!(
            model.get(Coefficient::CavityVolume),
            0.02 * consts::PI * 0.128 * 0.128,
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let mut model = CoefficientModel::default();
        for coefficient in Coefficient::ALL.iter().filter(|c| !c.is_derived()) {
            let value = 0.123 + coefficient.as_str().len() as f64;
            model.set_value(coefficient.as_str(), value).unwrap();
            assert_eq!(model.get_value(coefficient.as_str()).unwrap(), value);
        }
    }

    #[test]
    fn test_unknown_name_rejected() {
        let mut model = CoefficientModel::default();
        assert!(matches!(
            model.set_value("PLb", 1.0),
            Err(SimError::InvalidCoefficient { ref name }) if name == "PLb"
        ));
        assert!(model.get_value("lift").is_err());
        assert!(CoefficientModel::from_overrides([("mass", 0.17), ("bogus", 1.0)]).is_err());
    }

    #[test]
    fn test_derived_are_read_only_and_refreshed() {
        let mut model = CoefficientModel::default();
        assert!(model.set_value("area", 1.0).is_err());
        assert!(model.set_value(CD0_NAME, 0.1).is_err());

        model.set_value("diameter", 0.2).unwrap();
        assert_relative_eq!(model.area(), consts::PI * 0.01);
        model.set_value("PL0", 0.27).unwrap();
        assert_relative_eq!(model.alpha_0(), -0.1);
    }

    #[test]
    fn test_cd0_back_solves_pd0() {
        let model = CoefficientModel::from_overrides([
            ("PL0", 0.143),
            ("PLa", 2.29),
            ("CD0", 0.055),
            ("PDa", 1.67),
        ])
        .unwrap();
        let alpha_0 = -0.143 / 2.29;
        assert_relative_eq!(model.get(Coefficient::Pd0), 0.055 - 1.67 * alpha_0 * alpha_0);
    }

    #[test]
    fn test_pitch_damping_mirrors_roll_until_set() {
        let mut model = CoefficientModel::default();
        assert_eq!(model.pitch_damping(), model.roll_damping());
        model.set(Coefficient::Ptywy, -0.5).unwrap();
        assert_eq!(model.pitch_damping(), -0.5);
        assert_eq!(model.roll_damping(), -1.08e-3);
    }

    #[test]
    fn test_flat_lift_curve_has_zero_alpha_0() {
        let model = CoefficientModel::from_overrides([("PL0", 0.0), ("PLa", 0.0)]).unwrap();
        assert_eq!(model.alpha_0(), 0.0);
    }

    #[test]
    fn test_cavity_factor_table() {
        assert_eq!(cavity_factor_for_speed(-1.0), 1.0);
        assert_eq!(cavity_factor_for_speed(5.0), 0.48);
        assert_relative_eq!(cavity_factor_for_speed(1.0), 0.9);
        assert_relative_eq!(cavity_factor_for_speed(12.5), 0.25);
        assert_eq!(cavity_factor_for_speed(20.0), 0.2);
    }

    #[test]
    fn test_serialize_uses_coefficient_names() {
        let json = serde_json::to_value(CoefficientModel::default()).unwrap();
        assert_eq!(json["PL0"], 0.13);
        assert_eq!(json["I_zz"], 0.002352);
        assert!(json.get("PTywy").is_none());
    }
}
