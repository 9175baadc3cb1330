//! Named coefficient sets for known disc molds.
//!
//! Values come from wind tunnel measurements and flight tuning. Discs whose
//! drag was measured at zero angle of attack are given as `CD0`.

use crate::coefficients::CoefficientModel;
use crate::error::{SimError, SimResult};

/// Names accepted by [`by_name`].
pub const NAMES: [&str; 6] = ["ultrastar", "wraith", "stable_wraith", "destroyer", "roc", "flick"];

/// Coefficient set for a named disc.
pub fn by_name(name: &str) -> SimResult<CoefficientModel> {
    match name {
        "ultrastar" => Ok(CoefficientModel::ultrastar()),
        "wraith" => wraith(),
        "stable_wraith" => stable_wraith(),
        "destroyer" => destroyer(),
        "roc" => roc(),
        "flick" => flick(),
        _ => Err(SimError::UnknownDisc {
            name: name.to_string(),
        }),
    }
}

/// Wraith distance driver.
pub fn wraith() -> SimResult<CoefficientModel> {
    CoefficientModel::from_overrides([
        ("PL0", 0.143),
        ("PLa", 2.29),
        ("CD0", 0.055),
        ("PDa", 1.67),
        ("PTxwz", 0.0),
        ("PTy0", -0.02),
        ("PTya", 0.343),
        ("PTywy", -1.3e-2),
        ("PTxwx", -1.3e-2),
        ("PTzwz", -3.4e-5),
        ("I_xx", 6.183e-4),
        ("I_zz", 1.231e-3),
        ("mass", 0.175),
        ("diameter", 0.211),
        ("rim_depth", 0.012),
        ("rim_width", 0.021),
        ("height", 0.014),
    ])
}

/// Wraith with less turn and fade.
pub fn stable_wraith() -> SimResult<CoefficientModel> {
    CoefficientModel::from_overrides([
        ("PL0", 0.143),
        ("PLa", 2.29),
        ("CD0", 0.055),
        ("PDa", 1.67),
        ("PTxwz", 0.0),
        ("PTy0", -0.01),
        ("PTya", 0.2),
        ("PTxwx", -1.3e-2),
        ("PTzwz", -3.4e-5),
        ("I_xx", 6.183e-4),
        ("I_zz", 1.231e-3),
        ("mass", 0.175),
        ("diameter", 0.211),
        ("rim_depth", 0.012),
        ("rim_width", 0.021),
        ("height", 0.014),
    ])
}

/// Destroyer distance driver, tuned to match long flights at 70 mph.
pub fn destroyer() -> SimResult<CoefficientModel> {
    CoefficientModel::from_overrides([
        ("PL0", 0.16),
        ("PLa", 2.29),
        ("PD0", 0.035),
        ("PDa", 1.67),
        ("PTxwz", 0.0),
        ("PTy0", -0.01),
        ("PTya", 0.3),
        ("PTxwx", -6.0e-4),
        ("PTzwz", -2.1e-5),
        ("I_xx", 6.263e-4),
        ("I_zz", 1.231e-3),
        ("mass", 0.175),
        ("diameter", 0.211),
        ("rim_depth", 0.012),
        ("rim_width", 0.0229),
        ("height", 0.014),
    ])
}

/// Roc midrange.
pub fn roc() -> SimResult<CoefficientModel> {
    CoefficientModel::from_overrides([
        ("PL0", 0.053),
        ("PLa", 2.35),
        ("CD0", 0.067),
        ("PDa", 1.67),
        ("PTxwz", 0.0),
        ("PTy0", -0.01),
        ("PTya", 0.172),
        ("I_xx", 7.086e-4),
        ("I_zz", 1.408e-3),
        ("mass", 0.180),
        ("diameter", 0.217),
        ("rim_depth", 0.013),
        ("rim_width", 0.012),
        ("height", 0.020),
    ])
}

/// Flick overstable driver.
pub fn flick() -> SimResult<CoefficientModel> {
    CoefficientModel::from_overrides([
        ("PL0", 0.1),
        ("PLa", 2.18),
        ("PD0", 0.06),
        ("PDa", 1.67),
        ("PTxwz", 0.0),
        ("PTy0", -0.007),
        ("PTya", 0.458),
        ("I_xx", 6.183e-4),
        ("I_zz", 1.231e-3),
        ("mass", 0.175),
        ("diameter", 0.211),
        ("rim_depth", 0.012),
        ("rim_width", 0.023),
        ("height", 0.013),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_all_presets_build() {
        for name in NAMES {
            let model = by_name(name).unwrap();
            assert!(model.mass() > 0.0, "{name}");
        }
    }

    #[test]
    fn test_unknown_disc() {
        let err = by_name("frisbee").unwrap_err();
        assert!(matches!(err, SimError::UnknownDisc { ref name } if name == "frisbee"));
    }

    #[test]
    fn test_wraith_pd0_from_cd0() {
        let model = wraith().unwrap();
        let alpha_0 = -0.143 / 2.29;
        assert_relative_eq!(model.get_value("PD0").unwrap(), 0.055 - 1.67 * alpha_0 * alpha_0);
        assert_eq!(model.pitch_damping(), -1.3e-2);
    }
}
