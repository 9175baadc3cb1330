//! Adaptive explicit Runge-Kutta integration with terminal events.
//!
//! Two embedded pairs are available: Dormand-Prince 5(4) and
//! Bogacki-Shampine 3(2). Both propagate the higher order solution, control
//! the step from the embedded error estimate and reuse the last stage as the
//! first stage of the next step.
//!
//! The output is the sequence of accepted solver points; nothing is
//! resampled. When a terminal event fires, the last point is placed on the
//! located crossing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Right-hand side `dy/dt = f(t, y)` of a system with `N` scalar states.
pub trait OdeSystem<const N: usize> {
    /// Evaluate the time derivative.
    fn rhs(&self, t: f64, y: &[f64; N]) -> [f64; N];
}

impl<const N: usize, F> OdeSystem<N> for F
where
    F: Fn(f64, &[f64; N]) -> [f64; N],
{
    fn rhs(&self, t: f64, y: &[f64; N]) -> [f64; N] {
        self(t, y)
    }
}

/// Embedded Runge-Kutta pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Method {
    /// Dormand-Prince 5(4).
    #[default]
    Rk45,
    /// Bogacki-Shampine 3(2).
    Rk23,
}

/// Default relative tolerance.
pub const DEFAULT_RTOL: f64 = 1e-3;
/// Default absolute tolerance.
pub const DEFAULT_ATOL: f64 = 1e-6;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const MAX_STAGES: usize = 7;

/// Solver configuration. One value per call; nothing is global.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Integration method.
    pub method: Method,
    /// Relative tolerance.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
    /// Largest allowed step; unbounded when `None`.
    pub max_step: Option<f64>,
    /// Initial step; chosen automatically when `None`.
    pub first_step: Option<f64>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: Method::Rk45,
            rtol: DEFAULT_RTOL,
            atol: DEFAULT_ATOL,
            max_step: None,
            first_step: None,
        }
    }
}

impl SolverOptions {
    /// Same options with a step cap.
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = Some(max_step);
        self
    }

    /// Same options with the given tolerances.
    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Termination {
    /// The end of the span was reached.
    Completed,
    /// The terminal event fired at this time.
    Event(f64),
}

/// Work counters of one solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SolverStats {
    /// Right-hand side evaluations.
    pub rhs_evaluations: usize,
    /// Accepted steps.
    pub accepted_steps: usize,
    /// Rejected steps.
    pub rejected_steps: usize,
}

/// Solver failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OdeError {
    /// The span is not finite or runs backwards.
    #[error("invalid time span ({t0}, {t1})")]
    InvalidSpan { t0: f64, t1: f64 },

    /// Tolerances or step limits out of range.
    #[error("invalid solver options: {0}")]
    InvalidOptions(String),

    /// The starting point cannot be integrated.
    #[error("initial state or derivative is not finite")]
    NonFiniteInitialState,

    /// Steps kept producing non-finite values until the step underflowed.
    #[error("derivative became non-finite near t = {t}")]
    NonFiniteDerivative { t: f64 },

    /// The error estimate could not be met at any representable step.
    #[error("required step size is less than spacing between numbers at t = {t}")]
    StepSizeUnderflow { t: f64 },
}

/// Accepted solver points.
#[derive(Debug, Clone)]
pub struct OdeSolution<const N: usize> {
    /// Sample times, strictly increasing.
    pub t: Vec<f64>,
    /// States at `t`.
    pub y: Vec<[f64; N]>,
    /// How the solve ended.
    pub termination: Termination,
    /// Work counters.
    pub stats: SolverStats,
}

/// Scalar event function. A crossing from positive to non-positive ends
/// the solve.
pub type EventFn<'a, const N: usize> = &'a dyn Fn(f64, &[f64; N]) -> f64;

struct Tableau {
    c: &'static [f64],
    a: &'static [&'static [f64]],
    b: &'static [f64],
    e: &'static [f64],
    error_order: i32,
}

impl Tableau {
    fn stages(&self) -> usize {
        self.c.len()
    }
}

const DORMAND_PRINCE: Tableau = Tableau {
    c: &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0],
    a: &[
        &[],
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0],
        &[9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0],
    ],
    b: &[35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0],
    e: &[
        -71.0 / 57600.0,
        0.0,
        71.0 / 16695.0,
        -71.0 / 1920.0,
        17253.0 / 339200.0,
        -22.0 / 525.0,
        1.0 / 40.0,
    ],
    error_order: 4,
};

const BOGACKI_SHAMPINE: Tableau = Tableau {
    c: &[0.0, 1.0 / 2.0, 3.0 / 4.0],
    a: &[&[], &[1.0 / 2.0], &[0.0, 3.0 / 4.0]],
    b: &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0],
    e: &[5.0 / 72.0, -1.0 / 12.0, -1.0 / 9.0, 1.0 / 8.0],
    error_order: 2,
};

impl Method {
    fn tableau(&self) -> &'static Tableau {
        match self {
            Method::Rk45 => &DORMAND_PRINCE,
            Method::Rk23 => &BOGACKI_SHAMPINE,
        }
    }
}

/// Integrate `system` from `t_span.0` to `t_span.1` starting at `y0`.
pub fn solve_ivp<S, const N: usize>(
    system: &S,
    t_span: (f64, f64),
    y0: [f64; N],
    options: &SolverOptions,
    event: Option<EventFn<'_, N>>,
) -> Result<OdeSolution<N>, OdeError>
where
    S: OdeSystem<N> + ?Sized,
{
    let (t0, t_bound) = t_span;
    if !(t0.is_finite() && t_bound.is_finite()) || t_bound < t0 {
        return Err(OdeError::InvalidSpan { t0, t1: t_bound });
    }
    if !(options.rtol > 0.0) || !(options.atol >= 0.0) {
        return Err(OdeError::InvalidOptions(format!(
            "tolerances must be positive, got rtol = {}, atol = {}",
            options.rtol, options.atol
        )));
    }
    let rtol = options.rtol.max(100.0 * f64::EPSILON);
    let atol = options.atol;
    let max_step = options.max_step.unwrap_or(f64::INFINITY);
    if !(max_step > 0.0) {
        return Err(OdeError::InvalidOptions(format!("max_step must be positive, got {max_step}")));
    }

    let tableau = options.method.tableau();
    let exponent = -1.0 / f64::from(tableau.error_order + 1);
    let mut stats = SolverStats::default();

    let mut t = t0;
    let mut y = y0;
    let mut f = system.rhs(t, &y);
    stats.rhs_evaluations += 1;
    if !all_finite(&y) || !all_finite(&f) {
        return Err(OdeError::NonFiniteInitialState);
    }

    let mut ts = vec![t];
    let mut ys = vec![y];
    if t_bound == t0 {
        return Ok(OdeSolution {
            t: ts,
            y: ys,
            termination: Termination::Completed,
            stats,
        });
    }

    let mut g_prev = event.map(|g| g(t, &y));

    let mut h_abs = match options.first_step {
        Some(h) if h > 0.0 => h.min(t_bound - t0),
        Some(h) => return Err(OdeError::InvalidOptions(format!("first_step must be positive, got {h}"))),
        None => {
            let (h, evaluations) = select_initial_step(system, t0, &y, &f, t_bound, max_step, tableau.error_order, rtol, atol);
            stats.rhs_evaluations += evaluations;
            h
        }
    };

    let mut k = [[0.0; N]; MAX_STAGES];

    while t < t_bound {
        let min_step = 10.0 * (next_up(t) - t);
        if h_abs > max_step {
            h_abs = max_step;
        } else if h_abs < min_step {
            h_abs = min_step;
        }

        let mut step_rejected = false;
        let mut last_non_finite = false;
        let (t_new, y_new, f_new) = loop {
            if h_abs < min_step {
                return Err(if last_non_finite {
                    OdeError::NonFiniteDerivative { t }
                } else {
                    OdeError::StepSizeUnderflow { t }
                });
            }

            let t_new = (t + h_abs).min(t_bound);
            let h = t_new - t;
            let (y_new, f_new) = rk_step(system, tableau, t, &y, &f, h, &mut k);
            stats.rhs_evaluations += tableau.stages();

            let error_norm = error_norm(tableau, &k, h, &y, &y_new, rtol, atol);
            if !error_norm.is_finite() || !all_finite(&f_new) {
                last_non_finite = true;
                h_abs = h * MIN_FACTOR;
                step_rejected = true;
                stats.rejected_steps += 1;
                continue;
            }
            last_non_finite = false;

            if error_norm < 1.0 {
                let mut factor = if error_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    MAX_FACTOR.min(SAFETY * error_norm.powf(exponent))
                };
                if step_rejected {
                    factor = factor.min(1.0);
                }
                h_abs = h * factor;
                break (t_new, y_new, f_new);
            }

            h_abs = h * MIN_FACTOR.max(SAFETY * error_norm.powf(exponent));
            step_rejected = true;
            stats.rejected_steps += 1;
        };
        stats.accepted_steps += 1;

        if let (Some(g), Some(prev)) = (event, g_prev) {
            let g_new = g(t_new, &y_new);
            if prev > 0.0 && g_new <= 0.0 {
                let (t_event, y_event) = locate_event(g, t, &y, &f, t_new, &y_new, &f_new);
                ts.push(t_event);
                ys.push(y_event);
                return Ok(OdeSolution {
                    t: ts,
                    y: ys,
                    termination: Termination::Event(t_event),
                    stats,
                });
            }
            g_prev = Some(g_new);
        }

        t = t_new;
        y = y_new;
        f = f_new;
        ts.push(t);
        ys.push(y);
    }

    Ok(OdeSolution {
        t: ts,
        y: ys,
        termination: Termination::Completed,
        stats,
    })
}

fn rk_step<S, const N: usize>(
    system: &S,
    tableau: &Tableau,
    t: f64,
    y: &[f64; N],
    f: &[f64; N],
    h: f64,
    k: &mut [[f64; N]; MAX_STAGES],
) -> ([f64; N], [f64; N])
where
    S: OdeSystem<N> + ?Sized,
{
    k[0] = *f;
    for s in 1..tableau.stages() {
        let mut ys = *y;
        for (j, a) in tableau.a[s].iter().enumerate() {
            for i in 0..N {
                ys[i] += h * a * k[j][i];
            }
        }
        k[s] = system.rhs(t + tableau.c[s] * h, &ys);
    }

    let mut y_new = *y;
    for (j, b) in tableau.b.iter().enumerate() {
        for i in 0..N {
            y_new[i] += h * b * k[j][i];
        }
    }
    let f_new = system.rhs(t + h, &y_new);
    k[tableau.stages()] = f_new;
    (y_new, f_new)
}

fn error_norm<const N: usize>(
    tableau: &Tableau,
    k: &[[f64; N]; MAX_STAGES],
    h: f64,
    y: &[f64; N],
    y_new: &[f64; N],
    rtol: f64,
    atol: f64,
) -> f64 {
    if N == 0 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..N {
        let err: f64 = tableau.e.iter().enumerate().map(|(j, e)| e * k[j][i]).sum::<f64>() * h;
        let scale = atol + y[i].abs().max(y_new[i].abs()) * rtol;
        let ratio = err / scale;
        sum += ratio * ratio;
    }
    (sum / N as f64).sqrt()
}

fn rms_norm<const N: usize>(v: impl Fn(usize) -> f64) -> f64 {
    if N == 0 {
        return 0.0;
    }
    let sum: f64 = (0..N).map(|i| v(i) * v(i)).sum();
    (sum / N as f64).sqrt()
}

/// Starting step from the local derivative scale (Hairer, Nørsett & Wanner).
/// Returns the step and the number of extra derivative evaluations.
#[allow(clippy::too_many_arguments)]
fn select_initial_step<S, const N: usize>(
    system: &S,
    t0: f64,
    y0: &[f64; N],
    f0: &[f64; N],
    t_bound: f64,
    max_step: f64,
    error_order: i32,
    rtol: f64,
    atol: f64,
) -> (f64, usize)
where
    S: OdeSystem<N> + ?Sized,
{
    let interval = t_bound - t0;
    if N == 0 {
        return (interval, 0);
    }
    let scale = |i: usize| atol + y0[i].abs() * rtol;
    let d0 = rms_norm::<N>(|i| y0[i] / scale(i));
    let d1 = rms_norm::<N>(|i| f0[i] / scale(i));
    let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
    let h0 = h0.min(interval);

    let mut y1 = *y0;
    for i in 0..N {
        y1[i] += h0 * f0[i];
    }
    let f1 = system.rhs(t0 + h0, &y1);
    let d2 = rms_norm::<N>(|i| (f1[i] - f0[i]) / scale(i)) / h0;

    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / f64::from(error_order + 1))
    };
    // a non-finite probe leaves h1 NaN; fall back to h0
    let h1 = if h1.is_finite() { h1 } else { h0 };
    ((100.0 * h0).min(h1).min(interval).min(max_step), 1)
}

/// Cubic Hermite interpolation between two solver points.
fn hermite<const N: usize>(
    t0: f64,
    y0: &[f64; N],
    f0: &[f64; N],
    t1: f64,
    y1: &[f64; N],
    f1: &[f64; N],
    t: f64,
) -> [f64; N] {
    let h = t1 - t0;
    let s = (t - t0) / h;
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    let mut y = [0.0; N];
    for i in 0..N {
        y[i] = h00 * y0[i] + h10 * h * f0[i] + h01 * y1[i] + h11 * h * f1[i];
    }
    y
}

/// Bisect the interpolant for the positive to non-positive crossing.
/// The returned point is on the non-positive side.
fn locate_event<const N: usize>(
    g: EventFn<'_, N>,
    t0: f64,
    y0: &[f64; N],
    f0: &[f64; N],
    t1: f64,
    y1: &[f64; N],
    f1: &[f64; N],
) -> (f64, [f64; N]) {
    let mut lo = t0;
    let mut hi = t1;
    let mut y_hi = *y1;
    for _ in 0..200 {
        let tolerance = 4.0 * f64::EPSILON * lo.abs().max(hi.abs()).max(1.0);
        if hi - lo <= tolerance {
            break;
        }
        let mid = 0.5 * (lo + hi);
        let y_mid = hermite(t0, y0, f0, t1, y1, f1, mid);
        if g(mid, &y_mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
            y_hi = y_mid;
        }
    }
    (hi, y_hi)
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Smallest `f64` greater than `t`.
fn next_up(t: f64) -> f64 {
    if t.is_nan() || t == f64::INFINITY {
        return t;
    }
    if t == 0.0 {
        return f64::from_bits(1);
    }
    let bits = t.to_bits();
    if t > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn decay(_t: f64, y: &[f64; 1]) -> [f64; 1] {
        [-0.5 * y[0]]
    }

    fn oscillator(_t: f64, y: &[f64; 2]) -> [f64; 2] {
        [y[1], -y[0]]
    }

    #[test]
    fn test_exponential_decay_rk45() {
        let options = SolverOptions::default().with_tolerances(1e-8, 1e-10);
        let sol = solve_ivp(&decay, (0.0, 4.0), [2.0], &options, None).unwrap();
        assert_eq!(sol.termination, Termination::Completed);
        assert_eq!(*sol.t.last().unwrap(), 4.0);
        assert_relative_eq!(sol.y.last().unwrap()[0], 2.0 * (-2.0f64).exp(), max_relative = 1e-6);
        assert!(sol.t.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_oscillator_rk23() {
        let options = SolverOptions {
            method: Method::Rk23,
            ..SolverOptions::default().with_tolerances(1e-7, 1e-9)
        };
        let sol = solve_ivp(&oscillator, (0.0, std::f64::consts::PI), [0.0, 1.0], &options, None).unwrap();
        let last = sol.y.last().unwrap();
        assert_relative_eq!(last[0], 0.0, epsilon = 1e-5);
        assert_relative_eq!(last[1], -1.0, epsilon = 1e-5);
        assert!(sol.stats.accepted_steps > 0);
        assert_eq!(
            sol.stats.rhs_evaluations,
            1 + 1 + 3 * (sol.stats.accepted_steps + sol.stats.rejected_steps)
        );
    }

    #[test]
    fn test_max_step_is_respected() {
        let options = SolverOptions::default().with_max_step(0.05);
        let sol = solve_ivp(&decay, (0.0, 1.0), [1.0], &options, None).unwrap();
        assert!(sol.t.windows(2).all(|w| w[1] - w[0] <= 0.05 + 1e-12));
        assert!(sol.t.len() >= 21);
    }

    #[test]
    fn test_terminal_event_located() {
        // y = e^{-t/2} crosses 0.5 at t = 2 ln 2
        let threshold = |_t: f64, y: &[f64; 1]| y[0] - 0.5;
        let options = SolverOptions::default().with_tolerances(1e-9, 1e-12);
        let sol = solve_ivp(&decay, (0.0, 10.0), [1.0], &options, Some(&threshold)).unwrap();
        let expected = 2.0 * 2f64.ln();
        match sol.termination {
            Termination::Event(t) => assert_relative_eq!(t, expected, epsilon = 1e-6),
            Termination::Completed => panic!("event did not fire"),
        }
        assert_relative_eq!(*sol.t.last().unwrap(), expected, epsilon = 1e-6);
        assert!(sol.y.last().unwrap()[0] <= 0.5);
        assert!(*sol.t.last().unwrap() < 10.0);
    }

    #[test]
    fn test_event_starting_non_positive_does_not_fire() {
        let never_positive = |_t: f64, _y: &[f64; 1]| -1.0;
        let sol = solve_ivp(&decay, (0.0, 1.0), [1.0], &SolverOptions::default(), Some(&never_positive)).unwrap();
        assert_eq!(sol.termination, Termination::Completed);
    }

    #[test]
    fn test_first_step_used() {
        let options = SolverOptions {
            first_step: Some(1e-3),
            ..SolverOptions::default()
        };
        let sol = solve_ivp(&decay, (0.0, 1.0), [1.0], &options, None).unwrap();
        assert_relative_eq!(sol.t[1], 1e-3, epsilon = 1e-15);
    }

    #[test]
    fn test_empty_span() {
        let sol = solve_ivp(&decay, (2.0, 2.0), [1.0], &SolverOptions::default(), None).unwrap();
        assert_eq!(sol.t, vec![2.0]);
        assert_eq!(sol.y, vec![[1.0]]);
    }

    #[test]
    fn test_invalid_inputs() {
        let options = SolverOptions::default();
        assert!(matches!(
            solve_ivp(&decay, (1.0, 0.0), [1.0], &options, None),
            Err(OdeError::InvalidSpan { .. })
        ));
        let bad = SolverOptions { rtol: 0.0, ..options };
        assert!(matches!(
            solve_ivp(&decay, (0.0, 1.0), [1.0], &bad, None),
            Err(OdeError::InvalidOptions(_))
        ));
        assert!(matches!(
            solve_ivp(&decay, (0.0, 1.0), [f64::NAN], &options, None),
            Err(OdeError::NonFiniteInitialState)
        ));
    }

    #[test]
    fn test_blow_up_fails() {
        // y' = y², y(0) = 1 blows up at t = 1
        let blow_up = |_t: f64, y: &[f64; 1]| [y[0] * y[0]];
        let err = solve_ivp(&blow_up, (0.0, 2.0), [1.0], &SolverOptions::default(), None).unwrap_err();
        assert!(matches!(
            err,
            OdeError::StepSizeUnderflow { .. } | OdeError::NonFiniteDerivative { .. }
        ));
    }

    #[test]
    fn test_next_up() {
        assert!(next_up(1.0) > 1.0);
        assert_eq!(next_up(1.0) - 1.0, f64::EPSILON);
        assert!(next_up(-1.0) > -1.0);
        assert!(next_up(0.0) > 0.0);
    }
}
