//! Four-parameter logistic fitting via Levenberg–Marquardt.
//!
//! Given:
//! - standard concentrations `x_i`
//! - measured readings `y_i`
//!
//! we minimise `Σ (y_i − f(x_i; b, c, d, e))²` starting from a data-driven
//! initial guess. Each iteration solves a damped, column-scaled linear least
//! squares problem (see `math::ols`) and accepts the step only if the SSE
//! drops; otherwise the damping grows and the step is retried.
//!
//! Stopping rules mirror the MINPACK defaults (`ftol = xtol = 1.49012e-8`) so that
//! poorly constrained standards (upper asymptote far beyond the top standard)
//! still terminate instead of chasing `d, e → ∞`.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info};

use crate::domain::{
    DEFAULT_MAX_EVALUATIONS, FitQuality, FitResult, FourPlParams, StandardPoint, Termination,
};
use crate::error::FitError;
use crate::math::{norm, solve_least_squares};
use crate::models::{fill_jacobian_row, predict};

/// One observation per parameter at minimum.
pub const MIN_STANDARDS: usize = 4;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e20;
const EXACT_SSE: f64 = 1e-30;
const COLUMN_NORM_FLOOR: f64 = 1e-12;

/// Solver options.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Budget of model evaluations (full SSE sweeps over the standards).
    pub max_evaluations: usize,
    /// Relative SSE reduction below which an accepted step ends the fit.
    pub ftol: f64,
    /// Relative step size below which an accepted step ends the fit.
    pub xtol: f64,
    /// Starting point; `None` uses [`initial_guess`].
    pub initial: Option<FourPlParams>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            initial: None,
        }
    }
}

/// Fit the 4PL model to a set of standards.
pub fn fit_standards(points: &[StandardPoint], opts: &FitOptions) -> Result<FitResult, FitError> {
    let x: Vec<f64> = points.iter().map(|p| p.concentration).collect();
    let y: Vec<f64> = points.iter().map(|p| p.reading).collect();
    fit_four_pl(&x, &y, opts)
}

/// Fit the 4PL model to paired concentrations and readings.
pub fn fit_four_pl(
    concentrations: &[f64],
    readings: &[f64],
    opts: &FitOptions,
) -> Result<FitResult, FitError> {
    validate_inputs(concentrations, readings)?;

    let n = concentrations.len();
    let mut params = opts
        .initial
        .unwrap_or_else(|| initial_guess(concentrations, readings));

    let mut sse = sum_squares(concentrations, readings, &params);
    let mut evaluations = 1usize;
    if !sse.is_finite() {
        return Err(FitError::NonFiniteStart {
            params: params.to_array(),
        });
    }
    debug!(?params, sse, "starting Levenberg-Marquardt");

    let mut lambda = LAMBDA_INIT;
    let mut iterations = 0usize;
    let mut jac = vec![[0.0; 4]; n];
    let mut residuals = vec![0.0; n];

    let termination = 'outer: loop {
        if sse <= EXACT_SSE {
            break Termination::ExactFit;
        }
        if evaluations >= opts.max_evaluations {
            return Err(FitError::MaxEvaluations {
                max_evaluations: opts.max_evaluations,
            });
        }

        for i in 0..n {
            fill_jacobian_row(concentrations[i], &params, &mut jac[i]);
            residuals[i] = readings[i] - predict(concentrations[i], &params);
        }
        let scale = column_norms(&jac);

        loop {
            let delta = damped_step(&jac, &residuals, &scale, lambda)
                .ok_or(FitError::SingularSystem { evaluations })?;

            let mut next = params.to_array();
            for k in 0..4 {
                next[k] += delta[k];
            }
            let trial = FourPlParams::from_array(next);
            let trial_sse = sum_squares(concentrations, readings, &trial);
            evaluations += 1;

            if trial_sse.is_finite() && trial_sse < sse {
                let reduction = sse - trial_sse;
                let step = norm(&delta);
                let size = norm(&next);

                params = trial;
                let previous = sse;
                sse = trial_sse;
                iterations += 1;
                lambda = (lambda * 0.1).max(LAMBDA_MIN);
                debug!(iterations, evaluations, sse, lambda, "accepted step");

                if sse <= EXACT_SSE {
                    break 'outer Termination::ExactFit;
                }
                if reduction <= opts.ftol * previous {
                    break 'outer Termination::RelativeReduction;
                }
                if step <= opts.xtol * (size + opts.xtol) {
                    break 'outer Termination::SmallStep;
                }
                continue 'outer;
            }

            lambda *= 10.0;
            // Even a vanishing gradient step no longer lowers the SSE: the current
            // point is a minimum to working precision.
            if lambda > LAMBDA_MAX {
                break 'outer Termination::Stalled;
            }
            if evaluations >= opts.max_evaluations {
                return Err(FitError::MaxEvaluations {
                    max_evaluations: opts.max_evaluations,
                });
            }
        }
    };

    let quality = fit_quality(readings, sse, evaluations, iterations, termination);
    info!(
        b = params.b,
        c = params.c,
        d = params.d,
        e = params.e,
        sse,
        evaluations,
        termination = termination.display_name(),
        "4PL fit finished"
    );

    Ok(FitResult { params, quality })
}

/// Default starting point when the caller supplies none.
///
/// - `c₀`: reading at the smallest concentration (the blank)
/// - `d₀`: reading at the largest concentration
/// - `b₀ = 1`
/// - `e₀`: the positive concentration whose reading is closest to `(c₀ + d₀) / 2`
pub fn initial_guess(concentrations: &[f64], readings: &[f64]) -> FourPlParams {
    let mut lo = 0;
    let mut hi = 0;
    for (i, &x) in concentrations.iter().enumerate() {
        if x < concentrations[lo] {
            lo = i;
        }
        if x > concentrations[hi] {
            hi = i;
        }
    }
    let c = readings[lo];
    let d = readings[hi];
    let mid = 0.5 * (c + d);

    let mut e = concentrations[hi];
    let mut best = f64::INFINITY;
    for (&x, &y) in concentrations.iter().zip(readings) {
        let gap = (y - mid).abs();
        if x > 0.0 && gap < best {
            best = gap;
            e = x;
        }
    }

    FourPlParams { b: 1.0, c, d, e }
}

fn validate_inputs(concentrations: &[f64], readings: &[f64]) -> Result<(), FitError> {
    if concentrations.len() != readings.len() {
        return Err(FitError::MismatchedInputs {
            concentrations: concentrations.len(),
            readings: readings.len(),
        });
    }
    if concentrations.len() < MIN_STANDARDS {
        return Err(FitError::TooFewPoints {
            got: concentrations.len(),
            min: MIN_STANDARDS,
        });
    }
    for (index, (x, y)) in concentrations.iter().zip(readings).enumerate() {
        if !(x.is_finite() && y.is_finite()) {
            return Err(FitError::NonFiniteInput { index });
        }
    }

    let negative = concentrations.iter().any(|&x| x < 0.0);
    let positive = concentrations.iter().any(|&x| x > 0.0);
    let first = concentrations[0];
    let distinct = concentrations.iter().any(|&x| x != first);
    if negative || !positive || !distinct {
        return Err(FitError::DegenerateConcentrations);
    }
    Ok(())
}

fn sum_squares(x: &[f64], y: &[f64], params: &FourPlParams) -> f64 {
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - predict(xi, params);
            r * r
        })
        .sum()
}

fn column_norms(jac: &[[f64; 4]]) -> [f64; 4] {
    let mut out = [0.0; 4];
    for (k, slot) in out.iter_mut().enumerate() {
        let col: Vec<f64> = jac.iter().map(|row| row[k]).collect();
        *slot = norm(&col).max(COLUMN_NORM_FLOOR);
    }
    out
}

/// Solve `[J·D⁻¹; √λ·I] s = [r; 0]` and return the unscaled step `δ = D⁻¹ s`.
fn damped_step(jac: &[[f64; 4]], residuals: &[f64], scale: &[f64; 4], lambda: f64) -> Option<[f64; 4]> {
    let n = jac.len();
    let mut a = DMatrix::<f64>::zeros(n + 4, 4);
    let mut rhs = DVector::<f64>::zeros(n + 4);

    for i in 0..n {
        for k in 0..4 {
            a[(i, k)] = jac[i][k] / scale[k];
        }
        rhs[i] = residuals[i];
    }
    let damping = lambda.sqrt();
    for k in 0..4 {
        a[(n + k, k)] = damping;
    }

    let scaled = solve_least_squares(&a, &rhs)?;
    let mut delta = [0.0; 4];
    for k in 0..4 {
        delta[k] = scaled[k] / scale[k];
    }
    Some(delta)
}

fn fit_quality(
    readings: &[f64],
    sse: f64,
    evaluations: usize,
    iterations: usize,
    termination: Termination,
) -> FitQuality {
    let n = readings.len();
    let mean = readings.iter().sum::<f64>() / n as f64;
    let sst: f64 = readings.iter().map(|y| (y - mean) * (y - mean)).sum();
    let r_squared = if sst > 0.0 { 1.0 - sse / sst } else { 1.0 };

    FitQuality {
        sse,
        rmse: (sse / n as f64).sqrt(),
        r_squared,
        n,
        evaluations,
        iterations,
        termination,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_CONCENTRATIONS;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    const REFERENCE_READINGS: [f64; 6] = [0.012, 0.032, 0.207, 0.376, 0.801, 1.73];

    fn synthetic(p: &FourPlParams) -> Vec<f64> {
        DEFAULT_CONCENTRATIONS.iter().map(|&x| predict(x, p)).collect()
    }

    #[test]
    fn noise_free_round_trip_reproduces_readings() {
        let truths = [
            FourPlParams { b: 1.5, c: 0.05, d: 2.0, e: 40.0 },
            FourPlParams { b: 1.2, c: 0.01, d: 3.0, e: 120.0 },
            FourPlParams { b: 0.8, c: 0.1, d: 1.5, e: 20.0 },
            FourPlParams { b: 2.0, c: 0.02, d: 2.5, e: 60.0 },
        ];
        for truth in &truths {
            let y = synthetic(truth);
            let fit = fit_four_pl(&DEFAULT_CONCENTRATIONS, &y, &FitOptions::default()).unwrap();
            for (&x, &yi) in DEFAULT_CONCENTRATIONS.iter().zip(&y) {
                let rel = (predict(x, &fit.params) - yi).abs() / yi.abs();
                assert!(rel < 1e-6, "x={x}: rel err {rel} for {truth:?}");
            }
            assert!(fit.quality.r_squared > 0.999_999);
        }
    }

    #[test]
    fn well_conditioned_round_trip_recovers_parameters() {
        let truth = FourPlParams { b: 1.5, c: 0.05, d: 2.0, e: 40.0 };
        let y = synthetic(&truth);
        let fit = fit_four_pl(&DEFAULT_CONCENTRATIONS, &y, &FitOptions::default()).unwrap();
        assert!((fit.params.b - truth.b).abs() < 1e-6);
        assert!((fit.params.c - truth.c).abs() < 1e-6);
        assert!((fit.params.d - truth.d).abs() < 1e-6);
        assert!((fit.params.e - truth.e).abs() < 1e-4);
    }

    #[test]
    fn reference_standards_fit_within_budget() {
        let fit =
            fit_four_pl(&DEFAULT_CONCENTRATIONS, &REFERENCE_READINGS, &FitOptions::default()).unwrap();
        assert!(fit.params.is_finite());
        assert!(fit.quality.evaluations <= DEFAULT_MAX_EVALUATIONS);
        assert!(fit.quality.rmse < 0.02, "rmse={}", fit.quality.rmse);
        assert!(fit.quality.r_squared > 0.999);
        // Blank reading is close to the lower asymptote.
        assert!((fit.params.c - 0.012).abs() < 0.01);
    }

    #[test]
    fn tiny_budget_reports_exhaustion() {
        let opts = FitOptions {
            max_evaluations: 3,
            ..FitOptions::default()
        };
        let err = fit_four_pl(&DEFAULT_CONCENTRATIONS, &REFERENCE_READINGS, &opts).unwrap_err();
        assert_eq!(err, FitError::MaxEvaluations { max_evaluations: 3 });
    }

    #[test]
    fn damping_limit_ends_as_a_converged_fit() {
        let truth = FourPlParams { b: 1.5, c: 0.05, d: 2.0, e: 40.0 };
        let offsets = [0.004, -0.003, 0.005, -0.002, 0.003, -0.004];
        let y: Vec<f64> = synthetic(&truth).iter().zip(offsets).map(|(v, dv)| v + dv).collect();

        // With both relative tolerances off, the damping limit is the only exit.
        let strict = FitOptions {
            ftol: 0.0,
            xtol: 0.0,
            max_evaluations: 10_000,
            ..FitOptions::default()
        };
        let fit = fit_four_pl(&DEFAULT_CONCENTRATIONS, &y, &strict).unwrap();
        assert_eq!(fit.quality.termination, Termination::Stalled);
        assert!(fit.quality.evaluations < 1_000, "evaluations={}", fit.quality.evaluations);
        assert!(fit.params.is_finite());

        // Same path as the default run, only longer, so it cannot end higher.
        let usual = fit_four_pl(&DEFAULT_CONCENTRATIONS, &y, &FitOptions::default()).unwrap();
        assert!(fit.quality.sse <= usual.quality.sse);
        assert!(fit.quality.rmse < 0.01);
    }

    #[test]
    fn noisy_standards_still_fit() {
        let truth = FourPlParams { b: 1.5, c: 0.05, d: 2.0, e: 40.0 };
        let clean = synthetic(&truth);
        let noise = Normal::new(0.0, 0.005).unwrap();

        for seed in 0..20u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let y: Vec<f64> = clean.iter().map(|v| v + noise.sample(&mut rng)).collect();
            let fit = fit_four_pl(&DEFAULT_CONCENTRATIONS, &y, &FitOptions::default())
                .unwrap_or_else(|e| panic!("seed {seed}: {e}"));
            assert!(fit.quality.rmse < 0.02, "seed {seed}: rmse={}", fit.quality.rmse);
        }
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let err = fit_four_pl(&DEFAULT_CONCENTRATIONS, &REFERENCE_READINGS[..5], &FitOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            FitError::MismatchedInputs {
                concentrations: 6,
                readings: 5
            }
        );
    }

    #[test]
    fn rejects_too_few_and_non_finite_standards() {
        let err = fit_four_pl(&[0.0, 5.0, 25.0], &[0.1, 0.2, 0.3], &FitOptions::default()).unwrap_err();
        assert_eq!(err, FitError::TooFewPoints { got: 3, min: 4 });

        let mut y = REFERENCE_READINGS;
        y[2] = f64::NAN;
        let err = fit_four_pl(&DEFAULT_CONCENTRATIONS, &y, &FitOptions::default()).unwrap_err();
        assert_eq!(err, FitError::NonFiniteInput { index: 2 });
    }

    #[test]
    fn rejects_degenerate_concentrations() {
        let err = fit_four_pl(&[0.0; 4], &[0.1, 0.2, 0.3, 0.4], &FitOptions::default()).unwrap_err();
        assert_eq!(err, FitError::DegenerateConcentrations);

        let err = fit_four_pl(&[-1.0, 5.0, 25.0, 50.0], &[0.1, 0.2, 0.3, 0.4], &FitOptions::default())
            .unwrap_err();
        assert_eq!(err, FitError::DegenerateConcentrations);
    }

    #[test]
    fn initial_guess_uses_blank_top_and_midpoint() {
        let p = initial_guess(&DEFAULT_CONCENTRATIONS, &REFERENCE_READINGS);
        assert_eq!(p.b, 1.0);
        assert_eq!(p.c, 0.012);
        assert_eq!(p.d, 1.73);
        // Midpoint 0.871 is closest to the 100 standard (0.801).
        assert_eq!(p.e, 100.0);
    }
}
