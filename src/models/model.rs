//! Four-parameter logistic model evaluation.
//!
//! The fitter relies on two primitive operations:
//! - predict y(x) given parameters (for residuals, grids and reports)
//! - fill a Jacobian row for a given concentration (for Levenberg–Marquardt)

use crate::domain::FourPlParams;

/// Logistic fraction `x^b / (e^b + x^b)` in `[0, 1]`.
///
/// Evaluated as `u / (1 + u)` with `u = (x / e)^b` so that large exponents do not
/// overflow. `x = 0` is handled explicitly: `0^b` is 0 for `b > 0` and `+∞` for
/// `b < 0`, which would otherwise turn into NaN for non-integer `b`.
///
/// A non-positive inflection point has no meaning for concentrations, so any
/// `x > 0` with `e <= 0` yields NaN and the caller rejects the parameters.
pub fn logistic_fraction(x: f64, b: f64, e: f64) -> f64 {
    if x == 0.0 {
        return if b > 0.0 {
            0.0
        } else if b < 0.0 {
            1.0
        } else {
            0.5
        };
    }
    if e <= 0.0 {
        return f64::NAN;
    }
    let u = (x / e).powf(b);
    if u.is_infinite() {
        return 1.0;
    }
    u / (1.0 + u)
}

/// Predict the reading at concentration `x`.
pub fn predict(x: f64, p: &FourPlParams) -> f64 {
    let f = logistic_fraction(x, p.b, p.e);
    p.c + (p.d - p.c) * f
}

/// Fill `∂y/∂(b, c, d, e)` at concentration `x`.
pub fn fill_jacobian_row(x: f64, p: &FourPlParams, out: &mut [f64; 4]) {
    let f = logistic_fraction(x, p.b, p.e);
    let g = f * (1.0 - f);
    let span = p.d - p.c;

    // g vanishes on both tails (including x = 0) where ln(x/e) is unbounded.
    let (db, de) = if g == 0.0 {
        (0.0, 0.0)
    } else {
        (span * g * (x / p.e).ln(), -span * g * p.b / p.e)
    };

    out[0] = db;
    out[1] = 1.0 - f;
    out[2] = f;
    out[3] = de;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(b: f64, c: f64, d: f64, e: f64) -> FourPlParams {
        FourPlParams { b, c, d, e }
    }

    #[test]
    fn zero_concentration_is_lower_asymptote() {
        for &b in &[0.3, 0.5, 1.0, 1.109, 2.7, 7.0] {
            let p = params(b, 0.0137, 1.9, 48.0);
            let y = predict(0.0, &p);
            assert!(!y.is_nan());
            assert_eq!(y, p.c);
        }
    }

    #[test]
    fn monotone_non_decreasing_for_rising_curves() {
        let sets = [
            params(1.0, 0.0, 1.0, 50.0),
            params(0.4, 0.05, 2.5, 10.0),
            params(1.5, 0.05, 2.0, 40.0),
            params(3.0, 0.1, 0.1, 100.0),
            params(6.0, -0.2, 3.0, 150.0),
            params(1.1, 0.0137, 2.8e5, 1.0e7),
        ];
        for p in &sets {
            let mut prev = predict(0.0, p);
            for i in 1..=2100 {
                let y = predict(i as f64 * 0.1, p);
                assert!(y.is_finite());
                assert!(
                    y >= prev - 1e-12 * prev.abs().max(1.0),
                    "decreasing at x={} for {p:?}",
                    i as f64 * 0.1
                );
                prev = y;
            }
        }
    }

    #[test]
    fn approaches_upper_asymptote() {
        let p = params(2.0, 0.1, 1.5, 10.0);
        assert!((predict(1.0e6, &p) - 1.5).abs() < 1e-9);
        assert!((predict(10.0, &p) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let p = params(1.3, 0.05, 2.1, 35.0);
        let x = 42.0;
        let mut row = [0.0; 4];
        fill_jacobian_row(x, &p, &mut row);

        let base = p.to_array();
        for k in 0..4 {
            let h = 1e-6 * base[k].abs().max(1.0);
            let mut hi = base;
            let mut lo = base;
            hi[k] += h;
            lo[k] -= h;
            let fd = (predict(x, &FourPlParams::from_array(hi))
                - predict(x, &FourPlParams::from_array(lo)))
                / (2.0 * h);
            assert!((row[k] - fd).abs() < 1e-6, "param {k}: {} vs {fd}", row[k]);
        }
    }

    #[test]
    fn non_positive_inflection_is_nan() {
        assert!(predict(10.0, &params(1.0, 0.0, 1.0, 0.0)).is_nan());
        assert!(predict(10.0, &params(1.3, 0.0, 1.0, -5.0)).is_nan());
    }

    #[test]
    fn jacobian_at_zero_is_finite() {
        let p = params(0.7, 0.05, 2.1, 35.0);
        let mut row = [f64::NAN; 4];
        fill_jacobian_row(0.0, &p, &mut row);
        assert_eq!(row, [0.0, 1.0, 0.0, 0.0]);
    }
}
