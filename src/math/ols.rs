//! Linear least squares solver.
//!
//! Every Levenberg–Marquardt iteration reduces to one small linear problem:
//!
//! ```text
//! minimize ‖A δ − r‖²,   A = [J·D⁻¹; √λ·I],  r = [residuals; 0]
//! ```
//!
//! Implementation choices:
//! - We solve the augmented (tall) system directly with SVD instead of forming
//!   the normal equations `JᵀJ + λI`, which squares the condition number.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - The parameter dimension is 4, so SVD cost is negligible.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Euclidean norm of a slice.
pub fn norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn damping_rows_shrink_the_step() {
        // Same system augmented with √λ·I rows (λ = 1): the solution is pulled toward 0.
        let x = DMatrix::from_row_slice(
            5,
            2,
            &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 0.0, 0.0, 1.0],
        );
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0, 0.0, 0.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!(beta[0].abs() < 2.0 && beta[1].abs() < 3.0);
        assert!(beta[0] > 0.0 && beta[1] > 0.0);
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let x = DMatrix::from_row_slice(2, 1, &[1.0, f64::NAN]);
        let y = DVector::from_row_slice(&[1.0, 1.0]);
        assert!(solve_least_squares(&x, &y).is_none());
    }
}
