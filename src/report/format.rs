//! Formatted terminal output: fit summary, standards back-calculation, results.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{
    FitResult, GridSpec, RESULT_CONCENTRATION_HEADER, RESULT_READING_HEADER, SampleRecord,
    StandardPoint,
};
use crate::fit::{PredictionGrid, resolve_reading};
use crate::models::predict;

/// One row of the standards back-calculation table.
#[derive(Debug, Clone, Copy)]
pub struct BackCalculated {
    pub point: StandardPoint,
    pub fitted: f64,
    pub residual: f64,
    /// The standard's own reading resolved through the grid.
    pub recovered: f64,
}

/// Resolve each standard's reading back to a concentration.
pub fn back_calculate(standards: &[StandardPoint], fit: &FitResult, grid: &PredictionGrid) -> Vec<BackCalculated> {
    standards
        .iter()
        .map(|&point| {
            let fitted = predict(point.concentration, &fit.params);
            BackCalculated {
                point,
                fitted,
                residual: point.reading - fitted,
                recovered: resolve_reading(grid, point.reading).concentration,
            }
        })
        .collect()
}

/// Decimal places implied by a grid step (0.1 → 1, 0.05 → 2, 1 → 0).
pub fn grid_precision(step: f64) -> usize {
    if !(step.is_finite() && step > 0.0) {
        return 1;
    }
    let mut decimals = 0usize;
    let mut scaled = step;
    while decimals < 10 && (scaled - scaled.round()).abs() > 1e-9 * scaled.abs().max(1.0) {
        scaled *= 10.0;
        decimals += 1;
    }
    decimals
}

/// Round to a fixed number of decimals.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Format the fit summary (parameters + diagnostics + standards table).
pub fn format_fit_summary(
    standards: &[StandardPoint],
    fit: &FitResult,
    grid: &PredictionGrid,
    precision: usize,
) -> String {
    let mut out = String::new();
    let p = &fit.params;
    let q = &fit.quality;

    out.push_str("=== hcg - hCG Concentration Calculator (4PL) ===\n");
    out.push_str("Model: y = c + (d - c) * x^b / (e^b + x^b)\n");
    out.push_str(&format!(
        "Parameters: b={:.6} c={:.6} d={:.6} e={:.6}\n",
        p.b, p.c, p.d, p.e
    ));
    out.push_str(&format!(
        "Fit: n={} SSE={:.3e} RMSE={:.5} R2={:.6}\n",
        q.n, q.sse, q.rmse, q.r_squared
    ));
    out.push_str(&format!(
        "Solver: {} iterations, {} evaluations ({})\n",
        q.iterations,
        q.evaluations,
        q.termination.display_name()
    ));
    out.push_str(&format_grid_line(grid));

    out.push_str("\nStandards:\n");
    out.push_str(&format_standards_table(&back_calculate(standards, fit, grid), precision));
    out
}

fn format_grid_line(grid: &PredictionGrid) -> String {
    let GridSpec { start, end, step } = grid.spec();
    let (lo, hi) = grid.bounds();
    format!(
        "Grid: [{start}, {end}) step {step} ({} points, lookups clamp to {} .. {})\n",
        grid.len(),
        fmt_num(lo),
        fmt_num(round_to(hi, grid_precision(step)))
    )
}

fn format_standards_table(rows: &[BackCalculated], precision: usize) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>12} {:>10} {:>10} {:>10} {:>12}\n",
            "conc", "reading", "fitted", "residual", "recovered"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!("{:-<12} {:-<10} {:-<10} {:-<10} {:-<12}\n", "", "", "", "", "").trim_end(),
    );
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:>12} {:>10.4} {:>10.4} {:>10.4} {:>12.*}\n",
                fmt_num(r.point.concentration),
                r.point.reading,
                r.fitted,
                r.residual,
                precision,
                r.recovered,
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Format the resolved samples table.
pub fn format_results(records: &[SampleRecord], precision: usize) -> String {
    let mut out = String::new();

    out.push_str("Results:\n");
    out.push_str(
        format!(
            "{:>5} {:>10} {:>18} {:<12}\n",
            "row", RESULT_READING_HEADER, RESULT_CONCENTRATION_HEADER, "note"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<5} {:-<10} {:-<18} {:-<12}\n", "", "", "", "").trim_end());
    out.push('\n');

    for (i, r) in records.iter().enumerate() {
        out.push_str(
            format!(
                "{:>5} {:>10} {:>18.*} {:<12}\n",
                i + 1,
                fmt_num(r.reading),
                precision,
                r.concentration,
                r.flag.label(),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    let flagged = records.iter().filter(|r| r.flag.is_boundary()).count();
    if flagged > 0 {
        out.push_str(&format!(
            "\n{flagged} of {} sample(s) clamped to the grid edge (outside the calibrated range).\n",
            records.len()
        ));
    }
    out
}

fn fmt_num(v: f64) -> String {
    format!("{v}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitQuality, FourPlParams, RangeFlag, Termination};

    fn fit() -> FitResult {
        FitResult {
            params: FourPlParams { b: 1.5, c: 0.05, d: 2.0, e: 40.0 },
            quality: FitQuality {
                sse: 0.0,
                rmse: 0.0,
                r_squared: 1.0,
                n: 2,
                evaluations: 7,
                iterations: 5,
                termination: Termination::ExactFit,
            },
        }
    }

    #[test]
    fn precision_follows_grid_step() {
        assert_eq!(grid_precision(0.1), 1);
        assert_eq!(grid_precision(0.05), 2);
        assert_eq!(grid_precision(1.0), 0);
        assert_eq!(grid_precision(2.5), 1);
        assert_eq!(grid_precision(-1.0), 1);
    }

    #[test]
    fn round_to_decimals() {
        assert_eq!(round_to(49.300000000000004, 1), 49.3);
        assert_eq!(round_to(0.125, 0), 0.0);
        assert_eq!(round_to(12.3456, 2), 12.35);
    }

    #[test]
    fn standards_back_calculate_to_their_level() {
        let fit = fit();
        let grid = PredictionGrid::build(&fit.params, GridSpec::default()).unwrap();
        let standards: Vec<StandardPoint> = [0.0, 50.0]
            .iter()
            .map(|&x| StandardPoint { concentration: x, reading: predict(x, &fit.params) })
            .collect();

        let rows = back_calculate(&standards, &fit, &grid);
        assert_eq!(rows[0].recovered, 0.0);
        assert!((rows[1].recovered - 50.0).abs() < 0.1 + 1e-9);
        assert!(rows.iter().all(|r| r.residual.abs() < 1e-12));

        let text = format_fit_summary(&standards, &fit, &grid, 1);
        assert!(text.contains("b=1.500000"));
        assert!(text.contains("(2050 points, lookups clamp to 0 .. 204.9)"), "{text}");
        assert!(text.contains("exact fit"));
    }

    #[test]
    fn results_table_marks_clamped_rows() {
        let records = vec![
            SampleRecord { reading: 0.376, concentration: 49.300000000000004, flag: RangeFlag::InRange },
            SampleRecord { reading: 9.0, concentration: 204.9, flag: RangeFlag::AtUpperBound },
        ];
        let text = format_results(&records, 1);
        assert!(text.contains("hCG Concentration"));
        assert!(text.contains("49.3"));
        assert!(text.contains(">= grid max"));
        assert!(text.contains("1 of 2 sample(s) clamped"));
    }
}
