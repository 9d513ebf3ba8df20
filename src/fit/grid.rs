//! Prediction grid generation.
//!
//! The fitted curve is inverted by table lookup: we evaluate the model on a
//! dense, evenly spaced set of candidate concentrations once per fit, then
//! resolve every sample against that table.
//!
//! Spacing follows `arange` semantics: `ceil((end - start) / step)` points,
//! `x_i = start + i * step`, end exclusive.

use crate::domain::{FourPlParams, GridSpec};
use crate::error::AppError;
use crate::models::predict;

/// Upper bound on grid size (keeps a typo in `--grid-step` from exhausting memory).
pub const MAX_GRID_POINTS: usize = 10_000_000;

/// Generate evenly spaced concentrations in `[start, end)`.
pub fn linear_space(spec: &GridSpec) -> Result<Vec<f64>, AppError> {
    let GridSpec { start, end, step } = *spec;
    if !(start.is_finite() && end.is_finite() && step.is_finite()) {
        return Err(AppError::InvalidConfig(format!(
            "Invalid grid: start={start}, end={end}, step={step} (must be finite)."
        )));
    }
    if step <= 0.0 {
        return Err(AppError::InvalidConfig(format!("Grid step must be > 0, got {step}.")));
    }
    if end <= start {
        return Err(AppError::InvalidConfig(format!(
            "Grid end ({end}) must be greater than grid start ({start})."
        )));
    }
    if start < 0.0 {
        return Err(AppError::InvalidConfig(format!(
            "Grid start must be >= 0 (concentrations are non-negative), got {start}."
        )));
    }

    let count = ((end - start) / step).ceil();
    if count > MAX_GRID_POINTS as f64 {
        return Err(AppError::InvalidConfig(format!(
            "Grid would have {count} points (max {MAX_GRID_POINTS}); increase the step."
        )));
    }
    let count = count as usize;

    Ok((0..count).map(|i| start + step * i as f64).collect())
}

/// Dense `(concentration, predicted reading)` lookup table for one fit.
#[derive(Debug, Clone)]
pub struct PredictionGrid {
    spec: GridSpec,
    concentrations: Vec<f64>,
    predicted: Vec<f64>,
}

impl PredictionGrid {
    pub fn build(params: &FourPlParams, spec: GridSpec) -> Result<Self, AppError> {
        let concentrations = linear_space(&spec)?;
        let predicted: Vec<f64> = concentrations.iter().map(|&x| predict(x, params)).collect();

        if let Some(i) = predicted.iter().position(|y| !y.is_finite()) {
            return Err(AppError::InvalidConfig(format!(
                "Fitted curve is not finite at concentration {}.",
                concentrations[i]
            )));
        }

        Ok(Self {
            spec,
            concentrations,
            predicted,
        })
    }

    pub fn spec(&self) -> GridSpec {
        self.spec
    }

    pub fn len(&self) -> usize {
        self.concentrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concentrations.is_empty()
    }

    pub fn concentrations(&self) -> &[f64] {
        &self.concentrations
    }

    pub fn predicted(&self) -> &[f64] {
        &self.predicted
    }

    /// Smallest and largest candidate concentration.
    pub fn bounds(&self) -> (f64, f64) {
        let lo = self.concentrations.first().copied().unwrap_or(self.spec.start);
        let hi = self.concentrations.last().copied().unwrap_or(self.spec.start);
        (lo, hi)
    }
}
