//! Shared calibration pipeline used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! standards -> sample table -> 4PL fit -> prediction grid -> per-sample lookup
//!
//! The front-end (`app`) can then focus on presentation and exports.

use tracing::info;

use crate::domain::{AssayConfig, CurveFile, FitResult, GridSpec, SampleRecord, StandardPoint};
use crate::error::AppError;
use crate::fit::{FitOptions, PredictionGrid, fit_standards, resolve_samples};
use crate::io::ingest::{SampleTable, load_samples, parse_standards};

/// A fitted standard curve ready for lookups.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub standards: Vec<StandardPoint>,
    pub fit: FitResult,
    pub grid: PredictionGrid,
}

/// All computed outputs of a single `hcg resolve` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub calibration: Calibration,
    pub samples: SampleTable,
    pub records: Vec<SampleRecord>,
}

/// Parse the configured standards and fit them.
pub fn calibrate(config: &AssayConfig) -> Result<Calibration, AppError> {
    let standards = parse_standards(&config.readings, &config.concentrations)?;
    calibrate_points(standards, config.grid, config.max_evaluations)
}

/// Fit already-parsed standards and tabulate the curve.
pub fn calibrate_points(
    standards: Vec<StandardPoint>,
    grid: GridSpec,
    max_evaluations: usize,
) -> Result<Calibration, AppError> {
    let opts = FitOptions {
        max_evaluations,
        ..FitOptions::default()
    };
    let fit = fit_standards(&standards, &opts)?;
    let grid = PredictionGrid::build(&fit.params, grid)?;
    info!(points = grid.len(), "prediction grid built");

    Ok(Calibration {
        standards,
        fit,
        grid,
    })
}

/// Execute the full pipeline: validate inputs, fit once, resolve every sample.
///
/// Both input checks run before the fit so a malformed table never costs a fit,
/// and a fit failure aborts the whole batch (every sample shares the one curve).
pub fn run_assay(config: &AssayConfig) -> Result<RunOutput, AppError> {
    let standards = parse_standards(&config.readings, &config.concentrations)?;

    let path = config
        .samples_path
        .as_deref()
        .ok_or_else(|| AppError::InvalidConfig("a sample CSV is required (--samples).".to_string()))?;
    let samples = load_samples(path, &config.reading_column)?;

    let calibration = calibrate_points(standards, config.grid, config.max_evaluations)?;
    let records = resolve_samples(&calibration.grid, &samples.readings)?;

    Ok(RunOutput {
        calibration,
        samples,
        records,
    })
}

/// Rebuild a calibration from a saved curve file, without refitting.
pub fn calibration_from_curve(curve: &CurveFile, grid: Option<GridSpec>) -> Result<Calibration, AppError> {
    let spec = grid.unwrap_or(curve.grid);
    let fit = FitResult {
        params: curve.params,
        quality: curve.fit_quality.clone(),
    };
    let grid = PredictionGrid::build(&fit.params, spec)?;
    Ok(Calibration {
        standards: curve.standards.clone(),
        fit,
        grid,
    })
}
