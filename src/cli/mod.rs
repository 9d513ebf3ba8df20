//! Command-line parsing for the hCG ELISA calculator.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code. Every calibration option can also come
//! from the environment (or a `.env` file), so a lab can pin its standards once.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{
    DEFAULT_GRID_END, DEFAULT_GRID_START, DEFAULT_GRID_STEP, DEFAULT_MAX_EVALUATIONS,
    DEFAULT_READING_COLUMN, DEFAULT_READINGS, DEFAULT_RESULTS_FILE,
};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "hcg",
    version,
    about = "hCG concentration calculator: 4PL standard curve fit for ELISA readings",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the standards, resolve every sample in a table, print and optionally export.
    Resolve(ResolveArgs),
    /// Fit the standards only and print the curve diagnostics.
    Fit(FitArgs),
    /// Resolve readings against a previously exported curve JSON.
    Lookup(LookupArgs),
}

/// Standard-curve and grid options shared by `resolve` and `fit`.
#[derive(Debug, Args, Clone)]
pub struct CalibrationArgs {
    /// Standards readings, comma-separated, one per concentration level.
    #[arg(short = 'r', long, env = "HCG_READINGS", default_value = DEFAULT_READINGS)]
    pub readings: String,

    /// Standard concentration levels (mIU/mL), comma-separated.
    #[arg(long, env = "HCG_CONCENTRATIONS", default_value = "0, 5, 25, 50, 100, 200")]
    pub concentrations: String,

    #[command(flatten)]
    pub grid: GridArgs,

    /// Assay label stored in exported curve files (e.g. kit lot or plate id).
    #[arg(long, env = "HCG_LABEL")]
    pub label: Option<String>,

    /// Model evaluation budget for the curve fit.
    #[arg(long, default_value_t = DEFAULT_MAX_EVALUATIONS)]
    pub max_evals: usize,
}

/// Inversion grid options.
#[derive(Debug, Args, Clone)]
pub struct GridArgs {
    /// Lowest candidate concentration.
    #[arg(long, default_value_t = DEFAULT_GRID_START)]
    pub grid_start: f64,

    /// Upper bound of candidate concentrations (exclusive).
    #[arg(long, default_value_t = DEFAULT_GRID_END)]
    pub grid_end: f64,

    /// Spacing of candidate concentrations.
    #[arg(long, default_value_t = DEFAULT_GRID_STEP)]
    pub grid_step: f64,

    /// Decimal places for reported concentrations (defaults to the grid step's).
    #[arg(long)]
    pub precision: Option<usize>,
}

/// Options for the full pipeline.
#[derive(Debug, Args, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub calibration: CalibrationArgs,

    /// Sample table (`.xlsx` workbook or CSV) with one absorbance reading per row.
    #[arg(short = 's', long, env = "HCG_SAMPLES", value_name = "FILE")]
    pub samples: PathBuf,

    /// Name of the reading column in the sample table.
    #[arg(long, default_value = DEFAULT_READING_COLUMN)]
    pub column: String,

    /// Export the results table (`Reading`, `hCG Concentration`) to a `Results`
    /// workbook sheet, or to CSV when the file name ends in `.csv`.
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_RESULTS_FILE
    )]
    pub export: Option<PathBuf>,

    /// Export the results (with range flags) to JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Export the fitted curve (standards + parameters + grid) to JSON.
    #[arg(long = "export-curve", value_name = "JSON")]
    pub export_curve: Option<PathBuf>,

    /// Print only the results table.
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Options for fitting the standards alone.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub calibration: CalibrationArgs,

    /// Export the fitted curve (standards + parameters + grid) to JSON.
    #[arg(long = "export-curve", value_name = "JSON")]
    pub export_curve: Option<PathBuf>,
}

/// Options for resolving readings against a saved curve.
#[derive(Debug, Args, Clone)]
pub struct LookupArgs {
    /// Curve JSON file produced by `hcg fit --export-curve`.
    #[arg(long, value_name = "JSON")]
    pub curve: PathBuf,

    /// Override the grid stored in the curve file.
    #[arg(long)]
    pub regrid: bool,

    #[command(flatten)]
    pub grid: GridArgs,

    /// Absorbance readings to resolve.
    #[arg(
        required = true,
        allow_negative_numbers = true,
        value_name = "READING",
        value_parser = parse_finite_reading
    )]
    pub readings: Vec<f64>,
}

/// Parse a reading given on the command line; `NaN` and infinities are refused.
fn parse_finite_reading(raw: &str) -> Result<f64, String> {
    let v: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a valid number"))?;
    if !v.is_finite() {
        return Err(format!("'{raw}' is not a finite number"));
    }
    Ok(v)
}
