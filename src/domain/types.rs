//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting and inversion
//! - exported to JSON/CSV
//! - reloaded later (`hcg lookup`) without refitting

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// hCG standard concentrations (mIU/mL) used by the assay kit.
pub const DEFAULT_CONCENTRATIONS: [f64; 6] = [0.0, 5.0, 25.0, 50.0, 100.0, 200.0];

/// Example standards readings, matching `DEFAULT_CONCENTRATIONS`.
pub const DEFAULT_READINGS: &str = "0.012, 0.032, 0.207, 0.376, 0.801, 1.73";

/// Column holding absorbance readings in the sample table.
pub const DEFAULT_READING_COLUMN: &str = "Abs";

/// Header of the reading column in the results table.
pub const RESULT_READING_HEADER: &str = "Reading";

/// Header of the concentration column in the results table.
pub const RESULT_CONCENTRATION_HEADER: &str = "hCG Concentration";

/// Default file name for the exported results table.
pub const DEFAULT_RESULTS_FILE: &str = "hcg_results.xlsx";

/// Name of the single worksheet in the exported results workbook.
pub const RESULTS_SHEET_NAME: &str = "Results";

/// Default scan range for the inversion grid: `[0, 205)` in steps of 0.1.
pub const DEFAULT_GRID_START: f64 = 0.0;
pub const DEFAULT_GRID_END: f64 = 205.0;
pub const DEFAULT_GRID_STEP: f64 = 0.1;

/// Model evaluation budget for the fitter.
pub const DEFAULT_MAX_EVALUATIONS: usize = 5000;

/// One calibration standard: known concentration and its measured reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardPoint {
    pub concentration: f64,
    pub reading: f64,
}

/// Four-parameter logistic parameters.
///
/// `y(x) = c + (d - c) * x^b / (e^b + x^b)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FourPlParams {
    /// Slope exponent.
    pub b: f64,
    /// Lower asymptote (reading at zero concentration).
    pub c: f64,
    /// Upper asymptote.
    pub d: f64,
    /// Inflection point (concentration at half response).
    pub e: f64,
}

impl FourPlParams {
    pub fn to_array(self) -> [f64; 4] {
        [self.b, self.c, self.d, self.e]
    }

    pub fn from_array(p: [f64; 4]) -> Self {
        Self {
            b: p[0],
            c: p[1],
            d: p[2],
            e: p[3],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Residuals vanished (noise-free data).
    ExactFit,
    /// Relative SSE reduction fell below `ftol`.
    RelativeReduction,
    /// Relative parameter step fell below `xtol`.
    SmallStep,
    /// Damping grew without finding a better point; the current point is a minimum
    /// to working precision.
    Stalled,
}

impl Termination {
    pub fn display_name(self) -> &'static str {
        match self {
            Termination::ExactFit => "exact fit",
            Termination::RelativeReduction => "relative reduction < ftol",
            Termination::SmallStep => "relative step < xtol",
            Termination::Stalled => "stalled (no further reduction)",
        }
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub r_squared: f64,
    pub n: usize,
    pub evaluations: usize,
    pub iterations: usize,
    pub termination: Termination,
}

/// Output of the curve fitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub params: FourPlParams,
    pub quality: FitQuality,
}

/// Scan range for the prediction grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub start: f64,
    /// Exclusive upper bound.
    pub end: f64,
    pub step: f64,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            start: DEFAULT_GRID_START,
            end: DEFAULT_GRID_END,
            step: DEFAULT_GRID_STEP,
        }
    }
}

/// Where a resolved concentration sits relative to the grid.
///
/// Readings outside the span of the prediction grid are clamped to the nearest
/// endpoint; the flag makes that visible instead of silently reporting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeFlag {
    InRange,
    AtLowerBound,
    AtUpperBound,
}

impl RangeFlag {
    pub fn is_boundary(self) -> bool {
        !matches!(self, RangeFlag::InRange)
    }

    pub fn label(self) -> &'static str {
        match self {
            RangeFlag::InRange => "",
            RangeFlag::AtLowerBound => "<= grid min",
            RangeFlag::AtUpperBound => ">= grid max",
        }
    }
}

/// One resolved sample (a row of the results table).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub reading: f64,
    pub concentration: f64,
    pub flag: RangeFlag,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus environment and defaults).
#[derive(Debug, Clone)]
pub struct AssayConfig {
    /// Free-text assay label stored in exported curve files.
    pub label: Option<String>,
    pub concentrations: Vec<f64>,
    /// Raw standards readings text (comma-separated).
    pub readings: String,
    pub samples_path: Option<PathBuf>,
    pub reading_column: String,
    pub grid: GridSpec,
    pub max_evaluations: usize,
    pub precision: usize,

    pub export_results: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
    pub export_curve: Option<PathBuf>,
}

impl Default for AssayConfig {
    fn default() -> Self {
        Self {
            label: None,
            concentrations: DEFAULT_CONCENTRATIONS.to_vec(),
            readings: DEFAULT_READINGS.to_string(),
            samples_path: None,
            reading_column: DEFAULT_READING_COLUMN.to_string(),
            grid: GridSpec::default(),
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
            precision: 1,
            export_results: None,
            export_json: None,
            export_curve: None,
        }
    }
}

/// A saved standard curve (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveFile {
    pub tool: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub standards: Vec<StandardPoint>,
    pub params: FourPlParams,
    pub fit_quality: FitQuality,
    pub grid: GridSpec,
}
