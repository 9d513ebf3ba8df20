//! Read/write standard curve JSON files.
//!
//! Curve JSON is the "portable" representation of a fitted curve:
//! - the standards it was fitted to
//! - the 4PL parameters and fit diagnostics
//! - the grid settings used for inversion
//!
//! `hcg lookup` reloads it to resolve readings without refitting.
//! The schema is defined by `domain::CurveFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{CurveFile, FitResult, GridSpec, StandardPoint};
use crate::error::AppError;

/// Identifier written into every curve file.
pub const CURVE_TOOL_NAME: &str = "hcg";

/// Assemble a curve file from a finished fit.
pub fn build_curve_file(
    label: Option<&str>,
    standards: &[StandardPoint],
    fit: &FitResult,
    grid: GridSpec,
) -> CurveFile {
    CurveFile {
        tool: CURVE_TOOL_NAME.to_string(),
        created_at: Utc::now(),
        label: label.map(str::to_string),
        standards: standards.to_vec(),
        params: fit.params,
        fit_quality: fit.quality.clone(),
        grid,
    }
}

/// Write a curve JSON file.
pub fn write_curve_json(path: &Path, curve: &CurveFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create curve JSON '{}'", path.display()), e))?;

    serde_json::to_writer_pretty(file, curve).map_err(|e| AppError::json("Failed to write curve JSON", e))?;

    Ok(())
}

/// Read a curve JSON file.
pub fn read_curve_json(path: &Path) -> Result<CurveFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open curve JSON '{}'", path.display()), e))?;
    let curve: CurveFile =
        serde_json::from_reader(file).map_err(|e| AppError::json("Invalid curve JSON", e))?;

    if !curve.params.is_finite() {
        return Err(AppError::InvalidConfig(format!(
            "Curve JSON '{}' has non-finite parameters.",
            path.display()
        )));
    }
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitQuality, FourPlParams, Termination};

    fn fit() -> FitResult {
        FitResult {
            params: FourPlParams { b: 1.1, c: 0.0137, d: 2.1, e: 260.0 },
            quality: FitQuality {
                sse: 7.1e-4,
                rmse: 0.0109,
                r_squared: 0.9997,
                n: 6,
                evaluations: 120,
                iterations: 40,
                termination: Termination::RelativeReduction,
            },
        }
    }

    #[test]
    fn curve_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.json");
        let standards = vec![StandardPoint { concentration: 0.0, reading: 0.012 }];
        let curve = build_curve_file(Some("lot 2417"), &standards, &fit(), GridSpec::default());

        write_curve_json(&path, &curve).unwrap();
        let back = read_curve_json(&path).unwrap();

        assert_eq!(back.tool, "hcg");
        assert_eq!(back.label.as_deref(), Some("lot 2417"));
        assert_eq!(back.params, curve.params);
        assert_eq!(back.standards, standards);
        assert_eq!(back.grid, GridSpec::default());
        assert_eq!(back.fit_quality.termination, Termination::RelativeReduction);
    }

    #[test]
    fn label_is_optional_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.json");
        let curve = build_curve_file(None, &[], &fit(), GridSpec::default());
        write_curve_json(&path, &curve).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("\"label\""));
        assert_eq!(read_curve_json(&path).unwrap().label, None);
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_curve_json(&path).unwrap_err(), AppError::Json { .. }));
    }
}
