//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - calibration inputs (`StandardPoint`, assay defaults)
//! - fit outputs (`FourPlParams`, `FitQuality`, `FitResult`)
//! - inversion outputs (`SampleRecord`, `RangeFlag`) and the saved `CurveFile`

pub mod types;

pub use types::*;
