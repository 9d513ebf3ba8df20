//! Concentration lookup: invert the fitted curve by nearest predicted reading.
//!
//! For each observed reading we scan the prediction grid and return the
//! candidate concentration whose predicted reading has the smallest absolute
//! difference. Ties keep the first (lowest) concentration.
//!
//! Readings outside the span of the grid clamp to the nearest endpoint; there
//! is no extrapolation. Endpoint hits are tagged with a [`RangeFlag`] so callers
//! can warn about them. Infinite readings clamp the same way; NaN has no
//! nearest point and is refused by [`resolve_samples`].

use tracing::warn;

use crate::domain::{RangeFlag, SampleRecord};
use crate::error::AppError;
use crate::fit::grid::PredictionGrid;

/// Result of resolving one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub concentration: f64,
    /// Position in the prediction grid.
    pub index: usize,
    pub flag: RangeFlag,
}

/// Resolve a single reading against the grid.
///
/// `reading` must not be NaN; batch callers go through [`resolve_samples`],
/// which rejects it.
pub fn resolve_reading(grid: &PredictionGrid, reading: f64) -> Resolution {
    debug_assert!(!grid.is_empty());
    debug_assert!(!reading.is_nan(), "NaN reading has no nearest grid point");
    let predicted = grid.predicted();

    let index = if reading.is_infinite() {
        extreme_index(predicted, reading > 0.0)
    } else {
        nearest_index(predicted, reading)
    };

    let last = grid.len().saturating_sub(1);
    let flag = if index == 0 {
        RangeFlag::AtLowerBound
    } else if index == last {
        RangeFlag::AtUpperBound
    } else {
        RangeFlag::InRange
    };

    Resolution {
        concentration: grid.concentrations().get(index).copied().unwrap_or(0.0),
        index,
        flag,
    }
}

fn nearest_index(predicted: &[f64], reading: f64) -> usize {
    let mut index = 0usize;
    let mut best = f64::INFINITY;
    for (i, &y) in predicted.iter().enumerate() {
        let diff = (y - reading).abs();
        if diff < best {
            best = diff;
            index = i;
        }
    }
    index
}

/// First index of the largest (`highest`) or smallest prediction.
fn extreme_index(predicted: &[f64], highest: bool) -> usize {
    let mut index = 0usize;
    for (i, &y) in predicted.iter().enumerate() {
        let better = if highest { y > predicted[index] } else { y < predicted[index] };
        if better {
            index = i;
        }
    }
    index
}

/// Resolve a batch of readings, preserving input order.
///
/// Fails without resolving anything if any reading is NaN, so every output
/// row corresponds to a real lookup.
pub fn resolve_samples(grid: &PredictionGrid, readings: &[f64]) -> Result<Vec<SampleRecord>, AppError> {
    if let Some(row) = readings.iter().position(|r| r.is_nan()) {
        return Err(AppError::InvalidSamples(format!(
            "reading #{} is not a number",
            row + 1
        )));
    }

    let mut boundary_hits = 0usize;
    let records: Vec<SampleRecord> = readings
        .iter()
        .enumerate()
        .map(|(row, &reading)| {
            let r = resolve_reading(grid, reading);
            if r.flag.is_boundary() {
                boundary_hits += 1;
                warn!(
                    row = row + 1,
                    reading,
                    concentration = r.concentration,
                    "reading sits at the edge of the calibration grid; concentration is clamped"
                );
            }
            SampleRecord {
                reading,
                concentration: r.concentration,
                flag: r.flag,
            }
        })
        .collect();

    if boundary_hits > 0 {
        warn!(
            boundary_hits,
            total = readings.len(),
            "some samples fall outside the calibrated range"
        );
    }
    Ok(records)
}
