//! Calibration and inversion.
//!
//! Responsibilities:
//!
//! - fit the four-parameter logistic curve to the standards (`fitter`)
//! - tabulate the fitted curve on a dense concentration grid (`grid`)
//! - resolve sample readings to concentrations by nearest match (`resolver`)

pub mod fitter;
pub mod grid;
pub mod resolver;

pub use fitter::*;
pub use grid::*;
pub use resolver::*;
