//! Mathematical utilities: linear least squares for the damped LM step.

pub mod ols;

pub use ols::*;
