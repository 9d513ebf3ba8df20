//! `hcg-elisa` library crate.
//!
//! The binary (`hcg`) is a thin wrapper around this library so that:
//!
//! - the 4PL fit and concentration lookup are testable without spawning processes
//! - a saved curve can be reused by other front-ends
//!
//! Data flow: standards -> [`fit::fit_standards`] -> [`fit::PredictionGrid`] ->
//! [`fit::resolve_reading`] per sample.

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
