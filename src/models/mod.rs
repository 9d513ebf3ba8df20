//! Dose-response model implementation.
//!
//! The model is a small set of pure functions so that fitting, inversion and
//! reporting code can share one definition.

pub mod model;

pub use model::*;
