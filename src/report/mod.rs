//! Reporting utilities: standards back-calculation and formatted terminal output.

pub mod format;

pub use format::*;
