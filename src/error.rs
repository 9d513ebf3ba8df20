//! Error types shared by the library and the `hcg` binary.
//!
//! Every failure is reported to the user as a single message plus a process
//! exit code. Nothing here is fatal in the panic sense: the caller can always
//! fix the input and run again.

use std::path::PathBuf;

/// Failure of the four-parameter logistic fit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("concentrations and readings differ in length ({concentrations} vs {readings})")]
    MismatchedInputs { concentrations: usize, readings: usize },

    #[error("at least {min} standards are required to fit four parameters, got {got}")]
    TooFewPoints { got: usize, min: usize },

    #[error("standard #{index} is not a finite number")]
    NonFiniteInput { index: usize },

    #[error("standard concentrations must be non-negative with at least one positive and two distinct levels")]
    DegenerateConcentrations,

    #[error("model produced a non-finite residual at the initial guess {params:?}")]
    NonFiniteStart { params: [f64; 4] },

    #[error("damped least-squares system is singular after {evaluations} evaluations")]
    SingularSystem { evaluations: usize },

    #[error("optimal parameters not found: evaluation budget of {max_evaluations} exhausted")]
    MaxEvaluations { max_evaluations: usize },
}

/// Application-level error with an associated process exit code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid standards: {0}")]
    InvalidStandards(String),

    #[error("'{}' is missing the required '{column}' column", .path.display())]
    MissingColumn { column: String, path: PathBuf },

    #[error("invalid sample table: {0}")]
    InvalidSamples(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("error during curve fitting: {0}")]
    Fit(#[from] FitError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },

    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{context}: {source}")]
    WorkbookRead {
        context: String,
        #[source]
        source: calamine::Error,
    },

    #[error("{context}: {source}")]
    WorkbookWrite {
        context: String,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
}

impl AppError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn csv(context: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    pub fn workbook_read(context: impl Into<String>, source: calamine::Error) -> Self {
        Self::WorkbookRead {
            context: context.into(),
            source,
        }
    }

    pub fn workbook_write(context: impl Into<String>, source: rust_xlsxwriter::XlsxError) -> Self {
        Self::WorkbookWrite {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for the `hcg` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::InvalidStandards(_)
            | AppError::MissingColumn { .. }
            | AppError::InvalidConfig(_) => 2,
            AppError::InvalidSamples(_) => 3,
            AppError::Fit(_) => 4,
            AppError::Io { .. }
            | AppError::Csv { .. }
            | AppError::Json { .. }
            | AppError::WorkbookRead { .. }
            | AppError::WorkbookWrite { .. } => 5,
        }
    }
}
