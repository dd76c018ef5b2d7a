use thiserror::Error;

/// Fatal failures raised by the loader and the analysis stages.
///
/// Per-row domain problems are not errors: they become
/// [`Rejection`](crate::record::Rejection)s and only escalate to
/// [`RaterError::RejectRateExceeded`] past the configured threshold.
#[derive(Error, Debug)]
pub enum RaterError {
    #[error("Schema error: missing column '{column}'")]
    MissingColumn { column: String },

    #[error("Schema error: unexpected column '{column}'")]
    ExtraColumn { column: String },

    #[error("Schema error at row {row}, field '{field}': cannot parse '{value}' as {expected}")]
    InvalidType {
        row: u64,
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("Cannot normalize sales method '{label}' at row {row}")]
    NormalizationAmbiguity { row: u64, label: String },

    #[error("Config error in '{field}': {reason}")]
    Config { field: String, reason: String },

    #[error("Rejected {rejected} of {total} rows, above the allowed rate of {threshold}")]
    RejectRateExceeded {
        rejected: usize,
        total: usize,
        threshold: f64,
    },

    #[error("No usable rows in input")]
    EmptyDataset,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RaterError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RaterError::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type RaterResult<T> = Result<T, RaterError>;
