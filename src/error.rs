use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A required field is missing or cannot be parsed. Aborts the whole batch.
    /// `row` is the 1-based position of the record among the data rows, so
    /// headers and blank lines are not counted; 0 points at the CSV header.
    #[error("malformed input at row {row}: {field} {reason}")]
    MalformedInput { row: usize, field: &'static str, reason: String },
    #[error("insufficient data: {rows} rows, at least {required} required")]
    InsufficientData { rows: usize, required: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn malformed(row: usize, field: &'static str, reason: impl Into<String>) -> Self {
        Error::MalformedInput { row, field, reason: reason.into() }
    }
}
