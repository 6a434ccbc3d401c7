use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("row {row}: unknown entity {value:?}")]
    UnknownEntity { row: usize, value: String },

    #[error("row {row}: unparseable date {value:?}")]
    InvalidDate { row: usize, value: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
