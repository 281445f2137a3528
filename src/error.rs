use thiserror::Error;

/// Structural failures of an aggregation call.
///
/// Malformed cells never surface here; they degrade to a zero contribution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("invalid column `{column}`: not present in dataset schema")]
    InvalidColumn { column: String },

    #[error("selection setting `{setting}` is required by this view")]
    MissingSelection { setting: String },

    #[error("selection setting `{setting}` has no meaning for `{view}` views")]
    UnsupportedSelection { setting: String, view: String },
}

/// Failures while assembling a [`Dataset`](crate::dataset::Dataset).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    #[error("duplicate column `{0}` in header")]
    DuplicateColumn(String),

    #[error("record {row} has {found} cells, expected {expected}")]
    RaggedRecord {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("record {row} does not match the dataset columns (column `{column}`)")]
    SchemaDrift { row: usize, column: String },
}

pub type Result<T> = std::result::Result<T, AggregateError>;
