use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Recoverable failures raised by the query engine.
///
/// None of these end a session: the caller reports them and lets the user
/// retry with a different field, format or filter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Column number {position} out of range (dataset has {count} columns)")]
    OutOfRange { position: usize, count: usize },

    #[error("Could not interpret input: {0}")]
    UnresolvableField(String),

    #[error("No fields detected as dates with format '{0}'")]
    NoDateFieldsDetected(String),

    #[error("Invalid filter selection: {0}")]
    InvalidFilterSelection(String),

    #[error("No data found for the selected filter")]
    EmptyFilterResult,

    #[error("Field '{field}' must be numeric (found {found})")]
    TypeMismatch { field: String, found: String },

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Formula error: {0}")]
    Formula(String),
}
