use thiserror::Error;

/// Errors raised while building or binding upsert statements.
///
/// Every variant is produced before any SQL leaves the engine; backend
/// failures during execution travel through `anyhow` instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpsertError {
    #[error(
        "No key columns found for entity '{entity}': mark at least one column as primary key \
         or name a unique constraint as the conflict target"
    )]
    MissingKeyColumns { entity: String },

    #[error(
        "No value columns found for entity '{entity}': at least one mapped column must be \
         neither a key column nor generated"
    )]
    MissingValueColumns { entity: String },

    #[error("Invalid row count {row_count} for table '{table}': batches need at least one row")]
    InvalidRowCount { table: String, row_count: usize },

    #[error("Batch for table '{table}' was prepared for {expected} rows but got {actual}")]
    BatchSizeMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Batch of {row_count} rows x {columns} columns for table '{table}' exceeds the limit of \
         {limit} bind parameters; lower the batch size"
    )]
    TooManyParameters {
        table: String,
        row_count: usize,
        columns: usize,
        limit: usize,
    },

    #[error("Column '{column}' appears more than once in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error("Column '{column}' of table '{table}' is both a key column and a value column")]
    KeyValueOverlap { table: String, column: String },

    #[error("Unknown entity type '{entity}'")]
    UnknownEntity { entity: String },

    #[error("Entity '{entity}' declares no unique constraint named '{constraint}'")]
    UnknownConstraint { entity: String, constraint: String },

    #[error("Column '{column}' of entity '{entity}' is not declared")]
    UnknownColumn { entity: String, column: String },

    #[error("Unsupported database: '{product}' (expected PostgreSQL or MySQL)")]
    UnsupportedDatabase { product: String },

    #[error("Row {row} for table '{table}' has {actual} values, expected {expected}")]
    RowArity {
        table: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid value for column '{column}': {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("Failed to serialize JSON value for column '{column}': {reason}")]
    Json { column: String, reason: String },
}

pub type Result<T, E = UpsertError> = std::result::Result<T, E>;
