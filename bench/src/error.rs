//! Error kinds surfaced by the vector layouts and the benchmark driver.

use crate::schema::VectorId;
use thiserror::Error;
use vecbench_core::StatisticsError;

pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    /// Creating, dropping or indexing a table failed for a reason other than
    /// the table not existing yet.
    #[error("schema operation on `{table}` failed: {source}")]
    SchemaOperation {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("table `{table}` does not match the requested layout: {reason}")]
    SchemaMismatch { table: String, reason: String },

    #[error("expected {expected} values per vector, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("value at position {position} is NaN")]
    NanValue { position: usize },

    #[error("vector {vector_id} has {found} stored attributes, expected {expected}")]
    ReconstructionCorruption {
        vector_id: VectorId,
        expected: usize,
        found: usize,
    },

    #[error("invalid projection: {0}")]
    InvalidProjection(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("layout used before its schema was created or opened")]
    NotInitialized,

    #[error("verification failed for {layout}: {detail}")]
    VerificationFailed { layout: String, detail: String },

    #[error("invalid value for {var}: {reason}")]
    Config { var: String, reason: String },

    #[error(transparent)]
    Statistics(#[from] StatisticsError),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl BenchError {
    pub(crate) fn schema(table: &str, source: rusqlite::Error) -> Self {
        BenchError::SchemaOperation {
            table: table.to_string(),
            source,
        }
    }
}

/// True when SQLite reports that the table being dropped does not exist.
///
/// This is the only drop failure `create_schema` recovers from.
pub(crate) fn is_missing_table(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.starts_with("no such table"),
        _ => false,
    }
}
