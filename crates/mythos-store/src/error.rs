use thiserror::Error;

use crate::archive::ArchiveError;

/// Errors produced by the store layer and the history facade.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON column or payload could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A lookup or update expected a row that does not exist.
    #[error("{table} record not found: {id}")]
    NotFound { table: &'static str, id: String },

    /// An insert collided with an existing primary key.
    #[error("{table} record already exists: {id}")]
    AlreadyExists { table: &'static str, id: String },

    /// A write targeted a table the transaction did not declare.
    #[error("table {0} is not part of this transaction")]
    OutOfScope(&'static str),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A creation draft or update violates the creation invariants.
    #[error("Invalid creation: {0}")]
    InvalidCreation(String),

    /// Export or import payload problem.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl StoreError {
    pub(crate) fn not_found(table: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            table,
            id: id.to_string(),
        }
    }

    /// Map an insert failure to [`StoreError::AlreadyExists`] when it is a
    /// primary-key collision.
    pub(crate) fn from_insert(err: rusqlite::Error, table: &'static str, id: impl ToString) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Self::AlreadyExists {
                    table,
                    id: id.to_string(),
                }
            }
            _ => Self::Sqlite(err),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
