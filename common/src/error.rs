use thiserror::Error;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("File search error: {0}")]
    FileSearch(String),
    #[error("Indexing timed out after {attempts} poll attempts ({waited_secs}s)")]
    IndexingTimeout { attempts: u32, waited_secs: u64 },
    #[error("Ingestion processing error: {0}")]
    Processing(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Prefixes the message of string-carrying variants with `context`.
    ///
    /// Wrapped source errors (database, object store, http) keep their type so
    /// the HTTP layer can still classify them.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Self::NotFound(msg) => Self::NotFound(format!("{context}: {msg}")),
            Self::Validation(msg) => Self::Validation(format!("{context}: {msg}")),
            Self::FileSearch(msg) => Self::FileSearch(format!("{context}: {msg}")),
            Self::Processing(msg) => Self::Processing(format!("{context}: {msg}")),
            Self::InternalError(msg) => Self::InternalError(format!("{context}: {msg}")),
            other => other,
        }
    }
}
