//! Error types for mf-db

use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Table not found (D003)
    #[error("[D003] Table or view not found: {0}")]
    TableNotFound(String),

    /// Server refused a new client (D004)
    #[error("[D004] Too many clients: {0}")]
    TooManyClients(String),

    /// Handle was closed (D005)
    #[error("[D005] Database connection is closed")]
    Closed,

    /// Every connection attempt failed (D006)
    #[error("[D006] Could not connect to the database after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<DbError>,
    },

    /// Run context cancelled while retrying (D007)
    #[error("[D007] Run context canceled by the user")]
    Cancelled,

    /// Mutex poisoned (D008)
    #[error("[D008] Database mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Internal error (D009)
    #[error("[D009] Internal database error: {0}")]
    Internal(String),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

/// Coarse classification used to decide how the service reacts to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The connection is gone or could not be made
    Connection,
    /// The server has no capacity for another client
    TooManyClients,
    /// A relation the schema should contain is missing
    MissingRelation,
    /// Anything else
    Other,
}

impl DbError {
    /// Classify this error for liveness handling
    pub fn class(&self) -> ErrorClass {
        match self {
            DbError::ConnectionError(_) | DbError::Closed => ErrorClass::Connection,
            DbError::RetriesExhausted { .. } => ErrorClass::Connection,
            DbError::TooManyClients(_) => ErrorClass::TooManyClients,
            DbError::TableNotFound(_) => ErrorClass::MissingRelation,
            DbError::ExecutionError(msg) => classify_message(msg),
            DbError::Cancelled | DbError::MutexPoisoned(_) | DbError::Internal(_) => {
                ErrorClass::Other
            }
        }
    }
}

fn classify_message(msg: &str) -> ErrorClass {
    let lower = msg.to_ascii_lowercase();
    if lower.contains("connection refused") || lower.contains("connection error") {
        ErrorClass::Connection
    } else if lower.contains("too many clients") {
        ErrorClass::TooManyClients
    } else {
        ErrorClass::Other
    }
}

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error does not expose structured variants, so the
        // message is the only thing to classify on.
        let msg = err.to_string();
        if msg.contains("Table with name")
            || msg.contains("View with name")
            || msg.contains("Table or view with name")
            || (msg.contains("Catalog Error") && msg.contains("Table") && msg.contains("not found"))
        {
            DbError::TableNotFound(msg)
        } else if msg.contains("Connection Error") {
            DbError::ConnectionError(msg)
        } else {
            DbError::ExecutionError(msg)
        }
    }
}
