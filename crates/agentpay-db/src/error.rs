//! Database error types

use agentpay_types::GatewayError;
use thiserror::Error;

/// Database operation errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Row decode error: {0}")]
    Decode(String),
}

impl DbError {
    /// Whether the underlying failure was a unique-constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Duplicate(_) => true,
            Self::Query(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<DbError> for GatewayError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => GatewayError::internal(format!("missing row: {}", what)),
            other => GatewayError::database(other.to_string()),
        }
    }
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;
