//! Error taxonomy shared by every layer.
//!
//! Driver failures are carried opaquely as boxed sources; nothing in the core
//! translates or retries them.

/// Boxed driver error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by statement execution and transaction lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to begin transaction: {0}")]
    TransactionOpen(#[source] BoxError),

    #[error("Statement failed: {0}")]
    Statement(#[source] BoxError),

    #[error("Failed to commit transaction: {0}")]
    Commit(#[source] BoxError),

    #[error("Failed to rollback transaction: {0}")]
    Rollback(#[source] BoxError),

    #[error("Transaction already closed")]
    TxClosed,

    #[error("Transaction connection is busy")]
    ConnBusy,

    #[error("Scope cancelled")]
    Cancelled,

    #[error("Scope deadline exceeded")]
    DeadlineExceeded,

    #[error("No rows in result set")]
    NoRows,

    #[error("Cannot decode column {column}: expected {expected}, found {found}")]
    Decode {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Batch aborted by an earlier failure")]
    BatchAborted,

    #[error("No more batch results")]
    BatchExhausted,
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub fn transaction_open(err: impl Into<BoxError>) -> Self {
        Self::TransactionOpen(err.into())
    }

    pub fn statement(err: impl Into<BoxError>) -> Self {
        Self::Statement(err.into())
    }

    pub fn commit(err: impl Into<BoxError>) -> Self {
        Self::Commit(err.into())
    }

    pub fn rollback(err: impl Into<BoxError>) -> Self {
        Self::Rollback(err.into())
    }

    /// `true` for the "already closed" error that cleanup swallows.
    pub fn is_tx_closed(&self) -> bool {
        matches!(self, Self::TxClosed)
    }

    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows)
    }

    /// `true` when the scope was cancelled or its deadline passed, including
    /// when that happened while opening a transaction or running a statement.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled | Self::DeadlineExceeded => true,
            Self::TransactionOpen(source) | Self::Statement(source) => source
                .downcast_ref::<DbError>()
                .is_some_and(DbError::is_cancellation),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_seen_through_open_errors() {
        let err = DbError::transaction_open(DbError::Cancelled);
        assert!(err.is_cancellation());
        assert!(!err.is_tx_closed());

        let err = DbError::statement(std::io::Error::other("connection reset"));
        assert!(!err.is_cancellation());
    }

    #[test]
    fn display_keeps_driver_message() {
        let err = DbError::commit(std::io::Error::other("serialization failure"));
        assert_eq!(
            err.to_string(),
            "Failed to commit transaction: serialization failure"
        );
    }
}
