use serverbeat_common::error::SignalError;

/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use serverbeat_storage::error::StorageError;
///
/// let err = StorageError::InvalidArgument("expected exactly one sender, got 2".to_string());
/// assert!(err.to_string().contains("one sender"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The `signal_data` column could not be encoded or decoded.
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored row does not describe a valid signal.
    #[error("Storage: invalid signal: {0}")]
    Signal(#[from] SignalError),

    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller passed arguments the store does not support, such as more
    /// than one sender for a series lookup.
    #[error("Storage: {0}")]
    InvalidArgument(String),

    /// A column contained an unexpected value.
    #[error("Storage: unexpected value in column '{column}': expected {expected}")]
    UnexpectedColumnType {
        column: &'static str,
        expected: &'static str,
    },
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
