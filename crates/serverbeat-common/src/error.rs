/// Errors raised while building data points and time series signals.
///
/// # Examples
///
/// ```rust
/// use serverbeat_common::error::SignalError;
///
/// let err = SignalError::UnsupportedVariant("FOO".to_string());
/// assert!(err.to_string().contains("FOO"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// The record carries a status that is not one of `OK`, `NOT_OK`, `MISSING`, `EXPECTED`.
    #[error("Signal: unsupported data point status '{0}'")]
    UnsupportedVariant(String),

    /// Timestamps are whole seconds since the epoch and never negative.
    #[error("Signal: negative timestamp {0}")]
    NegativeTimestamp(i64),

    /// A series declared as sorted has a point older than its predecessor.
    #[error("Signal: timestamps are not in order at index {index} ({current} < {previous})")]
    UnorderedTimestamps {
        index: usize,
        previous: i64,
        current: i64,
    },
}

/// Convenience `Result` alias for signal model operations.
pub type Result<T> = std::result::Result<T, SignalError>;
