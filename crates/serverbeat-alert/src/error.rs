#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlertError {
    #[error("Alert: malformed rule '{rule}': {reason}")]
    MalformedRule { rule: String, reason: String },

    /// Snapshot alerts need both a RED and a YELLOW rule.
    #[error("Alert: missing {0} condition")]
    MissingCondition(&'static str),

    #[error("Alert: alert type '{0}' is not supported")]
    UnsupportedAlertType(String),
}

pub type Result<T> = std::result::Result<T, AlertError>;
