#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectError {
    #[error("Project: tag '{tag}' must have exactly one default subtag, found {found}")]
    DefaultSubtag { tag: String, found: usize },

    #[error("Project: invalid subtag '{subtag}' for tag '{tag}'")]
    UnknownSubtag { tag: String, subtag: String },

    #[error("Project: tag '{tag}' has unsupported type '{kind}'")]
    UnknownTagType { tag: String, kind: String },

    /// `multi` tags list their subtags explicitly.
    #[error("Project: tag '{0}' is of type 'multi' but declares no subtags")]
    MissingSubtags(String),

    #[error("Project: tag '{0}' declares subtags, only 'multi' type can have subtags")]
    UnexpectedSubtags(String),

    #[error("Project: malformed tree at '{path}': {reason}")]
    MalformedTree { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ProjectError>;
