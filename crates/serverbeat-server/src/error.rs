use serverbeat_alert::AlertError;
use serverbeat_project::ProjectError;
use serverbeat_storage::StorageError;

/// A project document could not be loaded. Every variant names the file (or
/// project) involved and keeps the underlying cause.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config: failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config: failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Config: invalid tag document {path}: {source}")]
    InvalidTag {
        path: String,
        #[source]
        source: ProjectError,
    },

    #[error("Config: invalid alert document {path}: {source}")]
    InvalidAlert {
        path: String,
        #[source]
        source: AlertError,
    },

    #[error("Config: invalid tree for project {project}: {source}")]
    InvalidTree {
        project: String,
        #[source]
        source: ProjectError,
    },
}

/// Failures of an evaluation pass or of one of its units.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Evaluation: {0}")]
    Config(#[from] ConfigError),

    #[error("Evaluation: {0}")]
    Storage(#[from] StorageError),

    #[error("Evaluation: {0}")]
    Project(#[from] ProjectError),

    #[error("Evaluation: no time series stored for tag '{tag}' subtag '{subtag}' sender '{sender}'")]
    NoSignal {
        tag: String,
        subtag: String,
        sender: String,
    },

    #[error("Evaluation: worker pool closed")]
    PoolClosed(#[from] tokio::sync::AcquireError),

    #[error("Evaluation: worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, EvaluationError>;
