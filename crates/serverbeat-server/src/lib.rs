//! Scheduled alert evaluation.
//!
//! [`evaluator::AlertEvaluator`] runs one pass over a project: it resolves the
//! units attached to the project tree, evaluates each against the stored
//! signals and sweeps verdicts the pass did not refresh. The schedulers in
//! [`scheduler`] drive passes and signal retention on a fixed cadence.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod scheduler;

pub use error::{ConfigError, EvaluationError};
pub use evaluator::{AlertEvaluator, EvaluationUnit, PassReport};
pub use loader::{ConfigLoader, YamlProjectLoader};
