//! Static project configuration for serverbeat: tag and subtag definitions,
//! the crumbs tree that says which sender reports which tag, and the tag
//! dependency graph. Pure data and traversal, no I/O.

pub mod error;
pub mod graph;
pub mod tag;
pub mod tree;
pub mod view;

#[cfg(test)]
mod tests;

pub use error::ProjectError;
pub use graph::DependencyGraph;
pub use tag::{SubtagConfig, SubtagType, TagConfig, TagDocument, TagTiming};
pub use tree::{LeafEntry, ProjectTree, TagAndSender};
pub use view::ProjectConfig;
