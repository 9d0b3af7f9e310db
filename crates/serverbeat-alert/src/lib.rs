//! Alert conditions for serverbeat.
//!
//! An alert document names a kind and, for snapshot alerts, a RED and a
//! YELLOW rule of the form `TYPE(|TYPE)* COMPARATOR NUMBER`. Evaluating an
//! [`AlertConfig`] against a [`TimeSeriesSignal`](serverbeat_common::signal::TimeSeriesSignal)
//! counts the most recent snapshots older than the SLA and returns a
//! traffic-light verdict.

pub mod condition;
pub mod config;
pub mod error;


pub use condition::{AlertConditions, Comparator, SnapshotConditions, StatusTally, Threshold};
pub use config::{AlertConfig, AlertDocument, AlertKind};
pub use error::AlertError;
