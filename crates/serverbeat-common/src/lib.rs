//! Shared building blocks for serverbeat: the signal model, traffic-light
//! verdicts and the small helpers every other crate leans on.

pub mod error;
pub mod id;
pub mod signal;
pub mod types;

pub use error::SignalError;
pub use signal::{DataPoint, DataPointStatus, TimeSeriesSignal};
pub use types::{ServerbeatAlert, TrafficLight};
