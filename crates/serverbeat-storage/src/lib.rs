//! Persistence for reported signals and computed alert verdicts.
//!
//! [`SignalStore`] and [`AlertStore`] are the contracts the evaluator works
//! against. The default implementation ([`engine::SqliteStore`]) keeps all
//! three tables in one SQLite database in WAL mode. Aggregated views over
//! alerts are pure reductions in [`aggregate`] and come for free with any
//! [`AlertStore`] that can list its rows.

pub mod aggregate;
pub mod database;
pub mod engine;
pub mod error;


use error::Result;
use serde::Serialize;
use serverbeat_common::signal::TimeSeriesSignal;
use serverbeat_common::types::ServerbeatAlert;
use std::collections::BTreeMap;

pub use aggregate::DetailedAlert;
pub use engine::SqliteStore;
pub use error::StorageError;

/// Which stored version of a time series to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesAt {
    /// The version with the greatest signal timestamp.
    Latest,
    /// The version reported at exactly this signal timestamp.
    At(i64),
}

/// A distinct `(sender, tag)` pair seen in stored signals.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SenderTag {
    pub sender: String,
    pub tag: String,
}

/// A persisted verdict, keyed by
/// `(project, crumbs, sender, tag, subtag, alert_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub project: String,
    pub crumbs: Vec<String>,
    pub sender: String,
    pub tag: String,
    pub subtag: String,
    pub alert_name: String,
    #[serde(flatten)]
    pub alert: ServerbeatAlert,
}

/// Read and write access to reported signals.
///
/// Series lookups take a sender list for forward compatibility but accept
/// exactly one sender; any other count fails with
/// [`StorageError::InvalidArgument`].
pub trait SignalStore: Send + Sync {
    /// Returns `None` when no version matches.
    fn get_time_series(
        &self,
        project: &str,
        tag: &str,
        subtag: &str,
        at: SeriesAt,
        senders: &[String],
    ) -> Result<Option<TimeSeriesSignal>>;

    /// Builds a series out of single-signal rows reported at or before
    /// `max_timestamp`, keeping the newest report for each observation time.
    fn get_single_as_time_series(
        &self,
        project: &str,
        tag: &str,
        subtag: &str,
        max_timestamp: i64,
        senders: &[String],
    ) -> Result<TimeSeriesSignal>;

    fn write_time_series_signal(&self, project: &str, signal: &TimeSeriesSignal) -> Result<()>;

    /// The signal must carry exactly one data point.
    fn write_single_signal(&self, project: &str, signal: &TimeSeriesSignal) -> Result<()>;

    /// Signal timestamps of stored series, ascending. An empty sender list
    /// matches every sender.
    fn time_series_timestamps(
        &self,
        project: &str,
        tag: &str,
        subtag: &str,
        senders: &[String],
    ) -> Result<Vec<i64>>;

    fn single_signal_timestamps(
        &self,
        project: &str,
        tag: &str,
        subtag: &str,
        senders: &[String],
    ) -> Result<Vec<i64>>;

    fn tags_and_senders(&self, project: &str) -> Result<Vec<SenderTag>>;

    /// Every project that has stored at least one signal.
    fn project_ids(&self) -> Result<Vec<String>>;

    /// Returns the number of rows removed.
    fn remove_time_series_older_than(&self, project: &str, cutoff: i64) -> Result<usize>;

    fn remove_single_signals_older_than(&self, project: &str, cutoff: i64) -> Result<usize>;
}

/// Persisted verdicts and the views built on them.
pub trait AlertStore: Send + Sync {
    /// Inserts or replaces the verdict for the record's key.
    fn write_alert(&self, record: &AlertRecord) -> Result<()>;

    /// Removes the project's verdicts stamped before `cutoff`. Returns the
    /// number of rows removed.
    fn delete_alerts_older_than(&self, project: &str, cutoff: i64) -> Result<usize>;

    fn list_alerts(&self, project: &str) -> Result<Vec<AlertRecord>>;

    /// Worst light per crumbs key.
    fn alerts_grouped_by_crumbs(&self, project: &str) -> Result<BTreeMap<String, ServerbeatAlert>> {
        Ok(aggregate::worst_by_crumbs(&self.list_alerts(project)?))
    }

    /// Worst light per crumbs key, then per tag.
    fn alerts_grouped_by_crumbs_and_tag(
        &self,
        project: &str,
    ) -> Result<BTreeMap<String, BTreeMap<String, ServerbeatAlert>>> {
        Ok(aggregate::worst_by_crumbs_and_tag(&self.list_alerts(project)?))
    }

    /// Per-subtag detail for one `(tag, sender)` under a crumbs prefix.
    fn detailed_tag_alerts(
        &self,
        project: &str,
        tag: &str,
        sender: &str,
        crumbs: &[String],
    ) -> Result<BTreeMap<String, DetailedAlert>> {
        Ok(aggregate::detailed_tag_alerts(
            &self.list_alerts(project)?,
            tag,
            sender,
            crumbs,
        ))
    }

    /// Worst light at one crumbs path, GRAY when nothing was evaluated there.
    fn crumbs_alert(&self, project: &str, crumbs: &[String]) -> Result<ServerbeatAlert> {
        let grouped = self.alerts_grouped_by_crumbs(project)?;
        Ok(aggregate::or_gray(grouped.get(&serverbeat_common::types::join_crumbs(crumbs))))
    }
}
