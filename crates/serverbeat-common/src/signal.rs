//! Observations reported by senders and the ordered series built from them.

use crate::error::{Result, SignalError};
use crate::types::{now_in_seconds, to_readable_date};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Message carried by synthesized points when none is supplied.
pub const ARTIFICIAL_MESSAGE: &str = "Missing signal from the server";

/// Status tag of a [`DataPoint`], as spelled on the wire and in rule strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataPointStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NOT_OK")]
    NotOk,
    #[serde(rename = "MISSING")]
    Missing,
    #[serde(rename = "EXPECTED")]
    Artificial,
}

impl DataPointStatus {
    pub const ALL: [DataPointStatus; 4] = [
        DataPointStatus::Ok,
        DataPointStatus::NotOk,
        DataPointStatus::Missing,
        DataPointStatus::Artificial,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DataPointStatus::Ok => "OK",
            DataPointStatus::NotOk => "NOT_OK",
            DataPointStatus::Missing => "MISSING",
            DataPointStatus::Artificial => "EXPECTED",
        }
    }
}

impl FromStr for DataPointStatus {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OK" => Ok(DataPointStatus::Ok),
            "NOT_OK" => Ok(DataPointStatus::NotOk),
            "MISSING" => Ok(DataPointStatus::Missing),
            "EXPECTED" => Ok(DataPointStatus::Artificial),
            other => Err(SignalError::UnsupportedVariant(other.to_string())),
        }
    }
}

impl std::fmt::Display for DataPointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw form of a data point as it arrives from a sender or a database row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPointRecord {
    pub status: String,
    pub timestamp: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_value: Option<f64>,
}

/// Payload shared by the three observed variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: i64,
    pub message: String,
    pub numeric_value: f64,
}

/// A single observation at a point in time.
///
/// `Artificial` points are synthesized by gap reconstruction and never come
/// from a sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DataPointRecord", into = "DataPointRecord")]
pub enum DataPoint {
    Ok(Observation),
    NotOk(Observation),
    Missing(Observation),
    Artificial { timestamp: i64, message: String },
}

impl DataPoint {
    /// Builds a point of the given status. `numeric_value` defaults to 0 and
    /// is dropped for artificial points.
    pub fn observed(
        status: DataPointStatus,
        timestamp: i64,
        message: impl Into<String>,
        numeric_value: Option<f64>,
    ) -> Result<Self> {
        if timestamp < 0 {
            return Err(SignalError::NegativeTimestamp(timestamp));
        }
        let message = message.into();
        let observation = |message| Observation {
            timestamp,
            message,
            numeric_value: numeric_value.unwrap_or(0.0),
        };
        Ok(match status {
            DataPointStatus::Ok => DataPoint::Ok(observation(message)),
            DataPointStatus::NotOk => DataPoint::NotOk(observation(message)),
            DataPointStatus::Missing => DataPoint::Missing(observation(message)),
            DataPointStatus::Artificial => DataPoint::Artificial { timestamp, message },
        })
    }

    pub fn artificial(timestamp: i64) -> Self {
        DataPoint::Artificial {
            timestamp,
            message: ARTIFICIAL_MESSAGE.to_string(),
        }
    }

    pub fn from_record(record: DataPointRecord) -> Result<Self> {
        let status: DataPointStatus = record.status.parse()?;
        match (status, record.message) {
            (DataPointStatus::Artificial, None) => {
                if record.timestamp < 0 {
                    return Err(SignalError::NegativeTimestamp(record.timestamp));
                }
                Ok(DataPoint::artificial(record.timestamp))
            }
            (status, message) => DataPoint::observed(
                status,
                record.timestamp,
                message.unwrap_or_default(),
                record.numeric_value,
            ),
        }
    }

    pub fn to_record(&self) -> DataPointRecord {
        let numeric_value = match self {
            DataPoint::Artificial { .. } => None,
            _ => Some(self.numeric_value()),
        };
        DataPointRecord {
            status: self.status().as_str().to_string(),
            timestamp: self.timestamp(),
            message: Some(self.message().to_string()),
            numeric_value,
        }
    }

    pub fn status(&self) -> DataPointStatus {
        match self {
            DataPoint::Ok(_) => DataPointStatus::Ok,
            DataPoint::NotOk(_) => DataPointStatus::NotOk,
            DataPoint::Missing(_) => DataPointStatus::Missing,
            DataPoint::Artificial { .. } => DataPointStatus::Artificial,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            DataPoint::Ok(o) | DataPoint::NotOk(o) | DataPoint::Missing(o) => o.timestamp,
            DataPoint::Artificial { timestamp, .. } => *timestamp,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DataPoint::Ok(o) | DataPoint::NotOk(o) | DataPoint::Missing(o) => &o.message,
            DataPoint::Artificial { message, .. } => message,
        }
    }

    pub fn numeric_value(&self) -> f64 {
        match self {
            DataPoint::Ok(o) | DataPoint::NotOk(o) | DataPoint::Missing(o) => o.numeric_value,
            DataPoint::Artificial { .. } => 0.0,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, DataPoint::Ok(_))
    }

    pub fn is_not_ok(&self) -> bool {
        matches!(self, DataPoint::NotOk(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, DataPoint::Missing(_))
    }

    pub fn is_artificial(&self) -> bool {
        matches!(self, DataPoint::Artificial { .. })
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DataPoint::Ok(_) => "OK",
            DataPoint::NotOk(_) => "Not OK",
            DataPoint::Missing(_) => "Missing",
            DataPoint::Artificial { .. } => "No Signal",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            DataPoint::Ok(_) => "black",
            DataPoint::NotOk(_) => "red",
            DataPoint::Missing(_) | DataPoint::Artificial { .. } => "orange",
        }
    }

    pub fn to_readable_timestamp(&self) -> String {
        to_readable_date(self.timestamp(), true)
    }
}

impl TryFrom<DataPointRecord> for DataPoint {
    type Error = SignalError;

    fn try_from(record: DataPointRecord) -> Result<Self> {
        DataPoint::from_record(record)
    }
}

impl From<DataPoint> for DataPointRecord {
    fn from(point: DataPoint) -> Self {
        point.to_record()
    }
}

/// Wire form of a [`TimeSeriesSignal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRecord {
    pub sender: String,
    pub data_points: Vec<DataPointRecord>,
    pub signal_timestamp: i64,
    #[serde(rename = "serverbeatTag")]
    pub tag: String,
    #[serde(rename = "serverbeatSubtag")]
    pub subtag: String,
}

/// Ascending sequence of data points reported by one sender for one
/// (tag, subtag), as known at `signal_timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SignalRecord", into = "SignalRecord")]
pub struct TimeSeriesSignal {
    sender: String,
    data_points: Vec<DataPoint>,
    signal_timestamp: i64,
    tag: String,
    subtag: String,
}

impl TimeSeriesSignal {
    /// Builds a series. With `sort` set the points are ordered first;
    /// otherwise they must already be ascending.
    pub fn new(
        sender: impl Into<String>,
        data_points: Vec<DataPoint>,
        signal_timestamp: i64,
        tag: impl Into<String>,
        subtag: impl Into<String>,
        sort: bool,
    ) -> Result<Self> {
        let mut signal = Self {
            sender: sender.into(),
            data_points,
            signal_timestamp,
            tag: tag.into(),
            subtag: subtag.into(),
        };
        if sort {
            signal.sort_data_points();
        }
        signal.check_order()?;
        Ok(signal)
    }

    pub fn from_record(record: SignalRecord, sort: bool) -> Result<Self> {
        let data_points = record
            .data_points
            .into_iter()
            .map(DataPoint::from_record)
            .collect::<Result<Vec<_>>>()?;
        Self::new(
            record.sender,
            data_points,
            record.signal_timestamp,
            record.tag,
            record.subtag,
            sort,
        )
    }

    pub fn to_record(&self) -> SignalRecord {
        SignalRecord {
            sender: self.sender.clone(),
            data_points: self.data_points.iter().map(DataPoint::to_record).collect(),
            signal_timestamp: self.signal_timestamp,
            tag: self.tag.clone(),
            subtag: self.subtag.clone(),
        }
    }

    fn check_order(&self) -> Result<()> {
        for (index, pair) in self.data_points.windows(2).enumerate() {
            let (previous, current) = (pair[0].timestamp(), pair[1].timestamp());
            if current < previous {
                return Err(SignalError::UnorderedTimestamps {
                    index: index + 1,
                    previous,
                    current,
                });
            }
        }
        Ok(())
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn subtag(&self) -> &str {
        &self.subtag
    }

    pub fn signal_timestamp(&self) -> i64 {
        self.signal_timestamp
    }

    pub fn data_points(&self) -> &[DataPoint] {
        &self.data_points
    }

    pub fn len(&self) -> usize {
        self.data_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }

    /// Stable ascending sort by timestamp.
    pub fn sort_data_points(&mut self) {
        self.data_points.sort_by_key(DataPoint::timestamp);
    }

    /// [`fill_in_the_blank_at`](Self::fill_in_the_blank_at) evaluated at the wall clock.
    pub fn fill_in_the_blank(
        &mut self,
        frequency_minutes: i64,
        tolerance_minutes: i64,
        sla_minutes: i64,
        critical_window_minutes: i64,
    ) -> usize {
        self.fill_in_the_blank_at(
            now_in_seconds(),
            frequency_minutes,
            tolerance_minutes,
            sla_minutes,
            critical_window_minutes,
        )
    }

    /// Inserts artificial points wherever an expected report is missing, from
    /// the start of the SLA + critical window up to `max(now, signal_timestamp)`.
    ///
    /// Returns the number of artificial points added.
    pub fn fill_in_the_blank_at(
        &mut self,
        now: i64,
        frequency_minutes: i64,
        tolerance_minutes: i64,
        sla_minutes: i64,
        critical_window_minutes: i64,
    ) -> usize {
        let frequency = frequency_minutes * 60;
        let tolerance = tolerance_minutes * 60;
        let sla = sla_minutes * 60;
        let critical_window = critical_window_minutes * 60;

        let end_time = now.max(self.signal_timestamp);
        let mut start_time =
            end_time - (sla + critical_window + (now - self.signal_timestamp).abs());
        if let Some(first) = self.data_points.first() {
            start_time = start_time.min(first.timestamp());
        }

        let original_len = self.data_points.len();
        if self.data_points.is_empty() {
            self.data_points.push(DataPoint::artificial(start_time));
        }

        let points = std::mem::take(&mut self.data_points);
        let mut merged = Vec::with_capacity(points.len());
        let mut cursor = start_time;
        for point in points {
            let next = point.timestamp();
            merged.extend(
                produce_artificial_timestamps(cursor, next, frequency, tolerance)
                    .into_iter()
                    .map(DataPoint::artificial),
            );
            merged.push(point);
            cursor = next;
        }
        merged.extend(
            produce_artificial_timestamps(cursor, end_time, frequency, tolerance)
                .into_iter()
                .map(DataPoint::artificial),
        );

        self.data_points = merged;
        self.data_points.len() - original_len
    }
}

impl TryFrom<SignalRecord> for TimeSeriesSignal {
    type Error = SignalError;

    fn try_from(record: SignalRecord) -> Result<Self> {
        TimeSeriesSignal::from_record(record, false)
    }
}

impl From<TimeSeriesSignal> for SignalRecord {
    fn from(signal: TimeSeriesSignal) -> Self {
        signal.to_record()
    }
}

/// Timestamps expected between `start` and `end` when reports arrive every
/// `frequency_secs` and may be late by up to `tolerance_secs`.
///
/// Steps forward by `frequency_secs` while the remaining gap still exceeds
/// `frequency_secs + tolerance_secs`; never emits a value at or after `end`.
///
/// ```
/// use serverbeat_common::signal::produce_artificial_timestamps;
///
/// let ts = produce_artificial_timestamps(0, 1000, 100, 50);
/// assert_eq!(ts, vec![100, 200, 300, 400, 500, 600, 700, 800, 900]);
/// ```
pub fn produce_artificial_timestamps(
    start: i64,
    end: i64,
    frequency_secs: i64,
    tolerance_secs: i64,
) -> Vec<i64> {
    if frequency_secs <= 0 {
        return Vec::new();
    }
    let distance = frequency_secs + tolerance_secs.max(0);
    let mut timestamps = Vec::new();
    let mut cursor = start;
    while cursor + distance < end {
        cursor += frequency_secs;
        timestamps.push(cursor);
    }
    timestamps
}
