use crate::condition::{AlertConditions, SnapshotConditions};
use crate::error::{AlertError, Result};
use serde::{Deserialize, Serialize};
use serverbeat_common::signal::TimeSeriesSignal;
use serverbeat_common::types::{now_in_seconds, ServerbeatAlert};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Snapshot,
    Variation,
    AbsoluteSize,
}

impl FromStr for AlertKind {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "snapshot" => Ok(Self::Snapshot),
            "variation" => Ok(Self::Variation),
            "absolute_size" => Ok(Self::AbsoluteSize),
            other => Err(AlertError::UnsupportedAlertType(other.to_string())),
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snapshot => write!(f, "snapshot"),
            Self::Variation => write!(f, "variation"),
            Self::AbsoluteSize => write!(f, "absolute_size"),
        }
    }
}

/// Alert rule as written in `alerts/<name>`.
///
/// ```yaml
/// type: snapshot
/// description: partitions keep failing
/// snapshot_count: 5
/// conditions:
///   RED: NOT_OK|MISSING >= 3
///   YELLOW: NOT_OK >= 1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertDocument {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub snapshot_count: u32,
    #[serde(default)]
    pub conditions: ConditionsDocument,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionsDocument {
    #[serde(rename = "RED", default, skip_serializing_if = "Option::is_none")]
    pub red: Option<String>,
    #[serde(rename = "YELLOW", default, skip_serializing_if = "Option::is_none")]
    pub yellow: Option<String>,
}

/// A parsed alert rule, ready to evaluate signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    pub name: String,
    pub kind: AlertKind,
    pub description: String,
    pub snapshot_count: u32,
    pub conditions: AlertConditions,
}

impl AlertConfig {
    pub fn from_document(name: impl Into<String>, doc: AlertDocument) -> Result<Self> {
        let kind: AlertKind = doc.kind.parse()?;
        let conditions = match kind {
            AlertKind::Snapshot => AlertConditions::Snapshot(SnapshotConditions::from_rules(
                doc.conditions.red.as_deref(),
                doc.conditions.yellow.as_deref(),
            )?),
            AlertKind::Variation => AlertConditions::Variation,
            AlertKind::AbsoluteSize => AlertConditions::AbsoluteSize,
        };
        Ok(Self {
            name: name.into(),
            kind,
            description: doc.description,
            snapshot_count: doc.snapshot_count,
            conditions,
        })
    }

    pub fn calculate_alert(&self, sla_minutes: i64, signal: &TimeSeriesSignal) -> ServerbeatAlert {
        self.calculate_alert_at(now_in_seconds(), sla_minutes, signal)
    }

    pub fn calculate_alert_at(
        &self,
        now: i64,
        sla_minutes: i64,
        signal: &TimeSeriesSignal,
    ) -> ServerbeatAlert {
        self.conditions
            .calculate_at(now, sla_minutes, signal, self.snapshot_count)
    }
}
