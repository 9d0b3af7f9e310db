use crate::error::{AlertError, Result};
use serverbeat_common::signal::{DataPoint, DataPointStatus, TimeSeriesSignal};
use serverbeat_common::types::{ServerbeatAlert, TrafficLight};
use std::str::FromStr;

pub const ALL_GOOD_MESSAGE: &str = "all good!";
pub const NOT_IMPLEMENTED_MESSAGE: &str = "not implemented!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Equal,
}

impl Comparator {
    pub fn check(self, value: u64, threshold: u64) -> bool {
        match self {
            Self::LessThan => value < threshold,
            Self::LessEqual => value <= threshold,
            Self::GreaterThan => value > threshold,
            Self::GreaterEqual => value >= threshold,
            Self::Equal => value == threshold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LessThan => "<",
            Self::LessEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterEqual => ">=",
            Self::Equal => "=",
        }
    }

    /// Splits a leading comparator off `s`, longest operator first.
    fn split_prefix(s: &str) -> Option<(Self, &str)> {
        const OPERATORS: [(&str, Comparator); 5] = [
            (">=", Comparator::GreaterEqual),
            ("<=", Comparator::LessEqual),
            ("=", Comparator::Equal),
            ("<", Comparator::LessThan),
            (">", Comparator::GreaterThan),
        ];
        OPERATORS
            .iter()
            .find_map(|(op, cmp)| s.strip_prefix(op).map(|rest| (*cmp, rest)))
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-status counts over the snapshots a rule looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTally {
    pub ok: u64,
    pub not_ok: u64,
    pub missing: u64,
    pub artificial: u64,
}

impl StatusTally {
    /// Walks `points` newest to oldest, ignoring anything newer than `cutoff`,
    /// and counts at most `snapshot_count` of the rest.
    pub fn collect(points: &[DataPoint], cutoff: i64, snapshot_count: u32) -> Self {
        let mut tally = Self::default();
        points
            .iter()
            .rev()
            .filter(|p| p.timestamp() <= cutoff)
            .take(snapshot_count as usize)
            .for_each(|p| tally.add(p.status()));
        tally
    }

    fn add(&mut self, status: DataPointStatus) {
        match status {
            DataPointStatus::Ok => self.ok += 1,
            DataPointStatus::NotOk => self.not_ok += 1,
            DataPointStatus::Missing => self.missing += 1,
            DataPointStatus::Artificial => self.artificial += 1,
        }
    }

    pub fn count(&self, status: DataPointStatus) -> u64 {
        match status {
            DataPointStatus::Ok => self.ok,
            DataPointStatus::NotOk => self.not_ok,
            DataPointStatus::Missing => self.missing,
            DataPointStatus::Artificial => self.artificial,
        }
    }
}

/// One `TYPE(|TYPE)*COMPARATOR NUMBER` rule, e.g. `NOT_OK|MISSING >= 3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Threshold {
    /// Types as written; repeated entries are kept for display only.
    pub types: Vec<DataPointStatus>,
    pub comparator: Comparator,
    pub number: u64,
}

impl Threshold {
    /// Sum of the tallies of the distinct listed types.
    pub fn total(&self, tally: &StatusTally) -> u64 {
        DataPointStatus::ALL
            .iter()
            .filter(|status| self.types.contains(status))
            .map(|status| tally.count(*status))
            .sum()
    }

    /// Returns the total when the rule holds.
    pub fn matches(&self, tally: &StatusTally) -> Option<u64> {
        let total = self.total(tally);
        self.comparator.check(total, self.number).then_some(total)
    }

    pub fn types_label(&self) -> String {
        self.types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join("|")
    }

    fn verdict_message(&self, total: u64, snapshot_count: u32) -> String {
        format!(
            "{total} for ({}) which is {} {} in the past {snapshot_count} snapshots",
            self.types_label(),
            self.comparator,
            self.number,
        )
    }
}

impl FromStr for Threshold {
    type Err = AlertError;

    fn from_str(rule: &str) -> Result<Self> {
        let malformed = |reason: &str| AlertError::MalformedRule {
            rule: rule.to_string(),
            reason: reason.to_string(),
        };

        let compact: String = rule.chars().filter(|c| !c.is_whitespace()).collect();
        let op_start = compact
            .find(['<', '>', '='])
            .ok_or_else(|| malformed("missing comparator"))?;
        let (types_part, rest) = compact.split_at(op_start);
        let (comparator, number_part) =
            Comparator::split_prefix(rest).ok_or_else(|| malformed("missing comparator"))?;

        if number_part.is_empty() || !number_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("expected a decimal number after the comparator"));
        }
        let number = number_part
            .parse::<u64>()
            .map_err(|_| malformed("number out of range"))?;

        let types = types_part
            .split('|')
            .map(|t| {
                t.parse::<DataPointStatus>()
                    .map_err(|_| malformed(&format!("unknown status '{t}'")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            types,
            comparator,
            number,
        })
    }
}

impl std::fmt::Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.types_label(), self.comparator, self.number)
    }
}

/// RED and YELLOW thresholds of a snapshot alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConditions {
    pub red: Threshold,
    pub yellow: Threshold,
}

impl SnapshotConditions {
    pub fn from_rules(red: Option<&str>, yellow: Option<&str>) -> Result<Self> {
        let red = red.ok_or(AlertError::MissingCondition("RED"))?.parse()?;
        let yellow = yellow.ok_or(AlertError::MissingCondition("YELLOW"))?.parse()?;
        Ok(Self { red, yellow })
    }

    pub fn calculate_at(
        &self,
        now: i64,
        sla_minutes: i64,
        signal: &TimeSeriesSignal,
        snapshot_count: u32,
    ) -> ServerbeatAlert {
        let cutoff = latest_applicable_timestamp(now, sla_minutes);
        let tally = StatusTally::collect(signal.data_points(), cutoff, snapshot_count);

        for (light, threshold) in [
            (TrafficLight::Red, &self.red),
            (TrafficLight::Yellow, &self.yellow),
        ] {
            match threshold.matches(&tally) {
                Some(total) => {
                    return ServerbeatAlert::new(
                        light,
                        threshold.verdict_message(total, snapshot_count),
                        now,
                    )
                }
                None => tracing::trace!(
                    light = %light,
                    total = threshold.total(&tally),
                    rule = %threshold,
                    snapshot_count,
                    "Threshold not met"
                ),
            }
        }
        ServerbeatAlert::new(TrafficLight::Green, ALL_GOOD_MESSAGE, now)
    }
}

/// Conditions attached to an alert, one variant per alert kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertConditions {
    Snapshot(SnapshotConditions),
    Variation,
    AbsoluteSize,
}

impl AlertConditions {
    pub fn calculate_at(
        &self,
        now: i64,
        sla_minutes: i64,
        signal: &TimeSeriesSignal,
        snapshot_count: u32,
    ) -> ServerbeatAlert {
        match self {
            Self::Snapshot(conditions) => {
                conditions.calculate_at(now, sla_minutes, signal, snapshot_count)
            }
            Self::Variation | Self::AbsoluteSize => {
                ServerbeatAlert::new(TrafficLight::Green, NOT_IMPLEMENTED_MESSAGE, now)
            }
        }
    }
}

/// Newest timestamp a snapshot rule may look at: points reported within the
/// SLA are still allowed to arrive.
pub fn latest_applicable_timestamp(now: i64, sla_minutes: i64) -> i64 {
    now - sla_minutes * 60
}
