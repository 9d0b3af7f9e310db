use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Separator used when a crumbs path is stored as a single key.
pub const CRUMB_SEPARATOR: &str = "__CRUMB__";

/// Message attached to a GRAY verdict when the caller gives none.
pub const NO_ALERT_MESSAGE: &str = "no alert is set (or executed) for this entity";

/// Health verdict for an evaluated entity.
///
/// Variants are declared in code order so that `Ord` picks the worst light:
///
/// ```
/// use serverbeat_common::types::TrafficLight;
///
/// assert!(TrafficLight::Red > TrafficLight::Yellow);
/// assert!(TrafficLight::Green > TrafficLight::Gray);
/// assert_eq!(TrafficLight::from_code(1), Some(TrafficLight::Yellow));
/// assert_eq!(TrafficLight::Gray.code(), -1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TrafficLight {
    Gray,
    Green,
    Yellow,
    Red,
}

impl TrafficLight {
    pub fn code(self) -> i64 {
        match self {
            TrafficLight::Gray => -1,
            TrafficLight::Green => 0,
            TrafficLight::Yellow => 1,
            TrafficLight::Red => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(TrafficLight::Gray),
            0 => Some(TrafficLight::Green),
            1 => Some(TrafficLight::Yellow),
            2 => Some(TrafficLight::Red),
            _ => None,
        }
    }

    /// CSS colour used by dashboards.
    pub fn css_color(self) -> &'static str {
        match self {
            TrafficLight::Gray => "gray",
            TrafficLight::Green => "green",
            TrafficLight::Yellow => "orange",
            TrafficLight::Red => "red",
        }
    }
}

impl From<TrafficLight> for i64 {
    fn from(light: TrafficLight) -> Self {
        light.code()
    }
}

impl TryFrom<i64> for TrafficLight {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        TrafficLight::from_code(code).ok_or_else(|| format!("unknown traffic light code: {code}"))
    }
}

impl std::fmt::Display for TrafficLight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrafficLight::Gray => write!(f, "GRAY"),
            TrafficLight::Green => write!(f, "GREEN"),
            TrafficLight::Yellow => write!(f, "YELLOW"),
            TrafficLight::Red => write!(f, "RED"),
        }
    }
}

/// Outcome of evaluating one alert rule against one signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerbeatAlert {
    pub traffic_light: TrafficLight,
    pub message: String,
    /// Evaluation time, seconds since epoch.
    pub timestamp: i64,
}

impl ServerbeatAlert {
    pub fn new(traffic_light: TrafficLight, message: impl Into<String>, timestamp: i64) -> Self {
        Self {
            traffic_light,
            message: message.into(),
            timestamp,
        }
    }

    /// Verdict for an entity nothing has been computed for yet.
    pub fn gray(message: Option<&str>) -> Self {
        Self::new(
            TrafficLight::Gray,
            message.unwrap_or(NO_ALERT_MESSAGE),
            now_in_seconds(),
        )
    }
}

/// Joins a crumbs path into its storage key.
///
/// ```
/// use serverbeat_common::types::{join_crumbs, split_crumbs};
///
/// let crumbs = vec!["prod".to_string(), "ingest".to_string()];
/// let key = join_crumbs(&crumbs);
/// assert_eq!(key, "prod__CRUMB__ingest");
/// assert_eq!(split_crumbs(&key), crumbs);
/// ```
pub fn join_crumbs<S: AsRef<str>>(crumbs: &[S]) -> String {
    crumbs
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(CRUMB_SEPARATOR)
}

/// Inverse of [`join_crumbs`]; the empty key is the root path.
pub fn split_crumbs(key: &str) -> Vec<String> {
    if key.is_empty() {
        return Vec::new();
    }
    key.split(CRUMB_SEPARATOR).map(str::to_string).collect()
}

pub fn now_in_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Epoch seconds `days` days before now.
pub fn days_back_in_seconds(days: u32) -> i64 {
    now_in_seconds() - i64::from(days) * 24 * 60 * 60
}

/// Formats epoch seconds as `YYYY-MM-DD hh:mm:ss a Z`, or `YYYY-MM-DD HH:mm:ss`
/// without the zone.
pub fn to_readable_date(seconds: i64, include_timezone: bool) -> String {
    let Some(ts) = Utc.timestamp_opt(seconds, 0).single() else {
        return seconds.to_string();
    };
    if include_timezone {
        ts.format("%Y-%m-%d %I:%M:%S %P %:z").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
