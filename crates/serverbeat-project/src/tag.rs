use crate::error::{ProjectError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Tag type whose subtags are listed explicitly.
pub const MULTI_TYPE: &str = "multi";

pub const DEFAULT_SUBTAG: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtagType {
    Single,
    SingleWithSize,
    TimeSeries,
    TimeSeriesWithSize,
}

impl SubtagType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::SingleWithSize => "single_with_size",
            Self::TimeSeries => "time_series",
            Self::TimeSeriesWithSize => "time_series_with_size",
        }
    }
}

impl FromStr for SubtagType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "single_with_size" => Ok(Self::SingleWithSize),
            "time_series" => Ok(Self::TimeSeries),
            "time_series_with_size" => Ok(Self::TimeSeriesWithSize),
            _ => Err(format!("unknown subtag type: {s}")),
        }
    }
}

impl std::fmt::Display for SubtagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtagConfig {
    pub subtag_type: SubtagType,
    pub subtag: String,
    pub display_name: String,
    pub is_default: bool,
    /// Whether gaps in the series are filled with artificial points.
    pub draw_missing: bool,
}

impl SubtagConfig {
    /// The single subtag every non-`multi` tag gets.
    pub fn create_default(subtag_type: SubtagType) -> Self {
        Self {
            subtag_type,
            subtag: DEFAULT_SUBTAG.to_string(),
            display_name: String::new(),
            is_default: true,
            draw_missing: true,
        }
    }

    pub fn has_numeric_value(&self) -> bool {
        matches!(
            self.subtag_type,
            SubtagType::SingleWithSize | SubtagType::TimeSeriesWithSize
        )
    }

    pub fn is_time_series(&self) -> bool {
        matches!(
            self.subtag_type,
            SubtagType::TimeSeries | SubtagType::TimeSeriesWithSize
        )
    }

    pub fn is_single(&self) -> bool {
        matches!(
            self.subtag_type,
            SubtagType::Single | SubtagType::SingleWithSize
        )
    }
}

/// Reporting cadence of a tag, all in minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagTiming {
    pub frequency_minutes: i64,
    pub tolerance_minutes: i64,
    pub sla_minutes: i64,
    pub critical_window_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagConfig {
    pub tag: String,
    pub display_name: String,
    pub description: String,
    #[serde(flatten)]
    pub timing: TagTiming,
    subtags: Vec<SubtagConfig>,
    pub dependencies: Vec<String>,
}

impl TagConfig {
    /// Fails unless exactly one subtag is marked default.
    pub fn new(
        tag: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        timing: TagTiming,
        subtags: Vec<SubtagConfig>,
        dependencies: Vec<String>,
    ) -> Result<Self> {
        let tag = tag.into();
        let found = subtags.iter().filter(|s| s.is_default).count();
        if found != 1 {
            return Err(ProjectError::DefaultSubtag { tag, found });
        }
        Ok(Self {
            tag,
            display_name: display_name.into(),
            description: description.into(),
            timing,
            subtags,
            dependencies,
        })
    }

    pub fn from_document(tag: impl Into<String>, doc: TagDocument) -> Result<Self> {
        let tag = tag.into();
        let subtags = if doc.kind == MULTI_TYPE {
            doc.subtags
                .ok_or_else(|| ProjectError::MissingSubtags(tag.clone()))?
                .into_iter()
                .map(SubtagConfig::from)
                .collect()
        } else {
            if doc.subtags.is_some() {
                return Err(ProjectError::UnexpectedSubtags(tag));
            }
            let subtag_type = doc
                .kind
                .parse()
                .map_err(|_| ProjectError::UnknownTagType {
                    tag: tag.clone(),
                    kind: doc.kind.clone(),
                })?;
            vec![SubtagConfig::create_default(subtag_type)]
        };
        let timing = TagTiming {
            frequency_minutes: doc.frequency,
            tolerance_minutes: doc.tolerance,
            sla_minutes: doc.sla,
            critical_window_minutes: doc.critical_window,
        };
        Self::new(
            tag,
            doc.display_name,
            doc.description,
            timing,
            subtags,
            doc.dependencies,
        )
    }

    pub fn subtags(&self) -> &[SubtagConfig] {
        &self.subtags
    }

    pub fn default_subtag(&self) -> &SubtagConfig {
        // at least one subtag is marked default, see `new`
        self.subtags
            .iter()
            .find(|s| s.is_default)
            .unwrap_or(&self.subtags[0])
    }

    pub fn subtag_config(&self, subtag: &str) -> Result<&SubtagConfig> {
        self.subtags
            .iter()
            .find(|s| s.subtag == subtag)
            .ok_or_else(|| ProjectError::UnknownSubtag {
                tag: self.tag.clone(),
                subtag: subtag.to_string(),
            })
    }

    pub fn has_subtag(&self, subtag: &str) -> bool {
        self.subtags.iter().any(|s| s.subtag == subtag)
    }
}

/// Tag definition as written in `tags/<tag>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDocument {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub frequency: i64,
    #[serde(default)]
    pub tolerance: i64,
    pub sla: i64,
    #[serde(default)]
    pub critical_window: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtags: Option<Vec<SubtagDocument>>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtagDocument {
    #[serde(rename = "type")]
    pub subtag_type: SubtagType,
    pub subtag: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub draw_missing: bool,
}

impl From<SubtagDocument> for SubtagConfig {
    fn from(doc: SubtagDocument) -> Self {
        Self {
            subtag_type: doc.subtag_type,
            subtag: doc.subtag,
            display_name: doc.display_name,
            is_default: doc.is_default,
            draw_missing: doc.draw_missing,
        }
    }
}
