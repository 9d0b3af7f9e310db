use serde::{Deserialize, Serialize};

/// Per-project dashboard settings from `projectConfig.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default, alias = "available_views", skip_serializing_if = "Option::is_none")]
    pub available_views: Option<serde_yaml::Value>,
    #[serde(default, alias = "default_view", skip_serializing_if = "Option::is_none")]
    pub default_view: Option<String>,
}
