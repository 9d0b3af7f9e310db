use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Overrides [`ServerConfig::projects_dir`] when set.
pub const PROJECTS_DIR_ENV: &str = "SERVERBEAT_PROJECTS_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// SQLite file name, relative to `data_dir`.
    #[serde(default = "default_database_file")]
    pub database_file: String,
    /// Directory holding one sub-directory of YAML documents per project.
    #[serde(default = "default_projects_dir")]
    pub projects_dir: String,

    #[serde(default)]
    pub alert_check: AlertCheckConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertCheckConfig {
    #[serde(default = "default_alert_check_enabled")]
    pub enabled: bool,
    #[serde(default = "default_alert_check_interval_secs")]
    pub interval_secs: u64,
    /// Delay before the first pass after startup.
    #[serde(default = "default_alert_check_start_delay_secs")]
    pub start_delay_secs: u64,
    /// Upper bound on units evaluated at the same time within one pass.
    #[serde(default = "default_alert_check_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for AlertCheckConfig {
    fn default() -> Self {
        Self {
            enabled: default_alert_check_enabled(),
            interval_secs: default_alert_check_interval_secs(),
            start_delay_secs: default_alert_check_start_delay_secs(),
            max_concurrent: default_alert_check_max_concurrent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_enabled")]
    pub enabled: bool,
    #[serde(default = "default_retention_tick_secs")]
    pub tick_secs: u64,
    /// Signals older than this many days are removed.
    #[serde(default = "default_retention_days")]
    pub days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: default_retention_enabled(),
            tick_secs: default_retention_tick_secs(),
            days: default_retention_days(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            projects_dir: default_projects_dir(),
            alert_check: AlertCheckConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_database_file() -> String {
    "serverbeat.db".to_string()
}

fn default_projects_dir() -> String {
    "projects".to_string()
}

fn default_alert_check_enabled() -> bool {
    true
}

fn default_alert_check_interval_secs() -> u64 {
    300
}

fn default_alert_check_start_delay_secs() -> u64 {
    10
}

fn default_alert_check_max_concurrent() -> usize {
    4
}

fn default_retention_enabled() -> bool {
    true
}

fn default_retention_tick_secs() -> u64 {
    86_400
}

fn default_retention_days() -> u32 {
    10
}

impl ServerConfig {
    /// Reads the TOML file at `path`, then applies [`PROJECTS_DIR_ENV`].
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.override_projects_dir(std::env::var(PROJECTS_DIR_ENV).ok());
        Ok(config)
    }

    pub fn override_projects_dir(&mut self, projects_dir: Option<String>) {
        if let Some(dir) = projects_dir.filter(|d| !d.is_empty()) {
            tracing::debug!(projects_dir = %dir, "Projects directory overridden from environment");
            self.projects_dir = dir;
        }
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.database_file)
    }

    pub fn projects_path(&self) -> PathBuf {
        PathBuf::from(&self.projects_dir)
    }
}
