#![allow(dead_code)]

use anyhow::Result;
use serverbeat_common::signal::{DataPoint, DataPointStatus, TimeSeriesSignal};
use serverbeat_common::types::{now_in_seconds, ServerbeatAlert, TrafficLight};
use serverbeat_server::{AlertEvaluator, YamlProjectLoader};
use serverbeat_storage::{AlertRecord, AlertStore, SignalStore, SqliteStore};
use std::sync::Arc;
use tempfile::TempDir;

pub const PROJECT: &str = "demo";

pub const TREE: &str = r#"
prod:
  tagsAndSenders:
    - tag: partitions
      sender: etl-01
      alerts:
        failing: [default]
  files:
    tagsAndSenders:
      - tag: markers
        sender: ftp-01
        alerts:
          failing: [marker]
  unmonitored:
    tagsAndSenders:
      - tag: partitions
        sender: etl-02
"#;

pub const PARTITIONS_TAG: &str = r#"
type: multi
frequency: 60
sla: 0
subtags:
  - { type: time_series, subtag: default, is_default: true }
"#;

pub const MARKERS_TAG: &str = r#"
type: multi
frequency: 60
sla: 0
subtags:
  - { type: single, subtag: marker, is_default: true }
"#;

pub const FAILING_ALERT: &str = r#"
type: snapshot
snapshot_count: 3
conditions:
  RED: NOT_OK >= 2
  YELLOW: NOT_OK >= 1
"#;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub loader: Arc<YamlProjectLoader>,
}

impl TestContext {
    pub fn projects_dir(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("projects")
    }

    pub fn write_project_file(&self, project: &str, relative: &str, content: &str) -> Result<()> {
        let path = self.projects_dir().join(project).join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn evaluator(&self, max_concurrent: usize) -> AlertEvaluator {
        AlertEvaluator::new(
            self.loader.clone(),
            self.store.clone(),
            self.store.clone(),
            max_concurrent,
        )
    }

    pub fn evaluator_with_signals(
        &self,
        signals: Arc<dyn SignalStore>,
        max_concurrent: usize,
    ) -> AlertEvaluator {
        AlertEvaluator::new(self.loader.clone(), signals, self.store.clone(), max_concurrent)
    }

    /// Stores a series whose points end shortly before now, one per status.
    pub fn write_series(&self, sender: &str, statuses: &[DataPointStatus]) -> Result<()> {
        let now = now_in_seconds();
        let count = statuses.len() as i64;
        let points = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let ts = now - (count - i as i64) * 600;
                DataPoint::observed(*status, ts, format!("report {i}"), None)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let signal = TimeSeriesSignal::new(sender, points, now - 60, "partitions", "default", false)?;
        self.store.write_time_series_signal(PROJECT, &signal)?;
        Ok(())
    }

    pub fn write_marker(&self, sender: &str, status: DataPointStatus, age_secs: i64) -> Result<()> {
        let ts = now_in_seconds() - age_secs;
        let point = DataPoint::observed(status, ts, "marker", None)?;
        let signal = TimeSeriesSignal::new(sender, vec![point], ts, "markers", "marker", false)?;
        self.store.write_single_signal(PROJECT, &signal)?;
        Ok(())
    }

    /// A verdict left over from an earlier pass.
    pub fn write_stale_alert(&self, project: &str, crumbs: &[&str]) -> Result<()> {
        self.store.write_alert(&AlertRecord {
            project: project.to_string(),
            crumbs: crumbs.iter().map(|c| c.to_string()).collect(),
            sender: "gone-01".into(),
            tag: "retired".into(),
            subtag: "default".into(),
            alert_name: "failing".into(),
            alert: ServerbeatAlert::new(TrafficLight::Red, "stale", now_in_seconds() - 86_400),
        })?;
        Ok(())
    }

    pub fn alerts(&self, project: &str) -> Result<Vec<AlertRecord>> {
        Ok(self.store.list_alerts(project)?)
    }

    pub fn alert_for(&self, tag: &str, sender: &str) -> Result<Option<AlertRecord>> {
        Ok(self
            .alerts(PROJECT)?
            .into_iter()
            .find(|a| a.tag == tag && a.sender == sender))
    }
}

pub fn write_demo_project(ctx: &TestContext) -> Result<()> {
    ctx.write_project_file(PROJECT, "tree.yaml", TREE)?;
    ctx.write_project_file(PROJECT, "tags/partitions", PARTITIONS_TAG)?;
    ctx.write_project_file(PROJECT, "tags/markers", MARKERS_TAG)?;
    ctx.write_project_file(PROJECT, "alerts/failing", FAILING_ALERT)?;
    Ok(())
}

pub fn build_test_context() -> Result<TestContext> {
    serverbeat_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let store = Arc::new(SqliteStore::new(&temp_dir.path().join("serverbeat.db"))?);
    let loader = Arc::new(YamlProjectLoader::new(temp_dir.path().join("projects")));
    let ctx = TestContext {
        temp_dir,
        store,
        loader,
    };
    write_demo_project(&ctx)?;
    Ok(ctx)
}
