use crate::error::{EvaluationError, Result};
use crate::loader::ConfigLoader;
use serde::Serialize;
use serverbeat_alert::AlertConfig;
use serverbeat_common::types::{now_in_seconds, TrafficLight};
use serverbeat_project::tree::flatten;
use serverbeat_project::TagConfig;
use serverbeat_storage::{AlertRecord, AlertStore, SeriesAt, SignalStore};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Semaphore};

/// Outcome of one evaluation pass over a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub run_id: String,
    pub project: String,
    /// `(tag, alert, subtag, sender)` combinations found in the tree.
    pub units: usize,
    pub evaluated: usize,
    pub failed: usize,
    /// Stale verdicts removed after the pass.
    pub swept: usize,
    /// Shutdown was requested before every unit was dispatched.
    pub cancelled: bool,
    /// Another pass for the same project was still running.
    pub skipped: bool,
}

/// One alert rule applied to one subtag of one sender at one tree position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationUnit {
    pub crumbs: Vec<String>,
    pub sender: String,
    pub tag: String,
    pub subtag: String,
    pub alert_name: String,
}

/// Tag and alert configs loaded during a pass, shared by its units.
#[derive(Default)]
struct RuleCache {
    tags: Mutex<HashMap<String, Arc<TagConfig>>>,
    alerts: Mutex<HashMap<String, Arc<AlertConfig>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn cached<T>(
    cache: &Mutex<HashMap<String, Arc<T>>>,
    key: &str,
    load: impl FnOnce() -> Result<T>,
) -> Result<Arc<T>> {
    if let Some(hit) = lock(cache).get(key) {
        return Ok(hit.clone());
    }
    let value = Arc::new(load()?);
    lock(cache).insert(key.to_string(), value.clone());
    Ok(value)
}

struct PassContext {
    project: String,
    run_id: String,
    run_start: i64,
    loader: Arc<dyn ConfigLoader>,
    signals: Arc<dyn SignalStore>,
    alerts: Arc<dyn AlertStore>,
    cache: RuleCache,
}

impl PassContext {
    fn tag_config(&self, tag: &str) -> Result<Arc<TagConfig>> {
        cached(&self.cache.tags, tag, || {
            Ok(self.loader.tag_config(&self.project, tag)?)
        })
    }

    fn alert_config(&self, alert_name: &str) -> Result<Arc<AlertConfig>> {
        cached(&self.cache.alerts, alert_name, || {
            Ok(self.loader.alert_config(&self.project, alert_name)?)
        })
    }

    fn evaluate(&self, unit: &EvaluationUnit) -> Result<TrafficLight> {
        let tag_config = self.tag_config(&unit.tag)?;
        let subtag = tag_config.subtag_config(&unit.subtag)?;
        let senders = [unit.sender.clone()];

        let mut signal = if subtag.is_time_series() {
            self.signals
                .get_time_series(
                    &self.project,
                    &unit.tag,
                    &unit.subtag,
                    SeriesAt::Latest,
                    &senders,
                )?
                .ok_or_else(|| EvaluationError::NoSignal {
                    tag: unit.tag.clone(),
                    subtag: unit.subtag.clone(),
                    sender: unit.sender.clone(),
                })?
        } else {
            self.signals.get_single_as_time_series(
                &self.project,
                &unit.tag,
                &unit.subtag,
                self.run_start,
                &senders,
            )?
        };

        let now = now_in_seconds();
        let timing = tag_config.timing;
        if subtag.draw_missing {
            let added = signal.fill_in_the_blank_at(
                now,
                timing.frequency_minutes,
                timing.tolerance_minutes,
                timing.sla_minutes,
                timing.critical_window_minutes,
            );
            tracing::trace!(
                project = %self.project,
                run_id = %self.run_id,
                tag = %unit.tag,
                subtag = %unit.subtag,
                sender = %unit.sender,
                added,
                "Filled missing reports"
            );
        }

        let alert_config = self.alert_config(&unit.alert_name)?;
        let verdict = alert_config.calculate_alert_at(now, timing.sla_minutes, &signal);
        let light = verdict.traffic_light;

        self.alerts.write_alert(&AlertRecord {
            project: self.project.clone(),
            crumbs: unit.crumbs.clone(),
            sender: unit.sender.clone(),
            tag: unit.tag.clone(),
            subtag: unit.subtag.clone(),
            alert_name: unit.alert_name.clone(),
            alert: verdict,
        })?;
        Ok(light)
    }
}

/// Releases a project's in-flight slot when the pass ends, however it ends.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    project: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock(self.in_flight).remove(&self.project);
    }
}

/// Runs evaluation passes: every alert attached to the project tree is
/// evaluated against the latest stored signal and its verdict upserted, then
/// verdicts the pass did not touch are swept.
pub struct AlertEvaluator {
    loader: Arc<dyn ConfigLoader>,
    signals: Arc<dyn SignalStore>,
    alerts: Arc<dyn AlertStore>,
    max_concurrent: usize,
    in_flight: Mutex<HashSet<String>>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl AlertEvaluator {
    pub fn new(
        loader: Arc<dyn ConfigLoader>,
        signals: Arc<dyn SignalStore>,
        alerts: Arc<dyn AlertStore>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            loader,
            signals,
            alerts,
            max_concurrent: max_concurrent.max(1),
            in_flight: Mutex::new(HashSet::new()),
            shutdown: None,
        }
    }

    /// Stops dispatching units once `shutdown` turns `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn try_enter(&self, project: &str) -> Option<InFlightGuard<'_>> {
        if !lock(&self.in_flight).insert(project.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            in_flight: &self.in_flight,
            project: project.to_string(),
        })
    }

    /// Lists the units of a project. Leaves without an `alerts` map are not
    /// evaluated.
    pub fn resolve_units(&self, project: &str) -> Result<Vec<EvaluationUnit>> {
        let tree = self.loader.project_tree(project)?;
        let mut units = Vec::new();
        for leaf in flatten(&tree)? {
            let Some(alerts) = leaf.alerts else {
                continue;
            };
            for (alert_name, subtags) in alerts {
                for subtag in subtags {
                    units.push(EvaluationUnit {
                        crumbs: leaf.crumbs.clone(),
                        sender: leaf.sender.clone(),
                        tag: leaf.tag.clone(),
                        subtag,
                        alert_name: alert_name.clone(),
                    });
                }
            }
        }
        Ok(units)
    }

    /// Evaluates every unit of `project`.
    ///
    /// Failing to read the project tree fails the pass before anything is
    /// written. Past that point a failing unit is logged and counted, and the
    /// pass moves on. Once all units finish, verdicts stamped before the pass
    /// started are deleted, unless the pass was cancelled.
    pub async fn run_pass(&self, project: &str) -> Result<PassReport> {
        let run_id = serverbeat_common::id::next_run_id();
        let mut report = PassReport {
            run_id: run_id.clone(),
            project: project.to_string(),
            ..Default::default()
        };

        let Some(_guard) = self.try_enter(project) else {
            tracing::warn!(project, run_id = %run_id, "Evaluation pass already running, skipping");
            report.skipped = true;
            return Ok(report);
        };

        let run_start = now_in_seconds();
        let units = self.resolve_units(project)?;
        report.units = units.len();
        tracing::info!(project, run_id = %run_id, units = units.len(), "Evaluation pass started");

        let ctx = Arc::new(PassContext {
            project: project.to_string(),
            run_id: run_id.clone(),
            run_start,
            loader: self.loader.clone(),
            signals: self.signals.clone(),
            alerts: self.alerts.clone(),
            cache: RuleCache::default(),
        });

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(units.len());
        for unit in units {
            if self.shutdown_requested() {
                report.cancelled = true;
                break;
            }
            let permit = semaphore.clone().acquire_owned().await?;
            let ctx = ctx.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let result = ctx.evaluate(&unit);
                (unit, result)
            }));
        }

        for handle in handles {
            match handle.await {
                Ok((unit, Ok(light))) => {
                    report.evaluated += 1;
                    tracing::debug!(
                        project,
                        run_id = %run_id,
                        tag = %unit.tag,
                        subtag = %unit.subtag,
                        sender = %unit.sender,
                        alert = %unit.alert_name,
                        light = %light,
                        "Alert evaluated"
                    );
                }
                Ok((unit, Err(e))) => {
                    report.failed += 1;
                    tracing::error!(
                        project,
                        run_id = %run_id,
                        tag = %unit.tag,
                        subtag = %unit.subtag,
                        sender = %unit.sender,
                        alert = %unit.alert_name,
                        crumbs = ?unit.crumbs,
                        error = %e,
                        "Alert evaluation failed"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(project, run_id = %run_id, error = %e, "Evaluation worker panicked");
                }
            }
        }

        if report.cancelled {
            tracing::warn!(
                project,
                run_id = %run_id,
                evaluated = report.evaluated,
                "Evaluation pass cancelled, stale alerts kept"
            );
            return Ok(report);
        }

        let alerts = self.alerts.clone();
        let sweep_project = project.to_string();
        report.swept = tokio::task::spawn_blocking(move || {
            alerts.delete_alerts_older_than(&sweep_project, run_start)
        })
        .await??;

        tracing::info!(
            project,
            run_id = %run_id,
            evaluated = report.evaluated,
            failed = report.failed,
            swept = report.swept,
            "Evaluation pass finished"
        );
        Ok(report)
    }
}
