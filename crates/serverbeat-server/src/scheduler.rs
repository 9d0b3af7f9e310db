use crate::evaluator::{AlertEvaluator, PassReport};
use anyhow::Result;
use serverbeat_common::types::days_back_in_seconds;
use serverbeat_storage::SignalStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

/// Resolves when shutdown is requested or the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Triggers an evaluation pass for every project with stored signals on a
/// fixed cadence.
pub struct AlertScheduler {
    evaluator: Arc<AlertEvaluator>,
    signals: Arc<dyn SignalStore>,
    interval_secs: u64,
    start_delay_secs: u64,
    shutdown: watch::Receiver<bool>,
}

impl AlertScheduler {
    pub fn new(
        evaluator: Arc<AlertEvaluator>,
        signals: Arc<dyn SignalStore>,
        interval_secs: u64,
        start_delay_secs: u64,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            evaluator,
            signals,
            interval_secs,
            start_delay_secs,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            interval_secs = self.interval_secs,
            start_delay_secs = self.start_delay_secs,
            "Alert scheduler started"
        );

        tokio::select! {
            _ = sleep(Duration::from_secs(self.start_delay_secs)) => {}
            _ = wait_for_shutdown(&mut self.shutdown) => {
                tracing::info!("Alert scheduler stopped before first pass");
                return;
            }
        }

        let mut tick = interval(Duration::from_secs(self.interval_secs.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = wait_for_shutdown(&mut self.shutdown) => break,
            }
            if let Err(e) = self.run_cycle().await {
                tracing::error!(error = %e, "Alert check cycle failed");
            }
        }
        tracing::info!("Alert scheduler stopped");
    }

    /// Runs one pass per known project, one project at a time. A failed pass
    /// is logged and does not stop the cycle.
    pub async fn run_cycle(&self) -> Result<Vec<PassReport>> {
        let signals = self.signals.clone();
        let projects = tokio::task::spawn_blocking(move || signals.project_ids()).await??;

        let mut reports = Vec::with_capacity(projects.len());
        for project in projects {
            if *self.shutdown.borrow() {
                break;
            }
            match self.evaluator.run_pass(&project).await {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!(project = %project, error = %e, "Evaluation pass failed"),
            }
        }
        Ok(reports)
    }
}

/// Removes signals older than the retention window for every project.
pub struct RetentionScheduler {
    signals: Arc<dyn SignalStore>,
    tick_secs: u64,
    days: u32,
    shutdown: watch::Receiver<bool>,
}

impl RetentionScheduler {
    pub fn new(
        signals: Arc<dyn SignalStore>,
        tick_secs: u64,
        days: u32,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            signals,
            tick_secs,
            days,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            tick_secs = self.tick_secs,
            days = self.days,
            "Retention scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.tick_secs.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = wait_for_shutdown(&mut self.shutdown) => break,
            }
            match self.run_cycle().await {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, "Removed expired signals")
                }
                Err(e) => tracing::error!(error = %e, "Retention cycle failed"),
                _ => {}
            }
        }
        tracing::info!("Retention scheduler stopped");
    }

    /// Returns the number of rows removed across all projects.
    pub async fn run_cycle(&self) -> Result<usize> {
        let signals = self.signals.clone();
        let days = self.days;
        let removed = tokio::task::spawn_blocking(move || -> Result<usize> {
            let cutoff = days_back_in_seconds(days);
            let mut removed = 0;
            for project in signals.project_ids()? {
                let series = signals.remove_time_series_older_than(&project, cutoff)?;
                let singles = signals.remove_single_signals_older_than(&project, cutoff)?;
                tracing::debug!(project = %project, series, singles, cutoff, "Retention applied");
                removed += series + singles;
            }
            Ok(removed)
        })
        .await??;
        Ok(removed)
    }
}
