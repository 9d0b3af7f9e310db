mod common;

use common::{build_test_context, PROJECT};
use serverbeat_common::signal::{DataPoint, DataPointStatus, TimeSeriesSignal};
use serverbeat_common::types::{days_back_in_seconds, TrafficLight};
use serverbeat_server::scheduler::{AlertScheduler, RetentionScheduler};
use serverbeat_storage::SignalStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test]
async fn alert_cycle_evaluates_every_project_with_signals() {
    let ctx = build_test_context().unwrap();
    ctx.write_series("etl-01", &[DataPointStatus::NotOk; 3]).unwrap();

    // signals for a project without documents: its pass fails, the cycle goes on
    let orphan = TimeSeriesSignal::new(
        "etl-01",
        vec![DataPoint::observed(DataPointStatus::Ok, 100, "ok", None).unwrap()],
        100,
        "partitions",
        "default",
        false,
    )
    .unwrap();
    ctx.store.write_time_series_signal("orphan", &orphan).unwrap();

    let (_tx, rx) = watch::channel(false);
    let scheduler = AlertScheduler::new(
        Arc::new(ctx.evaluator(2)),
        ctx.store.clone(),
        300,
        0,
        rx,
    );
    let reports = scheduler.run_cycle().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].project, PROJECT);
    // the marker unit has no stored signal and still gets a verdict
    assert_eq!(reports[0].evaluated, 2);

    let partitions = ctx.alert_for("partitions", "etl-01").unwrap().unwrap();
    assert_eq!(partitions.alert.traffic_light, TrafficLight::Red);
}

#[tokio::test]
async fn retention_cycle_removes_old_signals() {
    let ctx = build_test_context().unwrap();
    let old = days_back_in_seconds(30);
    let old_series = TimeSeriesSignal::new(
        "etl-01",
        vec![DataPoint::observed(DataPointStatus::Ok, old, "ok", None).unwrap()],
        old,
        "partitions",
        "default",
        false,
    )
    .unwrap();
    ctx.store.write_time_series_signal(PROJECT, &old_series).unwrap();
    ctx.write_series("etl-01", &[DataPointStatus::Ok; 2]).unwrap();
    ctx.write_marker("ftp-01", DataPointStatus::Ok, 40 * 86_400).unwrap();
    ctx.write_marker("ftp-01", DataPointStatus::Ok, 600).unwrap();

    let (_tx, rx) = watch::channel(false);
    let scheduler = RetentionScheduler::new(ctx.store.clone(), 86_400, 10, rx);
    assert_eq!(scheduler.run_cycle().await.unwrap(), 2);

    let senders = ["etl-01".to_string()];
    assert_eq!(
        ctx.store
            .time_series_timestamps(PROJECT, "partitions", "default", &senders)
            .unwrap()
            .len(),
        1
    );
    let markers = ["ftp-01".to_string()];
    assert_eq!(
        ctx.store
            .single_signal_timestamps(PROJECT, "markers", "marker", &markers)
            .unwrap()
            .len(),
        1
    );

    // nothing left to remove
    assert_eq!(scheduler.run_cycle().await.unwrap(), 0);
}

#[tokio::test]
async fn schedulers_stop_on_shutdown() {
    let ctx = build_test_context().unwrap();
    let (tx, rx) = watch::channel(false);

    let alerts = AlertScheduler::new(
        Arc::new(ctx.evaluator(1)),
        ctx.store.clone(),
        3600,
        3600,
        rx.clone(),
    );
    let retention = RetentionScheduler::new(ctx.store.clone(), 3600, 10, rx);
    let alert_handle = tokio::spawn(alerts.run());
    let retention_handle = tokio::spawn(retention.run());

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), alert_handle)
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), retention_handle)
        .await
        .unwrap()
        .unwrap();
}
