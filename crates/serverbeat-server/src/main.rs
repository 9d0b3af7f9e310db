use anyhow::Result;
use serverbeat_project::ProjectTree;
use serverbeat_storage::aggregate::worst_light;
use serverbeat_storage::{AlertStore, SqliteStore};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::{timeout, Duration};
use tracing_subscriber::EnvFilter;

use serverbeat_server::config::ServerConfig;
use serverbeat_server::loader::{ConfigLoader, YamlProjectLoader};
use serverbeat_server::scheduler::{AlertScheduler, RetentionScheduler};
use serverbeat_server::AlertEvaluator;

const DEFAULT_CONFIG_PATH: &str = "config/server.toml";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  serverbeat-server [config.toml]                        Start the alert and retention schedulers");
    eprintln!("  serverbeat-server evaluate <config.toml> <project>     Run one evaluation pass and print its report");
    eprintln!("  serverbeat-server describe <config.toml> <project>     Print the project tree, view settings and tag dependencies");
}

fn required_arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index).map(String::as_str).ok_or_else(|| {
        print_usage();
        anyhow::anyhow!("Missing {name} argument")
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    serverbeat_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("serverbeat=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("evaluate") => {
            let config_path = required_arg(&args, 2, "config path")?;
            let project = required_arg(&args, 3, "project")?;
            run_evaluate(config_path, project).await
        }
        Some("describe") => {
            let config_path = required_arg(&args, 2, "config path")?;
            let project = required_arg(&args, 3, "project")?;
            run_describe(config_path, project)
        }
        Some("-h") | Some("--help") | Some("help") => {
            print_usage();
            Ok(())
        }
        other => run_server(other.unwrap_or(DEFAULT_CONFIG_PATH)).await,
    }
}

struct Services {
    config: ServerConfig,
    store: Arc<SqliteStore>,
    loader: Arc<YamlProjectLoader>,
}

fn open_services(config_path: &str) -> Result<Services> {
    let config = ServerConfig::load(config_path)?;
    let store = Arc::new(SqliteStore::new(&config.database_path())?);
    let loader = Arc::new(YamlProjectLoader::new(config.projects_path()));
    tracing::info!(
        database = %config.database_path().display(),
        projects_dir = %config.projects_dir,
        "Configuration loaded"
    );
    Ok(Services {
        config,
        store,
        loader,
    })
}

#[allow(clippy::print_stdout)]
async fn run_evaluate(config_path: &str, project: &str) -> Result<()> {
    let services = open_services(config_path)?;
    let evaluator = AlertEvaluator::new(
        services.loader.clone(),
        services.store.clone(),
        services.store.clone(),
        services.config.alert_check.max_concurrent,
    );
    let report = evaluator.run_pass(project).await?;

    let by_crumbs = services.store.alerts_grouped_by_crumbs(project)?;
    let summary = serde_json::json!({
        "report": report,
        "worst": worst_light(by_crumbs.values()).to_string(),
        "byCrumbs": by_crumbs,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_describe(config_path: &str, project: &str) -> Result<()> {
    let services = open_services(config_path)?;
    let loader = &services.loader;
    let tree = ProjectTree::from_value(&loader.project_tree(project)?)?;
    let summary = serde_json::json!({
        "project": project,
        "config": loader.project_config(project)?,
        "tree": tree,
        "dependencies": loader.dependency_graph(project)?,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let Services {
        config,
        store,
        loader,
    } = open_services(config_path)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let alert_handle = if config.alert_check.enabled {
        let evaluator = Arc::new(
            AlertEvaluator::new(
                loader.clone(),
                store.clone(),
                store.clone(),
                config.alert_check.max_concurrent,
            )
            .with_shutdown(shutdown_rx.clone()),
        );
        let scheduler = AlertScheduler::new(
            evaluator,
            store.clone(),
            config.alert_check.interval_secs,
            config.alert_check.start_delay_secs,
            shutdown_rx.clone(),
        );
        Some(tokio::spawn(async move {
            scheduler.run().await;
        }))
    } else {
        tracing::info!("Alert scheduler disabled");
        None
    };

    let retention_handle = if config.retention.enabled {
        let scheduler = RetentionScheduler::new(
            store.clone(),
            config.retention.tick_secs,
            config.retention.days,
            shutdown_rx.clone(),
        );
        Some(tokio::spawn(async move {
            scheduler.run().await;
        }))
    } else {
        tracing::info!("Retention scheduler disabled");
        None
    };

    tracing::info!("Server started");
    signal::ctrl_c().await?;
    tracing::info!("Shutting down gracefully");

    if shutdown_tx.send(true).is_err() {
        tracing::debug!("No scheduler was listening for shutdown");
    }
    for mut handle in [alert_handle, retention_handle].into_iter().flatten() {
        if timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
            tracing::warn!("Scheduler did not stop in time, aborting");
            handle.abort();
        }
    }
    tracing::info!("Server stopped");

    Ok(())
}
