use anyhow::{Context, Result};
use cstation::cli::{Args, ConfigDiscovery, ExecutionMode, Query, ReconcileRequest};
use cstation::station::{ReconciliationReport, Reconciler};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.global.verbose);

    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let config = ConfigDiscovery::load(args.global.config.as_deref(), args.global.overrides())
        .map_err(|e| anyhow::anyhow!(e).context("Failed to load configuration"))?;

    match mode {
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info(&config);
            return Ok(ExitCode::SUCCESS);
        }
        ExecutionMode::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()
                .map_err(|e| anyhow::anyhow!(e).context("Failed to write default configuration"))?;
            println!("{}", path.display());
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let client = config
        .build_client()
        .context("Failed to build station client")?;
    info!(host = %client.base_url(), "Connecting to Container Station");

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling the pending wait");
                cancel.cancel();
            }
        }
    });

    let reconciler =
        Reconciler::new(Arc::new(client), config.poll_policy()).with_cancellation(cancel);

    match mode {
        ExecutionMode::Query(query) => {
            run_query(&reconciler, query).await?;
            Ok(ExitCode::SUCCESS)
        }
        ExecutionMode::Reconcile(request) => run_reconcile(&reconciler, request).await,
        ExecutionMode::ShowConfig | ExecutionMode::InitConfig => Ok(ExitCode::SUCCESS),
    }
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "cstation=debug"
    } else {
        "cstation=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_query(reconciler: &Reconciler, query: Query) -> Result<()> {
    match query {
        Query::Overview => print_json(&reconciler.snapshot().await?),
        Query::Tasks { task_id: Some(task_id) } => {
            let state = reconciler.task_state(&task_id).await?;
            print_json(&serde_json::json!({"id": task_id, "state": state.to_string()}))
        }
        Query::Tasks { task_id: None } => print_json(&reconciler.tasks().await?),
        Query::Containers => print_json(&reconciler.list_containers().await?),
        Query::InspectContainer(container) => {
            print_json(&reconciler.inspect_container(&container).await?)
        }
        Query::InspectApplication(name) => {
            print_json(&reconciler.inspect_application(&name).await?)
        }
        Query::Volumes => print_json(&reconciler.volumes().list().await?),
        Query::InspectVolume(name) => print_json(&reconciler.volumes().inspect(&name).await?),
    }
}

async fn run_reconcile(reconciler: &Reconciler, request: ReconcileRequest) -> Result<ExitCode> {
    let kind = request.descriptor.kind();
    let operation = request.operation;
    info!(%kind, %operation, "Reconciling");

    let result = reconciler.reconcile(request.descriptor, operation).await;
    if let Err(e) = &result {
        error!(%kind, %operation, "Reconciliation failed: {}", e);
    }

    let report = ReconciliationReport::from_result(kind, operation, result);
    print_json(&report)?;

    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON output")?;
    println!("{}", rendered);
    Ok(())
}
