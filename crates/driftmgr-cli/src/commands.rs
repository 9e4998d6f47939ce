use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use driftmgr_core::{Resource, TerragruntModule};
use driftmgr_discovery::{DiscoveryEngine, DiscoveryJob};
use driftmgr_drift::{detect_drift, summarize, DetectorConfig};
use driftmgr_executor::{RunAllExecutor, RunAllOptions};
use driftmgr_graph::build_graph;
use driftmgr_provider::{AwsAdapter, AzureAdapter, DigitalOceanAdapter, GcpAdapter, LocalAdapter, Registry};
use driftmgr_store::{DriftRecord, InMemoryRepository, Repository};
use uuid::Uuid;

use crate::cli::{DriftCommand, OutputFormat, TerragruntCommand};
use crate::output;

/// Every cloud adapter this binary ships with. `--providers` filters the
/// discovery job down to a subset by name; registering the cloud adapters
/// unconditionally keeps credential discovery lazy (adapters fail at query
/// time, not at registration time). `local` needs a fixture path to read
/// from, so it's only registered when the caller supplies one.
fn full_registry(local_fixture: Option<&std::path::Path>) -> Registry {
    let mut registry = Registry::new();
    registry.register(Arc::new(AwsAdapter::new()));
    registry.register(Arc::new(AzureAdapter::new()));
    registry.register(Arc::new(GcpAdapter::new()));
    registry.register(Arc::new(DigitalOceanAdapter::new()));
    if let Some(path) = local_fixture {
        registry.register(Arc::new(LocalAdapter::new(path)));
    }
    registry
}

// ── Discover ──────────────────────────────────────────────────────────────────

pub async fn discover(
    providers: Vec<String>,
    regions: Vec<String>,
    local_fixture: Option<PathBuf>,
    output_format: OutputFormat,
) -> Result<()> {
    let engine = DiscoveryEngine::new(Arc::new(full_registry(local_fixture.as_deref())));
    let job = DiscoveryJob::new(providers, regions);
    let resources = engine.discover_resources(job.clone()).await;

    let status = engine.get_scheduled_job(job.id).await;
    if let Some(status) = &status {
        if let Some(err) = &status.error {
            eprintln!("discovery completed with partial errors: {}", err);
        }
    }

    print_resources(&resources, output_format)
}

fn print_resources(resources: &[Resource], output_format: OutputFormat) -> Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(resources)?),
        OutputFormat::Text => print!("{}", output::render_resources(resources)),
    }
    Ok(())
}

// ── Drift ─────────────────────────────────────────────────────────────────────

pub async fn drift(command: DriftCommand, output_format: OutputFormat) -> Result<()> {
    match command {
        DriftCommand::Detect { state, providers, regions, top, local_fixture } => {
            drift_detect(state, providers, regions, top, local_fixture, output_format).await
        }
    }
}

async fn drift_detect(
    state_path: PathBuf,
    providers: Vec<String>,
    regions: Vec<String>,
    top_n: usize,
    local_fixture: Option<PathBuf>,
    output_format: OutputFormat,
) -> Result<()> {
    let state_json = std::fs::read_to_string(&state_path)
        .with_context(|| format!("failed to read state file {}", state_path.display()))?;
    let state: Vec<Resource> = serde_json::from_str(&state_json)
        .with_context(|| format!("{} is not a JSON array of Resource records", state_path.display()))?;

    let engine = DiscoveryEngine::new(Arc::new(full_registry(local_fixture.as_deref())));
    let job = DiscoveryJob::new(providers, regions);
    let live = engine.discover_resources(job).await;

    let config = DetectorConfig::default();
    let results = detect_drift(&state, &live, &config);

    let repository = InMemoryRepository::new();
    let run_id = Uuid::new_v4();
    for result in &results {
        repository.record(DriftRecord::new(result.clone(), run_id)).await?;
    }
    let history = repository.get_all_drifts().await?;

    let summary = summarize(&results, state.len(), live.len(), &history, top_n);

    match output_format {
        OutputFormat::Json => {
            let payload = serde_json::json!({ "results": results, "summary": summary });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        OutputFormat::Text => {
            print!("{}", output::render_drift_summary(&summary));
        }
    }
    Ok(())
}

// ── Terragrunt run-all ────────────────────────────────────────────────────────

pub async fn terragrunt(command: TerragruntCommand, output_format: OutputFormat) -> Result<()> {
    match command {
        TerragruntCommand::RunAll {
            dir,
            command,
            binary,
            parallelism,
            ignore_errors,
            ignore_dependencies,
            include_skipped,
            target,
            exclude,
            dry_run,
            auto_approve,
            timeout_secs,
            retry_max_attempts,
        } => {
            let modules = load_modules(&dir)?;
            let graph = build_graph(modules).context("failed to build the module dependency graph")?;

            let mut options = RunAllOptions::new(command);
            options.binary = binary;
            options.parallelism = parallelism;
            options.ignore_errors = ignore_errors;
            options.ignore_dependencies = ignore_dependencies;
            options.include_skipped = include_skipped;
            options.target_modules = target;
            options.exclude_modules = exclude;
            options.dry_run = dry_run;
            options.auto_approve = auto_approve;
            options.per_module_timeout = Duration::from_secs(timeout_secs);
            options.retry_max_attempts = retry_max_attempts;

            let executor = RunAllExecutor::new();
            let results = executor.run_all(&graph, &options).await?;
            let snapshot = executor.progress();

            match output_format {
                OutputFormat::Json => {
                    let payload = serde_json::json!({ "results": results, "progress": snapshot });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Text => {
                    print!("{}", output::render_exec_results(&results));
                    println!(
                        "total={} success={} failed={} skipped={} ({:?})",
                        snapshot.total, snapshot.success, snapshot.failed, snapshot.skipped, snapshot.duration
                    );
                }
            }

            if results.iter().any(|r| r.status == driftmgr_core::ModuleStatus::Failed) {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Recursively find every `terragrunt.hcl` under `root` and parse it into a
/// [`TerragruntModule`], keyed by its containing directory (spec §4.6/§4.7).
fn load_modules(root: &std::path::Path) -> Result<Vec<TerragruntModule>> {
    let files = driftmgr_hcl::find_terragrunt_files(root)
        .with_context(|| format!("failed to walk {}", root.display()))?;

    let mut modules = Vec::with_capacity(files.len());
    for file in files {
        let config = driftmgr_hcl::load_terragrunt_file(&file)
            .with_context(|| format!("failed to parse {}", file.display()))?;
        let module_dir = file
            .parent()
            .ok_or_else(|| anyhow::anyhow!("{} has no parent directory", file.display()))?
            .to_string_lossy()
            .to_string();
        modules.push(TerragruntModule::new(module_dir, config));
    }
    Ok(modules)
}
