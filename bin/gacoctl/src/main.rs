//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Control CLI for running attack campaigns against the grid."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gaco_common::{init_tracing, AppConfig};
use gaco_metrics::{encode_text, new_registry, SharedRegistry};
use gaco_orchestrator::{CampaignOrchestrator, OrchestratorError};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

mod campaign;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Grid attack campaign orchestrator",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Write Prometheus text exposition here after the command finishes"
    )]
    metrics_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Interface, health and threat model summary")]
    Status,
    #[command(about = "Run a reconnaissance pass and print the report")]
    Recon,
    #[command(about = "Execute one validated attack")]
    Attack {
        #[arg(help = "spoof_data, inject_load, reconnaissance, block_command or toggle_device")]
        technique: String,
        #[arg(long, default_value = "{}", help = "Technique parameters as a JSON object")]
        params: String,
    },
    #[command(about = "Ask the planner for an attack plan")]
    Plan {
        #[arg(
            long,
            default_value = "Maximize grid disruption through strategic attack progression"
        )]
        objective: String,
        #[arg(long, help = "Fail instead of accepting the fallback plan")]
        strict: bool,
    },
    #[command(subcommand, about = "Run a single campaign")]
    Campaign(campaign::CampaignCommand),
    #[command(about = "Alternate AI and random campaigns and compare them")]
    Compare {
        #[arg(long, value_name = "SECONDS")]
        duration: Option<u64>,
        #[arg(long, default_value_t = 3)]
        trials: u32,
    },
    #[command(about = "Sample the grid for a while and report what the monitor saw")]
    Monitor {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
    #[command(about = "Print the effective configuration")]
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<OrchestratorError>() {
            Some(failure) => {
                // Domain failures stay machine readable on stdout.
                let _ = emit(&failure.body());
                ExitCode::from(2)
            }
            None => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/gaco.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let config = loaded.config;
    init_tracing("gacoctl", &config.logging)?;
    info!(config_path = %loaded.source.display(), "configuration loaded");

    let registry = if config.metrics.enabled {
        Some(new_registry())
    } else {
        if cli.metrics_out.is_some() {
            warn!("metrics output requested but metrics are disabled by configuration");
        }
        None
    };
    let orchestrator = CampaignOrchestrator::from_config(&config, registry.clone())?;
    let outcome = dispatch(&orchestrator, &config, cli.command).await;
    orchestrator.shutdown().await;
    if let (Some(path), Some(registry)) = (&cli.metrics_out, &registry) {
        write_metrics(path, registry)?;
    }
    outcome
}

async fn dispatch(
    orchestrator: &CampaignOrchestrator,
    config: &AppConfig,
    command: Commands,
) -> Result<()> {
    let default_duration = config.campaign.default_duration;
    match command {
        Commands::Status => emit(&orchestrator.status().await?),
        Commands::Recon => emit(&orchestrator.reconnaissance().await?),
        Commands::Attack { technique, params } => {
            let params: Value = serde_json::from_str(&params).map_err(|err| {
                OrchestratorError::InvalidRequest(format!("--params is not valid JSON: {err}"))
            })?;
            emit(&orchestrator.execute_technique(&technique, &params).await?)
        }
        Commands::Plan { objective, strict } => {
            let context = json!({ "source": "gacoctl" });
            let plan = if strict {
                orchestrator.plan_attack_strict(&objective, &context).await?
            } else {
                orchestrator.plan_attack(&objective, &context).await?
            };
            emit(&plan)
        }
        Commands::Campaign(cmd) => campaign::run(orchestrator, cmd, default_duration).await,
        Commands::Compare { duration, trials } => {
            let duration = duration.map(Duration::from_secs).unwrap_or(default_duration);
            emit(&orchestrator.run_comparison(duration, trials).await?)
        }
        Commands::Monitor { seconds } => monitor(orchestrator, Duration::from_secs(seconds)).await,
        Commands::Config => emit(config),
    }
}

async fn monitor(orchestrator: &CampaignOrchestrator, window: Duration) -> Result<()> {
    if !orchestrator.start_monitoring() {
        warn!("monitor already running or disabled by configuration");
    }
    tokio::time::sleep(window).await;
    let monitor = orchestrator.monitor();
    let report = json!({
        "status": monitor.status(),
        "stability": monitor.stability_metrics(),
        "anomalies": monitor.anomalies(),
        "impact": orchestrator.attack_impact_analysis().await?,
    });
    emit(&report)
}

fn write_metrics(path: &Path, registry: &SharedRegistry) -> Result<()> {
    let text = encode_text(registry)?;
    std::fs::write(path, text)
        .with_context(|| format!("unable to write metrics to {}", path.display()))?;
    info!(path = %path.display(), "metrics written");
    Ok(())
}

pub(crate) fn emit<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{rendered}");
    Ok(())
}
