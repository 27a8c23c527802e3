//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Campaign subcommands for the orchestrator CLI."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use anyhow::Result;
use clap::Subcommand;
use gaco_orchestrator::CampaignOrchestrator;
use gaco_planner::analyze_effectiveness;
use serde_json::json;

use crate::emit;

#[derive(Debug, Subcommand)]
pub enum CampaignCommand {
    #[command(about = "Planned campaign with adaptive re-planning")]
    Ai {
        #[arg(long, value_name = "SECONDS")]
        duration: Option<u64>,
        #[arg(long, help = "Reset the grid before starting")]
        reset: bool,
    },
    #[command(about = "Uniformly random baseline campaign")]
    Random {
        #[arg(long, value_name = "SECONDS")]
        duration: Option<u64>,
        #[arg(long, help = "Reset the grid before starting")]
        reset: bool,
    },
    #[command(about = "Campaigns recorded by this process")]
    History,
}

pub async fn run(
    orchestrator: &CampaignOrchestrator,
    command: CampaignCommand,
    default_duration: Duration,
) -> Result<()> {
    let seconds = |duration: Option<u64>| duration.map(Duration::from_secs).unwrap_or(default_duration);
    match command {
        CampaignCommand::Ai { duration, reset } => {
            if reset {
                orchestrator.reset_grid().await?;
            }
            let result = orchestrator.execute_ai_campaign(seconds(duration)).await?;
            let analysis = analyze_effectiveness(&result);
            emit(&json!({ "campaign": result, "analysis": analysis }))
        }
        CampaignCommand::Random { duration, reset } => {
            if reset {
                orchestrator.reset_grid().await?;
            }
            emit(&orchestrator.execute_random_campaign(seconds(duration)).await?)
        }
        CampaignCommand::History => emit(&orchestrator.campaign_history()),
    }
}
