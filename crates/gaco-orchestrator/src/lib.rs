//! ---
//! ems_section: "04-configuration-orchestration"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Campaign orchestration and strategy comparison."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Campaign orchestration over one grid.
//!
//! [`CampaignOrchestrator`] exposes single attacks, reconnaissance, planning,
//! AI and random campaigns and the trial-based comparison between them. Every
//! operation returns its result or an [`OrchestratorError`] carrying a stable
//! reason code.

pub mod comparison;
pub mod errors;
pub mod orchestrator;

pub use comparison::{ComparisonMetrics, ComparisonReport, ImprovementRatio};
pub use errors::{ErrorBody, OrchestratorError};
pub use orchestrator::{CampaignOrchestrator, OrchestratorStatus};
