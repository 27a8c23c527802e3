//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Strategic planning and adaptive campaign execution."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Strategic planner for attack campaigns.
//!
//! A [`PlanningOracle`] proposes steps as free-form JSON; [`normalize`] maps
//! them onto canonical [`gaco_attack::AttackRequest`]s. When the oracle is
//! missing, slow or incoherent the planner falls back to a deterministic
//! sequence derived from the current vulnerabilities.
//! [`StrategicPlanner::execute_campaign`] runs the plan under a wall-clock
//! budget and re-plans after state-changing steps.

pub mod campaign;
pub mod effectiveness;
pub mod errors;
pub mod normalize;
pub mod oracle;
pub mod plan;
pub mod prompt;

pub use campaign::{AdaptiveDecision, CampaignKind, CampaignResult, SkippedStep, StrategicPlanner};
pub use effectiveness::{analyze_effectiveness, CampaignAnalysis};
pub use errors::{OracleError, PlannerError};
pub use normalize::{normalize, normalize_params, resolve_technique, NormalizeError};
pub use oracle::{HttpOracle, PlanningOracle};
pub use plan::{fallback_steps, parse_plan, AttackPlan, PlanContext, PlanSource, PlanStep};
