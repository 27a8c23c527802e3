//! ---
//! ems_section: "04-configuration-orchestration"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Campaign orchestration and strategy comparison."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use gaco_common::Technique;
use gaco_grid::GridError;
use gaco_planner::{OracleError, PlannerError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures surfaced by the orchestrator API.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrchestratorError {
    /// The threat model refused the request.
    #[error("{technique} rejected by threat model: {reason}")]
    ValidationRejected { technique: Technique, reason: String },
    /// The grid interface could not be reached.
    #[error("grid interface unavailable: {0}")]
    InterfaceUnavailable(String),
    /// Strict planning found no usable oracle.
    #[error("planning oracle unavailable: {0}")]
    OracleUnavailable(String),
    /// Strict planning received a reply without a usable plan.
    #[error("malformed plan: {0}")]
    MalformedPlan(String),
    /// The attack reached the grid and failed there.
    #[error("{technique} failed: {reason}")]
    AttackExecutionFailed { technique: Technique, reason: String },
    /// Caller supplied an unusable argument.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl OrchestratorError {
    /// Stable machine-readable code.
    pub fn reason(&self) -> &'static str {
        match self {
            OrchestratorError::ValidationRejected { .. } => "validation_rejected",
            OrchestratorError::InterfaceUnavailable(_) => "interface_unavailable",
            OrchestratorError::OracleUnavailable(_) => "oracle_unavailable",
            OrchestratorError::MalformedPlan(_) => "malformed_plan",
            OrchestratorError::AttackExecutionFailed { .. } => "attack_execution_failed",
            OrchestratorError::InvalidRequest(_) => "invalid_request",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            reason: self.reason().to_owned(),
            message: self.to_string(),
        }
    }
}

impl From<GridError> for OrchestratorError {
    fn from(err: GridError) -> Self {
        match err {
            GridError::Unavailable(detail) => OrchestratorError::InterfaceUnavailable(detail),
            other => OrchestratorError::InterfaceUnavailable(other.to_string()),
        }
    }
}

impl From<PlannerError> for OrchestratorError {
    fn from(err: PlannerError) -> Self {
        match err {
            PlannerError::Grid(grid) => grid.into(),
        }
    }
}

impl From<OracleError> for OrchestratorError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Malformed(detail) => OrchestratorError::MalformedPlan(detail),
            other => OrchestratorError::OracleUnavailable(other.to_string()),
        }
    }
}

/// Serializable error payload for callers that speak JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub reason: String,
    pub message: String,
}
