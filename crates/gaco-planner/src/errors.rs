//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Strategic planning and adaptive campaign execution."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use gaco_grid::GridError;
use thiserror::Error;

/// Failures talking to the planning oracle. All of them trigger the fallback.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OracleError {
    #[error("planning oracle unavailable: {0}")]
    Unavailable(String),
    #[error("planning oracle timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed plan: {0}")]
    Malformed(String),
}

/// Planning faults that cannot be recovered by falling back.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlannerError {
    #[error("grid context unavailable: {0}")]
    Grid(#[from] GridError),
}
