//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Grid state model and grid interface boundary."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use thiserror::Error;

/// Result alias for grid interface calls.
pub type Result<T> = std::result::Result<T, GridError>;

/// Failures surfaced by a grid interface implementation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GridError {
    /// Interface not initialised or unreachable.
    #[error("grid interface unavailable: {0}")]
    Unavailable(String),
    /// Call exceeded the gateway deadline.
    #[error("grid call {operation} timed out after {after:?}")]
    Timeout {
        /// Name of the interface operation.
        operation: &'static str,
        /// Deadline that elapsed.
        after: Duration,
    },
    /// The federation refused a publication.
    #[error("publication to {target} was rejected")]
    PublicationRejected {
        /// Publication key or signal name.
        target: String,
    },
    /// Target does not name a known phase or signal.
    #[error("invalid target {0}")]
    InvalidTarget(String),
}

impl GridError {
    /// Whether the error indicates the interface as a whole cannot be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, GridError::Unavailable(_) | GridError::Timeout { .. })
    }
}
