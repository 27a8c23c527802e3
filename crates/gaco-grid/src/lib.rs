//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Grid state model and grid interface boundary."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Grid-facing types for the campaign orchestrator.
//!
//! The co-simulation federation itself lives outside this workspace. This crate
//! captures what the orchestrator needs from it: immutable [`GridState`]
//! snapshots, the [`GridInterface`] contract, a [`GridGateway`] that bounds and
//! serializes calls, and a [`SimulatedGrid`] effect model for local runs.
#![warn(missing_docs)]

pub mod assessment;
pub mod errors;
pub mod gateway;
pub mod interface;
pub mod phasor;
pub mod simulated;
pub mod state;

pub use assessment::{voltage_violations, RiskLevel, Severity, ViolationKind, VoltageViolation};
pub use errors::{GridError, Result};
pub use gateway::GridGateway;
pub use interface::{AttackRecord, GridInterface, InterfaceStatus, RecordedValue};
pub use phasor::{Phase, Phasor, PhasorReading};
pub use simulated::SimulatedGrid;
pub use state::{assess_health, per_unit, GridState, HealthStatus, SystemHealth};
