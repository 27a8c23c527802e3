//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Test doubles for the grid interface and planning oracle."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Test doubles shared by the integration suites.
//!
//! [`ScriptedGrid`] wraps the deterministic simulator, logs every call, can
//! serve canned snapshots and can be switched offline. [`StubOracle`] answers
//! planning requests with a fixed reply, a fixed error, or never.

mod grid;
mod oracle;

pub use grid::{voltage_state, GridCall, ScriptedGrid};
pub use oracle::{StubMode, StubOracle};
