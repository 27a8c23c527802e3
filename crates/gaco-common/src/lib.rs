//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the campaign runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Core shared primitives for the campaign orchestrator workspace.
//! This crate exposes configuration loading, tracing setup and the attack
//! technique vocabulary consumed across the workspace.

pub mod config;
pub mod logging;
pub mod technique;

pub use config::{
    AppConfig, CampaignConfig, GridSettings, LoadedAppConfig, LoggingConfig, MetricsConfig,
    MonitoringConfig, PlannerConfig, ThreatModelConfig, VoltageLimits,
};
pub use logging::{init_tracing, LogFormat};
pub use technique::Technique;

/// Nominal phase-to-neutral voltage of the simulated feeder, in volts.
pub const NOMINAL_VOLTAGE: f64 = 2401.78;
