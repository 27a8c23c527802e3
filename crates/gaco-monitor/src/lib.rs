//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Grid observation loop and derived health analytics."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Continuous grid observation.
//!
//! [`GridMonitor`] samples a [`gaco_grid::GridInterface`] on an interval,
//! latches the first healthy sample as its baseline and flags deviations from
//! it. Stability metrics and vulnerability assessments are derived on demand.

pub mod anomaly;
pub mod assessment;
pub mod impact;
pub mod monitor;
pub mod stability;

pub use anomaly::{AnomalyKind, AnomalyRecord};
pub use assessment::{assess, Finding, VulnerabilityAssessment};
pub use impact::{AttackCorrelation, AttackImpactReport};
pub use monitor::{GridMonitor, MonitorStatus, Sample};
pub use stability::StabilityMetrics;
