//! ---
//! ems_section: "07-resilience-fault-tolerance"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Attack primitives and the safety policy gating them."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Attack primitives for simulated grid penetration testing.
//!
//! [`ThreatModelValidator`] decides whether an [`AttackRequest`] may run and
//! how its parameters must be clamped; [`AttackEngine`] executes it against a
//! [`gaco_grid::GridInterface`] and scores the impact.

pub mod engine;
pub mod impact;
pub mod random;
pub mod recon;
pub mod request;
pub mod result;
pub mod threat_model;

pub use engine::AttackEngine;
pub use impact::ImpactScore;
pub use random::{random_request, random_technique};
pub use recon::{
    AttackSurface, ReconReport, Recommendation, Topology, Vulnerability,
};
pub use request::{
    AttackRequest, BlockCommandParams, DeviceState, InjectLoadParams, RequestError, SignalClass,
    SpoofParams, SpoofTarget, ToggleDeviceParams,
};
pub use result::{AttackDetails, AttackResult, StepAnnotation};
pub use threat_model::{Modifications, ThreatModelValidator, ValidationResult};
