//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Grid state model and grid interface boundary."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use async_trait::async_trait;
use gaco_common::Technique;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::phasor::{Phase, Phasor};
use crate::state::GridState;

/// Value published by a recorded attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordedValue {
    /// Injected voltage or power phasor.
    Phasor(Phasor),
    /// Command blocking flag.
    Flag(bool),
}

/// Entry in the federation's attack history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackRecord {
    /// Simulation time of the publication.
    pub timestamp: f64,
    /// Publication kind (`voltage_spoof`, `power_injection`, `command_blocking`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Signal or subsystem targeted.
    pub target: String,
    /// Published value.
    pub value: RecordedValue,
    /// Technique that produced the publication.
    pub technique: Technique,
}

/// Summary of the interface connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceStatus {
    /// Federate name.
    pub name: String,
    /// Current simulation time in seconds.
    pub current_time: f64,
    /// Number of attack publications registered.
    pub publications: usize,
    /// Number of measurement subscriptions.
    pub subscriptions: usize,
    /// Length of the attack history.
    pub attack_count: usize,
    /// Whether the federation handshake completed.
    pub initialized: bool,
}

/// Contract between the orchestrator and the co-simulation federation.
///
/// Implementations must tolerate concurrent reads. Actuating calls are
/// serialized by [`crate::GridGateway`], so implementations need not guard
/// against overlapping writes themselves.
#[async_trait]
pub trait GridInterface: Send + Sync {
    /// Latest snapshot.
    async fn current_state(&self) -> Result<GridState>;

    /// Publish a spoofed voltage phasor on a phase.
    async fn inject_voltage(&self, phase: Phase, phasor: Phasor) -> Result<()>;

    /// Publish a spoofed or injected power phasor on a phase.
    async fn inject_power(&self, phase: Phase, phasor: Phasor) -> Result<()>;

    /// Publish the command blocking flag.
    async fn block_commands(&self, enable: bool) -> Result<()>;

    /// Request the next time grant. Returns the granted simulation time.
    async fn advance_time(&self, step: Option<f64>) -> Result<f64>;

    /// Attacks published since the last reset.
    async fn attack_history(&self) -> Result<Vec<AttackRecord>>;

    /// Clear attack history and lift command blocking.
    async fn reset_state(&self) -> Result<()>;

    /// Connection summary.
    async fn status(&self) -> Result<InterfaceStatus>;
}
