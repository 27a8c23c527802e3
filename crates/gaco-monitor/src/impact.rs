//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Grid observation loop and derived health analytics."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use gaco_grid::AttackRecord;
use serde::{Deserialize, Serialize};

use crate::monitor::Sample;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackCorrelation {
    pub attack: AttackRecord,
    /// Health of the last sample at or before the attack time, if any.
    pub health_before: Option<f64>,
    /// Health of the first sample after the attack time, if any.
    pub health_after: Option<f64>,
    pub health_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttackImpactReport {
    pub total_attacks: usize,
    pub correlated: usize,
    /// Mean health change over correlated attacks; negative means degradation.
    pub mean_health_change: f64,
    pub attacks: Vec<AttackCorrelation>,
}

/// Match every recorded attack to the samples around it in simulation time.
///
/// Publications take effect at the next time grant, so a sample stamped with
/// the attack's own time still shows the pre-attack grid.
pub fn analyze(attacks: &[AttackRecord], history: &[Sample]) -> AttackImpactReport {
    let correlations: Vec<AttackCorrelation> = attacks
        .iter()
        .map(|attack| {
            let before = history
                .iter()
                .rev()
                .find(|s| s.state.timestamp <= attack.timestamp)
                .map(|s| s.state.system_health.score);
            let after = history
                .iter()
                .find(|s| s.state.timestamp > attack.timestamp)
                .map(|s| s.state.system_health.score);
            AttackCorrelation {
                attack: attack.clone(),
                health_before: before,
                health_after: after,
                health_change: before.zip(after).map(|(b, a)| a - b),
            }
        })
        .collect();

    let changes: Vec<f64> = correlations.iter().filter_map(|c| c.health_change).collect();
    let mean_health_change = if changes.is_empty() {
        0.0
    } else {
        changes.iter().sum::<f64>() / changes.len() as f64
    };
    AttackImpactReport {
        total_attacks: attacks.len(),
        correlated: changes.len(),
        mean_health_change,
        attacks: correlations,
    }
}
