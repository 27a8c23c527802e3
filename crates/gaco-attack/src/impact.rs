//! ---
//! ems_section: "07-resilience-fault-tolerance"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Attack primitives and the safety policy gating them."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use gaco_grid::{GridState, PhasorReading};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

const VOLTAGE_WEIGHT: f64 = 0.4;
const POWER_WEIGHT: f64 = 0.3;
const HEALTH_WEIGHT: f64 = 0.3;

/// Scalar summary of how far a grid moved between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImpactScore {
    /// Largest relative voltage change, percent, capped at 100.
    pub voltage_impact_pct: f64,
    /// Largest relative power change, percent, capped at 100.
    pub power_impact_pct: f64,
    /// Health points lost, never negative.
    pub health_impact: f64,
    /// `0.4·voltage + 0.3·power + 0.3·health`, within `[0, 100]`.
    pub total_score: f64,
}

impl ImpactScore {
    /// Score the transition from `pre` to `post`.
    pub fn between(pre: &GridState, post: &GridState) -> Self {
        let voltage_impact_pct = max_relative_change(&pre.voltages, &post.voltages);
        let power_impact_pct = max_relative_change(&pre.powers, &post.powers);
        let health_impact = (pre.system_health.score - post.system_health.score)
            .max(0.0)
            .min(100.0);
        let total_score = VOLTAGE_WEIGHT * voltage_impact_pct
            + POWER_WEIGHT * power_impact_pct
            + HEALTH_WEIGHT * health_impact;
        Self {
            voltage_impact_pct,
            power_impact_pct,
            health_impact,
            total_score,
        }
    }
}

fn max_relative_change(
    pre: &IndexMap<String, PhasorReading>,
    post: &IndexMap<String, PhasorReading>,
) -> f64 {
    let largest = pre
        .iter()
        .filter_map(|(key, before)| {
            let after = post.get(key)?;
            if before.magnitude > 0.0 {
                Some((after.magnitude - before.magnitude).abs() / before.magnitude)
            } else {
                Some(0.0)
            }
        })
        .fold(0.0_f64, f64::max);
    (largest * 100.0).min(100.0)
}
