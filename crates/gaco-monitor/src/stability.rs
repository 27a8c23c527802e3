//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Grid observation loop and derived health analytics."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use chrono::{DateTime, Duration, Utc};
use gaco_grid::per_unit;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::anomaly::AnomalyRecord;
use crate::monitor::Sample;

/// Samples considered for stability metrics.
pub const STABILITY_WINDOW: usize = 100;

const VOLTAGE_WEIGHT: f64 = 0.6;
const POWER_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StabilityMetrics {
    pub voltage_stability: f64,
    pub power_stability: f64,
    pub overall_stability: f64,
    /// Anomalies recorded during the trailing hour.
    pub anomaly_rate: usize,
    pub samples: usize,
}

/// Score variability of the most recent samples.
///
/// Voltage stability is `100 − 100·σ` over every per-unit reading, power
/// stability `100 − 100·CV` over every apparent power magnitude; both floor at
/// zero. Fewer than two samples yield all zeros.
pub fn compute(history: &[Sample], anomalies: &[AnomalyRecord], now: DateTime<Utc>) -> StabilityMetrics {
    if history.len() < 2 {
        return StabilityMetrics::default();
    }
    let window = &history[history.len().saturating_sub(STABILITY_WINDOW)..];

    let voltages: Vec<f64> = window
        .iter()
        .flat_map(|s| s.state.voltages.values().map(|r| per_unit(r.magnitude)))
        .collect();
    let powers: Vec<f64> = window
        .iter()
        .flat_map(|s| s.state.powers.values().map(|r| r.magnitude))
        .collect();

    let voltage_stability = if voltages.len() >= 2 {
        (100.0 - voltages.iter().population_std_dev() * 100.0).max(0.0)
    } else {
        0.0
    };
    let power_stability = if powers.len() >= 2 {
        let mean = powers.iter().mean();
        if mean > 0.0 {
            let cv = powers.iter().population_std_dev() / mean;
            (100.0 - cv * 100.0).max(0.0)
        } else {
            0.0
        }
    } else {
        0.0
    };

    let cutoff = now - Duration::minutes(60);
    StabilityMetrics {
        voltage_stability,
        power_stability,
        overall_stability: VOLTAGE_WEIGHT * voltage_stability + POWER_WEIGHT * power_stability,
        anomaly_rate: anomalies.iter().filter(|a| a.timestamp > cutoff).count(),
        samples: window.len(),
    }
}
