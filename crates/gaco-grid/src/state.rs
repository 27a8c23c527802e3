//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Grid state model and grid interface boundary."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use gaco_common::NOMINAL_VOLTAGE;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::phasor::{Phase, PhasorReading};

const UNDERVOLTAGE_PU: f64 = 0.95;
const OVERVOLTAGE_PU: f64 = 1.05;
const UNDERVOLTAGE_PENALTY: f64 = 20.0;
const OVERVOLTAGE_PENALTY: f64 = 15.0;

/// Convert a voltage magnitude to per-unit of the feeder nominal.
pub fn per_unit(magnitude: f64) -> f64 {
    magnitude / NOMINAL_VOLTAGE
}

/// Coarse health band derived from the health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Score of at least 90.
    Healthy,
    /// Score of at least 70.
    Degraded,
    /// Score of at least 50.
    Compromised,
    /// Anything lower.
    Critical,
    /// No assessment available yet.
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Band a health score.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            HealthStatus::Healthy
        } else if score >= 70.0 {
            HealthStatus::Degraded
        } else if score >= 50.0 {
            HealthStatus::Compromised
        } else {
            HealthStatus::Critical
        }
    }

    /// Stable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Compromised => "compromised",
            HealthStatus::Critical => "critical",
            HealthStatus::Unknown => "unknown",
        }
    }

    /// Degraded, compromised or critical.
    pub fn is_stressed(&self) -> bool {
        matches!(
            self,
            HealthStatus::Degraded | HealthStatus::Compromised | HealthStatus::Critical
        )
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate health assessment attached to every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    /// Health band.
    pub status: HealthStatus,
    /// Score in `[0, 100]`.
    pub score: f64,
    /// Human readable findings, in detection order.
    pub issues: Vec<String>,
    /// Sum of apparent power magnitudes in MVA.
    #[serde(default)]
    pub total_power_mva: f64,
}

impl Default for SystemHealth {
    fn default() -> Self {
        Self {
            status: HealthStatus::Unknown,
            score: 100.0,
            issues: Vec::new(),
            total_power_mva: 0.0,
        }
    }
}

/// Score voltages against the ±5 % band.
///
/// Every undervoltage reading costs 20 points and every overvoltage 15; the
/// score floors at zero.
pub fn assess_health(
    voltages: &IndexMap<String, PhasorReading>,
    powers: &IndexMap<String, PhasorReading>,
) -> SystemHealth {
    let mut score: f64 = 100.0;
    let mut issues = Vec::new();

    for (name, reading) in voltages {
        let pu = per_unit(reading.magnitude);
        if pu < UNDERVOLTAGE_PU {
            score -= UNDERVOLTAGE_PENALTY;
            issues.push(format!("Undervoltage: {} = {:.3} pu", name, pu));
        } else if pu > OVERVOLTAGE_PU {
            score -= OVERVOLTAGE_PENALTY;
            issues.push(format!("Overvoltage: {} = {:.3} pu", name, pu));
        }
    }

    let total_power: f64 = powers.values().map(|p| p.magnitude).sum();
    let score = score.max(0.0);
    SystemHealth {
        status: HealthStatus::from_score(score),
        score,
        issues,
        total_power_mva: total_power / 1e6,
    }
}

/// Immutable snapshot of the grid at one simulation instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GridState {
    /// Simulation time in seconds.
    pub timestamp: f64,
    /// Voltage readings keyed by subscription name.
    pub voltages: IndexMap<String, PhasorReading>,
    /// Power readings keyed by subscription name.
    pub powers: IndexMap<String, PhasorReading>,
    /// Health derived from the readings.
    pub system_health: SystemHealth,
}

impl GridState {
    /// Build a snapshot and derive its health assessment.
    pub fn from_readings(
        timestamp: f64,
        voltages: IndexMap<String, PhasorReading>,
        powers: IndexMap<String, PhasorReading>,
    ) -> Self {
        let system_health = assess_health(&voltages, &powers);
        Self {
            timestamp,
            voltages,
            powers,
            system_health,
        }
    }

    /// First voltage reading whose key ends in the phase letter.
    pub fn voltage_for_phase(&self, phase: Phase) -> Option<&PhasorReading> {
        self.voltages
            .iter()
            .find(|(key, _)| Phase::from_key(key) == Some(phase))
            .map(|(_, reading)| reading)
    }

    /// First power reading whose key ends in the phase letter.
    pub fn power_for_phase(&self, phase: Phase) -> Option<&PhasorReading> {
        self.powers
            .iter()
            .find(|(key, _)| Phase::from_key(key) == Some(phase))
            .map(|(_, reading)| reading)
    }

    /// Health score shortcut.
    pub fn health_score(&self) -> f64 {
        self.system_health.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phasor::Phasor;

    fn voltages(pus: &[(&str, f64)]) -> IndexMap<String, PhasorReading> {
        pus.iter()
            .map(|(k, pu)| {
                (
                    (*k).to_owned(),
                    PhasorReading::from_phasor(Phasor::new(pu * NOMINAL_VOLTAGE, 0.0)),
                )
            })
            .collect()
    }

    #[test]
    fn nominal_voltages_are_healthy() {
        let v = voltages(&[("gld_voltage_Va", 1.0), ("gld_voltage_Vb", 1.01)]);
        let health = assess_health(&v, &IndexMap::new());
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.score, 100.0);
        assert!(health.issues.is_empty());
    }

    #[test]
    fn violations_cost_points_and_band_status() {
        let v = voltages(&[
            ("gld_voltage_Va", 0.90),
            ("gld_voltage_Vb", 1.10),
            ("gld_voltage_Vc", 1.0),
        ]);
        let health = assess_health(&v, &IndexMap::new());
        assert_eq!(health.score, 65.0);
        assert_eq!(health.status, HealthStatus::Compromised);
        assert_eq!(health.issues.len(), 2);
        assert!(health.issues[0].starts_with("Undervoltage"));
    }

    #[test]
    fn score_never_drops_below_zero() {
        let keys: Vec<(String, f64)> = (0..8).map(|i| (format!("bus_{i}"), 0.5)).collect();
        let refs: Vec<(&str, f64)> = keys.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        let health = assess_health(&voltages(&refs), &IndexMap::new());
        assert_eq!(health.score, 0.0);
        assert_eq!(health.status, HealthStatus::Critical);
    }

    #[test]
    fn phase_lookup_uses_key_suffix() {
        let state = GridState::from_readings(
            0.0,
            voltages(&[("gld_voltage_Va", 1.0), ("gld_voltage_Vb", 0.9)]),
            IndexMap::new(),
        );
        let b = state.voltage_for_phase(Phase::B).expect("phase b present");
        assert!((per_unit(b.magnitude) - 0.9).abs() < 1e-9);
        assert!(state.voltage_for_phase(Phase::C).is_none());
    }
}
