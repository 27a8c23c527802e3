//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Grid observation loop and derived health analytics."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use gaco_common::MonitoringConfig;
use gaco_grid::{GridState, PhasorReading, Severity};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Voltage,
    Power,
    Health,
    DetectionError,
}

/// Deviation of one observation from the latched baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: AnomalyKind,
    pub location: String,
    pub baseline: f64,
    pub current: f64,
    /// Relative change for voltage and power, points lost for health.
    pub deviation: f64,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AnomalyRecord {
    /// Record a failed observation.
    pub fn detection_error(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind: AnomalyKind::DetectionError,
            location: "grid_interface".to_owned(),
            baseline: 0.0,
            current: 0.0,
            deviation: 0.0,
            severity: Severity::High,
            message: Some(message.into()),
        }
    }
}

/// Compare `current` against `baseline`.
///
/// Voltage and power readings are flagged when their relative change exceeds
/// the configured threshold and escalate to high above twice that. A health
/// drop beyond the threshold is high, beyond three times it critical.
pub fn detect(
    baseline: &GridState,
    current: &GridState,
    thresholds: &MonitoringConfig,
    at: DateTime<Utc>,
) -> Vec<AnomalyRecord> {
    let mut found = Vec::new();
    compare_readings(
        &baseline.voltages,
        &current.voltages,
        AnomalyKind::Voltage,
        thresholds.voltage_deviation,
        at,
        &mut found,
    );
    compare_readings(
        &baseline.powers,
        &current.powers,
        AnomalyKind::Power,
        thresholds.power_deviation,
        at,
        &mut found,
    );

    let drop = baseline.system_health.score - current.system_health.score;
    if drop > thresholds.health_degradation {
        found.push(AnomalyRecord {
            timestamp: at,
            kind: AnomalyKind::Health,
            location: "system".to_owned(),
            baseline: baseline.system_health.score,
            current: current.system_health.score,
            deviation: drop,
            severity: if drop > 3.0 * thresholds.health_degradation {
                Severity::Critical
            } else {
                Severity::High
            },
            message: None,
        });
    }
    found
}

fn compare_readings(
    baseline: &IndexMap<String, PhasorReading>,
    current: &IndexMap<String, PhasorReading>,
    kind: AnomalyKind,
    threshold: f64,
    at: DateTime<Utc>,
    found: &mut Vec<AnomalyRecord>,
) {
    for (key, reading) in current {
        let Some(base) = baseline.get(key) else {
            continue;
        };
        if base.magnitude <= 0.0 {
            continue;
        }
        let deviation = (reading.magnitude - base.magnitude).abs() / base.magnitude;
        if deviation > threshold {
            found.push(AnomalyRecord {
                timestamp: at,
                kind,
                location: key.clone(),
                baseline: base.magnitude,
                current: reading.magnitude,
                deviation,
                severity: if deviation > 2.0 * threshold {
                    Severity::High
                } else {
                    Severity::Medium
                },
                message: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaco_common::NOMINAL_VOLTAGE;
    use gaco_grid::Phasor;

    fn state(va_pu: f64, sa_va: f64) -> GridState {
        let mut voltages = IndexMap::new();
        voltages.insert(
            "gld_voltage_Va".to_owned(),
            PhasorReading::from_phasor(Phasor::new(va_pu * NOMINAL_VOLTAGE, 0.0)),
        );
        let mut powers = IndexMap::new();
        powers.insert(
            "gld_power_Sa".to_owned(),
            PhasorReading::from_phasor(Phasor::new(sa_va, 0.0)),
        );
        GridState::from_readings(0.0, voltages, powers)
    }

    #[test]
    fn small_drift_is_not_an_anomaly() {
        let base = state(1.0, 1.0e6);
        let now = state(1.03, 1.05e6);
        assert!(detect(&base, &now, &MonitoringConfig::default(), Utc::now()).is_empty());
    }

    #[test]
    fn severity_escalates_with_deviation() {
        let base = state(1.0, 1.0e6);
        let config = MonitoringConfig::default();

        let moderate = detect(&base, &state(1.07, 1.15e6), &config, Utc::now());
        assert_eq!(moderate.len(), 3);
        assert_eq!(moderate[0].kind, AnomalyKind::Voltage);
        assert_eq!(moderate[0].severity, Severity::Medium);
        assert_eq!(moderate[1].kind, AnomalyKind::Power);
        assert_eq!(moderate[1].severity, Severity::Medium);
        assert_eq!(moderate[2].kind, AnomalyKind::Health);
        assert_eq!(moderate[2].severity, Severity::High);

        let severe = detect(&base, &state(0.85, 1.5e6), &config, Utc::now());
        assert_eq!(severe[0].severity, Severity::High);
        assert_eq!(severe[1].severity, Severity::High);
        assert!((severe[2].deviation - 20.0).abs() < 1e-9);
    }

    #[test]
    fn large_health_drop_is_critical() {
        let mut base = state(1.0, 1.0e6);
        base.system_health.score = 100.0;
        let mut now = base.clone();
        now.system_health.score = 60.0;
        let found = detect(&base, &now, &MonitoringConfig::default(), Utc::now());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Critical);
    }
}
