//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Grid state model and grid interface boundary."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::phasor::Phase;
use crate::state::{per_unit, GridState};

/// Severity attached to findings, anomalies and attack surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Worth watching.
    Medium,
    /// Actionable.
    High,
    /// Immediate threat to operation.
    Critical,
}

impl Severity {
    /// Stable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Overall risk derived from a set of findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// No findings.
    Low,
    /// Some findings, none severe.
    Medium,
    /// Severe or numerous findings.
    High,
    /// More than two high severity findings.
    Critical,
}

impl RiskLevel {
    /// `critical` above two high findings, `high` for any high finding or more
    /// than three findings, `medium` for any finding, `low` otherwise.
    pub fn classify(total: usize, high: usize) -> Self {
        if high > 2 {
            RiskLevel::Critical
        } else if high > 0 || total > 3 {
            RiskLevel::High
        } else if total > 0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Direction of a voltage band violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    /// Below 0.95 pu.
    Undervoltage,
    /// Above 1.05 pu.
    Overvoltage,
}

/// A bus outside the ±5 % voltage band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageViolation {
    /// Measurement key.
    pub location: String,
    /// Direction of the violation.
    pub kind: ViolationKind,
    /// Per-unit magnitude.
    pub value_pu: f64,
    /// `high` beyond ±10 %, `medium` otherwise.
    pub severity: Severity,
}

impl VoltageViolation {
    /// Phase the violated bus belongs to, if the key names one.
    pub fn phase(&self) -> Option<Phase> {
        Phase::from_key(&self.location)
    }
}

/// Every voltage reading outside the ±5 % band, in snapshot order.
pub fn voltage_violations(state: &GridState) -> Vec<VoltageViolation> {
    state
        .voltages
        .iter()
        .filter_map(|(location, reading)| {
            let pu = per_unit(reading.magnitude);
            let (kind, severe) = if pu < 0.95 {
                (ViolationKind::Undervoltage, pu < 0.9)
            } else if pu > 1.05 {
                (ViolationKind::Overvoltage, pu > 1.1)
            } else {
                return None;
            };
            Some(VoltageViolation {
                location: location.clone(),
                kind,
                value_pu: pu,
                severity: if severe { Severity::High } else { Severity::Medium },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_classification_matches_thresholds() {
        assert_eq!(RiskLevel::classify(0, 0), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(2, 0), RiskLevel::Medium);
        assert_eq!(RiskLevel::classify(4, 0), RiskLevel::High);
        assert_eq!(RiskLevel::classify(1, 1), RiskLevel::High);
        assert_eq!(RiskLevel::classify(3, 3), RiskLevel::Critical);
    }
}
