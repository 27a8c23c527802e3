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
use gaco_grid::{voltage_violations, GridState, HealthStatus, RiskLevel, Severity};
use serde::{Deserialize, Serialize};

use crate::stability::StabilityMetrics;

const STRESS_HIGH_BELOW: f64 = 70.0;
const STABILITY_FLAG_BELOW: f64 = 80.0;
const STABILITY_HIGH_BELOW: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    pub value: f64,
    pub severity: Severity,
    pub description: String,
}

/// On-demand weakness report grouped by category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityAssessment {
    pub assessed_at: DateTime<Utc>,
    pub voltage_vulnerabilities: Vec<Finding>,
    pub power_vulnerabilities: Vec<Finding>,
    pub stability_vulnerabilities: Vec<Finding>,
    pub overall_risk: RiskLevel,
}

impl VulnerabilityAssessment {
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.voltage_vulnerabilities
            .iter()
            .chain(&self.power_vulnerabilities)
            .chain(&self.stability_vulnerabilities)
    }

    pub fn total(&self) -> usize {
        self.findings().count()
    }
}

/// Assess `state`, adding a stability finding when metrics are available.
pub fn assess(state: &GridState, stability: Option<&StabilityMetrics>) -> VulnerabilityAssessment {
    let voltage_vulnerabilities = voltage_violations(state)
        .into_iter()
        .map(|v| Finding {
            kind: format!("{:?}", v.kind).to_lowercase(),
            description: format!("{} at {:.3} pu", v.location, v.value_pu),
            location: v.location,
            value: v.value_pu,
            severity: v.severity,
        })
        .collect();

    let mut power_vulnerabilities = Vec::new();
    // Unknown counts too: it is what a failed state read reports.
    let health = &state.system_health;
    if health.status != HealthStatus::Healthy {
        power_vulnerabilities.push(Finding {
            kind: "system_stress".to_owned(),
            location: "system".to_owned(),
            value: health.score,
            severity: if health.score < STRESS_HIGH_BELOW {
                Severity::High
            } else {
                Severity::Medium
            },
            description: format!("System health {} ({:.1})", health.status, health.score),
        });
    }

    let mut stability_vulnerabilities = Vec::new();
    if let Some(metrics) = stability.filter(|m| m.samples >= 2) {
        if metrics.overall_stability < STABILITY_FLAG_BELOW {
            stability_vulnerabilities.push(Finding {
                kind: "low_stability".to_owned(),
                location: "system".to_owned(),
                value: metrics.overall_stability,
                severity: if metrics.overall_stability < STABILITY_HIGH_BELOW {
                    Severity::High
                } else {
                    Severity::Medium
                },
                description: format!("Overall stability {:.1}", metrics.overall_stability),
            });
        }
    }

    let mut assessment = VulnerabilityAssessment {
        assessed_at: Utc::now(),
        voltage_vulnerabilities,
        power_vulnerabilities,
        stability_vulnerabilities,
        overall_risk: RiskLevel::Low,
    };
    let high = assessment
        .findings()
        .filter(|f| f.severity >= Severity::High)
        .count();
    assessment.overall_risk = RiskLevel::classify(assessment.total(), high);
    assessment
}
