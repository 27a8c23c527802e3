//! ---
//! ems_section: "07-resilience-fault-tolerance"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Attack primitives and the safety policy gating them."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Read-only reconnaissance over a single grid snapshot.

use gaco_common::NOMINAL_VOLTAGE;
use gaco_grid::{
    per_unit, voltage_violations, GridState, Phase, Severity, ViolationKind,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::request::{AttackRequest, InjectLoadParams, SpoofParams, SpoofTarget};

const IMBALANCE_THRESHOLD: f64 = 0.2;
const STRESS_LOAD_VA: f64 = 2_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusInfo {
    pub name: String,
    pub voltage: f64,
    pub pu_voltage: f64,
    pub phase_angle: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    Export,
    Import,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerFlow {
    pub name: String,
    pub magnitude_mva: f64,
    pub power_factor: f64,
    pub direction: FlowDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalNode {
    pub bus: String,
    pub issue: String,
    pub severity: Severity,
}

/// Buses, voltage levels and flows inferred from measurement keys.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Topology {
    pub buses: Vec<BusInfo>,
    /// Distinct magnitudes rounded to the nearest kV, in volts.
    pub voltage_levels: Vec<f64>,
    pub power_flows: Vec<PowerFlow>,
    pub critical_nodes: Vec<CriticalNode>,
}

/// Weakness detected in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Vulnerability {
    Undervoltage {
        location: String,
        severity: Severity,
        value: f64,
    },
    Overvoltage {
        location: String,
        severity: Severity,
        value: f64,
    },
    UnbalancedLoading {
        severity: Severity,
        phase_powers: IndexMap<Phase, f64>,
        imbalance_ratio: f64,
    },
    SystemDegradation {
        severity: Severity,
        health_score: f64,
        issues: Vec<String>,
    },
}

impl Vulnerability {
    pub fn severity(&self) -> Severity {
        match self {
            Vulnerability::Undervoltage { severity, .. }
            | Vulnerability::Overvoltage { severity, .. }
            | Vulnerability::UnbalancedLoading { severity, .. }
            | Vulnerability::SystemDegradation { severity, .. } => *severity,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Vulnerability::Undervoltage { .. } => "undervoltage",
            Vulnerability::Overvoltage { .. } => "overvoltage",
            Vulnerability::UnbalancedLoading { .. } => "unbalanced_loading",
            Vulnerability::SystemDegradation { .. } => "system_degradation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackSurface {
    pub surface: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub attack_methods: Vec<String>,
    pub impact: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Severity,
    pub target: String,
    pub objective: String,
    pub request: AttackRequest,
    pub expected_impact: String,
}

/// Everything a reconnaissance pass learns from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconReport {
    pub topology: Topology,
    pub vulnerabilities: Vec<Vulnerability>,
    pub attack_surfaces: Vec<AttackSurface>,
    pub recommendations: Vec<Recommendation>,
}

impl ReconReport {
    pub fn from_state(state: &GridState) -> Self {
        let vulnerabilities = identify_vulnerabilities(state);
        let recommendations = recommend(&vulnerabilities);
        Self {
            topology: analyze_topology(state),
            attack_surfaces: attack_surfaces(state),
            vulnerabilities,
            recommendations,
        }
    }
}

pub fn analyze_topology(state: &GridState) -> Topology {
    let mut topology = Topology::default();
    for (name, reading) in &state.voltages {
        topology.buses.push(BusInfo {
            name: name.clone(),
            voltage: reading.magnitude,
            pu_voltage: per_unit(reading.magnitude),
            phase_angle: reading.angle,
        });
        let level = (reading.magnitude / 1000.0).round() * 1000.0;
        if !topology.voltage_levels.contains(&level) {
            topology.voltage_levels.push(level);
        }
    }
    for (name, reading) in &state.powers {
        topology.power_flows.push(PowerFlow {
            name: name.clone(),
            magnitude_mva: reading.magnitude / 1e6,
            power_factor: reading.power_factor,
            direction: if reading.real > 0.0 {
                FlowDirection::Export
            } else {
                FlowDirection::Import
            },
        });
    }
    topology.critical_nodes = voltage_violations(state)
        .into_iter()
        .map(|violation| CriticalNode {
            bus: violation.location,
            issue: "voltage_violation".to_owned(),
            severity: violation.severity,
        })
        .collect();
    topology
}

pub fn identify_vulnerabilities(state: &GridState) -> Vec<Vulnerability> {
    let mut found: Vec<Vulnerability> = voltage_violations(state)
        .into_iter()
        .map(|violation| match violation.kind {
            ViolationKind::Undervoltage => Vulnerability::Undervoltage {
                location: violation.location,
                severity: violation.severity,
                value: violation.value_pu,
            },
            ViolationKind::Overvoltage => Vulnerability::Overvoltage {
                location: violation.location,
                severity: violation.severity,
                value: violation.value_pu,
            },
        })
        .collect();

    let mut phase_powers: IndexMap<Phase, f64> = IndexMap::new();
    for (key, reading) in &state.powers {
        if let Some(phase) = Phase::from_key(key) {
            phase_powers.insert(phase, reading.magnitude);
        }
    }
    let total: f64 = state.powers.values().map(|p| p.magnitude).sum();
    if total > 0.0 && phase_powers.len() >= 2 {
        let max = phase_powers.values().copied().fold(f64::MIN, f64::max);
        let min = phase_powers.values().copied().fold(f64::MAX, f64::min);
        if max > 0.0 && (max - min) / max > IMBALANCE_THRESHOLD {
            found.push(Vulnerability::UnbalancedLoading {
                severity: Severity::Medium,
                imbalance_ratio: (max - min) / max,
                phase_powers,
            });
        }
    }

    let health = &state.system_health;
    if health.status.is_stressed() {
        found.push(Vulnerability::SystemDegradation {
            severity: Severity::High,
            health_score: health.score,
            issues: health.issues.clone(),
        });
    }
    found
}

fn surface(surface: String, kind: &str, description: String, methods: &[&str], impact: Severity) -> AttackSurface {
    AttackSurface {
        surface,
        kind: kind.to_owned(),
        description,
        attack_methods: methods.iter().map(|m| (*m).to_owned()).collect(),
        impact,
    }
}

/// Fixed catalog plus one voltage-control surface per bus.
pub fn attack_surfaces(state: &GridState) -> Vec<AttackSurface> {
    let mut surfaces = vec![surface(
        "helics_messaging".to_owned(),
        "communication",
        "Co-simulation messages carry no authentication or encryption".to_owned(),
        &["message_tampering", "data_injection", "replay_attacks"],
        Severity::High,
    )];
    for bus in state.voltages.keys() {
        surfaces.push(surface(
            format!("voltage_control_{bus}"),
            "control_system",
            format!("Voltage setpoint manipulation at {bus}"),
            &["setpoint_manipulation", "false_data_injection"],
            Severity::High,
        ));
    }
    surfaces.push(surface(
        "power_flow_control".to_owned(),
        "control_system",
        "Transmission and distribution power flow interface".to_owned(),
        &["load_manipulation", "power_injection"],
        Severity::High,
    ));
    surfaces.push(surface(
        "protection_coordination".to_owned(),
        "protection_system",
        "Protection relay coordination points".to_owned(),
        &["protection_blinding", "false_trip_signals"],
        Severity::Critical,
    ));
    surfaces
}

/// Reconnaissance first, then one follow-up per vulnerability.
pub fn recommend(vulnerabilities: &[Vulnerability]) -> Vec<Recommendation> {
    let mut recommendations = vec![Recommendation {
        priority: Severity::High,
        target: "all_systems".to_owned(),
        objective: "Gather comprehensive grid intelligence".to_owned(),
        request: AttackRequest::Reconnaissance,
        expected_impact: "Complete vulnerability assessment".to_owned(),
    }];

    for vulnerability in vulnerabilities {
        let recommendation = match vulnerability {
            Vulnerability::Undervoltage {
                location,
                severity,
                value,
            } => Recommendation {
                priority: *severity,
                target: location.clone(),
                objective: "Trigger undervoltage protection cascade".to_owned(),
                request: spoof_voltage(location, value * NOMINAL_VOLTAGE * 0.9),
                expected_impact: "Protection system activation, possible load shedding".to_owned(),
            },
            Vulnerability::Overvoltage {
                location,
                severity,
                value,
            } => Recommendation {
                priority: *severity,
                target: location.clone(),
                objective: "Drive overvoltage toward equipment limits".to_owned(),
                request: spoof_voltage(location, value * NOMINAL_VOLTAGE * 1.1),
                expected_impact: "Insulation stress, overvoltage tripping".to_owned(),
            },
            Vulnerability::UnbalancedLoading {
                severity,
                phase_powers,
                ..
            } => {
                let lightest = phase_powers
                    .iter()
                    .min_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(phase, _)| *phase)
                    .unwrap_or(Phase::A);
                Recommendation {
                    priority: *severity,
                    target: format!("phase_{lightest}"),
                    objective: "Worsen phase imbalance".to_owned(),
                    request: AttackRequest::InjectLoad(InjectLoadParams {
                        phase: lightest,
                        magnitude: STRESS_LOAD_VA,
                        ..InjectLoadParams::default()
                    }),
                    expected_impact: "Neutral current rise, unbalance protection".to_owned(),
                }
            }
            Vulnerability::SystemDegradation { severity, .. } => Recommendation {
                priority: *severity,
                target: "weakest_phase".to_owned(),
                objective: "Exploit existing system stress".to_owned(),
                request: AttackRequest::InjectLoad(InjectLoadParams {
                    phase: Phase::A,
                    magnitude: STRESS_LOAD_VA,
                    ..InjectLoadParams::default()
                }),
                expected_impact: "System overload, cascading failures".to_owned(),
            },
        };
        recommendations.push(recommendation);
    }
    recommendations
}

fn spoof_voltage(location: &str, value: f64) -> AttackRequest {
    let phase = Phase::from_key(location).unwrap_or(Phase::A);
    AttackRequest::SpoofData(SpoofParams::new(SpoofTarget::voltage(phase), Some(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaco_grid::{Phasor, PhasorReading};

    fn reading(magnitude: f64) -> PhasorReading {
        PhasorReading::from_phasor(Phasor::new(magnitude, 0.0))
    }

    fn stressed_state() -> GridState {
        let mut voltages = IndexMap::new();
        voltages.insert("gld_voltage_Va".to_owned(), reading(0.88 * NOMINAL_VOLTAGE));
        voltages.insert("gld_voltage_Vb".to_owned(), reading(1.0 * NOMINAL_VOLTAGE));
        voltages.insert("gld_voltage_Vc".to_owned(), reading(1.07 * NOMINAL_VOLTAGE));
        let mut powers = IndexMap::new();
        powers.insert("gld_power_Sa".to_owned(), reading(1.0e6));
        powers.insert("gld_power_Sb".to_owned(), reading(0.5e6));
        powers.insert("gld_power_Sc".to_owned(), reading(0.9e6));
        GridState::from_readings(3.0, voltages, powers)
    }

    #[test]
    fn topology_flags_buses_outside_band() {
        let topology = analyze_topology(&stressed_state());
        assert_eq!(topology.buses.len(), 3);
        assert_eq!(topology.voltage_levels, vec![2000.0, 3000.0]);
        assert_eq!(topology.critical_nodes.len(), 2);
        assert_eq!(topology.critical_nodes[0].severity, Severity::High);
        assert_eq!(topology.critical_nodes[1].severity, Severity::Medium);
        assert!(topology
            .power_flows
            .iter()
            .all(|f| f.direction == FlowDirection::Export));
    }

    #[test]
    fn vulnerabilities_cover_voltage_balance_and_health() {
        let found = identify_vulnerabilities(&stressed_state());
        let labels: Vec<_> = found.iter().map(|v| v.label()).collect();
        assert_eq!(
            labels,
            vec![
                "undervoltage",
                "overvoltage",
                "unbalanced_loading",
                "system_degradation"
            ]
        );
    }

    #[test]
    fn recommendations_start_with_reconnaissance_and_follow_each_finding() {
        let report = ReconReport::from_state(&stressed_state());
        assert_eq!(report.recommendations.len(), report.vulnerabilities.len() + 1);
        assert_eq!(report.recommendations[0].request, AttackRequest::Reconnaissance);
        match &report.recommendations[1].request {
            AttackRequest::SpoofData(params) => {
                assert_eq!(params.target, SpoofTarget::voltage(Phase::A));
                let expected = 0.88 * NOMINAL_VOLTAGE * 0.9;
                assert!((params.value.expect("value") - expected).abs() < 1e-6);
            }
            other => panic!("unexpected request {other:?}"),
        }
        match &report.recommendations[3].request {
            AttackRequest::InjectLoad(params) => assert_eq!(params.phase, Phase::B),
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn surface_catalog_has_one_control_point_per_bus() {
        let surfaces = attack_surfaces(&stressed_state());
        assert_eq!(surfaces.len(), 3 + 3);
        assert_eq!(surfaces[0].surface, "helics_messaging");
        assert_eq!(surfaces.last().map(|s| s.impact), Some(Severity::Critical));
    }
}
