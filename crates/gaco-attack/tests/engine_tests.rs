//! ---
//! ems_section: "07-resilience-fault-tolerance"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Attack primitives and the safety policy gating them."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;

use async_trait::async_trait;
use gaco_attack::{
    AttackDetails, AttackEngine, AttackRequest, BlockCommandParams, InjectLoadParams, SpoofParams,
    SpoofTarget, ThreatModelValidator, ToggleDeviceParams, Vulnerability,
};
use gaco_common::{ThreatModelConfig, Technique, NOMINAL_VOLTAGE};
use gaco_grid::{
    AttackRecord, GridError, GridInterface, GridState, InterfaceStatus, Phase, Phasor,
    PhasorReading, Severity, SimulatedGrid,
};
use indexmap::IndexMap;

fn engine_with(grid: Arc<dyn GridInterface>) -> AttackEngine {
    AttackEngine::with_seed(grid, Arc::new(ThreatModelValidator::default()), 42)
}

/// Grid frozen on one snapshot; every write fails when `broken` is set.
struct FixedGrid {
    state: GridState,
    broken: bool,
}

#[async_trait]
impl GridInterface for FixedGrid {
    async fn current_state(&self) -> gaco_grid::Result<GridState> {
        Ok(self.state.clone())
    }
    async fn inject_voltage(&self, phase: Phase, _: Phasor) -> gaco_grid::Result<()> {
        self.write(format!("voltage_{phase}"))
    }
    async fn inject_power(&self, phase: Phase, _: Phasor) -> gaco_grid::Result<()> {
        self.write(format!("power_{phase}"))
    }
    async fn block_commands(&self, _: bool) -> gaco_grid::Result<()> {
        self.write("control_system".to_owned())
    }
    async fn advance_time(&self, _: Option<f64>) -> gaco_grid::Result<f64> {
        Ok(self.state.timestamp)
    }
    async fn attack_history(&self) -> gaco_grid::Result<Vec<AttackRecord>> {
        Ok(Vec::new())
    }
    async fn reset_state(&self) -> gaco_grid::Result<()> {
        Ok(())
    }
    async fn status(&self) -> gaco_grid::Result<InterfaceStatus> {
        Err(GridError::Unavailable("fixed grid has no federation".to_owned()))
    }
}

impl FixedGrid {
    fn write(&self, target: String) -> gaco_grid::Result<()> {
        if self.broken {
            Err(GridError::PublicationRejected { target })
        } else {
            Ok(())
        }
    }
}

fn state_with_phase_a_at(pu: f64) -> GridState {
    let mut voltages = IndexMap::new();
    for (key, value) in [("gld_voltage_Va", pu), ("gld_voltage_Vb", 1.0), ("gld_voltage_Vc", 1.0)] {
        voltages.insert(
            key.to_owned(),
            PhasorReading::from_phasor(Phasor::new(value * NOMINAL_VOLTAGE, 0.0)),
        );
    }
    let mut powers = IndexMap::new();
    for key in ["gld_power_Sa", "gld_power_Sb", "gld_power_Sc"] {
        powers.insert(
            key.to_owned(),
            PhasorReading::from_phasor(Phasor::from_power_factor(1.0e6, 0.92)),
        );
    }
    GridState::from_readings(10.0, voltages, powers)
}

#[tokio::test]
async fn overvoltage_spoof_is_clamped_and_scored() {
    let engine = engine_with(Arc::new(SimulatedGrid::deterministic()));
    let request = AttackRequest::SpoofData(SpoofParams::new(
        SpoofTarget::voltage(Phase::A),
        Some(1.5 * NOMINAL_VOLTAGE),
    ));

    let result = engine.execute_checked(&request).await;

    assert!(result.success, "error: {:?}", result.error);
    let validation = result.validation.as_ref().expect("validation attached");
    assert_eq!(validation.warnings.len(), 1);
    let clamped = validation.modifications.value.expect("clamped");
    assert!((clamped - 1.3 * NOMINAL_VOLTAGE).abs() < 1e-9);
    match result.details.as_ref().expect("details") {
        AttackDetails::VoltageSpoof { value, .. } => assert_eq!(*value, clamped),
        other => panic!("unexpected details {other:?}"),
    }
    assert!(result.impact.voltage_impact_pct > 0.0);
    assert!(result.pre_state.is_some() && result.post_state.is_some());
}

#[tokio::test]
async fn reconnaissance_reports_single_severe_undervoltage() {
    let grid = Arc::new(FixedGrid {
        state: state_with_phase_a_at(0.88),
        broken: false,
    });
    let result = engine_with(grid).execute_checked(&AttackRequest::Reconnaissance).await;

    assert!(result.success);
    let report = match result.details.expect("details") {
        AttackDetails::Reconnaissance(report) => report,
        other => panic!("unexpected details {other:?}"),
    };
    let undervoltage: Vec<_> = report
        .vulnerabilities
        .iter()
        .filter(|v| matches!(v, Vulnerability::Undervoltage { .. }))
        .collect();
    assert_eq!(undervoltage.len(), 1);
    assert_eq!(undervoltage[0].severity(), Severity::High);
    assert_eq!(report.recommendations[0].request, AttackRequest::Reconnaissance);
    assert_eq!(result.impact.total_score, 0.0);
}

#[tokio::test]
async fn derived_voltage_pushes_stressed_phase_further() {
    let grid = Arc::new(FixedGrid {
        state: state_with_phase_a_at(0.9),
        broken: false,
    });
    let request = AttackRequest::SpoofData(SpoofParams::new(SpoofTarget::voltage(Phase::A), None));
    let result = engine_with(grid).execute_checked(&request).await;

    match result.details.expect("details") {
        AttackDetails::VoltageSpoof { value, .. } => {
            assert!((value - 0.8 * NOMINAL_VOLTAGE).abs() < 1e-6)
        }
        other => panic!("unexpected details {other:?}"),
    }
}

#[tokio::test]
async fn derived_voltage_on_nominal_phase_picks_a_side() {
    let engine = engine_with(Arc::new(SimulatedGrid::deterministic()));
    let request = AttackRequest::SpoofData(SpoofParams::new(SpoofTarget::voltage(Phase::A), None));
    for _ in 0..4 {
        let result = engine.execute(&request).await;
        match result.details.expect("details") {
            AttackDetails::VoltageSpoof { value, .. } => {
                let pu = value / NOMINAL_VOLTAGE;
                assert!(
                    (pu - 0.85).abs() < 1e-9 || (pu - 1.15).abs() < 1e-9 || pu < 0.95 || pu > 1.05
                );
            }
            other => panic!("unexpected details {other:?}"),
        }
    }
}

#[tokio::test]
async fn derived_power_spoof_stays_below_cap() {
    let engine = engine_with(Arc::new(SimulatedGrid::deterministic()));
    let request = AttackRequest::SpoofData(SpoofParams::new(SpoofTarget::power(Phase::B), None));
    let result = engine.execute_checked(&request).await;
    match result.details.expect("details") {
        AttackDetails::PowerSpoof { value, .. } => {
            assert!(value >= 0.5 * 0.99e6 && value <= 5.0e6);
        }
        other => panic!("unexpected details {other:?}"),
    }
}

#[tokio::test]
async fn load_injection_raises_phase_power() {
    let grid = Arc::new(SimulatedGrid::deterministic());
    let engine = engine_with(grid.clone());
    let request = AttackRequest::InjectLoad(InjectLoadParams {
        phase: Phase::C,
        magnitude: 2.0e6,
        power_factor: 0.9,
    });

    let result = engine.execute_checked(&request).await;

    assert!(result.success);
    assert!(result.impact.power_impact_pct > 100.0 - 1e-9);
    let history = grid.attack_history().await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].technique, Technique::InjectLoad);
    match result.details.expect("details") {
        AttackDetails::LoadInjection { published, .. } => {
            assert!((published.real - 1.8e6).abs() < 1e-6);
            assert!((published.magnitude - 2.0e6).abs() < 1e-6);
        }
        other => panic!("unexpected details {other:?}"),
    }
}

#[tokio::test]
async fn command_blocking_is_published() {
    let grid = Arc::new(SimulatedGrid::deterministic());
    let engine = engine_with(grid.clone());
    let result = engine
        .execute_checked(&AttackRequest::BlockCommand(BlockCommandParams::default()))
        .await;
    assert!(result.success);
    assert!(grid.commands_blocked());
}

#[tokio::test]
async fn rejected_requests_never_reach_the_grid() {
    let grid = Arc::new(SimulatedGrid::deterministic());
    let engine = engine_with(grid.clone());
    let result = engine
        .execute_checked(&AttackRequest::ToggleDevice(ToggleDeviceParams::default()))
        .await;

    assert!(!result.success);
    let error = result.error.expect("error");
    assert!(error.starts_with("validation_rejected"));
    assert!(result.pre_state.is_none());
    assert!(grid.attack_history().await.expect("history").is_empty());
    assert_eq!(grid.status().await.expect("status").current_time, 0.0);
}

#[tokio::test]
async fn permitted_toggle_reports_a_note() {
    let validator = ThreatModelValidator::new(ThreatModelConfig {
        allowed_techniques: vec![Technique::ToggleDevice],
        ..ThreatModelConfig::default()
    });
    let engine = AttackEngine::with_seed(
        Arc::new(SimulatedGrid::deterministic()),
        Arc::new(validator),
        1,
    );
    let result = engine
        .execute_checked(&AttackRequest::ToggleDevice(ToggleDeviceParams::default()))
        .await;
    assert!(result.success);
    assert!(matches!(
        result.details,
        Some(AttackDetails::DeviceToggle { ref note, .. }) if !note.is_empty()
    ));
}

#[tokio::test]
async fn grid_failures_become_unsuccessful_results() {
    let grid = Arc::new(FixedGrid {
        state: state_with_phase_a_at(1.0),
        broken: true,
    });
    let result = engine_with(grid)
        .execute_checked(&AttackRequest::InjectLoad(InjectLoadParams::default()))
        .await;

    assert!(!result.success);
    assert!(result.error.expect("error").contains("power_A"));
    assert!(result.pre_state.is_some());
    assert!(result.post_state.is_none());
    assert_eq!(result.impact.total_score, 0.0);
}
