//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Grid observation loop and derived health analytics."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use gaco_common::{MonitoringConfig, NOMINAL_VOLTAGE};
use gaco_grid::{
    AttackRecord, GridError, GridInterface, GridState, InterfaceStatus, Phase, Phasor,
    Severity, SimulatedGrid,
};
use gaco_monitor::{AnomalyKind, GridMonitor};

fn monitor_on(grid: Arc<SimulatedGrid>) -> GridMonitor {
    GridMonitor::new(grid, MonitoringConfig::default())
}

#[tokio::test]
async fn baseline_latches_once() -> Result<()> {
    let grid = Arc::new(SimulatedGrid::deterministic());
    let monitor = monitor_on(grid.clone());

    for _ in 0..4 {
        monitor.sample_now().await?;
        grid.advance_time(None).await?;
    }

    let baseline = monitor.baseline().expect("baseline latched");
    assert_eq!(baseline.timestamp, 0.0);
    assert_eq!(monitor.history().len(), 4);
    assert!(monitor.anomalies().is_empty());
    Ok(())
}

#[tokio::test]
async fn spoofed_voltage_is_flagged_against_baseline() -> Result<()> {
    let grid = Arc::new(SimulatedGrid::deterministic());
    let monitor = monitor_on(grid.clone());
    monitor.sample_now().await?;

    grid.inject_voltage(Phase::A, Phasor::from_polar(0.8 * NOMINAL_VOLTAGE, 0.0))
        .await?;
    grid.advance_time(None).await?;
    monitor.sample_now().await?;

    let anomalies = monitor.anomalies();
    let bus = anomalies
        .iter()
        .find(|a| a.location == "gld_voltage_Va")
        .expect("voltage anomaly");
    assert_eq!(bus.kind, AnomalyKind::Voltage);
    assert_eq!(bus.severity, Severity::High);
    assert!(anomalies.iter().any(|a| a.kind == AnomalyKind::Health));

    let assessment = monitor.assess_vulnerabilities().await?;
    assert!(!assessment.voltage_vulnerabilities.is_empty());

    let report = monitor.attack_impact_analysis().await?;
    assert_eq!(report.total_attacks, 1);
    assert_eq!(report.correlated, 1);
    assert!(report.mean_health_change < 0.0);
    Ok(())
}

#[tokio::test]
async fn reset_baseline_waits_for_next_healthy_sample() -> Result<()> {
    let grid = Arc::new(SimulatedGrid::deterministic());
    let monitor = monitor_on(grid.clone());
    monitor.sample_now().await?;

    grid.inject_voltage(Phase::B, Phasor::from_polar(0.8 * NOMINAL_VOLTAGE, 0.0))
        .await?;
    grid.advance_time(None).await?;
    monitor.reset_baseline();
    monitor.sample_now().await?;
    assert!(monitor.baseline().is_none());

    grid.reset_state().await?;
    grid.advance_time(None).await?;
    monitor.sample_now().await?;
    assert_eq!(monitor.baseline().map(|b| b.timestamp), Some(2.0));
    Ok(())
}

#[tokio::test]
async fn buffers_stay_bounded() -> Result<()> {
    let grid = Arc::new(SimulatedGrid::deterministic());
    let monitor = GridMonitor::new(
        grid.clone(),
        MonitoringConfig {
            history_size: 3,
            ..MonitoringConfig::default()
        },
    );
    for _ in 0..5 {
        monitor.sample_now().await?;
        grid.advance_time(None).await?;
    }
    let history = monitor.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].state.timestamp, 2.0);

    let metrics = monitor.stability_metrics();
    assert_eq!(metrics.samples, 3);
    assert!(metrics.overall_stability > 90.0);
    Ok(())
}

struct UnreachableGrid;

#[async_trait]
impl GridInterface for UnreachableGrid {
    async fn current_state(&self) -> gaco_grid::Result<GridState> {
        Err(GridError::Unavailable("federation offline".to_owned()))
    }
    async fn inject_voltage(&self, _: Phase, _: Phasor) -> gaco_grid::Result<()> {
        Ok(())
    }
    async fn inject_power(&self, _: Phase, _: Phasor) -> gaco_grid::Result<()> {
        Ok(())
    }
    async fn block_commands(&self, _: bool) -> gaco_grid::Result<()> {
        Ok(())
    }
    async fn advance_time(&self, _: Option<f64>) -> gaco_grid::Result<f64> {
        Ok(0.0)
    }
    async fn attack_history(&self) -> gaco_grid::Result<Vec<AttackRecord>> {
        Ok(Vec::new())
    }
    async fn reset_state(&self) -> gaco_grid::Result<()> {
        Ok(())
    }
    async fn status(&self) -> gaco_grid::Result<InterfaceStatus> {
        Err(GridError::Unavailable("federation offline".to_owned()))
    }
}

/// Grid whose reads never complete.
struct StalledGrid;

#[async_trait]
impl GridInterface for StalledGrid {
    async fn current_state(&self) -> gaco_grid::Result<GridState> {
        std::future::pending().await
    }
    async fn inject_voltage(&self, _: Phase, _: Phasor) -> gaco_grid::Result<()> {
        Ok(())
    }
    async fn inject_power(&self, _: Phase, _: Phasor) -> gaco_grid::Result<()> {
        Ok(())
    }
    async fn block_commands(&self, _: bool) -> gaco_grid::Result<()> {
        Ok(())
    }
    async fn advance_time(&self, _: Option<f64>) -> gaco_grid::Result<f64> {
        Ok(0.0)
    }
    async fn attack_history(&self) -> gaco_grid::Result<Vec<AttackRecord>> {
        Ok(Vec::new())
    }
    async fn reset_state(&self) -> gaco_grid::Result<()> {
        Ok(())
    }
    async fn status(&self) -> gaco_grid::Result<InterfaceStatus> {
        Err(GridError::Unavailable("federation stalled".to_owned()))
    }
}

#[tokio::test]
async fn failed_reads_are_recorded_as_detection_errors() {
    let monitor = GridMonitor::new(Arc::new(UnreachableGrid), MonitoringConfig::default());
    assert!(monitor.sample_now().await.is_err());
    let anomalies = monitor.anomalies();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].kind, AnomalyKind::DetectionError);
    assert!(monitor.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn loop_start_is_idempotent_and_stop_joins() {
    let monitor = monitor_on(Arc::new(SimulatedGrid::deterministic()));
    assert!(monitor.start(Some(Duration::from_millis(100))));
    assert!(!monitor.start(Some(Duration::from_millis(100))));
    assert!(monitor.is_running());

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(monitor.history().len() >= 3);

    assert!(monitor.stop().await);
    assert!(!monitor.is_running());
    assert!(!monitor.stop().await);

    let frozen = monitor.history().len();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(monitor.history().len(), frozen);
    assert!(monitor.status().baseline_latched);
}

#[tokio::test(start_paused = true)]
async fn stop_gives_up_on_a_stuck_loop_after_the_timeout() {
    let config = MonitoringConfig {
        stop_timeout: Duration::from_secs(2),
        ..MonitoringConfig::default()
    };
    let monitor = GridMonitor::new(Arc::new(StalledGrid), config);
    assert!(monitor.start(Some(Duration::from_millis(100))));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = tokio::time::Instant::now();
    assert!(monitor.stop().await);
    let waited = started.elapsed();

    assert!(waited >= Duration::from_secs(2), "returned after {waited:?}");
    assert!(waited < Duration::from_millis(2_100), "returned after {waited:?}");
    assert!(!monitor.is_running());
    assert!(monitor.history().is_empty());
}
