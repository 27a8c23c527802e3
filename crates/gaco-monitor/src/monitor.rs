//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Grid observation loop and derived health analytics."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gaco_common::MonitoringConfig;
use gaco_grid::{GridError, GridInterface, GridState, HealthStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::anomaly::{self, AnomalyRecord};
use crate::assessment::{self, VulnerabilityAssessment};
use crate::impact::{self, AttackImpactReport};
use crate::stability::{self, StabilityMetrics};

/// One observation stamped with wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub observed_at: DateTime<Utc>,
    pub state: GridState,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub samples: usize,
    pub anomalies: usize,
    pub baseline_latched: bool,
}

#[derive(Debug, Default)]
struct Buffers {
    history: VecDeque<Sample>,
    anomalies: VecDeque<AnomalyRecord>,
    baseline: Option<GridState>,
}

impl Buffers {
    fn push_sample(&mut self, sample: Sample, capacity: usize) {
        if self.history.len() == capacity {
            self.history.pop_front();
        }
        self.history.push_back(sample);
    }

    fn push_anomalies(&mut self, found: Vec<AnomalyRecord>, capacity: usize) {
        for record in found {
            if self.anomalies.len() == capacity {
                self.anomalies.pop_front();
            }
            self.anomalies.push_back(record);
        }
    }
}

#[derive(Debug)]
struct Running {
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

/// Periodic observer of a grid interface.
///
/// The monitor is stopped until [`GridMonitor::start`] spawns its loop. All
/// buffers are bounded by `history_size` and readers always get copies.
pub struct GridMonitor {
    grid: Arc<dyn GridInterface>,
    config: MonitoringConfig,
    buffers: Arc<Mutex<Buffers>>,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for GridMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridMonitor")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl GridMonitor {
    pub fn new(grid: Arc<dyn GridInterface>, config: MonitoringConfig) -> Self {
        Self {
            grid,
            config,
            buffers: Arc::new(Mutex::new(Buffers::default())),
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Spawn the observation loop. Returns `false` when it was already running.
    pub fn start(&self, interval: Option<Duration>) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            debug!("monitor already running");
            return false;
        }
        let interval = interval.unwrap_or(self.config.interval);
        let (shutdown, mut shutdown_rx) = broadcast::channel(1);
        let grid = self.grid.clone();
        let buffers = self.buffers.clone();
        let config = self.config.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("monitor shutdown signal received");
                        break;
                    }
                    _ = ticker.tick() => {
                        let _ = observe(grid.as_ref(), &buffers, &config).await;
                    }
                }
            }
        });
        *running = Some(Running { shutdown, task });
        info!(interval_ms = interval.as_millis() as u64, "grid monitor started");
        true
    }

    /// Signal the loop and wait for it to exit. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let Some(Running { shutdown, mut task }) = self.running.lock().take() else {
            return false;
        };
        let _ = shutdown.send(());
        match tokio::time::timeout(self.config.stop_timeout, &mut task).await {
            Ok(Ok(())) => info!("grid monitor stopped"),
            Ok(Err(err)) => warn!(error = %err, "monitor task ended abnormally"),
            Err(_) => {
                warn!(
                    timeout_s = self.config.stop_timeout.as_secs_f64(),
                    "monitor loop did not stop in time; aborting"
                );
                task.abort();
            }
        }
        true
    }

    /// Take one observation immediately, outside the loop.
    pub async fn sample_now(&self) -> Result<GridState, GridError> {
        observe(self.grid.as_ref(), &self.buffers, &self.config).await
    }

    pub fn latest(&self) -> Option<GridState> {
        self.buffers.lock().history.back().map(|s| s.state.clone())
    }

    pub fn history(&self) -> Vec<Sample> {
        self.buffers.lock().history.iter().cloned().collect()
    }

    pub fn history_since(&self, since: DateTime<Utc>) -> Vec<Sample> {
        self.buffers
            .lock()
            .history
            .iter()
            .filter(|s| s.observed_at >= since)
            .cloned()
            .collect()
    }

    pub fn anomalies(&self) -> Vec<AnomalyRecord> {
        self.buffers.lock().anomalies.iter().cloned().collect()
    }

    pub fn anomalies_since(&self, since: DateTime<Utc>) -> Vec<AnomalyRecord> {
        self.buffers
            .lock()
            .anomalies
            .iter()
            .filter(|a| a.timestamp >= since)
            .cloned()
            .collect()
    }

    pub fn baseline(&self) -> Option<GridState> {
        self.buffers.lock().baseline.clone()
    }

    /// Forget the baseline; the next healthy sample latches a new one.
    pub fn reset_baseline(&self) {
        self.buffers.lock().baseline = None;
        info!("monitor baseline cleared");
    }

    pub fn stability_metrics(&self) -> StabilityMetrics {
        let buffers = self.buffers.lock();
        let history: Vec<Sample> = buffers.history.iter().cloned().collect();
        let anomalies: Vec<AnomalyRecord> = buffers.anomalies.iter().cloned().collect();
        drop(buffers);
        stability::compute(&history, &anomalies, Utc::now())
    }

    /// Assess the grid as it is right now.
    pub async fn assess_vulnerabilities(&self) -> Result<VulnerabilityAssessment, GridError> {
        let state = self.grid.current_state().await?;
        let metrics = self.stability_metrics();
        Ok(assessment::assess(&state, Some(&metrics)))
    }

    /// Correlate the grid's attack history with observed health.
    pub async fn attack_impact_analysis(&self) -> Result<AttackImpactReport, GridError> {
        let attacks = self.grid.attack_history().await?;
        let history = self.history();
        Ok(impact::analyze(&attacks, &history))
    }

    pub fn status(&self) -> MonitorStatus {
        let running = self.is_running();
        let buffers = self.buffers.lock();
        MonitorStatus {
            running,
            samples: buffers.history.len(),
            anomalies: buffers.anomalies.len(),
            baseline_latched: buffers.baseline.is_some(),
        }
    }
}

impl Drop for GridMonitor {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.task.abort();
        }
    }
}

async fn observe(
    grid: &dyn GridInterface,
    buffers: &Mutex<Buffers>,
    config: &MonitoringConfig,
) -> Result<GridState, GridError> {
    let now = Utc::now();
    let state = match grid.current_state().await {
        Ok(state) => state,
        Err(err) => {
            warn!(error = %err, "monitor failed to read grid state");
            buffers.lock().push_anomalies(
                vec![AnomalyRecord::detection_error(now, err.to_string())],
                config.history_size,
            );
            return Err(err);
        }
    };

    let mut buffers = buffers.lock();
    buffers.push_sample(
        Sample {
            observed_at: now,
            state: state.clone(),
        },
        config.history_size,
    );

    let found = match &buffers.baseline {
        Some(baseline) => anomaly::detect(baseline, &state, config, now),
        None => Vec::new(),
    };
    if !found.is_empty() {
        for record in &found {
            info!(
                kind = ?record.kind,
                location = %record.location,
                severity = record.severity.as_str(),
                deviation = record.deviation,
                "grid anomaly detected"
            );
        }
        buffers.push_anomalies(found, config.history_size);
    }

    if buffers.baseline.is_none() && state.system_health.status == HealthStatus::Healthy {
        debug!(timestamp = state.timestamp, "monitor baseline latched");
        buffers.baseline = Some(state.clone());
    }
    Ok(state)
}
