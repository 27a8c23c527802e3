//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Test doubles for the grid interface and planning oracle."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use gaco_common::NOMINAL_VOLTAGE;
use gaco_grid::{
    AttackRecord, GridError, GridInterface, GridState, InterfaceStatus, Phase, Phasor,
    PhasorReading, Result, SimulatedGrid,
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

/// One call observed by [`ScriptedGrid`].
#[derive(Debug, Clone, PartialEq)]
pub enum GridCall {
    CurrentState,
    InjectVoltage(Phase, Phasor),
    InjectPower(Phase, Phasor),
    BlockCommands(bool),
    AdvanceTime(Option<f64>),
    AttackHistory,
    Reset,
    Status,
}

/// Recording grid double backed by [`SimulatedGrid::deterministic`].
///
/// Queued snapshots are returned by `current_state` before the simulator is
/// consulted again.
#[derive(Debug)]
pub struct ScriptedGrid {
    inner: SimulatedGrid,
    script: Mutex<VecDeque<GridState>>,
    calls: Mutex<Vec<GridCall>>,
    offline: AtomicBool,
    resets_allowed: AtomicUsize,
}

impl Default for ScriptedGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGrid {
    pub fn new() -> Self {
        Self {
            inner: SimulatedGrid::deterministic(),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            resets_allowed: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn with_states(states: impl IntoIterator<Item = GridState>) -> Self {
        let grid = Self::new();
        grid.script.lock().extend(states);
        grid
    }

    pub fn push_state(&self, state: GridState) {
        self.script.lock().push_back(state);
    }

    /// Make every call except `reset_state` fail as unavailable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Let the next `allowed` resets succeed and fail every one after.
    pub fn fail_resets_after(&self, allowed: usize) {
        self.resets_allowed.store(allowed, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<GridCall> {
        self.calls.lock().clone()
    }

    pub fn reset_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, GridCall::Reset))
            .count()
    }

    /// Number of voltage and power publications.
    pub fn injection_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, GridCall::InjectVoltage(..) | GridCall::InjectPower(..)))
            .count()
    }

    fn record(&self, call: GridCall) -> Result<()> {
        debug!(?call, "scripted grid call");
        self.calls.lock().push(call);
        if self.offline.load(Ordering::SeqCst) {
            return Err(GridError::Unavailable("scripted grid offline".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl GridInterface for ScriptedGrid {
    async fn current_state(&self) -> Result<GridState> {
        self.record(GridCall::CurrentState)?;
        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(state) => Ok(state),
            None => self.inner.current_state().await,
        }
    }

    async fn inject_voltage(&self, phase: Phase, phasor: Phasor) -> Result<()> {
        self.record(GridCall::InjectVoltage(phase, phasor))?;
        self.inner.inject_voltage(phase, phasor).await
    }

    async fn inject_power(&self, phase: Phase, phasor: Phasor) -> Result<()> {
        self.record(GridCall::InjectPower(phase, phasor))?;
        self.inner.inject_power(phase, phasor).await
    }

    async fn block_commands(&self, enable: bool) -> Result<()> {
        self.record(GridCall::BlockCommands(enable))?;
        self.inner.block_commands(enable).await
    }

    async fn advance_time(&self, step: Option<f64>) -> Result<f64> {
        self.record(GridCall::AdvanceTime(step))?;
        self.inner.advance_time(step).await
    }

    async fn attack_history(&self) -> Result<Vec<AttackRecord>> {
        self.record(GridCall::AttackHistory)?;
        self.inner.attack_history().await
    }

    async fn reset_state(&self) -> Result<()> {
        debug!("scripted grid reset");
        self.calls.lock().push(GridCall::Reset);
        let spent = self
            .resets_allowed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if spent.is_err() {
            return Err(GridError::Unavailable("reset failed".to_owned()));
        }
        self.script.lock().clear();
        self.inner.reset_state().await
    }

    async fn status(&self) -> Result<InterfaceStatus> {
        self.record(GridCall::Status)?;
        self.inner.status().await
    }
}

/// Snapshot with distribution voltages at the given per-unit values and no
/// power readings.
pub fn voltage_state(timestamp: f64, pu: [f64; 3]) -> GridState {
    let voltages: IndexMap<String, PhasorReading> = Phase::ALL
        .iter()
        .zip(pu)
        .map(|(phase, value)| {
            (
                format!("gld_voltage_V{}", phase.letter()),
                PhasorReading::from_phasor(Phasor::new(value * NOMINAL_VOLTAGE, 0.0)),
            )
        })
        .collect();
    GridState::from_readings(timestamp, voltages, IndexMap::new())
}
