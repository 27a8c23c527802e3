//! ---
//! ems_section: "11-simulation-test-harness"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "In-process effect model standing in for the co-simulation federation."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::HashMap;

use async_trait::async_trait;
use gaco_common::{GridSettings, Technique, NOMINAL_VOLTAGE};
use indexmap::IndexMap;
use parking_lot::Mutex;
use rand::prelude::*;
use rand_distr::StandardNormal;
use tracing::{debug, info};

use crate::errors::Result;
use crate::interface::{AttackRecord, GridInterface, InterfaceStatus, RecordedValue};
use crate::phasor::{Phase, Phasor, PhasorReading};
use crate::state::GridState;

/// Per-unit voltage drop on the distribution side per MVA of injected load.
const SAG_PU_PER_MVA: f64 = 0.02;
/// Share of a distribution-side deviation seen at the transmission bus.
const TRANSMISSION_COUPLING: f64 = 0.5;
/// Publications registered by the attacker federate (3 voltage, 3 power, blocking).
const PUBLICATIONS: usize = 7;

/// Mutable simulator internals guarded by a single lock.
#[derive(Debug)]
struct SimState {
    time: f64,
    rng: StdRng,
    voltage_overrides: HashMap<Phase, Phasor>,
    power_injections: HashMap<Phase, Phasor>,
    commands_blocked: bool,
    history: Vec<AttackRecord>,
    snapshot: GridState,
}

/// Deterministic-seeded stand-in for the co-simulation federation.
///
/// Published attacks take effect at the next time grant, mirroring how the
/// federation only exchanges values on synchronized ticks. Spoofed voltages
/// replace the distribution bus reading, injected power adds to the phase load
/// and sags that phase's voltage.
#[derive(Debug)]
pub struct SimulatedGrid {
    name: String,
    time_delta: f64,
    noise_sigma: f64,
    base_voltage_pu: [f64; 3],
    base_load: [Phasor; 3],
    state: Mutex<SimState>,
}

impl SimulatedGrid {
    /// Build a simulator from grid settings.
    pub fn new(settings: &GridSettings) -> Self {
        Self::with_parameters(
            settings.name.clone(),
            settings.time_delta,
            settings.noise_sigma,
            settings.seed,
        )
    }

    /// Noise-free simulator, useful where readings must be reproducible exactly.
    pub fn deterministic() -> Self {
        Self::with_parameters("gaco_sim".to_owned(), 1.0, 0.0, 0)
    }

    fn with_parameters(name: String, time_delta: f64, noise_sigma: f64, seed: u64) -> Self {
        let grid = Self {
            name,
            time_delta,
            noise_sigma: noise_sigma.max(0.0),
            base_voltage_pu: [1.0, 0.99, 1.01],
            base_load: [
                Phasor::from_power_factor(1_050_000.0, 0.92),
                Phasor::from_power_factor(1_000_000.0, 0.92),
                Phasor::from_power_factor(950_000.0, 0.92),
            ],
            state: Mutex::new(SimState {
                time: 0.0,
                rng: StdRng::seed_from_u64(seed),
                voltage_overrides: HashMap::new(),
                power_injections: HashMap::new(),
                commands_blocked: false,
                history: Vec::new(),
                snapshot: GridState::default(),
            }),
        };
        {
            let mut state = grid.state.lock();
            state.snapshot = grid.compute_snapshot(&mut state);
        }
        info!(federate = %grid.name, "simulated grid initialised");
        grid
    }

    /// Whether command blocking is currently published.
    pub fn commands_blocked(&self) -> bool {
        self.state.lock().commands_blocked
    }

    fn noise(&self, rng: &mut StdRng) -> f64 {
        if self.noise_sigma == 0.0 {
            return 0.0;
        }
        let z: f64 = rng.sample(StandardNormal);
        z * self.noise_sigma
    }

    fn compute_snapshot(&self, state: &mut SimState) -> GridState {
        let mut voltages = IndexMap::new();
        let mut powers = IndexMap::new();
        let mut transmission = Vec::with_capacity(3);

        for (idx, phase) in Phase::ALL.iter().enumerate() {
            let angle = -120.0 * idx as f64;
            let injected = state
                .power_injections
                .get(phase)
                .copied()
                .unwrap_or_default();
            let load = self.base_load[idx] + injected;

            let distribution = match state.voltage_overrides.get(phase) {
                Some(spoofed) => *spoofed,
                None => {
                    let sag = SAG_PU_PER_MVA * injected.magnitude() / 1e6;
                    let pu = self.base_voltage_pu[idx] - sag + self.noise(&mut state.rng);
                    Phasor::from_polar(pu.max(0.0) * NOMINAL_VOLTAGE, angle)
                }
            };
            let deviation = distribution.magnitude() / NOMINAL_VOLTAGE - 1.0;
            let transmission_pu =
                1.0 + TRANSMISSION_COUPLING * deviation + self.noise(&mut state.rng);

            voltages.insert(
                format!("gld_voltage_V{}", phase.letter()),
                PhasorReading::from_phasor(distribution),
            );
            let noisy_load = load.scale(1.0 + self.noise(&mut state.rng));
            powers.insert(
                format!("gld_power_S{}", phase.letter()),
                PhasorReading::from_phasor(noisy_load),
            );
            transmission.push((
                format!("gpk_voltage_V{}", phase.letter()),
                PhasorReading::from_phasor(Phasor::from_polar(
                    transmission_pu.max(0.0) * NOMINAL_VOLTAGE,
                    angle,
                )),
            ));
        }
        voltages.extend(transmission);
        GridState::from_readings(state.time, voltages, powers)
    }

    fn record(state: &mut SimState, kind: &str, target: String, value: RecordedValue, technique: Technique) {
        let record = AttackRecord {
            timestamp: state.time,
            kind: kind.to_owned(),
            target,
            value,
            technique,
        };
        state.history.push(record);
    }
}

#[async_trait]
impl GridInterface for SimulatedGrid {
    async fn current_state(&self) -> Result<GridState> {
        Ok(self.state.lock().snapshot.clone())
    }

    async fn inject_voltage(&self, phase: Phase, phasor: Phasor) -> Result<()> {
        let mut state = self.state.lock();
        state.voltage_overrides.insert(phase, phasor);
        Self::record(
            &mut state,
            "voltage_spoof",
            format!("voltage_{phase}"),
            RecordedValue::Phasor(phasor),
            Technique::SpoofData,
        );
        info!(%phase, magnitude = phasor.magnitude(), "voltage attack published");
        Ok(())
    }

    async fn inject_power(&self, phase: Phase, phasor: Phasor) -> Result<()> {
        let mut state = self.state.lock();
        let total = state
            .power_injections
            .get(&phase)
            .copied()
            .unwrap_or_default()
            + phasor;
        state.power_injections.insert(phase, total);
        Self::record(
            &mut state,
            "power_injection",
            format!("power_{phase}"),
            RecordedValue::Phasor(phasor),
            Technique::InjectLoad,
        );
        info!(%phase, magnitude = phasor.magnitude(), "power attack published");
        Ok(())
    }

    async fn block_commands(&self, enable: bool) -> Result<()> {
        let mut state = self.state.lock();
        state.commands_blocked = enable;
        Self::record(
            &mut state,
            "command_blocking",
            "control_system".to_owned(),
            RecordedValue::Flag(enable),
            Technique::BlockCommand,
        );
        info!(enable, "command blocking published");
        Ok(())
    }

    async fn advance_time(&self, step: Option<f64>) -> Result<f64> {
        let mut state = self.state.lock();
        state.time += step.unwrap_or(self.time_delta);
        let snapshot = self.compute_snapshot(&mut state);
        state.snapshot = snapshot;
        debug!(time = state.time, "time granted");
        Ok(state.time)
    }

    async fn attack_history(&self) -> Result<Vec<AttackRecord>> {
        Ok(self.state.lock().history.clone())
    }

    async fn reset_state(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.history.clear();
        state.voltage_overrides.clear();
        state.power_injections.clear();
        state.commands_blocked = false;
        let snapshot = self.compute_snapshot(&mut state);
        state.snapshot = snapshot;
        info!(federate = %self.name, "grid state reset");
        Ok(())
    }

    async fn status(&self) -> Result<InterfaceStatus> {
        let state = self.state.lock();
        Ok(InterfaceStatus {
            name: self.name.clone(),
            current_time: state.time,
            publications: PUBLICATIONS,
            subscriptions: state.snapshot.voltages.len() + state.snapshot.powers.len(),
            attack_count: state.history.len(),
            initialized: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{per_unit, HealthStatus};

    #[tokio::test]
    async fn starts_healthy_with_nine_readings() {
        let grid = SimulatedGrid::deterministic();
        let state = grid.current_state().await.expect("state");
        assert_eq!(state.voltages.len(), 6);
        assert_eq!(state.powers.len(), 3);
        assert_eq!(state.system_health.status, HealthStatus::Healthy);
        let status = grid.status().await.expect("status");
        assert_eq!(status.subscriptions, 9);
        assert_eq!(status.attack_count, 0);
    }

    #[tokio::test]
    async fn spoofed_voltage_appears_after_time_grant() {
        let grid = SimulatedGrid::deterministic();
        grid.inject_voltage(Phase::B, Phasor::new(0.85 * NOMINAL_VOLTAGE, 0.0))
            .await
            .expect("inject");
        let before = grid.current_state().await.expect("state");
        let b_before = before.voltage_for_phase(Phase::B).expect("b");
        assert!((per_unit(b_before.magnitude) - 0.99).abs() < 1e-9);

        grid.advance_time(None).await.expect("advance");
        let after = grid.current_state().await.expect("state");
        let b_after = after.voltage_for_phase(Phase::B).expect("b");
        assert!((per_unit(b_after.magnitude) - 0.85).abs() < 1e-9);
        assert_eq!(after.timestamp, 1.0);
        assert_ne!(after.system_health.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn injected_load_raises_power_and_sags_voltage() {
        let grid = SimulatedGrid::deterministic();
        let before = grid.current_state().await.expect("state");
        grid.inject_power(Phase::A, Phasor::from_power_factor(2_000_000.0, 0.9))
            .await
            .expect("inject");
        grid.advance_time(None).await.expect("advance");
        let after = grid.current_state().await.expect("state");

        let p_before = before.power_for_phase(Phase::A).expect("a").magnitude;
        let p_after = after.power_for_phase(Phase::A).expect("a").magnitude;
        assert!(p_after > p_before * 2.5);
        let v_after = per_unit(after.voltage_for_phase(Phase::A).expect("a").magnitude);
        assert!((v_after - 0.96).abs() < 1e-3);
    }

    #[tokio::test]
    async fn reset_clears_history_and_effects() {
        let grid = SimulatedGrid::deterministic();
        grid.block_commands(true).await.expect("block");
        grid.inject_voltage(Phase::A, Phasor::new(3000.0, 0.0))
            .await
            .expect("inject");
        grid.advance_time(None).await.expect("advance");
        assert_eq!(grid.attack_history().await.expect("history").len(), 2);
        assert!(grid.commands_blocked());

        grid.reset_state().await.expect("reset");
        assert!(grid.attack_history().await.expect("history").is_empty());
        assert!(!grid.commands_blocked());
        let state = grid.current_state().await.expect("state");
        assert_eq!(state.system_health.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn seeded_noise_is_reproducible() {
        let settings = GridSettings::default();
        let a = SimulatedGrid::new(&settings);
        let b = SimulatedGrid::new(&settings);
        for _ in 0..3 {
            a.advance_time(None).await.expect("advance");
            b.advance_time(None).await.expect("advance");
        }
        assert_eq!(
            a.current_state().await.expect("a"),
            b.current_state().await.expect("b")
        );
    }
}
