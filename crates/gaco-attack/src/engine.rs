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

use chrono::Utc;
use gaco_common::NOMINAL_VOLTAGE;
use gaco_grid::{per_unit, GridError, GridInterface, GridState, Phase, Phasor, PhasorReading};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, instrument, warn};

use crate::impact::ImpactScore;
use crate::recon::ReconReport;
use crate::request::{
    AttackRequest, BlockCommandParams, InjectLoadParams, SignalClass, SpoofParams,
    ToggleDeviceParams,
};
use crate::result::{AttackDetails, AttackResult};
use crate::threat_model::ThreatModelValidator;

const DEFAULT_POWER_FACTOR: f64 = 0.9;
const FALLBACK_POWER_VA: f64 = 2_000_000.0;
const MAX_DERIVED_POWER_VA: f64 = 5_000_000.0;
const DERIVED_PU_STEP: f64 = 0.1;
const DERIVED_PU_FLOOR: f64 = 0.7;
const DERIVED_PU_CEILING: f64 = 1.3;

/// Executes attack primitives against a grid interface and scores them.
///
/// Every failure is folded into an unsuccessful [`AttackResult`]; callers never
/// see an `Err` from this type.
pub struct AttackEngine {
    grid: Arc<dyn GridInterface>,
    validator: Arc<ThreatModelValidator>,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for AttackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttackEngine")
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl AttackEngine {
    pub fn new(grid: Arc<dyn GridInterface>, validator: Arc<ThreatModelValidator>) -> Self {
        Self::with_rng(grid, validator, StdRng::from_entropy())
    }

    /// Engine whose derived parameters are reproducible.
    pub fn with_seed(
        grid: Arc<dyn GridInterface>,
        validator: Arc<ThreatModelValidator>,
        seed: u64,
    ) -> Self {
        Self::with_rng(grid, validator, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        grid: Arc<dyn GridInterface>,
        validator: Arc<ThreatModelValidator>,
        rng: StdRng,
    ) -> Self {
        Self {
            grid,
            validator,
            rng: Mutex::new(rng),
        }
    }

    pub fn grid(&self) -> &Arc<dyn GridInterface> {
        &self.grid
    }

    pub fn validator(&self) -> &Arc<ThreatModelValidator> {
        &self.validator
    }

    /// Validate, apply the required modifications, then execute.
    ///
    /// A rejected request never touches the grid.
    pub async fn execute_checked(&self, request: &AttackRequest) -> AttackResult {
        let validation = self.validator.validate(request);
        if !validation.valid {
            warn!(technique = %request.technique(), reason = %validation.reason, "attack rejected by threat model");
            let mut result = AttackResult::failed(
                request.technique(),
                format!("validation_rejected: {}", validation.reason),
            );
            result.validation = Some(validation);
            return result;
        }
        let adjusted = validation.apply(request);
        let mut result = self.execute(&adjusted).await;
        result.validation = Some(validation);
        result
    }

    /// Run one primitive without consulting the threat model.
    #[instrument(skip_all, fields(technique = %request.technique()))]
    pub async fn execute(&self, request: &AttackRequest) -> AttackResult {
        let technique = request.technique();
        let pre = match self.grid.current_state().await {
            Ok(state) => state,
            Err(err) => {
                warn!(%technique, error = %err, "pre-attack state unavailable");
                return AttackResult::failed(technique, err.to_string());
            }
        };

        let outcome = self.run(request, &pre).await;
        let mut result = AttackResult::failed(technique, String::new());
        result.pre_state = Some(pre.clone());
        match outcome {
            Ok((details, post)) => {
                result.impact = ImpactScore::between(&pre, &post);
                result.success = true;
                result.error = None;
                result.details = Some(details);
                result.post_state = Some(post);
            }
            Err(err) => {
                warn!(%technique, error = %err, "attack failed");
                result.error = Some(err.to_string());
            }
        }
        result.timestamp = Utc::now();
        info!(
            %technique,
            success = result.success,
            score = result.impact.total_score,
            "attack executed"
        );
        result
    }

    async fn run(
        &self,
        request: &AttackRequest,
        pre: &GridState,
    ) -> Result<(AttackDetails, GridState), GridError> {
        let details = match request {
            AttackRequest::SpoofData(params) => self.spoof(params, pre).await?,
            AttackRequest::InjectLoad(params) => self.inject_load(params).await?,
            AttackRequest::Reconnaissance => {
                AttackDetails::Reconnaissance(Box::new(ReconReport::from_state(pre)))
            }
            AttackRequest::BlockCommand(params) => self.block(params).await?,
            AttackRequest::ToggleDevice(params) => Self::toggle(params),
        };
        self.grid.advance_time(None).await?;
        let post = self.grid.current_state().await?;
        Ok((details, post))
    }

    async fn spoof(&self, params: &SpoofParams, pre: &GridState) -> Result<AttackDetails, GridError> {
        let phase = params.target.phase;
        match params.target.signal {
            SignalClass::Voltage => {
                let value = match params.value {
                    Some(value) => value,
                    None => self.derive_voltage(pre, phase),
                };
                let angle = params
                    .phase_angle
                    .or_else(|| pre.voltage_for_phase(phase).map(|r| r.angle))
                    .unwrap_or(0.0);
                let phasor = Phasor::from_polar(value, angle);
                self.grid.inject_voltage(phase, phasor).await?;
                Ok(AttackDetails::VoltageSpoof {
                    phase,
                    value,
                    published: PhasorReading::from(phasor),
                })
            }
            SignalClass::Power => {
                let value = match params.value {
                    Some(value) => value,
                    None => self.derive_power(pre, phase),
                };
                let pf = params.power_factor.unwrap_or(DEFAULT_POWER_FACTOR);
                let phasor = Phasor::from_power_factor(value, pf);
                self.grid.inject_power(phase, phasor).await?;
                Ok(AttackDetails::PowerSpoof {
                    phase,
                    value,
                    published: PhasorReading::from(phasor),
                })
            }
        }
    }

    /// Push an already stressed phase further, otherwise pick a side at random.
    fn derive_voltage(&self, pre: &GridState, phase: Phase) -> f64 {
        let pu = pre
            .voltage_for_phase(phase)
            .map(|r| per_unit(r.magnitude))
            .unwrap_or(1.0);
        let target_pu = if pu < 0.95 {
            (pu - DERIVED_PU_STEP).max(DERIVED_PU_FLOOR)
        } else if pu > 1.05 {
            (pu + DERIVED_PU_STEP).min(DERIVED_PU_CEILING)
        } else if self.rng.lock().gen_bool(0.5) {
            0.85
        } else {
            1.15
        };
        target_pu * NOMINAL_VOLTAGE
    }

    fn derive_power(&self, pre: &GridState, phase: Phase) -> f64 {
        let existing = pre
            .power_for_phase(phase)
            .map(|r| r.magnitude)
            .filter(|m| *m > 0.0);
        let value = match existing {
            Some(magnitude) => magnitude * self.rng.lock().gen_range(0.5..=1.0),
            None => FALLBACK_POWER_VA,
        };
        value.min(MAX_DERIVED_POWER_VA)
    }

    async fn inject_load(&self, params: &InjectLoadParams) -> Result<AttackDetails, GridError> {
        let phasor = Phasor::from_power_factor(params.magnitude, params.power_factor);
        self.grid.inject_power(params.phase, phasor).await?;
        Ok(AttackDetails::LoadInjection {
            phase: params.phase,
            magnitude: params.magnitude,
            power_factor: params.power_factor,
            published: PhasorReading::from(phasor),
        })
    }

    async fn block(&self, params: &BlockCommandParams) -> Result<AttackDetails, GridError> {
        self.grid.block_commands(params.enable).await?;
        Ok(AttackDetails::CommandBlocking {
            enabled: params.enable,
            duration: params.duration,
        })
    }

    fn toggle(params: &ToggleDeviceParams) -> AttackDetails {
        AttackDetails::DeviceToggle {
            device: params.device.clone(),
            state: params.state,
            note: "device control is not exposed by the grid interface; intent recorded only"
                .to_owned(),
        }
    }
}

