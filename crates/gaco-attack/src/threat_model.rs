//! ---
//! ems_section: "07-resilience-fault-tolerance"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Attack primitives and the safety policy gating them."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use gaco_common::{ThreatModelConfig, NOMINAL_VOLTAGE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::request::{AttackRequest, SignalClass};

/// Parameter overrides the validator requires before execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Modifications {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Modifications {
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.magnitude.is_none() && self.duration.is_none()
    }
}

/// Outcome of checking a request against the threat model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub reason: String,
    pub warnings: Vec<String>,
    pub modifications: Modifications,
}

impl ValidationResult {
    fn accepted() -> Self {
        Self {
            valid: true,
            reason: String::new(),
            warnings: Vec::new(),
            modifications: Modifications::default(),
        }
    }

    fn reject(&mut self, reason: String) {
        self.valid = false;
        self.reason = reason;
    }

    /// Produce the request with every modification applied.
    pub fn apply(&self, request: &AttackRequest) -> AttackRequest {
        let mut adjusted = request.clone();
        match &mut adjusted {
            AttackRequest::SpoofData(params) => {
                if let Some(value) = self.modifications.value {
                    params.value = Some(value);
                }
            }
            AttackRequest::InjectLoad(params) => {
                if let Some(magnitude) = self.modifications.magnitude {
                    params.magnitude = magnitude;
                }
            }
            AttackRequest::BlockCommand(params) => {
                if let Some(duration) = self.modifications.duration {
                    params.duration = duration;
                }
            }
            AttackRequest::Reconnaissance | AttackRequest::ToggleDevice(_) => {}
        }
        adjusted
    }
}

/// Stateless policy gate in front of the attack engine.
///
/// Constraints are fixed at construction so one validator can be shared across
/// tasks without locking.
#[derive(Debug, Clone)]
pub struct ThreatModelValidator {
    constraints: ThreatModelConfig,
}

impl ThreatModelValidator {
    pub fn new(constraints: ThreatModelConfig) -> Self {
        info!(
            safe_mode = constraints.safe_mode,
            allowed = ?constraints.allowed_techniques,
            "threat model validator initialised"
        );
        Self { constraints }
    }

    /// Copy of the active constraints.
    pub fn constraints(&self) -> ThreatModelConfig {
        self.constraints.clone()
    }

    pub fn min_voltage(&self) -> f64 {
        self.constraints.voltage_limits.min_pu * NOMINAL_VOLTAGE
    }

    pub fn max_voltage(&self) -> f64 {
        self.constraints.voltage_limits.max_pu * NOMINAL_VOLTAGE
    }

    pub fn validate(&self, request: &AttackRequest) -> ValidationResult {
        let technique = request.technique();
        let mut result = ValidationResult::accepted();

        if !self.constraints.is_allowed(technique) {
            let allowed: Vec<&str> = self
                .constraints
                .allowed_techniques
                .iter()
                .map(|t| t.as_str())
                .collect();
            result.reject(format!(
                "Technique {} not in allowed list: [{}]",
                technique,
                allowed.join(", ")
            ));
            debug!(%technique, "technique rejected by threat model");
            return result;
        }

        match request {
            AttackRequest::SpoofData(params) => {
                if let Some(value) = params.value {
                    match params.target.signal {
                        SignalClass::Voltage => self.check_voltage(value, &mut result),
                        SignalClass::Power => {
                            self.check_power(value, "Power", "value", &mut result)
                        }
                    }
                }
            }
            AttackRequest::InjectLoad(params) => {
                self.check_power(params.magnitude, "Load injection", "magnitude", &mut result)
            }
            AttackRequest::BlockCommand(params) => self.check_duration(params.duration, &mut result),
            AttackRequest::ToggleDevice(params) => {
                if self
                    .constraints
                    .restricted_targets
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(&params.device))
                {
                    result.reject(format!("Device {} is a restricted target", params.device));
                }
            }
            AttackRequest::Reconnaissance => {}
        }

        if !result.valid {
            debug!(%technique, reason = %result.reason, "request rejected by threat model");
        } else if !result.modifications.is_empty() {
            debug!(%technique, modifications = ?result.modifications, "request clamped by threat model");
        }
        result
    }

    fn check_voltage(&self, value: f64, result: &mut ValidationResult) {
        if !value.is_finite() {
            result.reject(format!("Voltage {value} is not a finite value"));
            return;
        }
        let min = self.min_voltage();
        let max = self.max_voltage();
        let (bound, side) = if value < min {
            (min, "minimum")
        } else if value > max {
            (max, "maximum")
        } else {
            return;
        };
        if self.constraints.safe_mode {
            result.modifications.value = Some(bound);
            result
                .warnings
                .push(format!("Voltage clamped to {side} safe value: {bound:.2}V"));
        } else {
            let relation = if side == "minimum" { "below" } else { "above" };
            result.reject(format!(
                "Voltage {value:.2}V {relation} {side} safe limit {bound:.2}V"
            ));
        }
    }

    fn check_power(&self, value: f64, label: &str, field: &str, result: &mut ValidationResult) {
        if !value.is_finite() {
            result.reject(format!("{label} {value} is not a finite value"));
            return;
        }
        let max = self.constraints.max_injection_va;
        if value.abs() <= max {
            return;
        }
        if self.constraints.safe_mode {
            let clamped = max.copysign(value);
            match field {
                "magnitude" => result.modifications.magnitude = Some(clamped),
                _ => result.modifications.value = Some(clamped),
            }
            result
                .warnings
                .push(format!("{label} clamped to maximum safe value: ±{max}VA"));
        } else {
            result.reject(format!("{label} {value}VA exceeds limit {max}VA"));
        }
    }

    fn check_duration(&self, duration: f64, result: &mut ValidationResult) {
        if !duration.is_finite() {
            result.reject(format!("Block duration {duration} is not a finite value"));
            return;
        }
        let max = self.constraints.max_block_duration_s;
        if duration <= max {
            return;
        }
        if self.constraints.safe_mode {
            result.modifications.duration = Some(max);
            result
                .warnings
                .push(format!("Block duration clamped to maximum safe value: {max}s"));
        } else {
            result.reject(format!("Block duration {duration}s exceeds limit {max}s"));
        }
    }
}

impl Default for ThreatModelValidator {
    fn default() -> Self {
        Self::new(ThreatModelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{
        BlockCommandParams, InjectLoadParams, SpoofParams, SpoofTarget, ToggleDeviceParams,
    };
    use gaco_common::Technique;
    use gaco_grid::Phase;
    use rand::prelude::*;

    fn strict() -> ThreatModelValidator {
        ThreatModelValidator::new(ThreatModelConfig {
            safe_mode: false,
            ..ThreatModelConfig::default()
        })
    }

    fn voltage_spoof(value: f64) -> AttackRequest {
        AttackRequest::SpoofData(SpoofParams::new(SpoofTarget::voltage(Phase::A), Some(value)))
    }

    #[test]
    fn overvoltage_is_clamped_in_safe_mode() {
        let validator = ThreatModelValidator::default();
        let result = validator.validate(&voltage_spoof(3500.0));
        assert!(result.valid);
        let clamped = result.modifications.value.expect("clamped value");
        assert!((clamped - 1.3 * NOMINAL_VOLTAGE).abs() < 1e-9);
        assert_eq!(result.warnings.len(), 1);

        match result.apply(&voltage_spoof(3500.0)) {
            AttackRequest::SpoofData(params) => assert_eq!(params.value, Some(clamped)),
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn overvoltage_is_rejected_without_safe_mode() {
        let result = strict().validate(&voltage_spoof(3500.0));
        assert!(!result.valid);
        assert!(result.reason.contains("above maximum"));
        assert!(result.modifications.is_empty());
    }

    #[test]
    fn voltage_clamp_always_lands_inside_envelope() {
        let validator = ThreatModelValidator::default();
        let mut rng = StdRng::seed_from_u64(0xC1A3);
        for _ in 0..500 {
            let value = rng.gen_range(-10_000.0..10_000.0);
            let request = voltage_spoof(value);
            let result = validator.validate(&request);
            assert!(result.valid);
            let effective = match result.apply(&request) {
                AttackRequest::SpoofData(params) => params.value.expect("value kept"),
                other => panic!("unexpected request {other:?}"),
            };
            assert!(effective >= validator.min_voltage() - 1e-9);
            assert!(effective <= validator.max_voltage() + 1e-9);
            if (validator.min_voltage()..=validator.max_voltage()).contains(&value) {
                assert_eq!(effective, value);
            }
        }
    }

    #[test]
    fn power_clamp_preserves_sign() {
        let validator = ThreatModelValidator::default();
        let request = AttackRequest::SpoofData(SpoofParams::new(
            SpoofTarget::power(Phase::B),
            Some(-9.0e6),
        ));
        let result = validator.validate(&request);
        assert_eq!(result.modifications.value, Some(-5.0e6));

        let load = AttackRequest::InjectLoad(InjectLoadParams {
            magnitude: 7.5e6,
            ..InjectLoadParams::default()
        });
        assert_eq!(validator.validate(&load).modifications.magnitude, Some(5.0e6));
    }

    #[test]
    fn block_duration_is_bounded() {
        let request = AttackRequest::BlockCommand(BlockCommandParams {
            enable: true,
            duration: 900.0,
        });
        let clamped = ThreatModelValidator::default().validate(&request);
        assert_eq!(clamped.modifications.duration, Some(300.0));
        assert!(!strict().validate(&request).valid);
    }

    #[test]
    fn non_finite_values_are_rejected_in_either_mode() {
        let lenient = ThreatModelValidator::default();
        let tight = strict();
        for validator in [&lenient, &tight] {
            for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
                let result = validator.validate(&voltage_spoof(value));
                assert!(!result.valid, "voltage {value} accepted");
                assert!(result.reason.contains("not a finite value"));
                assert!(result.modifications.is_empty());
            }
            let load = AttackRequest::InjectLoad(InjectLoadParams {
                magnitude: f64::NAN,
                ..InjectLoadParams::default()
            });
            assert!(!validator.validate(&load).valid);
            let block = AttackRequest::BlockCommand(BlockCommandParams {
                enable: true,
                duration: f64::INFINITY,
            });
            assert!(!validator.validate(&block).valid);
        }
    }

    #[test]
    fn disallowed_and_restricted_requests_are_rejected() {
        let toggle = AttackRequest::ToggleDevice(ToggleDeviceParams::default());
        let result = ThreatModelValidator::default().validate(&toggle);
        assert!(!result.valid);
        assert!(result.reason.contains("toggle_device"));

        let permissive = ThreatModelValidator::new(ThreatModelConfig {
            allowed_techniques: vec![Technique::ToggleDevice],
            ..ThreatModelConfig::default()
        });
        let restricted = AttackRequest::ToggleDevice(ToggleDeviceParams {
            device: "emergency_controls".to_owned(),
            ..ToggleDeviceParams::default()
        });
        assert!(!permissive.validate(&restricted).valid);
        assert!(permissive.validate(&toggle).valid);
    }

    #[test]
    fn reconnaissance_and_derived_spoofs_pass_untouched() {
        let validator = strict();
        let recon = validator.validate(&AttackRequest::Reconnaissance);
        assert!(recon.valid && recon.modifications.is_empty());

        let derived = AttackRequest::SpoofData(SpoofParams::new(SpoofTarget::voltage(Phase::C), None));
        assert!(validator.validate(&derived).valid);
    }
}
