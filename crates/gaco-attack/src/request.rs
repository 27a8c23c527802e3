//! ---
//! ems_section: "07-resilience-fault-tolerance"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Attack primitives and the safety policy gating them."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use gaco_common::Technique;
use gaco_grid::Phase;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

/// Errors raised while decoding a request from loose parameters.
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("invalid spoof target {0}; expected voltage_A..C or power_A..C")]
    InvalidTarget(String),
    #[error("invalid parameters for {technique}: {reason}")]
    InvalidParameters {
        technique: Technique,
        reason: String,
    },
}

/// Measured quantity a spoof rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalClass {
    Voltage,
    Power,
}

/// `voltage_X` or `power_X` for phase X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct SpoofTarget {
    pub signal: SignalClass,
    pub phase: Phase,
}

impl SpoofTarget {
    pub fn voltage(phase: Phase) -> Self {
        Self {
            signal: SignalClass::Voltage,
            phase,
        }
    }

    pub fn power(phase: Phase) -> Self {
        Self {
            signal: SignalClass::Power,
            phase,
        }
    }
}

impl fmt::Display for SpoofTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signal = match self.signal {
            SignalClass::Voltage => "voltage",
            SignalClass::Power => "power",
        };
        write!(f, "{}_{}", signal, self.phase)
    }
}

impl FromStr for SpoofTarget {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RequestError::InvalidTarget(s.to_owned());
        let (signal, phase) = s.rsplit_once('_').ok_or_else(invalid)?;
        let signal = match signal.to_ascii_lowercase().as_str() {
            "voltage" => SignalClass::Voltage,
            "power" => SignalClass::Power,
            _ => return Err(invalid()),
        };
        let phase = Phase::from_str(phase).map_err(|_| invalid())?;
        Ok(Self { signal, phase })
    }
}

fn default_power_factor() -> f64 {
    0.9
}

fn default_load_magnitude() -> f64 {
    1_000_000.0
}

fn default_true() -> bool {
    true
}

fn default_block_duration() -> f64 {
    10.0
}

fn default_device() -> String {
    "switch1".to_owned()
}

/// Rewrite a voltage or power measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpoofParams {
    pub target: SpoofTarget,
    /// Volts for voltage targets, VA for power targets. Derived when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Voltage phase angle in degrees.
    #[serde(default, rename = "phase", skip_serializing_if = "Option::is_none")]
    pub phase_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_factor: Option<f64>,
}

impl SpoofParams {
    pub fn new(target: SpoofTarget, value: Option<f64>) -> Self {
        Self {
            target,
            value,
            phase_angle: None,
            power_factor: None,
        }
    }
}

/// Inject an apparent-power load on one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectLoadParams {
    #[serde(default = "InjectLoadParams::default_phase")]
    pub phase: Phase,
    /// Apparent power in VA.
    #[serde(default = "default_load_magnitude")]
    pub magnitude: f64,
    #[serde(default = "default_power_factor")]
    pub power_factor: f64,
}

impl InjectLoadParams {
    fn default_phase() -> Phase {
        Phase::A
    }
}

impl Default for InjectLoadParams {
    fn default() -> Self {
        Self {
            phase: Phase::A,
            magnitude: default_load_magnitude(),
            power_factor: default_power_factor(),
        }
    }
}

/// Publish the command blocking flag for a bounded time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockCommandParams {
    #[serde(default = "default_true")]
    pub enable: bool,
    /// Seconds.
    #[serde(default = "default_block_duration")]
    pub duration: f64,
}

impl Default for BlockCommandParams {
    fn default() -> Self {
        Self {
            enable: true,
            duration: default_block_duration(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    #[default]
    Open,
    Closed,
}

/// Switch a named device. No device-level effect is guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToggleDeviceParams {
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default)]
    pub state: DeviceState,
}

impl Default for ToggleDeviceParams {
    fn default() -> Self {
        Self {
            device: default_device(),
            state: DeviceState::Open,
        }
    }
}

/// One attack primitive with its canonical parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "technique", content = "params", rename_all = "snake_case")]
pub enum AttackRequest {
    SpoofData(SpoofParams),
    InjectLoad(InjectLoadParams),
    Reconnaissance,
    BlockCommand(BlockCommandParams),
    ToggleDevice(ToggleDeviceParams),
}

impl AttackRequest {
    pub fn technique(&self) -> Technique {
        match self {
            AttackRequest::SpoofData(_) => Technique::SpoofData,
            AttackRequest::InjectLoad(_) => Technique::InjectLoad,
            AttackRequest::Reconnaissance => Technique::Reconnaissance,
            AttackRequest::BlockCommand(_) => Technique::BlockCommand,
            AttackRequest::ToggleDevice(_) => Technique::ToggleDevice,
        }
    }

    /// Decode canonical parameters for a technique.
    ///
    /// `null` or missing parameters select the per-technique defaults. A spoof
    /// without a target aims at `voltage_A`.
    pub fn from_parts(technique: Technique, params: &Value) -> Result<Self, RequestError> {
        let params = match params {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        let invalid = |err: serde_json::Error| {
            if let Some(target) = params.get("target").and_then(Value::as_str) {
                if SpoofTarget::from_str(target).is_err() {
                    return RequestError::InvalidTarget(target.to_owned());
                }
            }
            RequestError::InvalidParameters {
                technique,
                reason: err.to_string(),
            }
        };
        let request = match technique {
            Technique::SpoofData => {
                let mut params = params.clone();
                if let Value::Object(map) = &mut params {
                    map.entry("target")
                        .or_insert_with(|| Value::String("voltage_A".to_owned()));
                }
                AttackRequest::SpoofData(serde_json::from_value(params).map_err(invalid)?)
            }
            Technique::InjectLoad => {
                AttackRequest::InjectLoad(serde_json::from_value(params.clone()).map_err(invalid)?)
            }
            Technique::Reconnaissance => AttackRequest::Reconnaissance,
            Technique::BlockCommand => AttackRequest::BlockCommand(
                serde_json::from_value(params.clone()).map_err(invalid)?,
            ),
            Technique::ToggleDevice => AttackRequest::ToggleDevice(
                serde_json::from_value(params.clone()).map_err(invalid)?,
            ),
        };
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spoof_targets_parse_case_insensitively() {
        let target: SpoofTarget = "voltage_b".parse().expect("parse");
        assert_eq!(target, SpoofTarget::voltage(Phase::B));
        assert_eq!(target.to_string(), "voltage_B");
        assert!("current_A".parse::<SpoofTarget>().is_err());
        assert!("voltage".parse::<SpoofTarget>().is_err());
    }

    #[test]
    fn missing_parameters_use_technique_defaults() {
        let load = AttackRequest::from_parts(Technique::InjectLoad, &Value::Null).expect("load");
        assert_eq!(load, AttackRequest::InjectLoad(InjectLoadParams::default()));

        let spoof = AttackRequest::from_parts(Technique::SpoofData, &json!({})).expect("spoof");
        match spoof {
            AttackRequest::SpoofData(params) => {
                assert_eq!(params.target, SpoofTarget::voltage(Phase::A));
                assert!(params.value.is_none());
            }
            other => panic!("unexpected request {other:?}"),
        }

        let block = AttackRequest::from_parts(Technique::BlockCommand, &json!({})).expect("block");
        assert_eq!(block, AttackRequest::BlockCommand(BlockCommandParams::default()));
    }

    #[test]
    fn bad_spoof_target_is_reported_as_invalid_target() {
        let err = AttackRequest::from_parts(
            Technique::SpoofData,
            &json!({ "target": "frequency_A", "value": 60.0 }),
        )
        .expect_err("invalid target");
        assert_eq!(err, RequestError::InvalidTarget("frequency_A".to_owned()));
    }

    #[test]
    fn serialized_form_is_tagged_by_technique() {
        let request = AttackRequest::SpoofData(SpoofParams::new(
            SpoofTarget::power(Phase::C),
            Some(1.0e6),
        ));
        let encoded = serde_json::to_value(&request).expect("encode");
        assert_eq!(encoded["technique"], "spoof_data");
        assert_eq!(encoded["params"]["target"], "power_C");
    }
}
