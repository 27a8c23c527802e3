//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Strategic planning and adaptive campaign execution."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::str::FromStr;

use gaco_attack::{
    AttackRequest, BlockCommandParams, DeviceState, InjectLoadParams, SpoofParams, SpoofTarget,
    ToggleDeviceParams,
};
use gaco_common::{Technique, NOMINAL_VOLTAGE};
use gaco_grid::Phase;
use serde_json::Value;
use thiserror::Error;

use crate::plan::PlanStep;

const DEFAULT_LOAD_VA: f64 = 1_500_000.0;
const DEFAULT_SPOOF_VOLTS: f64 = 2041.51;
const DEFAULT_BLOCK_SECONDS: f64 = 30.0;
/// `"200%"` of `load_magnitude` becomes 2 MVA.
const LOAD_PERCENT_SCALE: f64 = 10_000.0;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NormalizeError {
    #[error("unknown technique {0}")]
    UnknownTechnique(String),
    #[error("invalid target {0}")]
    InvalidTarget(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

fn invalid(field: &'static str, value: &Value) -> NormalizeError {
    NormalizeError::InvalidValue {
        field,
        value: value.to_string(),
    }
}

/// `str::parse` accepts `"NaN"` and `"inf"`; neither is a usable parameter.
fn finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => finite(s),
        _ => None,
    }
}

fn percent(value: &Value) -> Option<f64> {
    let text = value.as_str()?.trim();
    finite(text.strip_suffix('%')?)
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "enable" | "enabled" | "1" => Some(true),
            "false" | "no" | "off" | "disable" | "disabled" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn seconds(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => {
            let text = s.trim().to_ascii_lowercase();
            let text = ["seconds", "second", "secs", "sec", "s"]
                .iter()
                .find_map(|suffix| text.strip_suffix(suffix))
                .unwrap_or(&text);
            finite(text)
        }
        other => number(other),
    }
}

fn phase(value: &Value) -> Option<Phase> {
    let text = value.as_str()?.trim();
    Phase::from_str(text)
        .ok()
        .or_else(|| Phase::from_key(text))
}

/// First present key among `keys`.
fn lookup<'a>(params: &'a Value, keys: &[&'static str]) -> Option<(&'static str, &'a Value)> {
    keys.iter()
        .find_map(|key| params.get(*key).map(|value| (*key, value)))
}

/// Map an oracle step onto the canonical request for its technique.
///
/// Oracles name parameters loosely: `load_magnitude`, `target_phase` and
/// `blocking_enabled` are accepted as aliases, `"200%"` and `"15s"` strings are
/// decoded, and anything absent takes the technique default.
pub fn normalize(step: &PlanStep) -> Result<AttackRequest, NormalizeError> {
    normalize_params(resolve_technique(step)?, &step.parameters)
}

/// Technique named by a step, matched case-insensitively.
pub fn resolve_technique(step: &PlanStep) -> Result<Technique, NormalizeError> {
    let label = step.technique.trim().to_ascii_lowercase();
    Technique::from_str(&label).map_err(|_| NormalizeError::UnknownTechnique(step.technique.clone()))
}

/// Build the request for an already resolved technique.
pub fn normalize_params(technique: Technique, params: &Value) -> Result<AttackRequest, NormalizeError> {
    let request = match technique {
        Technique::InjectLoad => AttackRequest::InjectLoad(inject_load(params)?),
        Technique::SpoofData => AttackRequest::SpoofData(spoof(params)?),
        Technique::BlockCommand => AttackRequest::BlockCommand(block(params)?),
        Technique::ToggleDevice => AttackRequest::ToggleDevice(toggle(params)?),
        Technique::Reconnaissance => AttackRequest::Reconnaissance,
    };
    Ok(request)
}

fn inject_load(params: &Value) -> Result<InjectLoadParams, NormalizeError> {
    let magnitude = match lookup(params, &["magnitude", "load_magnitude"]) {
        Some(("magnitude", value)) => number(value).ok_or_else(|| invalid("magnitude", value))?,
        Some((_, value)) => match percent(value) {
            Some(pct) => pct * LOAD_PERCENT_SCALE,
            None => number(value).unwrap_or(DEFAULT_LOAD_VA),
        },
        None => DEFAULT_LOAD_VA,
    };
    let phase = match lookup(params, &["phase", "target_phase"]) {
        Some((field, value)) => phase(value).ok_or_else(|| invalid(field, value))?,
        None => Phase::A,
    };
    let power_factor = match params.get("power_factor") {
        Some(value) => number(value).ok_or_else(|| invalid("power_factor", value))?,
        None => InjectLoadParams::default().power_factor,
    };
    Ok(InjectLoadParams {
        phase,
        magnitude,
        power_factor,
    })
}

fn spoof(params: &Value) -> Result<SpoofParams, NormalizeError> {
    // `phase` is an angle when numeric and a phase letter otherwise.
    let phase_field = params.get("phase");
    let phase_letter = phase_field.and_then(phase);

    let target = match params.get("target").and_then(Value::as_str) {
        Some(text) => SpoofTarget::from_str(text.trim())
            .map_err(|_| NormalizeError::InvalidTarget(text.to_owned()))?,
        None => match params.get("target_phase") {
            Some(value) => SpoofTarget::voltage(phase(value).ok_or_else(|| invalid("target_phase", value))?),
            None => SpoofTarget::voltage(phase_letter.unwrap_or(Phase::A)),
        },
    };

    let value = match lookup(params, &["value", "magnitude"]) {
        Some(("value", value)) => number(value).ok_or_else(|| invalid("value", value))?,
        Some((_, value)) => match percent(value) {
            Some(pct) => NOMINAL_VOLTAGE * (1.0 + pct / 100.0),
            None => number(value).unwrap_or(DEFAULT_SPOOF_VOLTS),
        },
        None => DEFAULT_SPOOF_VOLTS,
    };

    let mut spoof = SpoofParams::new(target, Some(value));
    spoof.phase_angle = phase_field.filter(|_| phase_letter.is_none()).and_then(number);
    spoof.power_factor = params.get("power_factor").and_then(number);
    Ok(spoof)
}

fn block(params: &Value) -> Result<BlockCommandParams, NormalizeError> {
    let enable = match lookup(params, &["enable", "blocking_enabled"]) {
        Some((field, value)) => flag(value).ok_or_else(|| invalid(field, value))?,
        None => true,
    };
    let duration = match params.get("duration") {
        Some(value) => seconds(value).ok_or_else(|| invalid("duration", value))?,
        None => DEFAULT_BLOCK_SECONDS,
    };
    Ok(BlockCommandParams { enable, duration })
}

fn toggle(params: &Value) -> Result<ToggleDeviceParams, NormalizeError> {
    let mut toggle = ToggleDeviceParams::default();
    if let Some(device) = params.get("device").and_then(Value::as_str) {
        toggle.device = device.trim().to_owned();
    }
    if let Some(value) = params.get("state") {
        toggle.state = match value.as_str().map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("open") | Some("opened") | Some("off") => DeviceState::Open,
            Some("closed") | Some("close") | Some("on") => DeviceState::Closed,
            _ => return Err(invalid("state", value)),
        };
    }
    Ok(toggle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(technique: &str, parameters: Value) -> PlanStep {
        PlanStep {
            step: 1,
            technique: technique.to_owned(),
            objective: String::new(),
            parameters,
            rationale: String::new(),
        }
    }

    #[test]
    fn load_aliases_and_percentages_are_decoded() {
        let request = normalize(&step(
            "inject_load",
            json!({ "load_magnitude": "200%", "target_phase": "B" }),
        ))
        .expect("normalize");
        assert_eq!(
            request,
            AttackRequest::InjectLoad(InjectLoadParams {
                phase: Phase::B,
                magnitude: 2_000_000.0,
                power_factor: 0.9,
            })
        );

        let numeric = normalize(&step("inject_load", json!({ "magnitude": "750000" }))).expect("normalize");
        assert_eq!(
            numeric,
            AttackRequest::InjectLoad(InjectLoadParams {
                phase: Phase::A,
                magnitude: 750_000.0,
                power_factor: 0.9,
            })
        );
    }

    #[test]
    fn empty_parameters_take_documented_defaults() {
        let load = normalize(&step("inject_load", json!({}))).expect("load");
        assert_eq!(
            load,
            AttackRequest::InjectLoad(InjectLoadParams {
                phase: Phase::A,
                magnitude: 1_500_000.0,
                power_factor: 0.9,
            })
        );
        match normalize(&step("spoof_data", Value::Null)).expect("spoof") {
            AttackRequest::SpoofData(params) => {
                assert_eq!(params.target, SpoofTarget::voltage(Phase::A));
                assert_eq!(params.value, Some(2041.51));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            normalize(&step("block_command", json!({}))).expect("block"),
            AttackRequest::BlockCommand(BlockCommandParams {
                enable: true,
                duration: 30.0
            })
        );
        assert_eq!(
            normalize(&step("toggle_device", json!({}))).expect("toggle"),
            AttackRequest::ToggleDevice(ToggleDeviceParams::default())
        );
    }

    #[test]
    fn spoof_magnitude_percent_is_relative_to_nominal() {
        match normalize(&step("spoof_data", json!({ "target_phase": "c", "magnitude": "-15%" })))
            .expect("spoof")
        {
            AttackRequest::SpoofData(params) => {
                assert_eq!(params.target, SpoofTarget::voltage(Phase::C));
                let expected = NOMINAL_VOLTAGE * 0.85;
                assert!((params.value.expect("value") - expected).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn spoof_phase_is_an_angle_or_a_letter() {
        match normalize(&step("spoof_data", json!({ "target": "voltage_B", "value": 2600, "phase": 30 })))
            .expect("angle")
        {
            AttackRequest::SpoofData(params) => assert_eq!(params.phase_angle, Some(30.0)),
            other => panic!("unexpected {other:?}"),
        }
        match normalize(&step("spoof_data", json!({ "phase": "B", "value": 2600 }))).expect("letter") {
            AttackRequest::SpoofData(params) => {
                assert_eq!(params.target, SpoofTarget::voltage(Phase::B));
                assert_eq!(params.phase_angle, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn block_accepts_string_flags_and_durations() {
        assert_eq!(
            normalize(&step(
                "block_command",
                json!({ "blocking_enabled": "false", "duration": "15s" })
            ))
            .expect("block"),
            AttackRequest::BlockCommand(BlockCommandParams {
                enable: false,
                duration: 15.0
            })
        );
        assert_eq!(
            normalize(&step("block_command", json!({ "duration": "20 sec" }))).expect("block"),
            AttackRequest::BlockCommand(BlockCommandParams {
                enable: true,
                duration: 20.0
            })
        );
    }

    #[test]
    fn technique_labels_are_case_insensitive_and_checked() {
        assert_eq!(
            normalize(&step(" Reconnaissance ", json!({ "scope": "full" }))).expect("recon"),
            AttackRequest::Reconnaissance
        );
        assert_eq!(
            normalize(&step("social_engineering", json!({}))),
            Err(NormalizeError::UnknownTechnique("social_engineering".to_owned()))
        );
    }

    #[test]
    fn unusable_values_are_reported() {
        assert_eq!(
            normalize(&step("spoof_data", json!({ "target": "frequency_A" }))),
            Err(NormalizeError::InvalidTarget("frequency_A".to_owned()))
        );
        assert!(matches!(
            normalize(&step("block_command", json!({ "duration": "forever" }))),
            Err(NormalizeError::InvalidValue { field: "duration", .. })
        ));
        assert!(matches!(
            normalize(&step("inject_load", json!({ "phase": "D" }))),
            Err(NormalizeError::InvalidValue { field: "phase", .. })
        ));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        assert!(matches!(
            normalize(&step("spoof_data", json!({ "target": "voltage_A", "value": "NaN" }))),
            Err(NormalizeError::InvalidValue { field: "value", .. })
        ));
        assert!(matches!(
            normalize(&step("inject_load", json!({ "magnitude": "inf" }))),
            Err(NormalizeError::InvalidValue { field: "magnitude", .. })
        ));
        assert!(matches!(
            normalize(&step("block_command", json!({ "duration": "-infinity s" }))),
            Err(NormalizeError::InvalidValue { field: "duration", .. })
        ));
        match normalize(&step("spoof_data", json!({ "magnitude": "nan%" }))).expect("default") {
            AttackRequest::SpoofData(params) => assert_eq!(params.value, Some(DEFAULT_SPOOF_VOLTS)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
