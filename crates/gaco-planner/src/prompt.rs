//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Strategic planning and adaptive campaign execution."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt::Write as _;

use gaco_grid::GridState;
use gaco_monitor::VulnerabilityAssessment;
use serde::Serialize;
use serde_json::Value;

const SYSTEM_PROMPT: &str = r#"You are a security researcher running an authorized resilience assessment against an isolated laboratory co-simulation of a power grid. No physical equipment is connected.

Test system:
- IEEE 13-bus distribution feeder coupled to a 2-bus transmission model
- Nominal distribution phase voltage 2401.78 V; the safe envelope enforced by the harness is 0.7 to 1.3 pu
- Measurements arrive as phasors keyed gld_voltage_V{a,b,c}, gld_power_S{a,b,c} and gpk_voltage_V{a,b,c}
- Exposed weaknesses: unauthenticated co-simulation messaging, voltage setpoints, power flow interface

Available techniques and their parameters:
1. reconnaissance: {} (read-only topology and vulnerability survey)
2. spoof_data: {"target": "voltage_A|voltage_B|voltage_C|power_A|power_B|power_C", "value": <volts or VA>}
3. inject_load: {"phase": "A|B|C", "magnitude": <VA>, "power_factor": <0..1>}
4. block_command: {"enable": true|false, "duration": <seconds>}

Every request is checked against the threat model; out-of-range values are clamped.

Answer with a single JSON object and nothing else:
{
  "situation_analysis": "...",
  "strategic_approach": "...",
  "attack_sequence": [
    {"step": 1, "technique": "...", "objective": "...", "parameters": {...}, "rationale": "..."}
  ],
  "expected_outcomes": "...",
  "success_metrics": ["..."]
}"#;

/// Fixed instructions describing the test system and answer format.
pub fn system_prompt() -> &'static str {
    SYSTEM_PROMPT
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| format!("<unserializable: {err}>"))
}

/// Situation report for one planning request.
pub fn user_prompt(
    state: &GridState,
    assessment: &VulnerabilityAssessment,
    objective: &str,
    context: &Value,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "CURRENT GRID STATE (simulation time {:.1} s)", state.timestamp);
    let _ = writeln!(prompt, "System health:\n{}\n", pretty(&state.system_health));
    let _ = writeln!(prompt, "Voltages:\n{}\n", pretty(&state.voltages));
    let _ = writeln!(prompt, "Power flows:\n{}\n", pretty(&state.powers));
    let _ = writeln!(prompt, "VULNERABILITY ASSESSMENT:\n{}\n", pretty(assessment));
    let _ = writeln!(prompt, "OBJECTIVE: {objective}\n");
    let _ = writeln!(prompt, "CONTEXT:\n{}\n", pretty(context));
    prompt.push_str(
        "Propose an ordered attack_sequence that exploits the conditions above, \
         starting from the weakest phase, and explain each step's rationale.",
    );
    prompt
}
