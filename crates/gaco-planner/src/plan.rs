//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Strategic planning and adaptive campaign execution."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use gaco_common::{Technique, NOMINAL_VOLTAGE};
use gaco_grid::{GridState, Phase};
use gaco_monitor::VulnerabilityAssessment;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::OracleError;

/// One proposed step, parameters still in the oracle's free form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step: u32,
    pub technique: String,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub rationale: String,
}

impl PlanStep {
    pub fn new(
        step: u32,
        technique: Technique,
        objective: &str,
        parameters: Value,
        rationale: &str,
    ) -> Self {
        Self {
            step,
            technique: technique.to_string(),
            objective: objective.to_owned(),
            parameters,
            rationale: rationale.to_owned(),
        }
    }

    pub fn is_reconnaissance(&self) -> bool {
        self.technique
            .trim()
            .eq_ignore_ascii_case(Technique::Reconnaissance.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Oracle,
    Fallback,
}

/// Grid context a plan was produced from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanContext {
    pub state: GridState,
    pub vulnerabilities: VulnerabilityAssessment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackPlan {
    pub objective: String,
    pub generated_at: DateTime<Utc>,
    pub source: PlanSource,
    /// Why the oracle's answer was not used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(skip)]
    pub fallback_cause: Option<OracleError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub situation_analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategic_approach: Option<String>,
    pub steps: Vec<PlanStep>,
    pub grid_context: PlanContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl AttackPlan {
    pub fn is_fallback(&self) -> bool {
        self.source == PlanSource::Fallback
    }
}

/// Structured content recovered from an oracle reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPlan {
    pub situation_analysis: Option<String>,
    pub strategic_approach: Option<String>,
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    step: Option<u32>,
    technique: String,
    #[serde(default)]
    objective: Option<String>,
    #[serde(default)]
    parameters: Value,
    #[serde(default)]
    rationale: Option<String>,
}

/// Outermost `{ … }` span of free text, first opening to last closing brace.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Parse an oracle reply into steps.
///
/// `attack_sequence` wins over `assessment_sequence` when both are present and
/// non-empty. A reply without any steps is malformed.
pub fn parse_plan(text: &str) -> Result<ParsedPlan, OracleError> {
    let body = extract_json(text)
        .ok_or_else(|| OracleError::Malformed("no JSON object in oracle reply".to_owned()))?;
    let document: Value =
        serde_json::from_str(body).map_err(|err| OracleError::Malformed(err.to_string()))?;

    let sequence = ["attack_sequence", "assessment_sequence"]
        .iter()
        .filter_map(|key| document.get(*key).and_then(Value::as_array))
        .find(|steps| !steps.is_empty())
        .ok_or_else(|| OracleError::Malformed("reply contains no attack steps".to_owned()))?;

    let mut steps = Vec::with_capacity(sequence.len());
    for (index, raw) in sequence.iter().enumerate() {
        let raw: RawStep = serde_json::from_value(raw.clone())
            .map_err(|err| OracleError::Malformed(format!("step {}: {err}", index + 1)))?;
        steps.push(PlanStep {
            step: raw.step.unwrap_or(index as u32 + 1),
            technique: raw.technique,
            objective: raw.objective.unwrap_or_default(),
            parameters: raw.parameters,
            rationale: raw.rationale.unwrap_or_default(),
        });
    }

    Ok(ParsedPlan {
        situation_analysis: as_text(document.get("situation_analysis")),
        strategic_approach: as_text(document.get("strategic_approach")),
        steps,
    })
}

/// Dependency-free sequence derived from the current vulnerabilities.
///
/// Reconnaissance, one voltage spoof per voltage violation pushing it 10 %
/// further out of band, then a fixed 2 MVA load on phase A.
pub fn fallback_steps(assessment: &VulnerabilityAssessment) -> Vec<PlanStep> {
    let mut steps = vec![PlanStep::new(
        1,
        Technique::Reconnaissance,
        "Gather comprehensive grid intelligence",
        json!({}),
        "Establish topology and current weaknesses before acting",
    )];

    for finding in &assessment.voltage_vulnerabilities {
        let factor = if finding.kind == "overvoltage" { 1.1 } else { 0.9 };
        let phase = Phase::from_key(&finding.location).unwrap_or(Phase::A);
        steps.push(PlanStep::new(
            steps.len() as u32 + 1,
            Technique::SpoofData,
            &format!("Exploit {} at {}", finding.kind, finding.location),
            json!({
                "target": format!("voltage_{phase}"),
                "value": finding.value * NOMINAL_VOLTAGE * factor,
            }),
            &format!("Deepen the existing {} to trigger protection", finding.kind),
        ));
    }

    steps.push(PlanStep::new(
        steps.len() as u32 + 1,
        Technique::InjectLoad,
        "Stress system with additional load",
        json!({ "phase": "A", "magnitude": 2_000_000.0, "power_factor": 0.9 }),
        "Additional load amplifies voltage sag",
    ));
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaco_grid::{Phasor, PhasorReading};
    use gaco_monitor::assess;

    fn state_with(pus: &[(&str, f64)]) -> GridState {
        let voltages = pus
            .iter()
            .map(|(key, pu)| {
                (
                    (*key).to_owned(),
                    PhasorReading::from_phasor(Phasor::new(pu * NOMINAL_VOLTAGE, 0.0)),
                )
            })
            .collect();
        GridState::from_readings(0.0, voltages, Default::default())
    }

    #[test]
    fn json_is_extracted_from_surrounding_prose() {
        let reply = "Sure. Here is the plan:\n{\"attack_sequence\": [{\"technique\": \"reconnaissance\"}]}\nGood luck.";
        let parsed = parse_plan(reply).expect("parse");
        assert_eq!(parsed.steps.len(), 1);
        assert_eq!(parsed.steps[0].step, 1);
        assert!(parsed.steps[0].is_reconnaissance());
    }

    #[test]
    fn assessment_sequence_is_accepted() {
        let reply = r#"{"situation_analysis": "stable", "assessment_sequence": [
            {"step": 4, "technique": "inject_load", "parameters": {"phase": "B"}, "rationale": "stress"}
        ]}"#;
        let parsed = parse_plan(reply).expect("parse");
        assert_eq!(parsed.situation_analysis.as_deref(), Some("stable"));
        assert_eq!(parsed.steps[0].step, 4);
        assert_eq!(parsed.steps[0].parameters["phase"], "B");
    }

    #[test]
    fn empty_or_missing_sequences_are_malformed() {
        assert!(matches!(
            parse_plan(r#"{"attack_sequence": []}"#),
            Err(OracleError::Malformed(_))
        ));
        assert!(matches!(parse_plan("no plan today"), Err(OracleError::Malformed(_))));
        assert!(matches!(parse_plan("{ not json }"), Err(OracleError::Malformed(_))));
    }

    #[test]
    fn fallback_targets_each_voltage_violation() {
        let state = state_with(&[("gld_voltage_Va", 1.0), ("gld_voltage_Vb", 0.92), ("gld_voltage_Vc", 1.08)]);
        let steps = fallback_steps(&assess(&state, None));
        let techniques: Vec<_> = steps.iter().map(|s| s.technique.as_str()).collect();
        assert_eq!(techniques, vec!["reconnaissance", "spoof_data", "spoof_data", "inject_load"]);

        assert_eq!(steps[1].parameters["target"], "voltage_B");
        let under = steps[1].parameters["value"].as_f64().expect("value");
        assert!((under - 0.92 * NOMINAL_VOLTAGE * 0.9).abs() < 1e-6);
        let over = steps[2].parameters["value"].as_f64().expect("value");
        assert!((over - 1.08 * NOMINAL_VOLTAGE * 1.1).abs() < 1e-6);
        assert_eq!(steps[3].step, 4);
    }
}
