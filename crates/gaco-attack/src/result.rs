//! ---
//! ems_section: "07-resilience-fault-tolerance"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Attack primitives and the safety policy gating them."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use gaco_common::Technique;
use gaco_grid::{GridState, Phase, PhasorReading};
use serde::{Deserialize, Serialize};

use crate::impact::ImpactScore;
use crate::recon::ReconReport;
use crate::request::DeviceState;
use crate::threat_model::ValidationResult;

/// Campaign context attached to a step's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepAnnotation {
    pub step: u32,
    pub objective: String,
    pub rationale: String,
}

/// What a handler actually published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "attack_type", rename_all = "snake_case")]
pub enum AttackDetails {
    VoltageSpoof {
        phase: Phase,
        value: f64,
        published: PhasorReading,
    },
    PowerSpoof {
        phase: Phase,
        value: f64,
        published: PhasorReading,
    },
    LoadInjection {
        phase: Phase,
        magnitude: f64,
        power_factor: f64,
        published: PhasorReading,
    },
    Reconnaissance(Box<ReconReport>),
    CommandBlocking {
        enabled: bool,
        duration: f64,
    },
    DeviceToggle {
        device: String,
        state: DeviceState,
        note: String,
    },
}

/// Outcome of one attack primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackResult {
    pub success: bool,
    pub technique: Technique,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_state: Option<GridState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_state: Option<GridState>,
    #[serde(default)]
    pub impact: ImpactScore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<AttackDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<StepAnnotation>,
}

impl AttackResult {
    /// Unsuccessful result that never reached the grid.
    pub fn failed(technique: Technique, error: impl Into<String>) -> Self {
        Self {
            success: false,
            technique,
            timestamp: Utc::now(),
            pre_state: None,
            post_state: None,
            impact: ImpactScore::default(),
            error: Some(error.into()),
            details: None,
            validation: None,
            annotation: None,
        }
    }

    pub fn with_annotation(mut self, annotation: StepAnnotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// Shortcut for `impact.total_score`.
    pub fn score(&self) -> f64 {
        self.impact.total_score
    }
}
