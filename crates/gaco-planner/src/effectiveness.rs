//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Strategic planning and adaptive campaign execution."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::campaign::CampaignResult;

const DECISION_CREDIT: f64 = 25.0;

/// Post-hoc quality ratings of a finished campaign.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CampaignAnalysis {
    /// Percentage of executed steps that succeeded.
    pub strategic_coherence: f64,
    /// 25 points per adaptive decision, capped at 100.
    pub adaptation_quality: f64,
    /// Effectiveness score per executed step.
    pub impact_efficiency: f64,
    /// `0.4·coherence + 0.3·adaptation + 0.3·efficiency`.
    pub overall_rating: f64,
}

pub fn analyze_effectiveness(result: &CampaignResult) -> CampaignAnalysis {
    let attacks = result.attacks.len();
    let (strategic_coherence, impact_efficiency) = if attacks == 0 {
        (0.0, 0.0)
    } else {
        (
            result.successful_attacks() as f64 / attacks as f64 * 100.0,
            result.effectiveness_score / attacks as f64,
        )
    };
    let adaptation_quality = (result.ai_decisions.len() as f64 * DECISION_CREDIT).min(100.0);
    CampaignAnalysis {
        strategic_coherence,
        adaptation_quality,
        impact_efficiency,
        overall_rating: 0.4 * strategic_coherence
            + 0.3 * adaptation_quality
            + 0.3 * impact_efficiency,
    }
}
