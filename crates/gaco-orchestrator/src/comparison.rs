//! ---
//! ems_section: "04-configuration-orchestration"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Campaign orchestration and strategy comparison."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;

use gaco_planner::CampaignResult;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

const INFINITY_LABEL: &str = "Infinity";

/// AI mean effectiveness relative to the random mean.
///
/// Serialized as a number, the string `"Infinity"` when only the AI leg
/// scored, or `null` when neither did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImprovementRatio {
    Finite(f64),
    Infinite,
    Undefined,
}

impl ImprovementRatio {
    pub fn between(ai_mean: f64, random_mean: f64) -> Self {
        if random_mean > 0.0 {
            ImprovementRatio::Finite(ai_mean / random_mean)
        } else if ai_mean > 0.0 {
            ImprovementRatio::Infinite
        } else {
            ImprovementRatio::Undefined
        }
    }
}

impl fmt::Display for ImprovementRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImprovementRatio::Finite(ratio) => write!(f, "{ratio:.2}x"),
            ImprovementRatio::Infinite => f.write_str(INFINITY_LABEL),
            ImprovementRatio::Undefined => f.write_str("undefined"),
        }
    }
}

impl Serialize for ImprovementRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ImprovementRatio::Finite(ratio) => serializer.serialize_f64(*ratio),
            ImprovementRatio::Infinite => serializer.serialize_str(INFINITY_LABEL),
            ImprovementRatio::Undefined => serializer.serialize_none(),
        }
    }
}

struct RatioVisitor;

impl<'de> Visitor<'de> for RatioVisitor {
    type Value = ImprovementRatio;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number, \"Infinity\" or null")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(ImprovementRatio::Finite(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(ImprovementRatio::Finite(v as f64))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(ImprovementRatio::Finite(v as f64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        if v == INFINITY_LABEL {
            Ok(ImprovementRatio::Infinite)
        } else {
            Err(E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(ImprovementRatio::Undefined)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(ImprovementRatio::Undefined)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(RatioVisitor)
    }
}

impl<'de> Deserialize<'de> for ImprovementRatio {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_option(RatioVisitor)
    }
}

/// Aggregate statistics over both legs of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMetrics {
    pub ai_mean: f64,
    pub ai_max: f64,
    pub random_mean: f64,
    pub random_max: f64,
    pub improvement_ratio: ImprovementRatio,
    /// Fraction of AI campaigns scoring above the success threshold.
    pub ai_success_rate: f64,
    pub random_success_rate: f64,
    pub success_threshold: f64,
}

impl ComparisonMetrics {
    pub fn compute(ai: &[CampaignResult], random: &[CampaignResult], threshold: f64) -> Self {
        let ai_scores: Vec<f64> = ai.iter().map(|r| r.effectiveness_score).collect();
        let random_scores: Vec<f64> = random.iter().map(|r| r.effectiveness_score).collect();
        let ai_mean = mean(&ai_scores);
        let random_mean = mean(&random_scores);
        Self {
            ai_mean,
            ai_max: max(&ai_scores),
            random_mean,
            random_max: max(&random_scores),
            improvement_ratio: ImprovementRatio::between(ai_mean, random_mean),
            ai_success_rate: success_rate(&ai_scores, threshold),
            random_success_rate: success_rate(&random_scores, threshold),
            success_threshold: threshold,
        }
    }
}

fn mean(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

fn max(scores: &[f64]) -> f64 {
    scores.iter().copied().fold(0.0, f64::max)
}

fn success_rate(scores: &[f64], threshold: f64) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().filter(|s| **s > threshold).count() as f64 / scores.len() as f64
}

/// Outcome of `run_comparison`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub trials: u32,
    pub duration_s: f64,
    pub ai_results: Vec<CampaignResult>,
    pub random_results: Vec<CampaignResult>,
    /// Metrics cover only the campaigns that ran.
    pub comparison_metrics: ComparisonMetrics,
    /// Why the run stopped before `trials` completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaco_planner::CampaignKind;
    use serde_json::json;
    use std::time::Duration;

    fn scored(kind: CampaignKind, score: f64) -> CampaignResult {
        let mut result = CampaignResult::begin(kind, Duration::from_secs(10));
        result.effectiveness_score = score;
        result
    }

    #[test]
    fn ratio_sentinels_serialize_as_documented() {
        assert_eq!(
            serde_json::to_value(ImprovementRatio::between(4.0, 2.0)).expect("encode"),
            json!(2.0)
        );
        assert_eq!(
            serde_json::to_value(ImprovementRatio::between(3.0, 0.0)).expect("encode"),
            json!("Infinity")
        );
        assert_eq!(
            serde_json::to_value(ImprovementRatio::between(0.0, 0.0)).expect("encode"),
            json!(null)
        );
    }

    #[test]
    fn ratio_decodes_every_form() {
        let decoded: Vec<ImprovementRatio> =
            serde_json::from_value(json!([1.5, "Infinity", null])).expect("decode");
        assert_eq!(
            decoded,
            vec![
                ImprovementRatio::Finite(1.5),
                ImprovementRatio::Infinite,
                ImprovementRatio::Undefined
            ]
        );
        assert!(serde_json::from_value::<ImprovementRatio>(json!("NaN")).is_err());
    }

    #[test]
    fn metrics_use_strict_threshold() {
        let ai = [scored(CampaignKind::AiStrategic, 30.0), scored(CampaignKind::AiStrategic, 10.0)];
        let random = [scored(CampaignKind::Random, 5.0), scored(CampaignKind::Random, 15.0)];
        let metrics = ComparisonMetrics::compute(&ai, &random, 10.0);
        assert_eq!(metrics.ai_mean, 20.0);
        assert_eq!(metrics.ai_max, 30.0);
        assert_eq!(metrics.random_mean, 10.0);
        assert_eq!(metrics.improvement_ratio, ImprovementRatio::Finite(2.0));
        assert_eq!(metrics.ai_success_rate, 0.5);
        assert_eq!(metrics.random_success_rate, 0.5);
    }
}
