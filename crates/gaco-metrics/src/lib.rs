//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Metrics collection and export utilities."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

/// Shared registry type used across the workspace.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Render the registry in the Prometheus text exposition format.
pub fn encode_text(registry: &Registry) -> Result<String> {
    let families = registry.gather();
    TextEncoder::new()
        .encode_to_string(&families)
        .map_err(|err| {
            error!(error = %err, "failed to encode metrics");
            err
        })
        .context("metrics encoding error")
}

/// Counters and histograms describing attack and campaign outcomes.
#[derive(Clone)]
pub struct CampaignMetrics {
    registry: SharedRegistry,
    attacks: IntCounterVec,
    validation_rejections: IntCounterVec,
    campaigns: IntCounterVec,
    oracle_fallbacks: IntCounter,
    effectiveness: HistogramVec,
}

impl fmt::Debug for CampaignMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CampaignMetrics")
            .field("families", &self.registry.gather().len())
            .finish()
    }
}

impl CampaignMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let attacks = IntCounterVec::new(
            Opts::new(
                "gaco_attacks_total",
                "Attack primitives executed, by technique and outcome",
            ),
            &["technique", "outcome"],
        )?;
        registry.register(Box::new(attacks.clone()))?;

        let validation_rejections = IntCounterVec::new(
            Opts::new(
                "gaco_validation_rejections_total",
                "Attack requests refused by the threat model",
            ),
            &["technique"],
        )?;
        registry.register(Box::new(validation_rejections.clone()))?;

        let campaigns = IntCounterVec::new(
            Opts::new("gaco_campaigns_total", "Campaigns completed, by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(campaigns.clone()))?;

        let oracle_fallbacks = IntCounter::with_opts(Opts::new(
            "gaco_oracle_fallbacks_total",
            "Plans produced by the deterministic fallback instead of the oracle",
        ))?;
        registry.register(Box::new(oracle_fallbacks.clone()))?;

        let buckets = prometheus::linear_buckets(0.0, 10.0, 11)
            .context("failed to construct effectiveness buckets")?;
        let effectiveness = HistogramVec::new(
            HistogramOpts::new(
                "gaco_campaign_effectiveness",
                "Effectiveness score of completed campaigns",
            )
            .buckets(buckets),
            &["kind"],
        )?;
        registry.register(Box::new(effectiveness.clone()))?;

        Ok(Self {
            registry,
            attacks,
            validation_rejections,
            campaigns,
            oracle_fallbacks,
            effectiveness,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_attack(&self, technique: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.attacks.with_label_values(&[technique, outcome]).inc();
    }

    pub fn record_rejection(&self, technique: &str) {
        self.validation_rejections
            .with_label_values(&[technique])
            .inc();
    }

    pub fn record_campaign(&self, kind: &str, effectiveness: f64) {
        self.campaigns.with_label_values(&[kind]).inc();
        self.effectiveness
            .with_label_values(&[kind])
            .observe(effectiveness);
    }

    pub fn record_fallback(&self) {
        self.oracle_fallbacks.inc();
    }

    pub fn attacks_recorded(&self, technique: &str, success: bool) -> u64 {
        let outcome = if success { "success" } else { "failure" };
        self.attacks.with_label_values(&[technique, outcome]).get()
    }

    pub fn fallbacks_recorded(&self) -> u64 {
        self.oracle_fallbacks.get()
    }
}

pub use prometheus;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_appear_in_text_exposition() {
        let registry = new_registry();
        let metrics = CampaignMetrics::new(registry.clone()).expect("metrics");
        metrics.record_attack("spoof_data", true);
        metrics.record_attack("spoof_data", true);
        metrics.record_attack("inject_load", false);
        metrics.record_rejection("toggle_device");
        metrics.record_campaign("random", 12.5);
        metrics.record_fallback();

        assert_eq!(metrics.attacks_recorded("spoof_data", true), 2);
        assert_eq!(metrics.fallbacks_recorded(), 1);

        let text = encode_text(&registry).expect("encode");
        assert!(text.contains("gaco_attacks_total{outcome=\"success\",technique=\"spoof_data\"} 2"));
        assert!(text.contains("gaco_validation_rejections_total{technique=\"toggle_device\"} 1"));
        assert!(text.contains("gaco_campaign_effectiveness_count{kind=\"random\"} 1"));
    }

    #[test]
    fn registering_twice_on_one_registry_fails() {
        let registry = new_registry();
        CampaignMetrics::new(registry.clone()).expect("first");
        assert!(CampaignMetrics::new(registry).is_err());
    }
}
