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
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gaco_attack::{
    random_request, random_technique, AttackDetails, AttackEngine, AttackRequest, AttackResult,
    ReconReport, ThreatModelValidator,
};
use gaco_common::{AppConfig, CampaignConfig, Technique, ThreatModelConfig};
use gaco_grid::{GridGateway, GridInterface, InterfaceStatus, SimulatedGrid, SystemHealth};
use gaco_metrics::{CampaignMetrics, SharedRegistry};
use gaco_monitor::{AttackImpactReport, GridMonitor, MonitorStatus};
use gaco_planner::{
    AttackPlan, CampaignKind, CampaignResult, HttpOracle, PlanningOracle, StrategicPlanner,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::{info, instrument, warn};

use crate::comparison::{ComparisonMetrics, ComparisonReport};
use crate::errors::OrchestratorError;

/// Snapshot returned by [`CampaignOrchestrator::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub interface: InterfaceStatus,
    pub health: SystemHealth,
    pub monitor: MonitorStatus,
    pub oracle_configured: bool,
    pub allowed_techniques: Vec<Technique>,
    pub campaigns_recorded: usize,
}

/// Entry point tying the engine, monitor and planner to one grid.
///
/// Campaigns, single attacks and comparisons queue behind one async gate so
/// only one of them drives the grid at a time.
pub struct CampaignOrchestrator {
    grid: Arc<dyn GridInterface>,
    engine: Arc<AttackEngine>,
    monitor: Arc<GridMonitor>,
    planner: Arc<StrategicPlanner>,
    campaign: CampaignConfig,
    metrics: Option<CampaignMetrics>,
    rng: Mutex<StdRng>,
    random_history: Mutex<Vec<CampaignResult>>,
    gate: tokio::sync::Mutex<()>,
}

impl fmt::Debug for CampaignOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CampaignOrchestrator")
            .field("engine", &self.engine)
            .field("planner", &self.planner)
            .field("campaign", &self.campaign)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl CampaignOrchestrator {
    /// Wire every component against `grid`.
    ///
    /// Grid calls go through a [`GridGateway`] bounded by
    /// `grid.call_timeout`. Metrics are registered when a registry is given.
    pub fn new(
        config: &AppConfig,
        grid: Arc<dyn GridInterface>,
        oracle: Option<Arc<dyn PlanningOracle>>,
        registry: Option<SharedRegistry>,
    ) -> Result<Self> {
        let grid: Arc<dyn GridInterface> =
            Arc::new(GridGateway::new(grid, config.grid.call_timeout));
        let validator = Arc::new(ThreatModelValidator::new(config.threat_model.clone()));
        let engine = Arc::new(match config.campaign.seed {
            Some(seed) => AttackEngine::with_seed(grid.clone(), validator, seed),
            None => AttackEngine::new(grid.clone(), validator),
        });
        let monitor = Arc::new(GridMonitor::new(grid.clone(), config.monitoring.clone()));
        let planner = Arc::new(StrategicPlanner::new(
            engine.clone(),
            monitor.clone(),
            oracle,
            config.planner.clone(),
            config.campaign.clone(),
        ));
        let metrics = registry
            .map(CampaignMetrics::new)
            .transpose()
            .context("failed to register campaign metrics")?;
        let rng = match config.campaign.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            grid,
            engine,
            monitor,
            planner,
            campaign: config.campaign.clone(),
            metrics,
            rng: Mutex::new(rng),
            random_history: Mutex::new(Vec::new()),
            gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Orchestrator over the bundled simulator, with the HTTP oracle when
    /// `planner.enabled` is set.
    pub fn from_config(config: &AppConfig, registry: Option<SharedRegistry>) -> Result<Self> {
        let grid: Arc<dyn GridInterface> = Arc::new(SimulatedGrid::new(&config.grid));
        let oracle: Option<Arc<dyn PlanningOracle>> = if config.planner.enabled {
            let oracle = HttpOracle::from_config(&config.planner)
                .context("failed to configure planning oracle")?;
            info!(endpoint = %oracle.endpoint(), "planning oracle configured");
            Some(Arc::new(oracle))
        } else {
            None
        };
        Self::new(config, grid, oracle, registry)
    }

    /// Start the background monitor loop unless monitoring is disabled.
    pub fn start_monitoring(&self) -> bool {
        self.monitor.config().enabled && self.monitor.start(None)
    }

    pub async fn shutdown(&self) {
        self.monitor.stop().await;
        info!("orchestrator stopped");
    }

    pub fn monitor(&self) -> &Arc<GridMonitor> {
        &self.monitor
    }

    pub fn planner(&self) -> &Arc<StrategicPlanner> {
        &self.planner
    }

    pub async fn status(&self) -> Result<OrchestratorStatus, OrchestratorError> {
        let interface = self.grid.status().await?;
        let state = self.grid.current_state().await?;
        let constraints = self.engine.validator().constraints();
        Ok(OrchestratorStatus {
            interface,
            health: state.system_health,
            monitor: self.monitor.status(),
            oracle_configured: self.planner.has_oracle(),
            allowed_techniques: constraints.allowed_techniques,
            campaigns_recorded: self.campaign_history().len(),
        })
    }

    /// Run one validated attack.
    ///
    /// Rejections and failures are returned as errors; a failure before the
    /// grid could be read counts as the interface being unavailable.
    pub async fn execute_attack(
        &self,
        request: &AttackRequest,
    ) -> Result<AttackResult, OrchestratorError> {
        let _gate = self.gate.lock().await;
        let result = self.engine.execute_checked(request).await;
        self.record_attack(&result);
        Self::check(result)
    }

    /// Decode a technique label and loose parameters, then execute.
    pub async fn execute_technique(
        &self,
        technique: &str,
        params: &Value,
    ) -> Result<AttackResult, OrchestratorError> {
        let technique = Technique::from_str(&technique.trim().to_ascii_lowercase())
            .map_err(|_| OrchestratorError::InvalidRequest(format!("unknown technique {technique}")))?;
        let request = AttackRequest::from_parts(technique, params)
            .map_err(|err| OrchestratorError::InvalidRequest(err.to_string()))?;
        self.execute_attack(&request).await
    }

    pub async fn reconnaissance(&self) -> Result<ReconReport, OrchestratorError> {
        let result = self.execute_attack(&AttackRequest::Reconnaissance).await?;
        match result.details {
            Some(AttackDetails::Reconnaissance(report)) => Ok(*report),
            _ => Err(OrchestratorError::AttackExecutionFailed {
                technique: Technique::Reconnaissance,
                reason: "reconnaissance produced no report".to_owned(),
            }),
        }
    }

    /// Plan with fallback; only an unreadable grid is an error.
    pub async fn plan_attack(
        &self,
        objective: &str,
        context: &Value,
    ) -> Result<AttackPlan, OrchestratorError> {
        let plan = self.planner.plan_attack(objective, context).await?;
        if plan.is_fallback() {
            if let Some(metrics) = &self.metrics {
                metrics.record_fallback();
            }
        }
        Ok(plan)
    }

    /// Plan without accepting the fallback: oracle faults become errors.
    pub async fn plan_attack_strict(
        &self,
        objective: &str,
        context: &Value,
    ) -> Result<AttackPlan, OrchestratorError> {
        let plan = self.plan_attack(objective, context).await?;
        match plan.fallback_cause {
            Some(cause) => Err(cause.into()),
            None => Ok(plan),
        }
    }

    pub async fn execute_ai_campaign(
        &self,
        duration: Duration,
    ) -> Result<CampaignResult, OrchestratorError> {
        Self::check_duration(duration)?;
        let _gate = self.gate.lock().await;
        Ok(self.ai_leg(duration).await)
    }

    pub async fn execute_random_campaign(
        &self,
        duration: Duration,
    ) -> Result<CampaignResult, OrchestratorError> {
        Self::check_duration(duration)?;
        let _gate = self.gate.lock().await;
        Ok(self.random_leg(duration).await)
    }

    /// Alternate AI and random campaigns from a freshly reset grid.
    ///
    /// The gate is held across all trials. A reset failure after the first
    /// campaign ends the run early: the report keeps what was collected and
    /// carries the failure in `error`.
    #[instrument(skip(self), fields(duration_s = duration.as_secs_f64()))]
    pub async fn run_comparison(
        &self,
        duration: Duration,
        trials: u32,
    ) -> Result<ComparisonReport, OrchestratorError> {
        Self::check_duration(duration)?;
        if trials == 0 {
            return Err(OrchestratorError::InvalidRequest(
                "trials must be at least 1".to_owned(),
            ));
        }
        let _gate = self.gate.lock().await;
        let mut ai_results = Vec::with_capacity(trials as usize);
        let mut random_results = Vec::with_capacity(trials as usize);
        let mut error = None;

        for trial in 1..=trials {
            info!(trial, trials, "comparison trial started");
            if let Err(err) = self.reset_grid_locked().await {
                error = Some(err);
                break;
            }
            let mut ai = self.ai_leg(duration).await;
            ai.trial = Some(trial);
            ai_results.push(ai);

            if let Err(err) = self.reset_grid_locked().await {
                error = Some(err);
                break;
            }
            let mut random = self.random_leg(duration).await;
            random.trial = Some(trial);
            random_results.push(random);
        }

        if let Some(err) = &error {
            if ai_results.is_empty() {
                return Err(err.clone());
            }
            warn!(
                error = %err,
                ai = ai_results.len(),
                random = random_results.len(),
                "comparison stopped early"
            );
        }

        let comparison_metrics =
            ComparisonMetrics::compute(&ai_results, &random_results, self.campaign.success_threshold);
        info!(
            ai_mean = comparison_metrics.ai_mean,
            random_mean = comparison_metrics.random_mean,
            ratio = %comparison_metrics.improvement_ratio,
            "comparison finished"
        );
        Ok(ComparisonReport {
            trials,
            duration_s: duration.as_secs_f64(),
            ai_results,
            random_results,
            comparison_metrics,
            error: error.map(|err| err.to_string()),
        })
    }

    /// Restore the grid and forget the monitor baseline.
    pub async fn reset_grid(&self) -> Result<(), OrchestratorError> {
        let _gate = self.gate.lock().await;
        self.reset_grid_locked().await
    }

    async fn reset_grid_locked(&self) -> Result<(), OrchestratorError> {
        self.grid.reset_state().await?;
        self.monitor.reset_baseline();
        Ok(())
    }

    /// AI and random campaigns, oldest first.
    pub fn campaign_history(&self) -> Vec<CampaignResult> {
        let mut history = self.planner.campaign_history();
        history.extend(self.random_history.lock().iter().cloned());
        history.sort_by_key(|c| c.start_time);
        history
    }

    pub fn reset_campaign_history(&self) -> usize {
        let random = {
            let mut history = self.random_history.lock();
            let cleared = history.len();
            history.clear();
            cleared
        };
        random + self.planner.reset_campaign_history()
    }

    pub async fn attack_impact_analysis(&self) -> Result<AttackImpactReport, OrchestratorError> {
        Ok(self.monitor.attack_impact_analysis().await?)
    }

    pub fn threat_model(&self) -> ThreatModelConfig {
        self.engine.validator().constraints()
    }

    async fn ai_leg(&self, duration: Duration) -> CampaignResult {
        let result = self.planner.execute_campaign(duration).await;
        if let Some(metrics) = &self.metrics {
            for attack in &result.attacks {
                self.record_attack(attack);
            }
            let fallbacks = result
                .initial_plan
                .iter()
                .chain(result.ai_decisions.iter().map(|d| &d.plan))
                .filter(|p| p.is_fallback())
                .count();
            for _ in 0..fallbacks {
                metrics.record_fallback();
            }
            metrics.record_campaign(result.kind.as_str(), result.effectiveness_score);
        }
        result
    }

    /// Uniformly random validated attacks with random pauses until the budget
    /// runs out.
    async fn random_leg(&self, duration: Duration) -> CampaignResult {
        let started = Instant::now();
        let mut result = CampaignResult::begin(CampaignKind::Random, duration);
        info!(campaign = %result.id, "random campaign started");

        let initial = match self.grid.current_state().await {
            Ok(state) => state,
            Err(err) => {
                warn!(campaign = %result.id, error = %err, "initial grid state unavailable");
                result.error = Some(format!("initial state unavailable: {err}"));
                result.conclude(None, Err(err), started.elapsed());
                return self.finish_random(result);
            }
        };

        while started.elapsed() < duration {
            let (request, delay) = {
                let mut rng = self.rng.lock();
                let technique = random_technique(&mut *rng);
                let request = random_request(&mut *rng, technique);
                let delay = rng.gen_range(
                    self.campaign.random_delay_min_s..=self.campaign.random_delay_max_s,
                );
                (request, Duration::from_secs_f64(delay))
            };
            let attack = self.engine.execute_checked(&request).await;
            self.record_attack(&attack);
            result.attacks.push(attack);

            let remaining = duration.saturating_sub(started.elapsed());
            sleep(delay.min(remaining)).await;
        }

        let last = self.grid.current_state().await;
        result.conclude(Some(&initial), last, started.elapsed());
        info!(
            campaign = %result.id,
            attacks = result.attacks.len(),
            score = result.effectiveness_score,
            "random campaign finished"
        );
        self.finish_random(result)
    }

    fn finish_random(&self, result: CampaignResult) -> CampaignResult {
        if let Some(metrics) = &self.metrics {
            metrics.record_campaign(result.kind.as_str(), result.effectiveness_score);
        }
        self.random_history.lock().push(result.clone());
        result
    }

    fn record_attack(&self, result: &AttackResult) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let technique = result.technique.as_str();
        metrics.record_attack(technique, result.success);
        if result.validation.as_ref().is_some_and(|v| !v.valid) {
            metrics.record_rejection(technique);
        }
    }

    fn check(result: AttackResult) -> Result<AttackResult, OrchestratorError> {
        if result.success {
            return Ok(result);
        }
        let technique = result.technique;
        let reason = result.error.clone().unwrap_or_default();
        if let Some(validation) = result.validation.as_ref().filter(|v| !v.valid) {
            return Err(OrchestratorError::ValidationRejected {
                technique,
                reason: validation.reason.clone(),
            });
        }
        if result.pre_state.is_none() {
            return Err(OrchestratorError::InterfaceUnavailable(reason));
        }
        Err(OrchestratorError::AttackExecutionFailed { technique, reason })
    }

    fn check_duration(duration: Duration) -> Result<(), OrchestratorError> {
        if duration.is_zero() {
            return Err(OrchestratorError::InvalidRequest(
                "campaign duration must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}
