//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Strategic planning and adaptive campaign execution."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gaco_attack::{AttackEngine, AttackResult, ImpactScore, StepAnnotation};
use gaco_common::{CampaignConfig, PlannerConfig, Technique};
use gaco_grid::{GridError, GridState};
use gaco_monitor::{assess, GridMonitor};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::{sleep, timeout, Instant};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{OracleError, PlannerError};
use crate::normalize::{normalize_params, resolve_technique};
use crate::oracle::PlanningOracle;
use crate::plan::{fallback_steps, parse_plan, AttackPlan, PlanContext, PlanSource, PlanStep};
use crate::prompt::{system_prompt, user_prompt};

const CAMPAIGN_OBJECTIVE: &str = "Maximize grid disruption through strategic attack progression";
const ADAPT_OBJECTIVE: &str = "Adapt strategy based on current grid response";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignKind {
    AiStrategic,
    Random,
}

impl CampaignKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignKind::AiStrategic => "ai_strategic",
            CampaignKind::Random => "random",
        }
    }
}

impl fmt::Display for CampaignKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Re-plan taken after a state-changing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveDecision {
    pub timestamp: DateTime<Utc>,
    /// Step number and technique that triggered the re-plan.
    pub trigger_step: u32,
    pub trigger: Technique,
    pub plan: AttackPlan,
    /// Non-reconnaissance steps spliced onto the queue.
    pub appended_steps: usize,
}

/// Plan step that named no known technique and was not executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedStep {
    pub step: u32,
    pub technique: String,
    pub reason: String,
}

/// Record of one AI or random campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignResult {
    pub id: Uuid,
    pub kind: CampaignKind,
    /// 1-based trial number when run as part of a comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial: Option<u32>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Requested budget in seconds.
    pub duration_s: f64,
    /// Time actually spent in seconds.
    pub elapsed_s: f64,
    pub attacks: Vec<AttackResult>,
    #[serde(default)]
    pub ai_decisions: Vec<AdaptiveDecision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_steps: Vec<SkippedStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_plan: Option<AttackPlan>,
    pub overall_impact: ImpactScore,
    pub effectiveness_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_state: Option<GridState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CampaignResult {
    pub fn begin(kind: CampaignKind, budget: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            trial: None,
            start_time: Utc::now(),
            end_time: None,
            duration_s: budget.as_secs_f64(),
            elapsed_s: 0.0,
            attacks: Vec::new(),
            ai_decisions: Vec::new(),
            skipped_steps: Vec::new(),
            initial_plan: None,
            overall_impact: ImpactScore::default(),
            effectiveness_score: 0.0,
            final_state: None,
            error: None,
        }
    }

    /// Close the record, scoring the move from `initial` to the final state.
    ///
    /// Without both snapshots the impact stays zero and the read error is kept.
    pub fn conclude(
        &mut self,
        initial: Option<&GridState>,
        final_state: Result<GridState, GridError>,
        elapsed: Duration,
    ) {
        match final_state {
            Ok(last) => {
                if let Some(first) = initial {
                    self.overall_impact = ImpactScore::between(first, &last);
                    self.effectiveness_score = self.overall_impact.total_score;
                }
                self.final_state = Some(last);
            }
            Err(err) => {
                self.error.get_or_insert_with(|| format!("final state unavailable: {err}"));
            }
        }
        self.elapsed_s = elapsed.as_secs_f64();
        self.end_time = Some(Utc::now());
    }

    pub fn successful_attacks(&self) -> usize {
        self.attacks.iter().filter(|a| a.success).count()
    }

    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Oracle-driven planner with a deterministic fallback, plus the adaptive
/// campaign loop built on it.
pub struct StrategicPlanner {
    engine: Arc<AttackEngine>,
    monitor: Arc<GridMonitor>,
    oracle: Option<Arc<dyn PlanningOracle>>,
    planner: PlannerConfig,
    campaign: CampaignConfig,
    history: Mutex<Vec<CampaignResult>>,
}

impl fmt::Debug for StrategicPlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategicPlanner")
            .field("oracle", &self.oracle.as_ref().map(|o| o.name().to_owned()))
            .field("planner", &self.planner)
            .field("campaign", &self.campaign)
            .field("history", &self.history.lock().len())
            .finish()
    }
}

impl StrategicPlanner {
    pub fn new(
        engine: Arc<AttackEngine>,
        monitor: Arc<GridMonitor>,
        oracle: Option<Arc<dyn PlanningOracle>>,
        planner: PlannerConfig,
        campaign: CampaignConfig,
    ) -> Self {
        Self {
            engine,
            monitor,
            oracle,
            planner,
            campaign,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn engine(&self) -> &Arc<AttackEngine> {
        &self.engine
    }

    /// Ask the oracle for a plan, falling back to the deterministic sequence
    /// on any oracle fault.
    ///
    /// Only a failure to read the grid is returned as an error.
    pub async fn plan_attack(
        &self,
        objective: &str,
        context: &Value,
    ) -> Result<AttackPlan, PlannerError> {
        self.plan_within(objective, context, self.planner.timeout).await
    }

    async fn plan_within(
        &self,
        objective: &str,
        context: &Value,
        budget: Duration,
    ) -> Result<AttackPlan, PlannerError> {
        let state = self.engine.grid().current_state().await?;
        let stability = self.monitor.stability_metrics();
        let vulnerabilities = assess(&state, Some(&stability));

        let (outcome, raw_response) = match &self.oracle {
            None => (
                Err(OracleError::Unavailable("no planning oracle configured".to_owned())),
                None,
            ),
            Some(oracle) => {
                let user = user_prompt(&state, &vulnerabilities, objective, context);
                match timeout(budget, oracle.complete(system_prompt(), &user)).await {
                    Err(_) => (Err(OracleError::Timeout(budget)), None),
                    Ok(Err(err)) => (Err(err), None),
                    Ok(Ok(text)) => (parse_plan(&text), Some(text)),
                }
            }
        };

        let mut plan = AttackPlan {
            objective: objective.to_owned(),
            generated_at: Utc::now(),
            source: PlanSource::Oracle,
            fallback_reason: None,
            fallback_cause: None,
            situation_analysis: None,
            strategic_approach: None,
            steps: Vec::new(),
            grid_context: PlanContext {
                state,
                vulnerabilities,
            },
            raw_response,
        };
        match outcome {
            Ok(parsed) => {
                info!(steps = parsed.steps.len(), objective, "oracle plan accepted");
                plan.situation_analysis = parsed.situation_analysis;
                plan.strategic_approach = parsed.strategic_approach;
                plan.steps = parsed.steps;
            }
            Err(err) => {
                warn!(error = %err, objective, "using fallback plan");
                plan.source = PlanSource::Fallback;
                plan.fallback_reason = Some(err.to_string());
                plan.fallback_cause = Some(err);
                plan.situation_analysis =
                    Some("Planning oracle unavailable, using fallback strategic planning".to_owned());
                plan.strategic_approach = Some("Multi-stage attack progression".to_owned());
                plan.steps = fallback_steps(&plan.grid_context.vulnerabilities);
            }
        }
        Ok(plan)
    }

    /// Run a planned, self-adapting campaign for at most `duration`.
    ///
    /// The budget is checked before every step and caps every pause and oracle
    /// call. A grid that cannot be read yields a partial result carrying the
    /// error rather than an `Err`.
    #[instrument(skip(self), fields(duration_s = duration.as_secs_f64()))]
    pub async fn execute_campaign(&self, duration: Duration) -> CampaignResult {
        let started = Instant::now();
        let mut result = CampaignResult::begin(CampaignKind::AiStrategic, duration);
        info!(campaign = %result.id, "AI campaign started");

        let initial = match self.engine.grid().current_state().await {
            Ok(state) => state,
            Err(err) => {
                warn!(campaign = %result.id, error = %err, "initial grid state unavailable");
                result.error = Some(format!("initial state unavailable: {err}"));
                result.conclude(None, Err(err), started.elapsed());
                return self.record(result);
            }
        };

        let context = json!({ "campaign_duration": duration.as_secs_f64() });
        // Half the campaign stays available for the steps a fallback plan yields.
        let budget = self.planner.timeout.min(duration / 2);
        let plan = match self.plan_within(CAMPAIGN_OBJECTIVE, &context, budget).await {
            Ok(plan) => plan,
            Err(err) => {
                result.error = Some(err.to_string());
                let last = self.engine.grid().current_state().await;
                result.conclude(Some(&initial), last, started.elapsed());
                return self.record(result);
            }
        };
        let mut queue: VecDeque<PlanStep> = plan.steps.iter().cloned().collect();
        result.initial_plan = Some(plan);

        while let Some(step) = queue.pop_front() {
            if started.elapsed() >= duration {
                break;
            }
            let Some(technique) = self.execute_step(&step, &mut result).await else {
                continue;
            };

            let remaining = duration.saturating_sub(started.elapsed());
            sleep(self.campaign.step_pause.min(remaining)).await;

            let remaining = duration.saturating_sub(started.elapsed());
            if technique.triggers_replan() && remaining >= self.campaign.replan_min_remaining {
                self.adapt(&step, technique, remaining, &mut queue, &mut result)
                    .await;
            }
        }

        let last = self.engine.grid().current_state().await;
        result.conclude(Some(&initial), last, started.elapsed());
        info!(
            campaign = %result.id,
            attacks = result.attacks.len(),
            decisions = result.ai_decisions.len(),
            score = result.effectiveness_score,
            "AI campaign finished"
        );
        self.record(result)
    }

    /// Execute one plan step. Returns `None` when the step was skipped.
    async fn execute_step(&self, step: &PlanStep, result: &mut CampaignResult) -> Option<Technique> {
        let annotation = StepAnnotation {
            step: step.step,
            objective: step.objective.clone(),
            rationale: step.rationale.clone(),
        };
        let technique = match resolve_technique(step) {
            Ok(technique) => technique,
            Err(err) => {
                warn!(step = step.step, technique = %step.technique, error = %err, "skipping step with unknown technique");
                result.skipped_steps.push(SkippedStep {
                    step: step.step,
                    technique: step.technique.clone(),
                    reason: "unknown technique".to_owned(),
                });
                return None;
            }
        };
        let attack = match normalize_params(technique, &step.parameters) {
            Ok(request) => {
                info!(step = step.step, %technique, objective = %step.objective, "executing planned step");
                self.engine.execute_checked(&request).await
            }
            Err(err) => {
                warn!(step = step.step, %technique, error = %err, "planned step has unusable parameters");
                AttackResult::failed(technique, format!("invalid_parameters: {err}"))
            }
        };
        let technique = attack.technique;
        result.attacks.push(attack.with_annotation(annotation));
        Some(technique)
    }

    async fn adapt(
        &self,
        trigger: &PlanStep,
        technique: Technique,
        remaining: Duration,
        queue: &mut VecDeque<PlanStep>,
        result: &mut CampaignResult,
    ) {
        let previous = result.attacks.last();
        let context = json!({
            "previous_attack": {
                "technique": technique.as_str(),
                "success": previous.map(|a| a.success),
                "impact": previous.map(|a| a.score()),
            },
            "previous_attacks": result.attacks.len(),
            "remaining_time": remaining.as_secs_f64(),
        });
        let budget = self.planner.timeout.min(remaining);
        match self.plan_within(ADAPT_OBJECTIVE, &context, budget).await {
            Ok(plan) => {
                let appended: Vec<PlanStep> = plan
                    .steps
                    .iter()
                    .filter(|s| !s.is_reconnaissance())
                    .cloned()
                    .collect();
                info!(trigger = %technique, appended = appended.len(), "campaign re-planned");
                result.ai_decisions.push(AdaptiveDecision {
                    timestamp: Utc::now(),
                    trigger_step: trigger.step,
                    trigger: technique,
                    appended_steps: appended.len(),
                    plan,
                });
                queue.extend(appended);
            }
            Err(err) => warn!(error = %err, "adaptive re-plan skipped"),
        }
    }

    fn record(&self, result: CampaignResult) -> CampaignResult {
        self.history.lock().push(result.clone());
        result
    }

    /// Completed AI campaigns, oldest first.
    pub fn campaign_history(&self) -> Vec<CampaignResult> {
        self.history.lock().clone()
    }

    pub fn reset_campaign_history(&self) -> usize {
        let mut history = self.history.lock();
        let cleared = history.len();
        history.clear();
        info!(cleared, "campaign history reset");
        cleared
    }
}
