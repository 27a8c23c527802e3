//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Configuration model and loaders for the campaign runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;
use crate::technique::Technique;

fn default_grid_name() -> String {
    "gaco_attacker".to_owned()
}

fn default_time_delta() -> f64 {
    1.0
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_simulation_seed() -> u64 {
    0x6AC0u64
}

fn default_noise_sigma() -> f64 {
    0.002
}

fn default_min_pu() -> f64 {
    0.7
}

fn default_max_pu() -> f64 {
    1.3
}

fn default_max_injection_va() -> f64 {
    5_000_000.0
}

fn default_max_block_duration_s() -> f64 {
    300.0
}

fn default_min_interval_s() -> f64 {
    1.0
}

fn default_allowed_techniques() -> Vec<Technique> {
    vec![
        Technique::SpoofData,
        Technique::InjectLoad,
        Technique::Reconnaissance,
        Technique::BlockCommand,
    ]
}

fn default_restricted_targets() -> Vec<String> {
    vec!["safety_systems".to_owned(), "emergency_controls".to_owned()]
}

fn default_true() -> bool {
    true
}

fn default_monitor_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_history_size() -> usize {
    1000
}

fn default_voltage_deviation() -> f64 {
    0.05
}

fn default_power_deviation() -> f64 {
    0.1
}

fn default_health_degradation() -> f64 {
    10.0
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_api_base() -> String {
    "http://localhost:8000/v1".to_owned()
}

fn default_model() -> String {
    "Qwen/Qwen3-30B-A3B".to_owned()
}

fn default_temperature() -> f64 {
    0.8
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_oracle_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_api_key_env() -> String {
    "GACO_ORACLE_API_KEY".to_owned()
}

fn default_step_pause() -> Duration {
    Duration::from_secs(2)
}

fn default_replan_min_remaining() -> Duration {
    Duration::from_secs(10)
}

fn default_random_delay_min() -> f64 {
    1.0
}

fn default_random_delay_max() -> f64 {
    5.0
}

fn default_campaign_duration() -> Duration {
    Duration::from_secs(60)
}

fn default_success_threshold() -> f64 {
    10.0
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the orchestrator runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub threat_model: ThreatModelConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub campaign: CampaignConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "GACO_CONFIG";

    /// Load configuration from disk, respecting the `GACO_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let mut config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        if let Some(overlay) = config.threat_model.overrides_file.clone() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            let overlay = if overlay.is_absolute() {
                overlay
            } else {
                base.join(overlay)
            };
            config.threat_model = ThreatModelConfig::from_yaml_path(&overlay)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.threat_model.validate()?;
        self.monitoring.validate()?;
        self.campaign.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Connection parameters for the grid interface and the bundled simulator.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    #[serde(default = "default_grid_name")]
    pub name: String,
    /// Simulation seconds advanced per `advance_time` call.
    #[serde(default = "default_time_delta")]
    pub time_delta: f64,
    #[serde(default = "default_call_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub call_timeout: Duration,
    #[serde(default = "default_simulation_seed")]
    pub seed: u64,
    /// Per-unit standard deviation of measurement noise in the simulator.
    #[serde(default = "default_noise_sigma")]
    pub noise_sigma: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            name: default_grid_name(),
            time_delta: default_time_delta(),
            call_timeout: default_call_timeout(),
            seed: default_simulation_seed(),
            noise_sigma: default_noise_sigma(),
        }
    }
}

impl GridSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.time_delta > 0.0) {
            return Err(anyhow!("grid.time_delta must be positive"));
        }
        if self.call_timeout.is_zero() {
            return Err(anyhow!("grid.call_timeout must be non-zero"));
        }
        if self.noise_sigma < 0.0 {
            return Err(anyhow!("grid.noise_sigma must not be negative"));
        }
        Ok(())
    }
}

/// Per-unit voltage envelope enforced on spoofed voltages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageLimits {
    #[serde(default = "default_min_pu", alias = "min")]
    pub min_pu: f64,
    #[serde(default = "default_max_pu", alias = "max")]
    pub max_pu: f64,
}

impl Default for VoltageLimits {
    fn default() -> Self {
        Self {
            min_pu: default_min_pu(),
            max_pu: default_max_pu(),
        }
    }
}

/// Safety policy applied to every attack before it reaches the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatModelConfig {
    #[serde(default)]
    pub voltage_limits: VoltageLimits,
    #[serde(default = "default_max_injection_va")]
    pub max_injection_va: f64,
    #[serde(default = "default_max_block_duration_s")]
    pub max_block_duration_s: f64,
    #[serde(default = "default_min_interval_s")]
    pub min_interval_s: f64,
    #[serde(default = "default_allowed_techniques")]
    pub allowed_techniques: Vec<Technique>,
    #[serde(default = "default_restricted_targets")]
    pub restricted_targets: Vec<String>,
    /// Clamp out-of-range parameters when set, reject them otherwise.
    #[serde(default = "default_true")]
    pub safe_mode: bool,
    /// Optional YAML document replacing this section wholesale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides_file: Option<PathBuf>,
}

impl Default for ThreatModelConfig {
    fn default() -> Self {
        Self {
            voltage_limits: VoltageLimits::default(),
            max_injection_va: default_max_injection_va(),
            max_block_duration_s: default_max_block_duration_s(),
            min_interval_s: default_min_interval_s(),
            allowed_techniques: default_allowed_techniques(),
            restricted_targets: default_restricted_targets(),
            safe_mode: true,
            overrides_file: None,
        }
    }
}

impl ThreatModelConfig {
    /// Parse a threat model from a YAML document, filling gaps with defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: ThreatModelConfig =
            serde_yaml::from_str(content).with_context(|| "failed to parse threat model")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_path(path: &Path) -> Result<Self> {
        debug!(threat_model = %path.display(), "loading threat model");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read threat model {}", path.display()))?;
        Self::from_yaml_str(&contents)
            .with_context(|| format!("invalid threat model {}", path.display()))
    }

    pub fn is_allowed(&self, technique: Technique) -> bool {
        self.allowed_techniques.contains(&technique)
    }

    pub fn validate(&self) -> Result<()> {
        let limits = self.voltage_limits;
        if !(limits.min_pu > 0.0 && limits.min_pu < limits.max_pu) {
            return Err(anyhow!(
                "threat_model.voltage_limits must satisfy 0 < min_pu < max_pu (got {} / {})",
                limits.min_pu,
                limits.max_pu
            ));
        }
        if !(self.max_injection_va > 0.0) {
            return Err(anyhow!("threat_model.max_injection_va must be positive"));
        }
        if !(self.max_block_duration_s > 0.0) {
            return Err(anyhow!("threat_model.max_block_duration_s must be positive"));
        }
        Ok(())
    }
}

/// Continuous monitor cadence, buffer capacity and anomaly thresholds.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_monitor_interval", rename = "interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub interval: Duration,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default = "default_voltage_deviation")]
    pub voltage_deviation: f64,
    #[serde(default = "default_power_deviation")]
    pub power_deviation: f64,
    #[serde(default = "default_health_degradation")]
    pub health_degradation: f64,
    #[serde(default = "default_stop_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub stop_timeout: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_monitor_interval(),
            history_size: default_history_size(),
            voltage_deviation: default_voltage_deviation(),
            power_deviation: default_power_deviation(),
            health_degradation: default_health_degradation(),
            stop_timeout: default_stop_timeout(),
        }
    }
}

impl MonitoringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.history_size == 0 {
            return Err(anyhow!("monitoring.history_size must be non-zero"));
        }
        if self.interval.is_zero() {
            return Err(anyhow!("monitoring.interval_ms must be non-zero"));
        }
        Ok(())
    }
}

/// Planning oracle endpoint. Leaving `enabled = false` runs the heuristic planner only.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_oracle_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: default_api_base(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout: default_oracle_timeout(),
            api_key_env: default_api_key_env(),
            api_key_file: None,
        }
    }
}

/// Pacing of AI and random campaigns.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    #[serde(default = "default_step_pause", rename = "step_pause_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub step_pause: Duration,
    #[serde(default = "default_replan_min_remaining")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub replan_min_remaining: Duration,
    #[serde(default = "default_random_delay_min")]
    pub random_delay_min_s: f64,
    #[serde(default = "default_random_delay_max")]
    pub random_delay_max_s: f64,
    #[serde(default = "default_campaign_duration")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub default_duration: Duration,
    /// Score above which a campaign counts as successful in comparisons.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            step_pause: default_step_pause(),
            replan_min_remaining: default_replan_min_remaining(),
            random_delay_min_s: default_random_delay_min(),
            random_delay_max_s: default_random_delay_max(),
            default_duration: default_campaign_duration(),
            success_threshold: default_success_threshold(),
            seed: None,
        }
    }
}

impl CampaignConfig {
    pub fn validate(&self) -> Result<()> {
        if self.random_delay_min_s < 0.0 || self.random_delay_min_s > self.random_delay_max_s {
            return Err(anyhow!(
                "campaign random delay bounds are inverted ({} > {})",
                self.random_delay_min_s,
                self.random_delay_max_s
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
