// =============================================================================
// Engine Configuration — Hot-reloadable settings with atomic save
// =============================================================================
//
// Central configuration hub for the Quorum decision engine. Every tunable
// parameter lives here so that a running engine can be reconfigured without
// a restart.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{RiskProfile, TradingMode};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_max_iterations() -> u32 {
    3
}

fn default_history_depth() -> usize {
    20
}

fn default_validation_threshold() -> f64 {
    0.7
}

fn default_data_freshness_seconds() -> u64 {
    300
}

fn default_required_data_sources() -> Vec<String> {
    vec![
        "news".to_string(),
        "social".to_string(),
        "onchain".to_string(),
        "technical".to_string(),
    ]
}

fn default_max_consecutive_losses() -> u32 {
    3
}

fn default_max_api_errors_per_min() -> u32 {
    5
}

fn default_min_sentiment() -> f64 {
    -0.3
}

fn default_max_slippage_pct() -> f64 {
    1.0
}

fn default_max_daily_loss() -> f64 {
    10.0
}

fn default_pii_patterns() -> Vec<String> {
    vec![
        "social security".to_string(),
        "ssn".to_string(),
        "credit card".to_string(),
        "password".to_string(),
        "private key".to_string(),
        "api key".to_string(),
    ]
}

fn default_max_parallel_tasks() -> usize {
    3
}

fn default_max_research_time_seconds() -> u64 {
    120
}

// =============================================================================
// Sections
// =============================================================================

/// Research-quality validation settings used by the validator agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum validation score for `validation_passed`.
    #[serde(default = "default_validation_threshold")]
    pub validation_threshold: f64,

    /// Research data older than this counts as stale.
    #[serde(default = "default_data_freshness_seconds")]
    pub data_freshness_seconds: u64,

    /// Sources that must be present in the research artifact.
    #[serde(default = "default_required_data_sources")]
    pub required_data_sources: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            validation_threshold: default_validation_threshold(),
            data_freshness_seconds: default_data_freshness_seconds(),
            required_data_sources: default_required_data_sources(),
        }
    }
}

/// Thresholds for the runtime safety enforcer's auto-pause triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Consecutive losing trades before the engine pauses.
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,

    /// API errors tolerated within a 60 second window.
    #[serde(default = "default_max_api_errors_per_min")]
    pub max_api_errors_per_min: u32,

    /// Sentiment floor; readings below it trigger a pause.
    #[serde(default = "default_min_sentiment")]
    pub min_sentiment: f64,

    /// Maximum tolerated slippage between expected and actual fill, in
    /// percent of the expected price.
    #[serde(default = "default_max_slippage_pct")]
    pub max_slippage_pct: f64,

    /// Maximum cumulative daily loss (quote currency) before pausing.
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: f64,

    /// Literal PII patterns scanned for in agent transcripts. Data-driven so
    /// that policy changes do not touch code.
    #[serde(default = "default_pii_patterns")]
    pub pii_patterns: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_consecutive_losses: default_max_consecutive_losses(),
            max_api_errors_per_min: default_max_api_errors_per_min(),
            min_sentiment: default_min_sentiment(),
            max_slippage_pct: default_max_slippage_pct(),
            max_daily_loss: default_max_daily_loss(),
            pii_patterns: default_pii_patterns(),
        }
    }
}

/// Research planner composition and execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Execute independent tasks of a batch concurrently.
    #[serde(default = "default_true")]
    pub enable_parallel_tasks: bool,

    /// Cap on concurrently executing tasks within one batch.
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,

    /// Include the optional pattern-matching and keyword tasks.
    #[serde(default = "default_true")]
    pub include_optional_tasks: bool,

    /// Cumulative wall-clock budget for one research pass; tasks still
    /// pending when it runs out are skipped.
    #[serde(default = "default_max_research_time_seconds")]
    pub max_research_time_seconds: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            enable_parallel_tasks: true,
            max_parallel_tasks: default_max_parallel_tasks(),
            include_optional_tasks: true,
            max_research_time_seconds: default_max_research_time_seconds(),
        }
    }
}

/// Temporal gateway behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Raise `TemporalViolation` on boundary breaches instead of returning
    /// empty results.
    #[serde(default = "default_true")]
    pub strict_mode: bool,

    /// Append an audit record for every data access.
    #[serde(default = "default_true")]
    pub log_access: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            strict_mode: true,
            log_access: true,
        }
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level configuration for the Quorum decision engine.
///
/// Every field has a serde default so that older JSON files missing new
/// fields still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Risk appetite: conservative, balanced, or aggressive.
    #[serde(default)]
    pub risk_profile: RiskProfile,

    /// Paper (simulated) or live trading.
    #[serde(default)]
    pub mode: TradingMode,

    /// Upper bound on decision-graph refinement loops per tick.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Decision records retained per symbol.
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_profile: RiskProfile::Conservative,
            mode: TradingMode::Paper,
            max_iterations: default_max_iterations(),
            history_depth: default_history_depth(),
            validation: ValidationConfig::default(),
            safety: SafetyConfig::default(),
            planner: PlannerConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            risk_profile = %config.risk_profile,
            mode = %config.mode,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise engine config")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }
}
