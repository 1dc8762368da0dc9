// =============================================================================
// Data-Boundary Validator — off-path look-ahead audit for batch runs
// =============================================================================
//
// Where the temporal gateway guards individual reads on the hot path, this
// validator audits whole runs: raw candle arrays, indicator access
// patterns, and symbol universes. It is synchronous and never suspends.
//
// Detection rules:
//   - FUTURE_PRICE / FUTURE_NEWS / FUTURE_FINANCIALS — data timestamped
//     beyond the simulation time at the moment of access (critical).
//   - LOOKAHEAD_INDICATOR — an indicator window reaching past the end of
//     the available data, flagged once per (name, lookback) pair (warning).
//   - SURVIVORSHIP_BIAS — querying a symbol after its delisting date
//     (warning).
//
// In strict mode a future-data access aborts the caller with
// `EngineError::LookAheadBias`; `prevalidate_run` applies the same rule to
// input data before any strategy code executes.
// =============================================================================

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::temporal::gateway::DataKind;
use crate::types::{OhlcvBar, Severity};

// -----------------------------------------------------------------------------
// Public types
// -----------------------------------------------------------------------------

/// Kinds of look-ahead bias the validator can detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasKind {
    FuturePrice,
    FutureNews,
    FutureFinancials,
    LookaheadIndicator,
    SurvivorshipBias,
}

impl std::fmt::Display for BiasKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::FuturePrice => "future_price",
            Self::FutureNews => "future_news",
            Self::FutureFinancials => "future_financials",
            Self::LookaheadIndicator => "lookahead_indicator",
            Self::SurvivorshipBias => "survivorship_bias",
        };
        write!(f, "{label}")
    }
}

/// A detected look-ahead violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasViolation {
    pub kind: BiasKind,
    /// Timestamp of the offending data.
    pub timestamp: DateTime<Utc>,
    pub simulation_time: DateTime<Utc>,
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub data_accessed: Option<String>,
}

/// Result of a boundary audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub total_checks: usize,
    pub violations: Vec<BiasViolation>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ValidationReport {
    pub fn critical_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Critical)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Warning)
            .count()
    }
}

// -----------------------------------------------------------------------------
// Validator
// -----------------------------------------------------------------------------

/// Batch-mode look-ahead auditor. Single-owner, synchronous.
pub struct DataBoundaryValidator {
    strict: bool,
    track_indicators: bool,
    simulation_time: Option<DateTime<Utc>>,
    access_count: usize,
    violations: Vec<BiasViolation>,
    warnings: Vec<String>,
    /// `(name, lookback)` pairs already flagged, so each suspicious
    /// indicator is reported once.
    seen_indicator_patterns: HashSet<String>,
}

impl DataBoundaryValidator {
    pub fn new(strict: bool, track_indicators: bool) -> Self {
        Self {
            strict,
            track_indicators,
            simulation_time: None,
            access_count: 0,
            violations: Vec::new(),
            warnings: Vec::new(),
            seen_indicator_patterns: HashSet::new(),
        }
    }

    /// Set the simulation time all subsequent accesses are checked against.
    pub fn set_simulation_time(&mut self, simulation_time: DateTime<Utc>) {
        self.simulation_time = Some(simulation_time);
    }

    /// Record one data access and validate it immediately.
    ///
    /// In strict mode a future-data access aborts with `LookAheadBias`.
    pub fn track_data_access(
        &mut self,
        kind: DataKind,
        symbol: &str,
        data_timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let sim = match self.simulation_time {
            Some(t) => t,
            None => {
                self.warnings
                    .push("data access recorded without simulation time set".to_string());
                return Ok(());
            }
        };

        self.access_count += 1;

        if data_timestamp > sim {
            let bias = match kind {
                DataKind::News | DataKind::Social => BiasKind::FutureNews,
                DataKind::Financials => BiasKind::FutureFinancials,
                _ => BiasKind::FuturePrice,
            };
            let description = format!(
                "accessed {kind} data from {} while simulating {}",
                data_timestamp.to_rfc3339(),
                sim.to_rfc3339()
            );
            self.violations.push(BiasViolation {
                kind: bias,
                timestamp: data_timestamp,
                simulation_time: sim,
                description: description.clone(),
                severity: Severity::Critical,
                data_accessed: Some(format!("{symbol}:{kind}")),
            });

            if self.strict {
                return Err(EngineError::LookAheadBias(description));
            }
            warn!(symbol, kind = %kind, "look-ahead access (non-strict): {description}");
        }

        Ok(())
    }

    /// Check a candle array for bars beyond `simulation_time`. Returns
    /// `false` (and records a critical violation) when future candles are
    /// present.
    pub fn validate_ohlcv(
        &mut self,
        bars: &[OhlcvBar],
        symbol: &str,
        simulation_time: DateTime<Utc>,
    ) -> bool {
        let max_ts = match bars.iter().map(|b| b.timestamp).max() {
            Some(ts) => ts,
            None => return true,
        };

        if max_ts > simulation_time {
            self.violations.push(BiasViolation {
                kind: BiasKind::FuturePrice,
                timestamp: max_ts,
                simulation_time,
                description: format!(
                    "OHLCV data contains future candles up to {}",
                    max_ts.to_rfc3339()
                ),
                severity: Severity::Critical,
                data_accessed: Some(symbol.to_string()),
            });
            return false;
        }

        true
    }

    /// Flag an indicator whose window reaches past the end of the data
    /// (e.g. a centered moving average). Flagged once per
    /// `(name, lookback)` pair.
    pub fn validate_indicator(
        &mut self,
        name: &str,
        lookback_period: usize,
        data_length: usize,
        current_index: usize,
    ) -> bool {
        if !self.track_indicators {
            return true;
        }

        if current_index + lookback_period > data_length {
            let pattern_key = format!("{name}:{lookback_period}");
            if self.seen_indicator_patterns.insert(pattern_key) {
                self.violations.push(BiasViolation {
                    kind: BiasKind::LookaheadIndicator,
                    timestamp: Utc::now(),
                    simulation_time: self.simulation_time.unwrap_or_else(Utc::now),
                    description: format!(
                        "indicator {name} may use future data (lookback={lookback_period})"
                    ),
                    severity: Severity::Warning,
                    data_accessed: None,
                });
            }
        }

        true
    }

    /// Flag symbols queried after their delisting date. Returns the biased
    /// subset of `symbols`.
    pub fn check_survivorship(
        &mut self,
        symbols: &[String],
        simulation_time: DateTime<Utc>,
        delisted: &HashMap<String, DateTime<Utc>>,
    ) -> Vec<String> {
        let mut biased = Vec::new();

        for symbol in symbols {
            if let Some(&delist_date) = delisted.get(symbol) {
                if simulation_time > delist_date {
                    biased.push(symbol.clone());
                    self.violations.push(BiasViolation {
                        kind: BiasKind::SurvivorshipBias,
                        timestamp: delist_date,
                        simulation_time,
                        description: format!(
                            "symbol {symbol} was delisted on {}",
                            delist_date.to_rfc3339()
                        ),
                        severity: Severity::Warning,
                        data_accessed: Some(symbol.clone()),
                    });
                }
            }
        }

        biased
    }

    /// Pre-validate run input before any strategy code executes. In strict
    /// mode a pre-detected future candle aborts with `LookAheadBias`.
    pub fn prevalidate_run(
        &mut self,
        data: &HashMap<String, Vec<OhlcvBar>>,
        horizon: DateTime<Utc>,
    ) -> Result<()> {
        let mut clean = true;
        for (symbol, bars) in data {
            if !self.validate_ohlcv(bars, symbol, horizon) {
                clean = false;
            }
        }

        if !clean && self.strict {
            return Err(EngineError::LookAheadBias(format!(
                "input data contains candles beyond the run horizon {}",
                horizon.to_rfc3339()
            )));
        }
        Ok(())
    }

    /// Aggregate everything recorded so far into a report.
    ///
    /// Recommendations are a deterministic function of the violation kinds
    /// present.
    pub fn validation_result(&self) -> ValidationReport {
        let kinds: HashSet<BiasKind> = self.violations.iter().map(|v| v.kind).collect();

        let mut recommendations = Vec::new();
        if kinds.contains(&BiasKind::FuturePrice) {
            recommendations.push("Route all market data reads through the temporal gateway".into());
        }
        if kinds.contains(&BiasKind::FutureNews) {
            recommendations.push("Filter news by publication date before use".into());
        }
        if kinds.contains(&BiasKind::FutureFinancials) {
            recommendations.push("Filter reports by release date, not period end".into());
        }
        if kinds.contains(&BiasKind::LookaheadIndicator) {
            recommendations.push("Replace centered indicators with trailing versions".into());
        }
        if kinds.contains(&BiasKind::SurvivorshipBias) {
            recommendations.push("Include delisted symbols in historical analysis".into());
        }

        let passed = self
            .violations
            .iter()
            .all(|v| v.severity != Severity::Critical);

        ValidationReport {
            passed,
            total_checks: self.access_count,
            violations: self.violations.clone(),
            warnings: self.warnings.clone(),
            recommendations,
        }
    }

    /// Render a human-readable report.
    pub fn report(&self) -> String {
        let result = self.validation_result();

        let mut out = String::new();
        out.push_str("╔══════════════════════════════════════════════════════════╗\n");
        out.push_str("║           DATA BOUNDARY VALIDATION REPORT                ║\n");
        out.push_str("╚══════════════════════════════════════════════════════════╝\n\n");
        out.push_str(&format!(
            "Status: {}\n",
            if result.passed { "PASSED" } else { "FAILED" }
        ));
        out.push_str(&format!("Total Data Accesses: {}\n", result.total_checks));
        out.push_str(&format!("Critical Violations: {}\n", result.critical_count()));
        out.push_str(&format!("Warnings: {}\n", result.warning_count()));

        if !result.violations.is_empty() {
            out.push_str("\nVIOLATIONS DETECTED:\n");
            for (i, v) in result.violations.iter().enumerate() {
                out.push_str(&format!(
                    "{}. [{}] {}\n   Simulation Time: {}\n   Violation Time:  {}\n   {}\n",
                    i + 1,
                    v.severity,
                    v.kind,
                    v.simulation_time.to_rfc3339(),
                    v.timestamp.to_rfc3339(),
                    v.description
                ));
            }
        }

        if !result.recommendations.is_empty() {
            out.push_str("\nRECOMMENDATIONS:\n");
            for rec in &result.recommendations {
                out.push_str(&format!("- {rec}\n"));
            }
        }

        out
    }

    /// Discard all recorded state.
    pub fn reset(&mut self) {
        self.simulation_time = None;
        self.access_count = 0;
        self.violations.clear();
        self.warnings.clear();
        self.seen_indicator_patterns.clear();
    }
}

// -----------------------------------------------------------------------------
// Quick pre-run data check
// -----------------------------------------------------------------------------

/// Validate backtest input data without running anything: coverage at both
/// ends of the requested range, and gaps larger than five times the median
/// candle spacing.
pub fn validate_backtest_data(
    data: &HashMap<String, Vec<OhlcvBar>>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ValidationReport {
    let mut validator = DataBoundaryValidator::new(false, true);

    for (symbol, bars) in data {
        if bars.is_empty() {
            validator.warnings.push(format!("no data for {symbol}"));
            continue;
        }

        let mut timestamps: Vec<DateTime<Utc>> = bars.iter().map(|b| b.timestamp).collect();
        timestamps.sort_unstable();
        let min_ts = timestamps[0];
        let max_ts = timestamps[timestamps.len() - 1];

        if min_ts > start {
            validator.warnings.push(format!(
                "{symbol}: data starts at {}, but the run starts at {}",
                min_ts.to_rfc3339(),
                start.to_rfc3339()
            ));
        }
        if max_ts < end {
            validator.warnings.push(format!(
                "{symbol}: data ends at {}, but the run ends at {}",
                max_ts.to_rfc3339(),
                end.to_rfc3339()
            ));
        }

        if timestamps.len() > 1 {
            let mut diffs: Vec<i64> = timestamps
                .windows(2)
                .map(|w| (w[1] - w[0]).num_seconds())
                .collect();
            diffs.sort_unstable();
            let median = diffs[diffs.len() / 2];
            let gap_count = diffs.iter().filter(|&&d| d > median * 5).count();

            if gap_count > 0 {
                validator
                    .warnings
                    .push(format!("{symbol}: {gap_count} data gaps detected"));
            }
        }
    }

    validator.validation_result()
}
