// =============================================================================
// Shared types used across the Quorum decision engine
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final recommendation produced by a decision tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Default for Action {
    fn default() -> Self {
        Self::Hold
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
            Self::Hold => write!(f, "hold"),
        }
    }
}

/// Risk appetite governing planner composition and risk caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Conservative,
    Balanced,
    Aggressive,
}

impl Default for RiskProfile {
    fn default() -> Self {
        Self::Conservative
    }
}

impl std::fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conservative => write!(f, "conservative"),
            Self::Balanced => write!(f, "balanced"),
            Self::Aggressive => write!(f, "aggressive"),
        }
    }
}

/// Whether the engine trades simulated or real funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Paper,
    Live,
}

impl Default for TradingMode {
    fn default() -> Self {
        Self::Paper
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paper => write!(f, "paper"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Severity attached to safety and boundary violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// One entry in the append-only transcript a decision tick accumulates.
/// Every agent stage appends exactly one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

// =============================================================================
// Market data structures
// =============================================================================

/// Point-in-time price quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceData {
    pub symbol: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub volume_24h: Option<f64>,
    #[serde(default)]
    pub change_24h: Option<f64>,
}

/// A single OHLCV candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// News item with temporal metadata. `published_at` is the field the
/// temporal gateway filters on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub content: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub sentiment: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Financial report. A quarter can end long before the report is released,
/// so the gateway filters on `released_at`, never `period_end`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialReport {
    pub symbol: String,
    pub report_type: String,
    pub period_end: DateTime<Utc>,
    pub released_at: DateTime<Utc>,
    #[serde(default)]
    pub metrics: serde_json::Value,
}

/// Opaque market snapshot handed to a decision tick. Carries the latest
/// quote plus enough history for the technical analyzer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub volume_24h: Option<f64>,
    #[serde(default)]
    pub change_24h: Option<f64>,
    /// Historical close prices, oldest first.
    #[serde(default)]
    pub prices: Vec<f64>,
    /// Historical volumes, oldest first (aligned with `prices`).
    #[serde(default)]
    pub volumes: Vec<f64>,
    /// Full candles when the data source provides them.
    #[serde(default)]
    pub ohlcv: Vec<OhlcvBar>,
}

/// Portfolio snapshot from the execution venue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Portfolio {
    /// Open positions as symbol -> portfolio fraction.
    #[serde(default)]
    pub positions: std::collections::HashMap<String, f64>,
    #[serde(default)]
    pub balance: f64,
}

/// Outcome of an executed trade, fed into the safety enforcer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub success: bool,
    pub pnl: f64,
    pub slippage: f64,
}
