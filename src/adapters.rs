// =============================================================================
// Capability adapter contracts
// =============================================================================
//
// The core never talks to an exchange, a news API, or a policy server
// directly. Everything external comes in through the narrow async traits
// below; concrete implementations (CCXT-style exchange glue, OPA clients,
// LLM providers) live outside this crate.
//
// Every time-indexed fetch carries an `as_of` / `published_before` /
// `released_before` watermark so the temporal gateway can enforce the
// simulation boundary on top of whatever filtering the adapter does itself.
// =============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::types::{
    Action, FinancialReport, MarketSnapshot, NewsItem, OhlcvBar, Portfolio, PriceData, RiskProfile,
};

/// A trade (or pre-trade analysis) submitted for compliance screening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub action: String,
    pub size: f64,
    pub leverage: f64,
    pub risk_profile: RiskProfile,
}

/// Verdict from the compliance adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    pub compliant: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub violations: Vec<String>,
}

/// Recommendation from the portfolio optimizer adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub action: Action,
    /// Fraction of the portfolio to allocate, in `[0, 1]`.
    pub size: f64,
    pub confidence: f64,
}

// =============================================================================
// Market data
// =============================================================================

/// Price and candle source. The gateway wraps this with temporal checks;
/// adapters should still honour `as_of` themselves where possible.
#[async_trait]
pub trait DataAdapter: Send + Sync {
    /// Full market snapshot: latest quote plus price/volume history.
    async fn get_market_data(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> anyhow::Result<MarketSnapshot>;

    /// Point-in-time price quote at or before `as_of`.
    async fn get_price(&self, symbol: &str, as_of: DateTime<Utc>)
        -> anyhow::Result<Option<PriceData>>;

    /// Candles ending at or before `as_of`, oldest first.
    async fn get_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<Vec<OhlcvBar>>;
}

/// News search, filtered by publication date.
#[async_trait]
pub trait NewsAdapter: Send + Sync {
    async fn search(
        &self,
        query: &str,
        symbols: &[String],
        published_before: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<NewsItem>>;
}

/// Social media sentiment: `{score, trending, volume, ...}`.
#[async_trait]
pub trait SocialAdapter: Send + Sync {
    async fn get_social_sentiment(
        &self,
        symbol: &str,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<Value>;
}

/// On-chain metrics: `{active_addresses, transaction_volume, whale_activity,
/// exchange_flows, ...}`.
#[async_trait]
pub trait OnChainAdapter: Send + Sync {
    async fn get_onchain_metrics(
        &self,
        symbol: &str,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<Value>;
}

/// Macro environment: `{fed_policy, dxy, vix, risk_on, ...}`.
#[async_trait]
pub trait MacroAdapter: Send + Sync {
    async fn get_macro_factors(&self, as_of: DateTime<Utc>) -> anyhow::Result<Value>;
}

/// Pre-computed sentiment score in `[-1, 1]`.
#[async_trait]
pub trait SentimentAdapter: Send + Sync {
    async fn get_sentiment(
        &self,
        symbol: &str,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<Option<f64>>;
}

/// Financial reports, filtered by release date.
#[async_trait]
pub trait FundamentalsAdapter: Send + Sync {
    async fn get_reports(
        &self,
        symbol: &str,
        report_type: Option<&str>,
        released_before: DateTime<Utc>,
    ) -> anyhow::Result<Vec<FinancialReport>>;
}

// =============================================================================
// Execution, compliance, optimization
// =============================================================================

/// Execution venue used by the optimizer node and emergency-pause flows.
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    async fn get_portfolio(&self) -> anyhow::Result<Portfolio>;

    async fn execute_trade(
        &self,
        symbol: &str,
        action: Action,
        size: f64,
        price: Option<f64>,
    ) -> anyhow::Result<Value>;

    /// Flatten everything. Called when a critical safety pause demands it.
    async fn close_all_positions(&self) -> anyhow::Result<()>;
}

/// Policy screening (e.g. an OPA sidecar with embedded fallback).
#[async_trait]
pub trait ComplianceAdapter: Send + Sync {
    async fn check_compliance(
        &self,
        trade: &TradeIntent,
        risk_profile: RiskProfile,
    ) -> anyhow::Result<ComplianceVerdict>;
}

/// Portfolio optimizer (quantum or classical). The optimizer agent falls
/// back to half-Kelly sizing when none is attached.
#[async_trait]
pub trait OptimizerAdapter: Send + Sync {
    async fn optimize_portfolio(
        &self,
        symbol: &str,
        signal: f64,
        current_portfolio: &Portfolio,
    ) -> anyhow::Result<OptimizationOutcome>;
}

/// Optional language model used for research narration and debate
/// arguments. Templated fallbacks are used when absent.
#[async_trait]
pub trait LanguageModelAdapter: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> anyhow::Result<String>;
}
