// =============================================================================
// End-to-end pipeline safety tests
// =============================================================================
//
// Exercises the full decision pipeline against mock adapters: the happy
// buy path, pause dominance after safety violations, risk denial, the
// temporal boundary, and resume semantics.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

use quorum_engine::{
    Action, AdapterSet, ComplianceAdapter, ComplianceVerdict, DataAdapter, EngineConfig,
    EngineError, ExecutionAdapter, LanguageModelAdapter, MarketSnapshot, NewsAdapter, NewsItem,
    OhlcvBar, OnChainAdapter, Orchestrator, Portfolio, PriceData, RiskProfile, SocialAdapter,
    TradeIntent, TradeOutcome,
};

/// Best-effort tracing init so `RUST_LOG=debug cargo test` shows the
/// pipeline's structured logs.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

// -----------------------------------------------------------------------------
// Mock adapters
// -----------------------------------------------------------------------------

/// Gently falling prices: RSI pins to 0 (deep oversold, bullish technical
/// sentiment) while volatility stays low.
struct DriftingData;

fn drifting_prices(limit: usize) -> Vec<f64> {
    (0..limit).map(|i| 100.0 - i as f64 * 0.01).collect()
}

#[async_trait]
impl DataAdapter for DriftingData {
    async fn get_market_data(
        &self,
        _symbol: &str,
        _timeframe: &str,
        limit: usize,
    ) -> anyhow::Result<MarketSnapshot> {
        let prices = drifting_prices(limit);
        Ok(MarketSnapshot {
            price: prices[prices.len() - 1],
            prices,
            volumes: vec![150_000_000.0; limit],
            ..Default::default()
        })
    }

    async fn get_price(
        &self,
        symbol: &str,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<Option<PriceData>> {
        Ok(Some(PriceData {
            symbol: symbol.to_string(),
            price: 99.0,
            timestamp: as_of,
            bid: None,
            ask: None,
            volume_24h: None,
            change_24h: None,
        }))
    }

    async fn get_ohlcv(
        &self,
        _symbol: &str,
        _timeframe: &str,
        limit: usize,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<Vec<OhlcvBar>> {
        let prices = drifting_prices(limit);
        Ok(prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                timestamp: as_of - Duration::hours((limit - i) as i64),
                open: close,
                high: close + 0.2,
                low: close - 0.2,
                close,
                volume: 150_000_000.0,
            })
            .collect())
    }
}

struct BullishNews;

#[async_trait]
impl NewsAdapter for BullishNews {
    async fn search(
        &self,
        _query: &str,
        symbols: &[String],
        published_before: DateTime<Utc>,
        _limit: usize,
    ) -> anyhow::Result<Vec<NewsItem>> {
        Ok(vec![NewsItem {
            title: "Institutional inflows accelerate".to_string(),
            content: "Funds keep accumulating.".to_string(),
            source: "wire".to_string(),
            published_at: published_before - Duration::hours(1),
            symbols: symbols.to_vec(),
            sentiment: Some(0.8),
            url: None,
        }])
    }
}

struct BullishSocial;

#[async_trait]
impl SocialAdapter for BullishSocial {
    async fn get_social_sentiment(
        &self,
        _symbol: &str,
        _as_of: DateTime<Utc>,
    ) -> anyhow::Result<Value> {
        Ok(json!({ "score": 0.8, "trending": true, "volume": 50_000 }))
    }
}

struct BullishChain;

#[async_trait]
impl OnChainAdapter for BullishChain {
    async fn get_onchain_metrics(
        &self,
        _symbol: &str,
        _as_of: DateTime<Utc>,
    ) -> anyhow::Result<Value> {
        Ok(json!({
            "active_addresses": 900_000,
            "transaction_volume": 2.5e9,
            "whale_activity": "bullish",
            "exchange_flows": { "inflow": 1.0e8, "outflow": 3.0e8 },
        }))
    }
}

struct ScriptedLlm;

#[async_trait]
impl LanguageModelAdapter for ScriptedLlm {
    async fn generate(&self, system_prompt: &str, _user_prompt: &str) -> anyhow::Result<String> {
        if system_prompt.contains("bull trader") {
            Ok("Score: 0.9. The trend favors accumulation.".to_string())
        } else if system_prompt.contains("bear trader") {
            Ok("Nothing actionable either way.".to_string())
        } else {
            Ok("Multi-source intelligence reads constructive.".to_string())
        }
    }
}

struct PaperExecution;

#[async_trait]
impl ExecutionAdapter for PaperExecution {
    async fn get_portfolio(&self) -> anyhow::Result<Portfolio> {
        Ok(Portfolio {
            positions: HashMap::new(),
            balance: 10_000.0,
        })
    }

    async fn execute_trade(
        &self,
        _symbol: &str,
        _action: Action,
        _size: f64,
        _price: Option<f64>,
    ) -> anyhow::Result<Value> {
        Ok(json!({ "status": "simulated" }))
    }

    async fn close_all_positions(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

struct Compliance {
    approve: bool,
}

#[async_trait]
impl ComplianceAdapter for Compliance {
    async fn check_compliance(
        &self,
        _trade: &TradeIntent,
        _risk_profile: RiskProfile,
    ) -> anyhow::Result<ComplianceVerdict> {
        Ok(ComplianceVerdict {
            compliant: self.approve,
            reason: if self.approve { "ok" } else { "blocked" }.to_string(),
            violations: Vec::new(),
        })
    }
}

fn full_adapters(approve_compliance: bool) -> AdapterSet {
    AdapterSet {
        data: Arc::new(DriftingData),
        execution: Arc::new(PaperExecution),
        compliance: Arc::new(Compliance {
            approve: approve_compliance,
        }),
        news: Some(Arc::new(BullishNews)),
        social: Some(Arc::new(BullishSocial)),
        onchain: Some(Arc::new(BullishChain)),
        macro_data: None,
        sentiment: None,
        fundamentals: None,
        optimizer: None,
        language_model: Some(Arc::new(ScriptedLlm)),
    }
}

// -----------------------------------------------------------------------------
// Scenarios
// -----------------------------------------------------------------------------

#[tokio::test]
async fn bullish_inputs_produce_a_buy_with_capped_size() {
    init_tracing();
    let orchestrator = Orchestrator::new(EngineConfig::default(), full_adapters(true));
    let record = orchestrator.analyze_symbol("BTC/USDT", None).await;

    assert_eq!(record.action, Action::Buy, "decision: {}", record.decision);
    assert!(record.confidence > 0.6);
    assert!(record.sentiment > 0.3);

    // Half-Kelly sizing caps at 10% of the portfolio.
    let size = record.decision["size"].as_f64().unwrap();
    assert!(size > 0.0 && size <= 0.10, "size {size}");
}

#[tokio::test]
async fn consecutive_losses_auto_pause_and_force_hold() {
    init_tracing();
    let orchestrator = Orchestrator::new(EngineConfig::default(), full_adapters(true));

    // Scenario: three losing trades in a row.
    for _ in 0..3 {
        orchestrator.safety().record_trade_result(TradeOutcome {
            success: false,
            pnl: -5.0,
            slippage: 0.0,
        });
    }
    let violation = orchestrator
        .safety()
        .check_consecutive_losses()
        .expect("breaker fires");
    assert!(violation.auto_pause);
    assert!(orchestrator.safety().is_paused());

    // The next tick completes but is overridden to a zero-confidence hold.
    let record = orchestrator.analyze_symbol("BTC/USDT", None).await;
    assert_eq!(record.action, Action::Hold);
    assert_eq!(record.confidence, 0.0);
}

#[tokio::test]
async fn risk_denial_overrides_bullish_sentiment() {
    let orchestrator = Orchestrator::new(EngineConfig::default(), full_adapters(false));
    let record = orchestrator.analyze_symbol("BTC/USDT", None).await;

    assert_eq!(record.action, Action::Hold);
    assert_eq!(record.confidence, 0.0);
    assert_eq!(
        record.decision["reason"].as_str().unwrap(),
        "Failed risk or compliance check"
    );
}

#[tokio::test]
async fn strict_gateway_blocks_reads_past_the_boundary() {
    let pinned = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let orchestrator =
        Orchestrator::new_at(EngineConfig::default(), full_adapters(true), pinned);

    let future = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let err = orchestrator
        .gateway()
        .get_price("BTC/USDT", Some(future))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TemporalViolation(_)));

    // Advancing the clock makes the same read legal.
    orchestrator.set_simulation_time(future).unwrap();
    let price = orchestrator
        .gateway()
        .get_price("BTC/USDT", Some(future))
        .await
        .unwrap();
    assert!(price.is_some());
}

#[tokio::test]
async fn pinned_tick_records_no_boundary_violations() {
    let pinned = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let orchestrator =
        Orchestrator::new_at(EngineConfig::default(), full_adapters(true), pinned);

    orchestrator.analyze_symbol("BTC/USDT", None).await;

    let stats = orchestrator.gateway().statistics();
    assert!(stats.total_requests > 0);
    assert_eq!(stats.violations, 0, "tick must never read past the boundary");
}

#[tokio::test]
async fn forced_resume_reopens_trading() {
    let orchestrator = Orchestrator::new(EngineConfig::default(), full_adapters(true));

    orchestrator.safety().check_daily_loss_limit(-100.0);
    assert!(orchestrator.safety().is_paused());

    // Violations are fresh, so a polite resume is refused.
    assert!(!orchestrator.safety().resume(false));
    assert!(orchestrator.safety().resume(true));
    assert!(!orchestrator.safety().is_paused());

    // Trading decisions flow again.
    let record = orchestrator.analyze_symbol("BTC/USDT", None).await;
    assert_eq!(record.action, Action::Buy);
}

#[tokio::test]
async fn decision_records_roundtrip_and_explain() {
    let orchestrator = Orchestrator::new(EngineConfig::default(), full_adapters(true));
    let record = orchestrator.analyze_symbol("ETH/USDT", None).await;

    // Serde round-trip equality.
    let json = serde_json::to_string(&record).unwrap();
    let back: quorum_engine::DecisionRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(record, back);

    // The explanation carries the structured fields.
    let text = Orchestrator::format_explanation(&record);
    assert!(text.contains("ETH/USDT"));
    assert!(text.contains("BUY"));
}

#[tokio::test]
async fn multiple_symbols_keep_independent_histories() {
    let orchestrator = Orchestrator::new(EngineConfig::default(), full_adapters(true));

    orchestrator.analyze_symbol("BTC/USDT", None).await;
    orchestrator.analyze_symbol("ETH/USDT", None).await;

    assert!(!orchestrator.get_decisions("BTC/USDT", 10, None).is_empty());
    assert!(!orchestrator.get_decisions("ETH/USDT", 10, None).is_empty());
    assert!(orchestrator.get_decisions("SOL/USDT", 10, None).is_empty());
}
