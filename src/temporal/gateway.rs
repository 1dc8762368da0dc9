// =============================================================================
// Temporal Gateway — the simulation-time boundary for all data reads
// =============================================================================
//
// Every read of time-indexed external data goes through this gateway. A
// read whose requested time (or embedded data timestamp) lies beyond the
// current simulation time is a boundary violation:
//
//   - strict mode  => the call aborts with `EngineError::TemporalViolation`
//   - lax mode     => the violation is logged and the read returns empty
//   - live mode    => the clock tracks the wall clock; price reads are
//                     cached with a 10 second TTL
//
// Every call appends exactly one audit record to a bounded ring (last
// 10,000). Adapter failures never propagate: they surface as empty results
// with the error text recorded in the audit entry's `reason`.
// =============================================================================

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adapters::{DataAdapter, FundamentalsAdapter, NewsAdapter, SentimentAdapter};
use crate::config::GatewayConfig;
use crate::error::{EngineError, Result};
use crate::types::{FinancialReport, NewsItem, OhlcvBar, PriceData};

/// Audit ring capacity.
const MAX_ACCESS_RECORDS: usize = 10_000;

/// Price cache TTL in live mode.
const CACHE_TTL_SECS: u64 = 10;

/// Simulation-time jumps larger than this flush the price cache.
const CACHE_FLUSH_JUMP_SECS: i64 = 60;

// -----------------------------------------------------------------------------
// Public types
// -----------------------------------------------------------------------------

/// Kinds of data that can be requested through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Price,
    Ohlcv,
    Orderbook,
    News,
    Social,
    Financials,
    Sentiment,
    OnChain,
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Price => "price",
            Self::Ohlcv => "ohlcv",
            Self::Orderbook => "orderbook",
            Self::News => "news",
            Self::Social => "social",
            Self::Financials => "financials",
            Self::Sentiment => "sentiment",
            Self::OnChain => "on_chain",
        };
        write!(f, "{label}")
    }
}

/// One entry in the access audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRecord {
    /// Wall-clock time the access was made.
    pub timestamp: DateTime<Utc>,
    pub data_kind: DataKind,
    pub symbol: String,
    pub requested_time: DateTime<Utc>,
    pub simulation_time: DateTime<Utc>,
    pub allowed: bool,
    #[serde(default)]
    pub reason: String,
}

/// Per-kind request counts for `GatewayStats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KindStats {
    pub total: usize,
    pub violations: usize,
}

/// Aggregate gateway statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStats {
    pub mode: String,
    pub simulation_time: DateTime<Utc>,
    pub strict_mode: bool,
    pub total_requests: usize,
    pub violations: usize,
    pub violation_rate: f64,
    pub by_kind: HashMap<String, KindStats>,
    pub cache_size: usize,
}

// -----------------------------------------------------------------------------
// Gateway
// -----------------------------------------------------------------------------

struct CachedPrice {
    data: PriceData,
    stored_at: Instant,
}

struct Inner {
    simulation_time: DateTime<Utc>,
    access_log: VecDeque<AccessRecord>,
    price_cache: HashMap<String, CachedPrice>,
}

/// Temporal data gateway. One instance per backtest tick stream (owned by
/// the orchestrator) or one shared instance in live mode.
pub struct TemporalGateway {
    inner: RwLock<Inner>,
    live: bool,
    strict: bool,
    log_access: bool,
    data_adapter: Option<Arc<dyn DataAdapter>>,
    news_adapter: Option<Arc<dyn NewsAdapter>>,
    fundamentals_adapter: Option<Arc<dyn FundamentalsAdapter>>,
    sentiment_adapter: Option<Arc<dyn SentimentAdapter>>,
}

impl TemporalGateway {
    /// Create a gateway. `simulation_time = None` means live mode: the
    /// boundary tracks the wall clock.
    pub fn new(simulation_time: Option<DateTime<Utc>>, config: &GatewayConfig) -> Self {
        let live = simulation_time.is_none();
        let now = simulation_time.unwrap_or_else(Utc::now);

        info!(
            mode = if live { "live" } else { "simulation" },
            simulation_time = %now.to_rfc3339(),
            strict = config.strict_mode,
            "temporal gateway initialised"
        );

        Self {
            inner: RwLock::new(Inner {
                simulation_time: now,
                access_log: VecDeque::new(),
                price_cache: HashMap::new(),
            }),
            live,
            strict: config.strict_mode,
            log_access: config.log_access,
            data_adapter: None,
            news_adapter: None,
            fundamentals_adapter: None,
            sentiment_adapter: None,
        }
    }

    pub fn with_data_adapter(mut self, adapter: Arc<dyn DataAdapter>) -> Self {
        self.data_adapter = Some(adapter);
        self
    }

    pub fn with_news_adapter(mut self, adapter: Arc<dyn NewsAdapter>) -> Self {
        self.news_adapter = Some(adapter);
        self
    }

    pub fn with_fundamentals_adapter(mut self, adapter: Arc<dyn FundamentalsAdapter>) -> Self {
        self.fundamentals_adapter = Some(adapter);
        self
    }

    pub fn with_sentiment_adapter(mut self, adapter: Arc<dyn SentimentAdapter>) -> Self {
        self.sentiment_adapter = Some(adapter);
        self
    }

    /// Current temporal boundary. Tracks the wall clock in live mode.
    pub fn simulation_time(&self) -> DateTime<Utc> {
        if self.live {
            Utc::now()
        } else {
            self.inner.read().simulation_time
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Move the simulation clock.
    ///
    /// Rejects times ahead of the wall clock in non-live mode. A jump of
    /// more than 60 seconds flushes the price cache, since cached quotes
    /// from another epoch are meaningless.
    pub fn set_simulation_time(&self, new_time: DateTime<Utc>) -> Result<()> {
        if !self.live && new_time > Utc::now() {
            return Err(EngineError::InvalidTime {
                requested: new_time,
            });
        }

        let mut inner = self.inner.write();
        let old = inner.simulation_time;
        inner.simulation_time = new_time;

        if (new_time - old).num_seconds().abs() > CACHE_FLUSH_JUMP_SECS {
            inner.price_cache.clear();
        }

        debug!(
            old = %old.to_rfc3339(),
            new = %new_time.to_rfc3339(),
            "simulation time updated"
        );
        Ok(())
    }

    /// Advance the simulation clock by `delta`.
    pub fn advance_time(&self, delta: Duration) -> Result<()> {
        let next = self.simulation_time() + delta;
        self.set_simulation_time(next)
    }

    // -------------------------------------------------------------------------
    // Boundary enforcement
    // -------------------------------------------------------------------------

    /// Check a request against the boundary. Returns `Ok(true)` when the
    /// request is admissible; records the denial (and aborts in strict
    /// mode) otherwise.
    fn admit(&self, kind: DataKind, symbol: &str, requested: DateTime<Utc>) -> Result<bool> {
        let sim = self.simulation_time();

        if requested > sim {
            let reason = format!(
                "requested time {} is after simulation time {}",
                requested.to_rfc3339(),
                sim.to_rfc3339()
            );
            self.record(kind, symbol, requested, sim, false, reason.clone());

            if self.strict {
                return Err(EngineError::TemporalViolation(reason));
            }
            warn!(kind = %kind, symbol, "temporal violation (lax mode): {reason}");
            return Ok(false);
        }

        Ok(true)
    }

    /// Append an allowed-access audit entry. `reason` carries the adapter
    /// error text when the fetch failed.
    fn note(&self, kind: DataKind, symbol: &str, requested: DateTime<Utc>, reason: String) {
        let sim = self.simulation_time();
        self.record(kind, symbol, requested, sim, true, reason);
    }

    fn record(
        &self,
        kind: DataKind,
        symbol: &str,
        requested: DateTime<Utc>,
        sim: DateTime<Utc>,
        allowed: bool,
        reason: String,
    ) {
        if !self.log_access {
            return;
        }

        let mut inner = self.inner.write();
        inner.access_log.push_back(AccessRecord {
            timestamp: Utc::now(),
            data_kind: kind,
            symbol: symbol.to_string(),
            requested_time: requested,
            simulation_time: sim,
            allowed,
            reason,
        });
        while inner.access_log.len() > MAX_ACCESS_RECORDS {
            inner.access_log.pop_front();
        }
    }

    // -------------------------------------------------------------------------
    // Data access
    // -------------------------------------------------------------------------

    /// Point-in-time price query. Quotes timestamped beyond the boundary are
    /// dropped even when the adapter fails to filter them.
    pub async fn get_price(
        &self,
        symbol: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Option<PriceData>> {
        let sim = self.simulation_time();
        let max_time = as_of.unwrap_or(sim);

        if !self.admit(DataKind::Price, symbol, max_time)? {
            return Ok(None);
        }

        // Live mode: serve cached quotes within the TTL.
        let cache_key = format!("{symbol}:{}", max_time.to_rfc3339());
        if self.live {
            let inner = self.inner.read();
            if let Some(entry) = inner.price_cache.get(&cache_key) {
                if entry.stored_at.elapsed().as_secs() < CACHE_TTL_SECS {
                    return Ok(Some(entry.data.clone()));
                }
            }
        }

        let fetched = match &self.data_adapter {
            Some(adapter) => match adapter.get_price(symbol, max_time).await {
                Ok(price) => {
                    self.note(DataKind::Price, symbol, max_time, String::new());
                    price
                }
                Err(e) => {
                    warn!(symbol, error = %e, "price adapter failed");
                    self.note(DataKind::Price, symbol, max_time, format!("adapter error: {e}"));
                    None
                }
            },
            None => {
                self.note(
                    DataKind::Price,
                    symbol,
                    max_time,
                    "no price adapter configured".to_string(),
                );
                None
            }
        };

        // Drop quotes the adapter should not have returned.
        let result = fetched.filter(|p| p.timestamp <= sim);

        if self.live {
            if let Some(ref price) = result {
                let mut inner = self.inner.write();
                inner.price_cache.insert(
                    cache_key,
                    CachedPrice {
                        data: price.clone(),
                        stored_at: Instant::now(),
                    },
                );
            }
        }

        Ok(result)
    }

    /// Candle history up to the boundary. Candles timestamped beyond it are
    /// filtered out even when the adapter does not filter them itself.
    pub async fn get_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<OhlcvBar>> {
        let sim = self.simulation_time();
        let max_time = as_of.unwrap_or(sim);

        if !self.admit(DataKind::Ohlcv, symbol, max_time)? {
            return Ok(Vec::new());
        }

        let bars = match &self.data_adapter {
            Some(adapter) => match adapter.get_ohlcv(symbol, timeframe, limit, max_time).await {
                Ok(bars) => {
                    self.note(DataKind::Ohlcv, symbol, max_time, String::new());
                    bars
                }
                Err(e) => {
                    warn!(symbol, error = %e, "ohlcv adapter failed");
                    self.note(DataKind::Ohlcv, symbol, max_time, format!("adapter error: {e}"));
                    Vec::new()
                }
            },
            None => {
                self.note(
                    DataKind::Ohlcv,
                    symbol,
                    max_time,
                    "no price adapter configured".to_string(),
                );
                Vec::new()
            }
        };

        Ok(bars.into_iter().filter(|b| b.timestamp <= sim).collect())
    }

    /// News search; only items published at or before the boundary come
    /// back, regardless of what the adapter returns.
    pub async fn search_news(
        &self,
        query: &str,
        symbols: &[String],
        limit: usize,
    ) -> Result<Vec<NewsItem>> {
        let sim = self.simulation_time();

        if !self.admit(DataKind::News, query, sim)? {
            return Ok(Vec::new());
        }

        let items = match &self.news_adapter {
            Some(adapter) => match adapter.search(query, symbols, sim, limit).await {
                Ok(items) => {
                    self.note(DataKind::News, query, sim, String::new());
                    items
                }
                Err(e) => {
                    warn!(query, error = %e, "news adapter failed");
                    self.note(DataKind::News, query, sim, format!("adapter error: {e}"));
                    Vec::new()
                }
            },
            None => {
                self.note(
                    DataKind::News,
                    query,
                    sim,
                    "no news adapter configured".to_string(),
                );
                Vec::new()
            }
        };

        Ok(items.into_iter().filter(|n| n.published_at <= sim).collect())
    }

    /// Financial reports released at or before the boundary. A report whose
    /// period ended long ago but whose release date is still ahead of the
    /// simulation clock must not leak through.
    pub async fn get_financials(
        &self,
        symbol: &str,
        report_type: Option<&str>,
    ) -> Result<Vec<FinancialReport>> {
        let sim = self.simulation_time();

        if !self.admit(DataKind::Financials, symbol, sim)? {
            return Ok(Vec::new());
        }

        let reports = match &self.fundamentals_adapter {
            Some(adapter) => match adapter.get_reports(symbol, report_type, sim).await {
                Ok(reports) => {
                    self.note(DataKind::Financials, symbol, sim, String::new());
                    reports
                }
                Err(e) => {
                    warn!(symbol, error = %e, "fundamentals adapter failed");
                    self.note(DataKind::Financials, symbol, sim, format!("adapter error: {e}"));
                    Vec::new()
                }
            },
            None => {
                self.note(
                    DataKind::Financials,
                    symbol,
                    sim,
                    "no fundamentals adapter configured".to_string(),
                );
                Vec::new()
            }
        };

        Ok(reports.into_iter().filter(|r| r.released_at <= sim).collect())
    }

    /// Pre-computed sentiment score at or before the boundary.
    pub async fn get_sentiment(
        &self,
        symbol: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Option<f64>> {
        let sim = self.simulation_time();
        let max_time = as_of.unwrap_or(sim);

        if !self.admit(DataKind::Sentiment, symbol, max_time)? {
            return Ok(None);
        }

        let score = match &self.sentiment_adapter {
            Some(adapter) => match adapter.get_sentiment(symbol, max_time).await {
                Ok(score) => {
                    self.note(DataKind::Sentiment, symbol, max_time, String::new());
                    score
                }
                Err(e) => {
                    warn!(symbol, error = %e, "sentiment adapter failed");
                    self.note(
                        DataKind::Sentiment,
                        symbol,
                        max_time,
                        format!("adapter error: {e}"),
                    );
                    None
                }
            },
            None => {
                self.note(
                    DataKind::Sentiment,
                    symbol,
                    max_time,
                    "no sentiment adapter configured".to_string(),
                );
                None
            }
        };

        Ok(score)
    }

    // -------------------------------------------------------------------------
    // Audit queries
    // -------------------------------------------------------------------------

    /// Filtered view of the audit trail.
    pub fn access_log(
        &self,
        kind: Option<DataKind>,
        symbol: Option<&str>,
        only_violations: bool,
    ) -> Vec<AccessRecord> {
        let inner = self.inner.read();
        inner
            .access_log
            .iter()
            .filter(|r| kind.map_or(true, |k| r.data_kind == k))
            .filter(|r| symbol.map_or(true, |s| r.symbol == s))
            .filter(|r| !only_violations || !r.allowed)
            .cloned()
            .collect()
    }

    /// Aggregate statistics over the audit trail.
    pub fn statistics(&self) -> GatewayStats {
        let inner = self.inner.read();
        let total = inner.access_log.len();
        let violations = inner.access_log.iter().filter(|r| !r.allowed).count();

        let mut by_kind: HashMap<String, KindStats> = HashMap::new();
        for record in &inner.access_log {
            let entry = by_kind.entry(record.data_kind.to_string()).or_default();
            entry.total += 1;
            if !record.allowed {
                entry.violations += 1;
            }
        }

        GatewayStats {
            mode: if self.live { "live" } else { "simulation" }.to_string(),
            simulation_time: inner.simulation_time,
            strict_mode: self.strict,
            total_requests: total,
            violations,
            violation_rate: if total > 0 {
                violations as f64 / total as f64
            } else {
                0.0
            },
            by_kind,
            cache_size: inner.price_cache.len(),
        }
    }

    /// Clear the audit trail and caches.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.access_log.clear();
        inner.price_cache.clear();
        info!("temporal gateway reset");
    }
}
