// =============================================================================
// Analyzer Agent — deterministic technical analysis
// =============================================================================
//
// Computes the indicator set (RSI, MACD, Bollinger Bands, EMAs, SMAs, ATR),
// scans for chart patterns, derives naive support/resistance levels, and
// reduces everything to a technical sentiment contribution in [-1, 1].
//
// Entirely deterministic given the market snapshot; no adapter calls.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::{
    average_true_range, bollinger_bands, exponential_moving_average, macd,
    relative_strength_index, simple_moving_average,
};
use crate::patterns::{detect_patterns, ChartPattern};
use crate::types::MarketSnapshot;

/// The indicator values the analyzer derives from a close-price history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub ema_20: f64,
    pub ema_50: f64,
    pub sma_20: f64,
    pub sma_50: f64,
    pub volume_sma: f64,
    pub atr: f64,
}

/// Support/resistance bands around the current price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SupportResistance {
    pub support_1: f64,
    pub support_2: f64,
    pub resistance_1: f64,
    pub resistance_2: f64,
}

/// Full analyzer output for one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub summary: String,
    pub indicators: IndicatorSet,
    pub patterns: Vec<ChartPattern>,
    pub levels: SupportResistance,
    /// Technical sentiment contribution in [-1, 1].
    pub sentiment: f64,
}

/// Compute the indicator set from a close-price history.
///
/// With fewer than two closes there is nothing to differentiate, so a
/// neutral set anchored on `current_price` comes back instead.
pub fn compute_indicators(prices: &[f64], volumes: &[f64], current_price: f64) -> IndicatorSet {
    if prices.len() < 2 {
        return neutral_indicators(current_price, volumes);
    }

    let rsi = relative_strength_index(prices, 14).unwrap_or(50.0);
    let macd_values = macd(prices, 12, 26);
    let bands = bollinger_bands(prices, 20, 2.0);

    let volume_sma = if volumes.len() >= 20 {
        volumes[volumes.len() - 20..].iter().sum::<f64>() / 20.0
    } else {
        0.0
    };

    IndicatorSet {
        rsi,
        macd: macd_values.map_or(0.0, |m| m.line),
        macd_signal: macd_values.map_or(0.0, |m| m.signal),
        macd_histogram: macd_values.map_or(0.0, |m| m.histogram),
        bb_upper: bands.map_or(current_price * 1.02, |b| b.upper),
        bb_middle: bands.map_or(current_price, |b| b.middle),
        bb_lower: bands.map_or(current_price * 0.98, |b| b.lower),
        ema_20: exponential_moving_average(prices, 20).unwrap_or(current_price),
        ema_50: exponential_moving_average(prices, 50).unwrap_or(current_price),
        sma_20: simple_moving_average(prices, 20).unwrap_or(current_price),
        sma_50: simple_moving_average(prices, 50).unwrap_or(current_price),
        volume_sma,
        atr: average_true_range(prices, 14).unwrap_or(current_price * 0.02),
    }
}

fn neutral_indicators(current_price: f64, volumes: &[f64]) -> IndicatorSet {
    IndicatorSet {
        rsi: 50.0,
        macd: 0.0,
        macd_signal: 0.0,
        macd_histogram: 0.0,
        bb_upper: current_price * 1.02,
        bb_middle: current_price,
        bb_lower: current_price * 0.98,
        ema_20: current_price,
        ema_50: current_price,
        sma_20: current_price,
        sma_50: current_price,
        volume_sma: volumes.first().copied().unwrap_or(0.0),
        atr: current_price * 0.02,
    }
}

/// Reduce an indicator set to a sentiment contribution: overbought leans
/// bearish, oversold leans bullish, everything else scales linearly off
/// RSI distance from 50.
pub fn technical_sentiment(indicators: &IndicatorSet) -> f64 {
    let rsi = indicators.rsi;
    if rsi > 70.0 {
        -0.5
    } else if rsi < 30.0 {
        0.5
    } else {
        (50.0 - rsi) / 100.0
    }
}

/// The analyzer agent itself. Stateless; all inputs arrive per call.
pub struct AnalyzerAgent;

impl AnalyzerAgent {
    pub fn new() -> Self {
        Self
    }

    /// Analyze one symbol from its market snapshot.
    pub fn analyze(&self, symbol: &str, snapshot: &MarketSnapshot) -> AnalysisOutcome {
        let current_price = if snapshot.price > 0.0 {
            snapshot.price
        } else {
            snapshot.prices.last().copied().unwrap_or(0.0)
        };

        let indicators = compute_indicators(&snapshot.prices, &snapshot.volumes, current_price);
        let patterns = detect_patterns(&snapshot.prices);
        let sentiment = technical_sentiment(&indicators);

        let levels = SupportResistance {
            support_1: current_price * 0.95,
            support_2: current_price * 0.90,
            resistance_1: current_price * 1.05,
            resistance_2: current_price * 1.10,
        };

        debug!(
            symbol,
            rsi = indicators.rsi,
            macd = indicators.macd,
            patterns = patterns.len(),
            sentiment,
            "technical analysis complete"
        );

        let summary = render_summary(symbol, &indicators, &patterns, &levels);

        AnalysisOutcome {
            summary,
            indicators,
            patterns,
            levels,
            sentiment,
        }
    }
}

impl Default for AnalyzerAgent {
    fn default() -> Self {
        Self::new()
    }
}

fn render_summary(
    symbol: &str,
    indicators: &IndicatorSet,
    patterns: &[ChartPattern],
    levels: &SupportResistance,
) -> String {
    let rsi_signal = if indicators.rsi > 70.0 {
        "Overbought"
    } else if indicators.rsi < 30.0 {
        "Oversold"
    } else {
        "Neutral"
    };

    let macd_signal = if indicators.macd > 0.0 {
        "Bullish"
    } else if indicators.macd < 0.0 {
        "Bearish"
    } else {
        "Neutral"
    };

    let ma_trend = if indicators.ema_20 > indicators.ema_50 {
        "Bullish crossover"
    } else if indicators.ema_20 < indicators.ema_50 {
        "Bearish crossover"
    } else {
        "Neutral"
    };

    let pattern_lines = if patterns.is_empty() {
        "  - no patterns detected".to_string()
    } else {
        patterns
            .iter()
            .map(|p| format!("  - {p}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Technical analysis for {symbol}:\n\
         Momentum: RSI(14) {:.1} ({rsi_signal}), MACD {:+.4} ({macd_signal})\n\
         Moving averages: EMA20 {:.2}, EMA50 {:.2} ({ma_trend})\n\
         Bollinger: {:.2} / {:.2} / {:.2}\n\
         Support {:.2} / {:.2}, resistance {:.2} / {:.2}\n\
         Patterns:\n{pattern_lines}",
        indicators.rsi,
        indicators.macd,
        indicators.ema_20,
        indicators.ema_50,
        indicators.bb_upper,
        indicators.bb_middle,
        indicators.bb_lower,
        levels.support_1,
        levels.support_2,
        levels.resistance_1,
        levels.resistance_2,
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(prices: Vec<f64>) -> MarketSnapshot {
        MarketSnapshot {
            price: prices.last().copied().unwrap_or(0.0),
            prices,
            volumes: vec![1000.0; 60],
            ..Default::default()
        }
    }

    #[test]
    fn neutral_set_without_history() {
        let set = compute_indicators(&[], &[500.0], 100.0);
        assert_eq!(set.rsi, 50.0);
        assert_eq!(set.macd, 0.0);
        assert!((set.bb_upper - 102.0).abs() < 1e-10);
        assert!((set.bb_lower - 98.0).abs() < 1e-10);
        assert_eq!(set.ema_20, 100.0);
        assert_eq!(set.volume_sma, 500.0);
        assert!((set.atr - 2.0).abs() < 1e-10);
    }

    #[test]
    fn uptrend_reads_overbought_and_bearish_sentiment() {
        let prices: Vec<f64> = (1..=60).map(|x| x as f64).collect();
        let set = compute_indicators(&prices, &[], 60.0);
        assert!(set.rsi > 70.0);
        assert!(set.macd > 0.0);
        assert_eq!(technical_sentiment(&set), -0.5);
    }

    #[test]
    fn downtrend_reads_oversold_and_bullish_sentiment() {
        let prices: Vec<f64> = (1..=60).rev().map(|x| x as f64).collect();
        let set = compute_indicators(&prices, &[], 1.0);
        assert!(set.rsi < 30.0);
        assert_eq!(technical_sentiment(&set), 0.5);
    }

    #[test]
    fn neutral_rsi_scales_linearly() {
        let set = IndicatorSet {
            rsi: 40.0,
            ..compute_indicators(&[], &[], 100.0)
        };
        assert!((technical_sentiment(&set) - 0.1).abs() < 1e-10);
    }

    #[test]
    fn sentiment_is_always_bounded() {
        for rsi in [0.0, 15.0, 29.9, 50.0, 70.1, 100.0] {
            let set = IndicatorSet {
                rsi,
                ..compute_indicators(&[], &[], 100.0)
            };
            let s = technical_sentiment(&set);
            assert!((-1.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn analyze_populates_levels_and_summary() {
        let outcome = AnalyzerAgent::new().analyze("BTC/USDT", &snapshot(vec![100.0; 60]));
        assert!((outcome.levels.support_1 - 95.0).abs() < 1e-10);
        assert!((outcome.levels.resistance_2 - 110.0).abs() < 1e-10);
        assert!(outcome.summary.contains("BTC/USDT"));
        assert!(outcome.summary.contains("RSI"));
        // Flat series consolidates.
        assert!(outcome.patterns.contains(&ChartPattern::Consolidation));
    }

    #[test]
    fn volume_sma_needs_twenty_points() {
        let set = compute_indicators(&[1.0, 2.0, 3.0], &[10.0; 5], 3.0);
        assert_eq!(set.volume_sma, 0.0);
        let set = compute_indicators(&[1.0; 30], &[10.0; 30], 1.0);
        assert!((set.volume_sma - 10.0).abs() < 1e-10);
    }

    #[test]
    fn indicator_set_serialises() {
        let set = compute_indicators(&[1.0, 2.0, 3.0], &[], 3.0);
        let value = serde_json::to_value(&set).unwrap();
        assert!(value.get("rsi").is_some());
        assert!(value.get("bb_middle").is_some());
    }
}
