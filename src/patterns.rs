// =============================================================================
// Chart pattern detection
// =============================================================================
//
// Deterministic pattern scans over a close-price history (oldest first):
//
//   1. Swing points — local maxima/minima with a +/-3 bar window.
//   2. Double top / double bottom — two swings within 2% of each other,
//      confirmed by a 5% move away from the level.
//   3. Head and shoulders (and inverse) — three swings, middle extreme,
//      shoulders within 5% of each other.
//   4. Triangles — slopes of rolling-window highs and lows.
//   5. Breakouts — 2% beyond the 20-bar range (excluding the last 5 bars).
//   6. Trend — linear-regression slope as a percentage of the mean price.
//   7. Consolidation — coefficient of variation below 2% over 10 bars.
//
// The geometric tolerances are deliberately kept from the production system
// these scans were extracted from; they are heuristics, not textbook
// definitions.
// =============================================================================

use serde::{Deserialize, Serialize};

/// A detected chart pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartPattern {
    DoubleTop,
    DoubleBottom,
    HeadAndShoulders,
    InverseHeadAndShoulders,
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
    BreakoutAboveResistance,
    BreakdownBelowSupport,
    StrongUptrend,
    Uptrend,
    Downtrend,
    StrongDowntrend,
    Consolidation,
}

impl std::fmt::Display for ChartPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::DoubleTop => "Double Top (Bearish)",
            Self::DoubleBottom => "Double Bottom (Bullish)",
            Self::HeadAndShoulders => "Head and Shoulders (Bearish)",
            Self::InverseHeadAndShoulders => "Inverse Head and Shoulders (Bullish)",
            Self::AscendingTriangle => "Ascending Triangle (Bullish)",
            Self::DescendingTriangle => "Descending Triangle (Bearish)",
            Self::SymmetricalTriangle => "Symmetrical Triangle (Continuation)",
            Self::BreakoutAboveResistance => "Breakout Above Resistance (Bullish)",
            Self::BreakdownBelowSupport => "Breakdown Below Support (Bearish)",
            Self::StrongUptrend => "Strong Uptrend",
            Self::Uptrend => "Uptrend",
            Self::Downtrend => "Downtrend",
            Self::StrongDowntrend => "Strong Downtrend",
            Self::Consolidation => "Consolidation/Range-bound",
        };
        write!(f, "{label}")
    }
}

/// Run all pattern scans over `prices`. Needs at least 10 closes; shorter
/// histories yield an empty result.
pub fn detect_patterns(prices: &[f64]) -> Vec<ChartPattern> {
    let mut patterns = Vec::new();

    if prices.len() < 10 {
        return patterns;
    }

    let (highs, lows) = swing_points(prices, 3);

    if is_double_top(prices, &highs) {
        patterns.push(ChartPattern::DoubleTop);
    }
    if is_double_bottom(prices, &lows) {
        patterns.push(ChartPattern::DoubleBottom);
    }
    if is_head_and_shoulders(prices, &highs) {
        patterns.push(ChartPattern::HeadAndShoulders);
    }
    if is_inverse_head_and_shoulders(prices, &lows) {
        patterns.push(ChartPattern::InverseHeadAndShoulders);
    }
    if let Some(p) = detect_triangle(prices) {
        patterns.push(p);
    }
    if let Some(p) = detect_breakout(prices) {
        patterns.push(p);
    }
    if let Some(p) = detect_trend(prices) {
        patterns.push(p);
    }
    if is_consolidating(prices) {
        patterns.push(ChartPattern::Consolidation);
    }

    patterns
}

// -----------------------------------------------------------------------------
// Swing points
// -----------------------------------------------------------------------------

/// Indices of local maxima and minima within a +/- `window` bar neighbourhood.
fn swing_points(prices: &[f64], window: usize) -> (Vec<usize>, Vec<usize>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();

    if prices.len() <= 2 * window {
        return (highs, lows);
    }

    for i in window..prices.len() - window {
        let before = &prices[i - window..i];
        let after = &prices[i + 1..i + window + 1];

        if before.iter().all(|&p| prices[i] >= p) && after.iter().all(|&p| prices[i] >= p) {
            highs.push(i);
        }
        if before.iter().all(|&p| prices[i] <= p) && after.iter().all(|&p| prices[i] <= p) {
            lows.push(i);
        }
    }

    (highs, lows)
}

// -----------------------------------------------------------------------------
// Reversal patterns
// -----------------------------------------------------------------------------

fn is_double_top(prices: &[f64], highs: &[usize]) -> bool {
    if highs.len() < 2 {
        return false;
    }
    let peak1 = prices[highs[highs.len() - 2]];
    let peak2 = prices[highs[highs.len() - 1]];

    // Peaks within 2% of each other, price already 5% off the level.
    let similarity = (peak1 - peak2).abs() / peak1;
    similarity < 0.02 && prices[prices.len() - 1] < peak1.min(peak2) * 0.95
}

fn is_double_bottom(prices: &[f64], lows: &[usize]) -> bool {
    if lows.len() < 2 {
        return false;
    }
    let trough1 = prices[lows[lows.len() - 2]];
    let trough2 = prices[lows[lows.len() - 1]];

    let similarity = (trough1 - trough2).abs() / trough1;
    similarity < 0.02 && prices[prices.len() - 1] > trough1.max(trough2) * 1.05
}

fn is_head_and_shoulders(prices: &[f64], highs: &[usize]) -> bool {
    if highs.len() < 3 {
        return false;
    }
    let left = prices[highs[highs.len() - 3]];
    let head = prices[highs[highs.len() - 2]];
    let right = prices[highs[highs.len() - 1]];

    // Head above both shoulders, shoulders within 5% of each other.
    head > left && head > right && (left - right).abs() / left < 0.05
}

fn is_inverse_head_and_shoulders(prices: &[f64], lows: &[usize]) -> bool {
    if lows.len() < 3 {
        return false;
    }
    let left = prices[lows[lows.len() - 3]];
    let head = prices[lows[lows.len() - 2]];
    let right = prices[lows[lows.len() - 1]];

    head < left && head < right && (left - right).abs() / left < 0.05
}

// -----------------------------------------------------------------------------
// Triangles, breakouts, trend
// -----------------------------------------------------------------------------

fn detect_triangle(prices: &[f64]) -> Option<ChartPattern> {
    if prices.len() < 20 {
        return None;
    }
    let recent = &prices[prices.len() - 20..];

    // Rolling 5-bar envelope of highs and lows, then the slope of each.
    let rolling_highs: Vec<f64> = (0..recent.len())
        .map(|i| {
            let lo = i.saturating_sub(2);
            let hi = (i + 3).min(recent.len());
            recent[lo..hi].iter().cloned().fold(f64::MIN, f64::max)
        })
        .collect();
    let rolling_lows: Vec<f64> = (0..recent.len())
        .map(|i| {
            let lo = i.saturating_sub(2);
            let hi = (i + 3).min(recent.len());
            recent[lo..hi].iter().cloned().fold(f64::MAX, f64::min)
        })
        .collect();

    let highs_slope = regression_slope(&rolling_highs);
    let lows_slope = regression_slope(&rolling_lows);

    // Flat top + rising bottom.
    if highs_slope.abs() < 0.001 && lows_slope > 0.001 {
        return Some(ChartPattern::AscendingTriangle);
    }
    // Falling top + flat bottom.
    if highs_slope < -0.001 && lows_slope.abs() < 0.001 {
        return Some(ChartPattern::DescendingTriangle);
    }
    // Converging trend lines.
    if highs_slope < -0.001 && lows_slope > 0.001 {
        return Some(ChartPattern::SymmetricalTriangle);
    }

    None
}

fn detect_breakout(prices: &[f64]) -> Option<ChartPattern> {
    if prices.len() < 20 {
        return None;
    }
    let recent = &prices[prices.len() - 20..];
    let current = prices[prices.len() - 1];

    // Range established by the first 15 of the last 20 bars.
    let base = &recent[..recent.len() - 5];
    let recent_high = base.iter().cloned().fold(f64::MIN, f64::max);
    let recent_low = base.iter().cloned().fold(f64::MAX, f64::min);

    if current > recent_high * 1.02 {
        return Some(ChartPattern::BreakoutAboveResistance);
    }
    if current < recent_low * 0.98 {
        return Some(ChartPattern::BreakdownBelowSupport);
    }

    None
}

fn detect_trend(prices: &[f64]) -> Option<ChartPattern> {
    if prices.len() < 10 {
        return None;
    }

    let slope = regression_slope(prices);
    let avg = prices.iter().sum::<f64>() / prices.len() as f64;
    if avg == 0.0 {
        return None;
    }
    let slope_pct = slope / avg * 100.0;

    if slope_pct > 0.5 {
        Some(ChartPattern::StrongUptrend)
    } else if slope_pct > 0.1 {
        Some(ChartPattern::Uptrend)
    } else if slope_pct < -0.5 {
        Some(ChartPattern::StrongDowntrend)
    } else if slope_pct < -0.1 {
        Some(ChartPattern::Downtrend)
    } else {
        None
    }
}

fn is_consolidating(prices: &[f64]) -> bool {
    if prices.len() < 10 {
        return false;
    }
    let recent = &prices[prices.len() - 10..];
    let avg = recent.iter().sum::<f64>() / recent.len() as f64;
    if avg == 0.0 {
        return false;
    }
    let variance = recent.iter().map(|p| (p - avg).powi(2)).sum::<f64>() / recent.len() as f64;

    variance.sqrt() / avg < 0.02
}

/// Least-squares slope of `values` against their indices.
fn regression_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return 0.0;
    }
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        cov += dx * (y - y_mean);
        var += dx * dx;
    }

    if var == 0.0 {
        0.0
    } else {
        cov / var
    }
}
