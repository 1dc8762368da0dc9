// =============================================================================
// Relative Strength Index (RSI) — simple-average variant
// =============================================================================
//
// Measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price deltas from consecutive closes.
// Step 2 — Split deltas into gains and losses.
// Step 3 — Average the gains and losses over the last `period` deltas
//          (plain means, not Wilder smoothing).
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Thresholds:  RSI > 70 => OVERBOUGHT,  RSI < 30 => OVERSOLD.
// =============================================================================

/// Compute the latest RSI value for `closes` over `period`.
///
/// # Edge cases
/// - empty input or `period == 0` => `None`
/// - fewer than `period + 1` closes => neutral 50.0
/// - zero average loss (no down moves in the window) => 100.0
pub fn relative_strength_index(closes: &[f64], period: usize) -> Option<f64> {
    if closes.is_empty() || period == 0 {
        return None;
    }
    if closes.len() < period + 1 {
        return Some(50.0);
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let window = &deltas[deltas.len() - period..];

    let (sum_gain, sum_loss) = window.iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
        if d > 0.0 {
            (g + d, l)
        } else {
            (g, l - d)
        }
    });

    let avg_gain = sum_gain / period as f64;
    let avg_loss = sum_loss / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}
