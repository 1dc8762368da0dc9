// =============================================================================
// Average True Range (ATR) — close-to-close variant
// =============================================================================
//
// Volatility estimate from the mean absolute close-to-close move over the
// trailing `period`. Works from the close series alone, so it is usable
// even when the data source provides no high/low columns.
// =============================================================================

use super::ema::mean;

/// Compute the latest ATR value for `closes` over `period`.
///
/// # Edge cases
/// - empty input or `period == 0` => `None`
/// - a single close => 2% of that close (volatility guess)
/// - fewer than `period` moves => mean of all available moves
pub fn average_true_range(closes: &[f64], period: usize) -> Option<f64> {
    if closes.is_empty() || period == 0 {
        return None;
    }
    if closes.len() < 2 {
        return Some(closes[0] * 0.02);
    }

    let moves: Vec<f64> = closes.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    if moves.len() < period {
        return Some(mean(&moves));
    }
    Some(mean(&moves[moves.len() - period..]))
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_on_empty_input() {
        assert!(average_true_range(&[], 14).is_none());
    }

    #[test]
    fn single_close_estimates_two_percent() {
        let atr = average_true_range(&[200.0], 14).unwrap();
        assert!((atr - 4.0).abs() < 1e-10);
    }

    #[test]
    fn flat_series_has_zero_range() {
        let closes = vec![100.0; 30];
        let atr = average_true_range(&closes, 14).unwrap();
        assert!(atr.abs() < 1e-10);
    }

    #[test]
    fn constant_step_series() {
        // Every move is exactly 2.0.
        let closes: Vec<f64> = (0..30).map(|x| (x * 2) as f64).collect();
        let atr = average_true_range(&closes, 14).unwrap();
        assert!((atr - 2.0).abs() < 1e-10);
    }
}
