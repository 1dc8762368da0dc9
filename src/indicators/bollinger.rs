// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band is the trailing SMA; upper and lower bands sit `std_mult`
// population standard deviations away.
// =============================================================================

use super::ema::mean;

/// The three Bollinger band levels.
#[derive(Debug, Clone, Copy)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Compute Bollinger Bands over the trailing `period` closes.
///
/// # Edge cases
/// - empty input or `period == 0` => `None`
/// - fewer closes than `period` => bands pinned to ±2% of the last close
pub fn bollinger_bands(closes: &[f64], period: usize, std_mult: f64) -> Option<BollingerBands> {
    if closes.is_empty() || period == 0 {
        return None;
    }

    let last = closes[closes.len() - 1];
    if closes.len() < period {
        return Some(BollingerBands {
            upper: last * 1.02,
            middle: last,
            lower: last * 0.98,
        });
    }

    let window = &closes[closes.len() - period..];
    let middle = mean(window);
    let variance = window.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    Some(BollingerBands {
        upper: middle + std_mult * std_dev,
        middle,
        lower: middle - std_mult * std_dev,
    })
}
