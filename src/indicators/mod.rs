// =============================================================================
// Technical indicators used by the analyzer agent
// =============================================================================
//
// Latest-value calculations over a close-price history (oldest first). The
// definitions intentionally mirror the production analyzer they were lifted
// from rather than any canonical TA library — see the MACD note in macd.rs.
// =============================================================================

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use atr::average_true_range;
pub use bollinger::{bollinger_bands, BollingerBands};
pub use ema::exponential_moving_average;
pub use macd::{macd, Macd};
pub use rsi::relative_strength_index;
pub use sma::simple_moving_average;
