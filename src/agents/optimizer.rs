// =============================================================================
// Optimizer Agent — position sizing via adapter or half-Kelly fallback
// =============================================================================
//
// Consults the portfolio-optimization adapter when one is attached
// (quantum annealer, mean-variance service, whatever). Without one — or
// when it fails — a classical half-Kelly approximation takes over:
//
//   win_rate = clamp(0.5 + 0.2 * signal, 0.3, 0.7)
//   kelly    = (win_rate * avg_win - (1 - win_rate) * avg_loss) / avg_win
//   size     = clamp(kelly / 2, 0, 0.10)        // half-Kelly, 10% cap
//
// Confidence starts from signal strength, gains from risk approval, and
// shrinks under high volatility.
// =============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapters::{OptimizerAdapter, Portfolio};
use crate::agents::risk::RiskAssessment;
use crate::types::Action;

const AVG_WIN: f64 = 1.03;
const AVG_LOSS: f64 = 0.98;
const MAX_POSITION_FRACTION: f64 = 0.10;

/// Optimizer output for one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub summary: String,
    pub action: Action,
    /// Portfolio fraction to allocate, in [0, 0.10] for the classical path.
    pub size: f64,
    pub confidence: f64,
    pub method: String,
}

/// Sizes positions from the debate signal and the risk verdict.
pub struct OptimizerAgent {
    adapter: Option<Arc<dyn OptimizerAdapter>>,
}

impl OptimizerAgent {
    pub fn new(adapter: Option<Arc<dyn OptimizerAdapter>>) -> Self {
        Self { adapter }
    }

    /// Produce an `{action, size, confidence}` recommendation. The bear
    /// score is expected to be negative; the net signal is their sum.
    pub async fn optimize(
        &self,
        symbol: &str,
        bull_score: f64,
        bear_score: f64,
        risk: Option<&RiskAssessment>,
        portfolio: &Portfolio,
    ) -> OptimizationResult {
        let signal = bull_score + bear_score;

        let (action, size, method) = match &self.adapter {
            Some(adapter) => match adapter.optimize_portfolio(symbol, signal, portfolio).await {
                Ok(outcome) => (outcome.action, outcome.size, "adapter".to_string()),
                Err(e) => {
                    warn!(symbol, error = %e, "optimizer adapter failed — classical fallback");
                    let (action, size) = classical_optimize(signal);
                    (action, size, "classical".to_string())
                }
            },
            None => {
                let (action, size) = classical_optimize(signal);
                (action, size, "classical".to_string())
            }
        };

        let confidence = compute_confidence(signal, risk);

        debug!(
            symbol,
            signal,
            action = %action,
            size,
            confidence,
            method = %method,
            "portfolio optimization complete"
        );

        let summary = format!(
            "Portfolio optimization for {symbol}: signal {signal:+.2}, recommended \
             {} at {:.2}% of portfolio, confidence {:.0}% ({method})",
            action.to_string().to_uppercase(),
            size * 100.0,
            confidence * 100.0,
        );

        OptimizationResult {
            summary,
            action,
            size,
            confidence,
            method,
        }
    }
}

/// Half-Kelly sizing from the net signal.
pub(crate) fn classical_optimize(signal: f64) -> (Action, f64) {
    let win_rate = (0.5 + signal * 0.2).clamp(0.3, 0.7);
    let kelly = (win_rate * AVG_WIN - (1.0 - win_rate) * AVG_LOSS) / AVG_WIN;
    let size = (kelly / 2.0).clamp(0.0, MAX_POSITION_FRACTION);

    let action = if signal > 0.3 {
        Action::Buy
    } else if signal < -0.3 {
        Action::Sell
    } else {
        Action::Hold
    };

    (action, size)
}

/// Confidence from signal strength, risk approval, and volatility.
fn compute_confidence(signal: f64, risk: Option<&RiskAssessment>) -> f64 {
    let mut confidence = signal.abs() * 0.5;

    if let Some(risk) = risk {
        if risk.approved {
            confidence += 0.3;
        }
        if risk.market_risk.volatility == "high" || risk.market_risk.volatility == "extreme" {
            confidence *= 0.7;
        }
    }

    confidence.clamp(0.0, 1.0)
}
