// =============================================================================
// Risk Agent — policy validation, market risk, and red-flag screening
// =============================================================================
//
// Three gates feed the approval:
//
//   1. Policy — the compliance adapter's verdict plus the embedded bounds
//      (position size, leverage, blacklist, per-profile caps) that apply
//      even when the external policy server is unreachable.
//   2. Market risk — volatility from the return series (annualized) and
//      liquidity from traded volume, with asset-tier heuristics when no
//      history is available.
//   3. Red flags — scam-adjacent keywords in the debate and technical text.
//
// A compliance adapter failure denies the trade; this agent fails closed.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapters::{ComplianceAdapter, TradeIntent};
use crate::types::{MarketSnapshot, RiskProfile};

/// Keywords that immediately flag an analysis as untrustworthy.
const RED_FLAG_KEYWORDS: &[&str] = &[
    "scam",
    "rug pull",
    "pump and dump",
    "ponzi",
    "extreme risk",
    "unverified",
    "suspicious",
];

const MAJOR_ASSETS: &[&str] = &["BTC", "ETH", "BNB", "SOL", "USDT", "USDC"];
const MID_CAP_ASSETS: &[&str] = &["AVAX", "MATIC", "DOT", "LINK", "UNI", "ATOM"];

// -----------------------------------------------------------------------------
// Public types
// -----------------------------------------------------------------------------

/// Embedded risk bounds applied alongside the compliance verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskBounds {
    pub max_position_size: f64,
    pub max_leverage: f64,
    pub blacklisted_assets: Vec<String>,
}

impl Default for RiskBounds {
    fn default() -> Self {
        Self {
            max_position_size: 15.0,
            max_leverage: 1.0,
            blacklisted_assets: Vec::new(),
        }
    }
}

impl RiskBounds {
    /// Per-profile position cap, in percent of the portfolio.
    pub fn profile_position_cap(profile: RiskProfile) -> f64 {
        match profile {
            RiskProfile::Conservative => 10.0,
            RiskProfile::Balanced => 15.0,
            RiskProfile::Aggressive => 25.0,
        }
    }
}

/// Outcome of the policy gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyCheck {
    pub approved: bool,
    pub checks: HashMap<String, bool>,
    pub compliance_reason: String,
    pub violations: Vec<String>,
}

/// Outcome of the market-risk gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRisk {
    pub level: String,
    pub volatility: String,
    pub volatility_value: f64,
    pub liquidity: String,
    pub liquidity_value: f64,
    pub correlation: f64,
}

/// Full risk verdict for one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub approved: bool,
    pub reason: String,
    pub policy_check: PolicyCheck,
    pub market_risk: MarketRisk,
    pub red_flags: bool,
    pub summary: String,
}

// -----------------------------------------------------------------------------
// Risk Agent
// -----------------------------------------------------------------------------

pub struct RiskAgent {
    compliance: Arc<dyn ComplianceAdapter>,
    bounds: RiskBounds,
}

impl RiskAgent {
    pub fn new(compliance: Arc<dyn ComplianceAdapter>, bounds: RiskBounds) -> Self {
        Self { compliance, bounds }
    }

    /// Assess a symbol under the given profile. `snapshot` supplies price
    /// and volume history for the market-risk calculations when available.
    pub async fn assess(
        &self,
        symbol: &str,
        bull_case: Option<&str>,
        bear_case: Option<&str>,
        technical: Option<&str>,
        risk_profile: RiskProfile,
        snapshot: Option<&MarketSnapshot>,
    ) -> RiskAssessment {
        let policy_check = self.check_policies(symbol, risk_profile).await;
        let market_risk = self.assess_market_risk(symbol, snapshot);
        let red_flags = has_red_flags(&[bull_case, bear_case, technical]);

        let approved = policy_check.approved && !red_flags && market_risk.level != "extreme";
        let reason = pick_reason(&policy_check, &market_risk, red_flags);

        debug!(
            symbol,
            approved,
            red_flags,
            risk_level = %market_risk.level,
            "risk assessment complete"
        );

        let summary = format!(
            "Risk assessment: {}\n\
             Market risk {} (volatility {}, liquidity {})\n\
             Reason: {reason}\n\
             Limits: max position {}%, max leverage {}x",
            if approved { "APPROVED" } else { "REJECTED" },
            market_risk.level.to_uppercase(),
            market_risk.volatility,
            market_risk.liquidity,
            RiskBounds::profile_position_cap(risk_profile),
            self.bounds.max_leverage,
        );

        RiskAssessment {
            approved,
            reason,
            policy_check,
            market_risk,
            red_flags,
            summary,
        }
    }

    /// Compliance verdict plus the embedded bound checks. Pre-trade
    /// analysis screens with size zero; the caps still gate leverage and
    /// the blacklist.
    async fn check_policies(&self, symbol: &str, risk_profile: RiskProfile) -> PolicyCheck {
        let intent = TradeIntent {
            symbol: symbol.to_string(),
            action: "analyze".to_string(),
            size: 0.0,
            leverage: self.bounds.max_leverage,
            risk_profile,
        };

        let verdict = match self.compliance.check_compliance(&intent, risk_profile).await {
            Ok(v) => v,
            Err(e) => {
                warn!(symbol, error = %e, "compliance adapter failed — denying");
                return PolicyCheck {
                    approved: false,
                    checks: HashMap::from([("compliance_reachable".to_string(), false)]),
                    compliance_reason: format!("compliance check failed: {e}"),
                    violations: Vec::new(),
                };
            }
        };

        let mut checks = HashMap::new();
        checks.insert("compliant".to_string(), verdict.compliant);
        checks.insert(
            "position_size_ok".to_string(),
            intent.size <= self.bounds.max_position_size,
        );
        checks.insert(
            "leverage_ok".to_string(),
            intent.leverage <= self.bounds.max_leverage,
        );
        checks.insert(
            "blacklist_ok".to_string(),
            !verdict.violations.iter().any(|v| v == symbol)
                && !self.bounds.blacklisted_assets.iter().any(|b| b == symbol),
        );

        let approved = checks.values().all(|&ok| ok);

        PolicyCheck {
            approved,
            checks,
            compliance_reason: verdict.reason,
            violations: verdict.violations,
        }
    }

    /// Volatility and liquidity classification with heuristic fallbacks
    /// keyed on the asset tier.
    fn assess_market_risk(&self, symbol: &str, snapshot: Option<&MarketSnapshot>) -> MarketRisk {
        let base = symbol.split('/').next().unwrap_or(symbol);

        let (volatility_value, volatility) = match snapshot.filter(|s| s.prices.len() > 1) {
            Some(s) => {
                let value = annualized_volatility(&s.prices);
                (value, volatility_band(value))
            }
            None => {
                if MAJOR_ASSETS.contains(&base) {
                    (45.0, "medium")
                } else if MID_CAP_ASSETS.contains(&base) {
                    (70.0, "high")
                } else {
                    (120.0, "extreme")
                }
            }
        };

        let (liquidity_value, liquidity) = match snapshot.filter(|s| !s.volumes.is_empty()) {
            Some(s) => {
                let avg = s.volumes.iter().sum::<f64>() / s.volumes.len() as f64;
                liquidity_band(avg)
            }
            None => {
                if MAJOR_ASSETS.contains(&base) {
                    (90.0, "very_high")
                } else if MID_CAP_ASSETS.contains(&base) {
                    (75.0, "high")
                } else {
                    (50.0, "medium")
                }
            }
        };

        let level = if volatility == "extreme" || liquidity == "very_low" {
            "high"
        } else if (volatility == "high" || volatility == "medium")
            && (liquidity == "high" || liquidity == "very_high")
        {
            "medium"
        } else if volatility == "low" && (liquidity == "high" || liquidity == "very_high") {
            "low"
        } else {
            "medium"
        };

        MarketRisk {
            level: level.to_string(),
            volatility: volatility.to_string(),
            volatility_value,
            liquidity: liquidity.to_string(),
            liquidity_value,
            correlation: 0.5,
        }
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn has_red_flags(texts: &[Option<&str>]) -> bool {
    texts.iter().flatten().any(|text| {
        let lower = text.to_lowercase();
        RED_FLAG_KEYWORDS.iter().any(|kw| lower.contains(kw))
    })
}

/// Annualized volatility in percent, from daily close returns.
fn annualized_volatility(prices: &[f64]) -> f64 {
    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.is_empty() {
        return 0.0;
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;

    variance.sqrt() * 365.0_f64.sqrt() * 100.0
}

fn volatility_band(value: f64) -> &'static str {
    if value < 30.0 {
        "low"
    } else if value < 60.0 {
        "medium"
    } else if value < 100.0 {
        "high"
    } else {
        "extreme"
    }
}

fn liquidity_band(avg_volume: f64) -> (f64, &'static str) {
    if avg_volume > 1_000_000_000.0 {
        (95.0, "very_high")
    } else if avg_volume > 100_000_000.0 {
        (80.0, "high")
    } else if avg_volume > 10_000_000.0 {
        (60.0, "medium")
    } else if avg_volume > 1_000_000.0 {
        (35.0, "low")
    } else {
        (15.0, "very_low")
    }
}

fn pick_reason(policy: &PolicyCheck, market_risk: &MarketRisk, red_flags: bool) -> String {
    if red_flags {
        return "Red flags detected in analysis".to_string();
    }
    if market_risk.level == "extreme" {
        return "Extreme market risk".to_string();
    }
    if !policy.approved {
        let mut failed: Vec<&str> = policy
            .checks
            .iter()
            .filter(|(_, &ok)| !ok)
            .map(|(name, _)| name.as_str())
            .collect();
        failed.sort_unstable();
        return format!("Policy violations: {}", failed.join(", "));
    }
    "All risk checks passed".to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ComplianceVerdict;
    use async_trait::async_trait;

    struct ApprovingCompliance;

    #[async_trait]
    impl ComplianceAdapter for ApprovingCompliance {
        async fn check_compliance(
            &self,
            _trade: &TradeIntent,
            _risk_profile: RiskProfile,
        ) -> anyhow::Result<ComplianceVerdict> {
            Ok(ComplianceVerdict {
                compliant: true,
                reason: "ok".to_string(),
                violations: Vec::new(),
            })
        }
    }

    struct DenyingCompliance;

    #[async_trait]
    impl ComplianceAdapter for DenyingCompliance {
        async fn check_compliance(
            &self,
            trade: &TradeIntent,
            _risk_profile: RiskProfile,
        ) -> anyhow::Result<ComplianceVerdict> {
            Ok(ComplianceVerdict {
                compliant: false,
                reason: "asset not allowed".to_string(),
                violations: vec![trade.symbol.clone()],
            })
        }
    }

    struct BrokenCompliance;

    #[async_trait]
    impl ComplianceAdapter for BrokenCompliance {
        async fn check_compliance(
            &self,
            _trade: &TradeIntent,
            _risk_profile: RiskProfile,
        ) -> anyhow::Result<ComplianceVerdict> {
            anyhow::bail!("opa unreachable")
        }
    }

    fn agent(compliance: Arc<dyn ComplianceAdapter>) -> RiskAgent {
        RiskAgent::new(compliance, RiskBounds::default())
    }

    fn snapshot_with_history() -> MarketSnapshot {
        MarketSnapshot {
            price: 100.0,
            prices: (0..60).map(|i| 100.0 + (i as f64 * 0.1)).collect(),
            volumes: vec![200_000_000.0; 60],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn clean_analysis_is_approved() {
        let assessment = agent(Arc::new(ApprovingCompliance))
            .assess(
                "BTC/USDT",
                Some("strong uptrend"),
                Some("overbought"),
                Some("rsi neutral"),
                RiskProfile::Conservative,
                Some(&snapshot_with_history()),
            )
            .await;

        assert!(assessment.approved);
        assert!(!assessment.red_flags);
        assert_eq!(assessment.reason, "All risk checks passed");
        assert!(assessment.summary.contains("APPROVED"));
    }

    #[tokio::test]
    async fn red_flag_keywords_deny() {
        let assessment = agent(Arc::new(ApprovingCompliance))
            .assess(
                "SHADY/USDT",
                Some("this looks like a rug pull to me"),
                None,
                None,
                RiskProfile::Aggressive,
                Some(&snapshot_with_history()),
            )
            .await;

        assert!(!assessment.approved);
        assert!(assessment.red_flags);
        assert_eq!(assessment.reason, "Red flags detected in analysis");
    }

    #[tokio::test]
    async fn compliance_denial_names_failed_checks() {
        let assessment = agent(Arc::new(DenyingCompliance))
            .assess(
                "BTC/USDT",
                None,
                None,
                None,
                RiskProfile::Balanced,
                Some(&snapshot_with_history()),
            )
            .await;

        assert!(!assessment.approved);
        assert!(assessment.reason.contains("Policy violations"));
        assert!(assessment.reason.contains("blacklist_ok"));
        assert!(assessment.reason.contains("compliant"));
    }

    #[tokio::test]
    async fn adapter_failure_fails_closed() {
        let assessment = agent(Arc::new(BrokenCompliance))
            .assess("BTC/USDT", None, None, None, RiskProfile::Conservative, None)
            .await;

        assert!(!assessment.approved);
        assert!(assessment.policy_check.compliance_reason.contains("opa unreachable"));
    }

    #[test]
    fn volatility_bands() {
        assert_eq!(volatility_band(10.0), "low");
        assert_eq!(volatility_band(45.0), "medium");
        assert_eq!(volatility_band(80.0), "high");
        assert_eq!(volatility_band(150.0), "extreme");
    }

    #[test]
    fn flat_series_has_zero_volatility() {
        assert_eq!(annualized_volatility(&[100.0; 30]), 0.0);
    }

    #[test]
    fn unknown_asset_without_history_is_extreme_volatility() {
        let agent = agent(Arc::new(ApprovingCompliance));
        let risk = agent.assess_market_risk("OBSCURE/USDT", None);
        assert_eq!(risk.volatility, "extreme");
        // Extreme volatility maps to high overall risk, not extreme.
        assert_eq!(risk.level, "high");
    }

    #[test]
    fn major_asset_without_history_uses_tier_heuristics() {
        let agent = agent(Arc::new(ApprovingCompliance));
        let risk = agent.assess_market_risk("BTC/USDT", None);
        assert_eq!(risk.volatility, "medium");
        assert_eq!(risk.liquidity, "very_high");
        assert_eq!(risk.level, "medium");
    }

    #[test]
    fn profile_caps_are_graded() {
        assert_eq!(RiskBounds::profile_position_cap(RiskProfile::Conservative), 10.0);
        assert_eq!(RiskBounds::profile_position_cap(RiskProfile::Balanced), 15.0);
        assert_eq!(RiskBounds::profile_position_cap(RiskProfile::Aggressive), 25.0);
    }
}
