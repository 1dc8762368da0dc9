// =============================================================================
// Safety Enforcer — runtime safety checks and auto-pause triggers
// =============================================================================
//
// Auto-pause triggers:
//   1. Consecutive losses     — N losing trades in a row (default 3).
//   2. API error burst        — more than M errors in 60 s (default 5).
//   3. Sentiment drop         — sentiment below the floor (default -0.3).
//   4. High slippage / MEV    — fill deviates from the expected price by
//                               more than the threshold (default 1%).
//   5. Daily loss limit       — cumulative daily PnL below -L (default 10).
//   6. Privacy breach         — PII patterns found in agent transcripts.
//
// The enforcer is a single-writer event accumulator; readers always get a
// copy-on-read snapshot. It never rewinds an in-flight tick — the decide
// node observes the paused flag and overrides the decision to `hold`.
// =============================================================================

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::SafetyConfig;
use crate::types::{Message, Severity, TradeOutcome};

/// Retained trade results and API errors (oldest evicted first).
const MAX_EVENT_HISTORY: usize = 100;

/// Window for the API-error-burst trigger.
const ERROR_BURST_WINDOW_SECS: i64 = 60;

/// Violations younger than this block a non-forced resume.
const RESUME_COOLDOWN_MINS: i64 = 30;

// -----------------------------------------------------------------------------
// Public types
// -----------------------------------------------------------------------------

/// The rule that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyTrigger {
    ConsecutiveLosses,
    ApiErrorBurst,
    SentimentDrop,
    HighSlippage,
    DailyLossLimit,
    PrivacyBreach,
}

impl std::fmt::Display for SafetyTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::ConsecutiveLosses => "consecutive_losses",
            Self::ApiErrorBurst => "api_error_burst",
            Self::SentimentDrop => "sentiment_drop",
            Self::HighSlippage => "high_slippage",
            Self::DailyLossLimit => "daily_loss_limit",
            Self::PrivacyBreach => "privacy_breach",
        };
        write!(f, "{label}")
    }
}

/// A safety rule that fired, with enough context to audit it later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyViolation {
    pub trigger: SafetyTrigger,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub auto_pause: bool,
}

/// Copy-on-read snapshot of the enforcer for status surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyStatus {
    pub paused: bool,
    pub pause_reason: Option<String>,
    pub recent_violations: usize,
    pub total_violations: usize,
    pub consecutive_losses: u32,
    pub api_errors_last_minute: usize,
}

// -----------------------------------------------------------------------------
// Internal mutable state (behind RwLock)
// -----------------------------------------------------------------------------

struct TradeEntry {
    at: DateTime<Utc>,
    outcome: TradeOutcome,
}

struct ApiErrorEntry {
    at: DateTime<Utc>,
    #[allow(dead_code)]
    message: String,
}

struct Inner {
    recent_trades: VecDeque<TradeEntry>,
    api_errors: VecDeque<ApiErrorEntry>,
    violations: Vec<SafetyViolation>,
    paused: bool,
    pause_reason: Option<String>,
}

// -----------------------------------------------------------------------------
// Safety Enforcer
// -----------------------------------------------------------------------------

/// Runtime safety enforcement with auto-pause.
pub struct SafetyEnforcer {
    state: RwLock<Inner>,
    max_consecutive_losses: u32,
    max_api_errors_per_min: u32,
    min_sentiment: f64,
    max_slippage_pct: f64,
    max_daily_loss: f64,
    pii_patterns: Vec<String>,
}

impl SafetyEnforcer {
    pub fn new(config: &SafetyConfig) -> Self {
        info!(
            max_consecutive_losses = config.max_consecutive_losses,
            max_api_errors_per_min = config.max_api_errors_per_min,
            min_sentiment = config.min_sentiment,
            max_slippage_pct = config.max_slippage_pct,
            max_daily_loss = config.max_daily_loss,
            "safety enforcer initialised"
        );

        Self {
            state: RwLock::new(Inner {
                recent_trades: VecDeque::new(),
                api_errors: VecDeque::new(),
                violations: Vec::new(),
                paused: false,
                pause_reason: None,
            }),
            max_consecutive_losses: config.max_consecutive_losses,
            max_api_errors_per_min: config.max_api_errors_per_min,
            min_sentiment: config.min_sentiment,
            max_slippage_pct: config.max_slippage_pct,
            max_daily_loss: config.max_daily_loss,
            pii_patterns: config.pii_patterns.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Event recording
    // -------------------------------------------------------------------------

    /// Record the outcome of a completed trade.
    pub fn record_trade_result(&self, outcome: TradeOutcome) {
        let mut s = self.state.write();
        s.recent_trades.push_back(TradeEntry {
            at: Utc::now(),
            outcome,
        });
        while s.recent_trades.len() > MAX_EVENT_HISTORY {
            s.recent_trades.pop_front();
        }
    }

    /// Record an API error for burst detection. Old entries expire from the
    /// 60 s window but stay in the bounded history ring.
    pub fn record_api_error(&self, message: impl Into<String>) {
        let mut s = self.state.write();
        s.api_errors.push_back(ApiErrorEntry {
            at: Utc::now(),
            message: message.into(),
        });
        while s.api_errors.len() > MAX_EVENT_HISTORY {
            s.api_errors.pop_front();
        }
    }

    // -------------------------------------------------------------------------
    // Trigger rules
    // -------------------------------------------------------------------------

    /// Trip when the last N trades all lost money.
    pub fn check_consecutive_losses(&self) -> Option<SafetyViolation> {
        let count = {
            let s = self.state.read();
            if s.recent_trades.len() < self.max_consecutive_losses as usize {
                return None;
            }
            Self::count_trailing_losses(&s)
        };

        if count >= self.max_consecutive_losses {
            return Some(self.register(SafetyViolation {
                trigger: SafetyTrigger::ConsecutiveLosses,
                message: format!("{count} consecutive losing trades detected"),
                severity: Severity::Critical,
                timestamp: Utc::now(),
                auto_pause: true,
            }));
        }
        None
    }

    /// Trip when more than M API errors landed inside the last 60 s.
    pub fn check_api_error_burst(&self) -> Option<SafetyViolation> {
        let recent = {
            let s = self.state.read();
            Self::count_recent_errors(&s)
        };

        if recent > self.max_api_errors_per_min as usize {
            return Some(self.register(SafetyViolation {
                trigger: SafetyTrigger::ApiErrorBurst,
                message: format!("{recent} API errors in the last minute"),
                severity: Severity::Critical,
                timestamp: Utc::now(),
                auto_pause: true,
            }));
        }
        None
    }

    /// Trip when sentiment falls below the configured floor.
    pub fn check_sentiment_drop(&self, sentiment: f64) -> Option<SafetyViolation> {
        if sentiment < self.min_sentiment {
            return Some(self.register(SafetyViolation {
                trigger: SafetyTrigger::SentimentDrop,
                message: format!(
                    "sentiment dropped to {sentiment:.2} (threshold {:.2})",
                    self.min_sentiment
                ),
                severity: Severity::Warning,
                timestamp: Utc::now(),
                auto_pause: true,
            }));
        }
        None
    }

    /// Trip when the fill price deviates from the expected price by more
    /// than the slippage threshold (sandwich / MEV signature).
    pub fn check_mev_attack(&self, expected_price: f64, actual_price: f64) -> Option<SafetyViolation> {
        if expected_price == 0.0 {
            return None;
        }

        let slippage = ((actual_price - expected_price) / expected_price).abs() * 100.0;
        if slippage > self.max_slippage_pct {
            return Some(self.register(SafetyViolation {
                trigger: SafetyTrigger::HighSlippage,
                message: format!(
                    "slippage {slippage:.2}% exceeds {:.2}% threshold",
                    self.max_slippage_pct
                ),
                severity: Severity::Critical,
                timestamp: Utc::now(),
                auto_pause: true,
            }));
        }
        None
    }

    /// Trip when cumulative daily PnL breaches the loss limit.
    pub fn check_daily_loss_limit(&self, current_pnl: f64) -> Option<SafetyViolation> {
        if current_pnl < -self.max_daily_loss {
            return Some(self.register(SafetyViolation {
                trigger: SafetyTrigger::DailyLossLimit,
                message: format!(
                    "daily loss {:.2} exceeds limit {:.2}",
                    current_pnl.abs(),
                    self.max_daily_loss
                ),
                severity: Severity::Critical,
                timestamp: Utc::now(),
                auto_pause: true,
            }));
        }
        None
    }

    /// Trip when a configured PII pattern shows up in agent transcripts.
    pub fn check_privacy_breach(&self, messages: &[Message]) -> Option<SafetyViolation> {
        for msg in messages {
            let content = msg.content.to_lowercase();
            for pattern in &self.pii_patterns {
                if content.contains(pattern.as_str()) {
                    return Some(self.register(SafetyViolation {
                        trigger: SafetyTrigger::PrivacyBreach,
                        message: format!("PII pattern '{pattern}' detected in messages"),
                        severity: Severity::Critical,
                        timestamp: Utc::now(),
                        auto_pause: true,
                    }));
                }
            }
        }
        None
    }

    /// Run every rule in one sweep; optional inputs skip their checks.
    pub fn run_all_checks(
        &self,
        sentiment: Option<f64>,
        daily_pnl: Option<f64>,
        messages: Option<&[Message]>,
    ) -> Vec<SafetyViolation> {
        let mut fired = Vec::new();

        if let Some(v) = self.check_consecutive_losses() {
            fired.push(v);
        }
        if let Some(v) = self.check_api_error_burst() {
            fired.push(v);
        }
        if let Some(s) = sentiment {
            if let Some(v) = self.check_sentiment_drop(s) {
                fired.push(v);
            }
        }
        if let Some(pnl) = daily_pnl {
            if let Some(v) = self.check_daily_loss_limit(pnl) {
                fired.push(v);
            }
        }
        if let Some(msgs) = messages {
            if let Some(v) = self.check_privacy_breach(msgs) {
                fired.push(v);
            }
        }

        fired
    }

    // -------------------------------------------------------------------------
    // Pause & resume
    // -------------------------------------------------------------------------

    pub fn is_paused(&self) -> bool {
        self.state.read().paused
    }

    pub fn pause_reason(&self) -> Option<String> {
        self.state.read().pause_reason.clone()
    }

    /// Resume after a pause.
    ///
    /// Refuses while any violation is younger than 30 minutes, unless
    /// `force` is set.
    pub fn resume(&self, force: bool) -> bool {
        if !force {
            let cutoff = Utc::now() - Duration::minutes(RESUME_COOLDOWN_MINS);
            let recent = {
                let s = self.state.read();
                s.violations.iter().filter(|v| v.timestamp > cutoff).count()
            };

            if recent > 0 {
                warn!(
                    recent_violations = recent,
                    "cannot resume: recent violations present (use force to override)"
                );
                return false;
            }
        }

        let mut s = self.state.write();
        s.paused = false;
        s.pause_reason = None;
        info!("trading resumed");
        true
    }

    /// Snapshot for status surfaces.
    pub fn status(&self) -> SafetyStatus {
        let s = self.state.read();
        let hour_ago = Utc::now() - Duration::hours(1);

        SafetyStatus {
            paused: s.paused,
            pause_reason: s.pause_reason.clone(),
            recent_violations: s.violations.iter().filter(|v| v.timestamp > hour_ago).count(),
            total_violations: s.violations.len(),
            consecutive_losses: Self::count_trailing_losses(&s),
            api_errors_last_minute: Self::count_recent_errors(&s),
        }
    }

    /// Current run of trailing losses (resets to 0 on any `pnl >= 0` trade).
    pub fn consecutive_losses(&self) -> u32 {
        Self::count_trailing_losses(&self.state.read())
    }

    /// Drop all recorded events and violations (does not unpause).
    pub fn clear_history(&self) {
        let mut s = self.state.write();
        s.recent_trades.clear();
        s.api_errors.clear();
        s.violations.clear();
        info!("safety history cleared");
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Store a fired violation and auto-pause when it demands it.
    fn register(&self, violation: SafetyViolation) -> SafetyViolation {
        let mut s = self.state.write();
        s.violations.push(violation.clone());

        if violation.auto_pause && !s.paused {
            s.paused = true;
            s.pause_reason = Some(violation.message.clone());
            error!(
                trigger = %violation.trigger,
                reason = %violation.message,
                "AUTO-PAUSE triggered — trading halted until manual review"
            );
        }

        violation
    }

    fn count_trailing_losses(s: &Inner) -> u32 {
        let mut count = 0;
        for entry in s.recent_trades.iter().rev() {
            if entry.outcome.pnl < 0.0 {
                count += 1;
            } else {
                break;
            }
        }
        count
    }

    fn count_recent_errors(s: &Inner) -> usize {
        let cutoff = Utc::now() - Duration::seconds(ERROR_BURST_WINDOW_SECS);
        s.api_errors.iter().filter(|e| e.at > cutoff).count()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SafetyConfig;

    fn enforcer() -> SafetyEnforcer {
        SafetyEnforcer::new(&SafetyConfig::default())
    }

    fn losing_trade(pnl: f64) -> TradeOutcome {
        TradeOutcome {
            success: false,
            pnl,
            slippage: 0.0,
        }
    }

    #[test]
    fn three_losses_trip_the_breaker_and_pause() {
        let e = enforcer();
        for _ in 0..3 {
            e.record_trade_result(losing_trade(-5.0));
        }

        let violation = e.check_consecutive_losses().expect("should fire");
        assert_eq!(violation.trigger, SafetyTrigger::ConsecutiveLosses);
        assert_eq!(violation.severity, Severity::Critical);
        assert!(violation.auto_pause);
        assert!(e.is_paused());
        assert!(e.pause_reason().is_some());
    }

    #[test]
    fn winning_trade_resets_the_loss_run() {
        let e = enforcer();
        e.record_trade_result(losing_trade(-5.0));
        e.record_trade_result(losing_trade(-5.0));
        e.record_trade_result(TradeOutcome {
            success: true,
            pnl: 0.0,
            slippage: 0.0,
        });

        assert_eq!(e.consecutive_losses(), 0);
        assert!(e.check_consecutive_losses().is_none());
        assert!(!e.is_paused());
    }

    #[test]
    fn no_trigger_below_the_threshold() {
        let e = enforcer();
        e.record_trade_result(losing_trade(-1.0));
        e.record_trade_result(losing_trade(-1.0));
        assert!(e.check_consecutive_losses().is_none());
    }

    #[test]
    fn api_error_burst_trips() {
        let e = enforcer();
        for i in 0..6 {
            e.record_api_error(format!("timeout {i}"));
        }
        let violation = e.check_api_error_burst().expect("should fire");
        assert_eq!(violation.trigger, SafetyTrigger::ApiErrorBurst);
        assert!(e.is_paused());
    }

    #[test]
    fn five_errors_do_not_trip() {
        let e = enforcer();
        for i in 0..5 {
            e.record_api_error(format!("timeout {i}"));
        }
        assert!(e.check_api_error_burst().is_none());
    }

    #[test]
    fn sentiment_drop_is_a_warning_but_pauses() {
        let e = enforcer();
        let violation = e.check_sentiment_drop(-0.5).expect("should fire");
        assert_eq!(violation.severity, Severity::Warning);
        assert!(violation.auto_pause);
        assert!(e.is_paused());

        let e2 = enforcer();
        assert!(e2.check_sentiment_drop(-0.2).is_none());
    }

    #[test]
    fn slippage_beyond_one_percent_trips() {
        let e = enforcer();
        assert!(e.check_mev_attack(100.0, 100.5).is_none());
        let violation = e.check_mev_attack(100.0, 102.0).expect("should fire");
        assert_eq!(violation.trigger, SafetyTrigger::HighSlippage);
        // Zero expected price never divides.
        assert!(e.check_mev_attack(0.0, 50.0).is_none());
    }

    #[test]
    fn daily_loss_limit_trips() {
        let e = enforcer();
        assert!(e.check_daily_loss_limit(-5.0).is_none());
        let violation = e.check_daily_loss_limit(-15.0).expect("should fire");
        assert_eq!(violation.trigger, SafetyTrigger::DailyLossLimit);
        assert!(e.is_paused());
    }

    #[test]
    fn privacy_breach_in_transcript_trips() {
        let e = enforcer();
        let messages = vec![
            Message::new("bull", "strong uptrend, buy now"),
            Message::new("researcher", "leaked api key found in the repo"),
        ];
        let violation = e.check_privacy_breach(&messages).expect("should fire");
        assert_eq!(violation.trigger, SafetyTrigger::PrivacyBreach);
        assert!(violation.message.contains("api key"));
    }

    #[test]
    fn run_all_checks_collects_everything() {
        let e = enforcer();
        for _ in 0..3 {
            e.record_trade_result(losing_trade(-5.0));
        }
        let fired = e.run_all_checks(Some(-0.9), Some(-50.0), None);
        let triggers: Vec<SafetyTrigger> = fired.iter().map(|v| v.trigger).collect();
        assert!(triggers.contains(&SafetyTrigger::ConsecutiveLosses));
        assert!(triggers.contains(&SafetyTrigger::SentimentDrop));
        assert!(triggers.contains(&SafetyTrigger::DailyLossLimit));
    }

    #[test]
    fn resume_refuses_after_recent_violation() {
        let e = enforcer();
        e.check_sentiment_drop(-0.9);
        assert!(e.is_paused());

        // The violation is seconds old — a plain resume must refuse.
        assert!(!e.resume(false));
        assert!(e.is_paused());

        // Forced resume clears the pause unconditionally.
        assert!(e.resume(true));
        assert!(!e.is_paused());
        assert!(e.pause_reason().is_none());
    }

    #[test]
    fn status_snapshot_reflects_state() {
        let e = enforcer();
        e.record_trade_result(losing_trade(-1.0));
        e.record_api_error("boom");
        e.check_sentiment_drop(-0.9);

        let status = e.status();
        assert!(status.paused);
        assert_eq!(status.total_violations, 1);
        assert_eq!(status.recent_violations, 1);
        assert_eq!(status.consecutive_losses, 1);
        assert_eq!(status.api_errors_last_minute, 1);
    }

    #[test]
    fn event_rings_are_bounded() {
        let e = enforcer();
        for i in 0..(MAX_EVENT_HISTORY + 20) {
            e.record_api_error(format!("err {i}"));
            e.record_trade_result(TradeOutcome {
                success: true,
                pnl: 1.0,
                slippage: 0.0,
            });
        }
        let s = e.state.read();
        assert_eq!(s.api_errors.len(), MAX_EVENT_HISTORY);
        assert_eq!(s.recent_trades.len(), MAX_EVENT_HISTORY);
    }

    #[test]
    fn clear_history_keeps_pause_state() {
        let e = enforcer();
        e.check_sentiment_drop(-0.9);
        e.clear_history();
        assert!(e.is_paused(), "clearing history must not silently unpause");
        assert_eq!(e.status().total_violations, 0);
    }
}
