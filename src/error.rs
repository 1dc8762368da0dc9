// =============================================================================
// Engine errors — the only failures ever surfaced to callers
// =============================================================================
//
// Task-level errors never escape the research executor, and node-level
// failures never escape the orchestrator; both are converted into structured
// results with an `error` field. The variants below are the exceptions:
// temporal violations in strict mode and pre-run look-ahead detection abort
// the caller directly.
// =============================================================================

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the decision engine core.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A data read crossed the simulation-time boundary while the gateway was
    /// in strict mode.
    #[error("temporal violation: {0}")]
    TemporalViolation(String),

    /// Attempted to move the simulation clock ahead of the wall clock in a
    /// non-live gateway.
    #[error("simulation time {requested} is ahead of the wall clock")]
    InvalidTime { requested: DateTime<Utc> },

    /// Look-ahead bias detected by the data-boundary validator in strict
    /// mode, before or during a run.
    #[error("look-ahead bias detected: {0}")]
    LookAheadBias(String),

    /// An external adapter failed. Usually converted to an empty result at
    /// the calling site; surfaced only from operations with no fallback.
    #[error("adapter failure: {0}")]
    Adapter(String),

    /// An internal invariant was broken (e.g. the graph runner exceeded its
    /// step budget). The tick ends with a conservative `hold`.
    #[error("invariant breach: {0}")]
    InvariantBreach(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
