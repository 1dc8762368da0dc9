// =============================================================================
// Decision graph — nodes, edges, and routers as data
// =============================================================================
//
// The orchestration DAG is a table interpreted by a small runner, not a
// web of dynamic dispatch. Fixed spine:
//
//   researcher -> validator -?-> bull -> bear -> analyzer -> risk
//             -> privacy -> optimizer -> decide -?-> END
//
// The two `-?->` hops are routed: after validation the tick either
// proceeds to the debate or loops back for more research, and after a
// decision the tick either terminates or re-enters refinement. Routers
// are pure functions of the state, so every routing decision is
// reproducible and testable in isolation.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::engine::state::DecisionState;

/// Graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Researcher,
    Validator,
    Bull,
    Bear,
    Analyzer,
    Risk,
    Privacy,
    Optimizer,
    Decide,
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Researcher => "researcher",
            Self::Validator => "validator",
            Self::Bull => "bull",
            Self::Bear => "bear",
            Self::Analyzer => "analyzer",
            Self::Risk => "risk",
            Self::Privacy => "privacy",
            Self::Optimizer => "optimizer",
            Self::Decide => "decide",
        };
        write!(f, "{label}")
    }
}

/// Labels a router can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteLabel {
    Proceed,
    ReResearch,
    Iterate,
    RefineResearch,
    End,
}

/// The two conditional edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Router {
    Validation,
    Continuation,
}

/// What follows a node: a fixed edge or a routed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fixed(Node),
    Routed(Router),
}

/// Entry node of every tick.
pub const ENTRY: Node = Node::Researcher;

/// The edge table.
pub fn next_step(node: Node) -> Step {
    match node {
        Node::Researcher => Step::Fixed(Node::Validator),
        Node::Validator => Step::Routed(Router::Validation),
        Node::Bull => Step::Fixed(Node::Bear),
        Node::Bear => Step::Fixed(Node::Analyzer),
        Node::Analyzer => Step::Fixed(Node::Risk),
        Node::Risk => Step::Fixed(Node::Privacy),
        Node::Privacy => Step::Fixed(Node::Optimizer),
        Node::Optimizer => Step::Fixed(Node::Decide),
        Node::Decide => Step::Routed(Router::Continuation),
    }
}

/// Route after validation: proceed when the research passed muster or the
/// iteration budget is spent; loop back only when there are named gaps
/// left to fill.
pub fn validation_router(state: &DecisionState) -> RouteLabel {
    if state.validation_passed {
        return RouteLabel::Proceed;
    }
    if state.iteration >= state.max_iterations {
        return RouteLabel::Proceed;
    }
    if !state.data_gaps.is_empty() {
        return RouteLabel::ReResearch;
    }
    RouteLabel::Proceed
}

/// Route after a decision: stop at the iteration budget or on a confident,
/// well-validated result; otherwise iterate fully on low confidence or
/// refine the research on low validation quality.
pub fn continuation_router(state: &DecisionState) -> RouteLabel {
    if state.iteration >= state.max_iterations {
        return RouteLabel::End;
    }
    if state.confidence > 0.85 && state.validation_score > 0.8 {
        return RouteLabel::End;
    }
    if state.confidence < 0.5 {
        return RouteLabel::Iterate;
    }
    if state.validation_score < 0.6 {
        return RouteLabel::RefineResearch;
    }
    RouteLabel::End
}

/// Resolve a router label to the next node; `None` terminates the tick.
pub fn resolve(router: Router, label: RouteLabel) -> Option<Node> {
    match (router, label) {
        (Router::Validation, RouteLabel::Proceed) => Some(Node::Bull),
        (Router::Validation, RouteLabel::ReResearch) => Some(Node::Researcher),
        (Router::Continuation, RouteLabel::Iterate) => Some(Node::Researcher),
        (Router::Continuation, RouteLabel::RefineResearch) => Some(Node::Researcher),
        (Router::Continuation, RouteLabel::End) => None,
        // Any other combination is a routing bug; fail safe by terminating.
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarketSnapshot;

    fn state() -> DecisionState {
        DecisionState::new("BTC/USDT", MarketSnapshot::default(), 3)
    }

    #[test]
    fn fixed_spine_reaches_decide() {
        // Following fixed edges (and Proceed at the validator) must walk
        // every node exactly once and land on decide.
        let mut node = ENTRY;
        let mut visited = vec![node];
        loop {
            node = match next_step(node) {
                Step::Fixed(next) => next,
                Step::Routed(Router::Validation) => Node::Bull,
                Step::Routed(Router::Continuation) => break,
            };
            visited.push(node);
        }
        assert_eq!(
            visited,
            vec![
                Node::Researcher,
                Node::Validator,
                Node::Bull,
                Node::Bear,
                Node::Analyzer,
                Node::Risk,
                Node::Privacy,
                Node::Optimizer,
                Node::Decide,
            ]
        );
    }

    #[test]
    fn validation_router_proceeds_on_pass() {
        let mut s = state();
        s.validation_passed = true;
        s.data_gaps = vec!["news".to_string()];
        assert_eq!(validation_router(&s), RouteLabel::Proceed);
    }

    #[test]
    fn validation_router_loops_on_gaps() {
        let mut s = state();
        s.validation_passed = false;
        s.data_gaps = vec!["news".to_string()];
        s.iteration = 0;
        assert_eq!(validation_router(&s), RouteLabel::ReResearch);
    }

    #[test]
    fn validation_router_respects_iteration_budget() {
        // Failed validation with gaps, but the budget is spent: proceed
        // regardless.
        let mut s = state();
        s.validation_passed = false;
        s.data_gaps = vec!["news".to_string()];
        s.iteration = 3;
        assert_eq!(validation_router(&s), RouteLabel::Proceed);
    }

    #[test]
    fn validation_router_proceeds_without_gaps() {
        let mut s = state();
        s.validation_passed = false;
        assert_eq!(validation_router(&s), RouteLabel::Proceed);
    }

    #[test]
    fn continuation_router_ends_at_budget() {
        let mut s = state();
        s.iteration = 3;
        s.confidence = 0.1;
        assert_eq!(continuation_router(&s), RouteLabel::End);
    }

    #[test]
    fn continuation_router_ends_on_high_quality() {
        let mut s = state();
        s.iteration = 1;
        s.confidence = 0.9;
        s.validation_score = 0.85;
        assert_eq!(continuation_router(&s), RouteLabel::End);
    }

    #[test]
    fn continuation_router_iterates_on_low_confidence() {
        let mut s = state();
        s.iteration = 1;
        s.confidence = 0.3;
        s.validation_score = 0.9;
        assert_eq!(continuation_router(&s), RouteLabel::Iterate);
    }

    #[test]
    fn continuation_router_refines_on_low_validation() {
        let mut s = state();
        s.iteration = 1;
        s.confidence = 0.7;
        s.validation_score = 0.4;
        assert_eq!(continuation_router(&s), RouteLabel::RefineResearch);
    }

    #[test]
    fn continuation_router_ends_on_moderate_quality() {
        let mut s = state();
        s.iteration = 1;
        s.confidence = 0.7;
        s.validation_score = 0.7;
        assert_eq!(continuation_router(&s), RouteLabel::End);
    }

    #[test]
    fn resolution_table() {
        assert_eq!(resolve(Router::Validation, RouteLabel::Proceed), Some(Node::Bull));
        assert_eq!(
            resolve(Router::Validation, RouteLabel::ReResearch),
            Some(Node::Researcher)
        );
        assert_eq!(
            resolve(Router::Continuation, RouteLabel::Iterate),
            Some(Node::Researcher)
        );
        assert_eq!(
            resolve(Router::Continuation, RouteLabel::RefineResearch),
            Some(Node::Researcher)
        );
        assert_eq!(resolve(Router::Continuation, RouteLabel::End), None);
        // Nonsense combinations terminate instead of looping.
        assert_eq!(resolve(Router::Validation, RouteLabel::Iterate), None);
    }
}
