// =============================================================================
// Orchestration engine — the decision state machine
// =============================================================================
//
// `state` holds the shared per-tick record and the patch merge discipline;
// `signal` turns argument text into numeric scores; `graph` is the node /
// edge table with its two routers; `orchestrator` wires the agents into
// the graph and drives one decision tick end to end.
// =============================================================================

pub mod graph;
pub mod orchestrator;
pub mod signal;
pub mod state;

pub use graph::{Node, RouteLabel};
pub use orchestrator::{AdapterSet, EngineStatus, Orchestrator};
pub use signal::SignalExtractor;
pub use state::{Decision, DecisionState, StatePatch};
