use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use council_models::state::{AnalystKind, DecisionState};

/// Every node the decision graph can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Analyst(AnalystKind),
    /// Executes the data-fetch calls its analyst requested.
    Tools(AnalystKind),
    BullResearcher,
    BearResearcher,
    ResearchManager,
    Trader,
    RiskyAnalyst,
    SafeAnalyst,
    NeutralAnalyst,
    RiskJudge,
}

impl NodeId {
    pub fn name(&self) -> String {
        match self {
            NodeId::Analyst(kind) => format!("{kind}_analyst"),
            NodeId::Tools(kind) => format!("{kind}_tools"),
            NodeId::BullResearcher => "bull_researcher".to_string(),
            NodeId::BearResearcher => "bear_researcher".to_string(),
            NodeId::ResearchManager => "research_manager".to_string(),
            NodeId::Trader => "trader".to_string(),
            NodeId::RiskyAnalyst => "risky_analyst".to_string(),
            NodeId::SafeAnalyst => "safe_analyst".to_string(),
            NodeId::NeutralAnalyst => "neutral_analyst".to_string(),
            NodeId::RiskJudge => "risk_judge".to_string(),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Where execution goes after a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Node(NodeId),
    End,
}

pub type RouteFn = Arc<dyn Fn(&DecisionState) -> Next + Send + Sync>;

/// An outgoing edge: fixed, or decided from the merged state.
#[derive(Clone)]
pub enum Edge {
    Direct(Next),
    Conditional(RouteFn),
}

impl Edge {
    pub fn conditional<F>(route: F) -> Self
    where
        F: Fn(&DecisionState) -> Next + Send + Sync + 'static,
    {
        Edge::Conditional(Arc::new(route))
    }

    pub fn resolve(&self, state: &DecisionState) -> Next {
        match self {
            Edge::Direct(next) => *next,
            Edge::Conditional(route) => route(state),
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Direct(next) => f.debug_tuple("Direct").field(next).finish(),
            Edge::Conditional(_) => f.write_str("Conditional(..)"),
        }
    }
}

pub type EdgeTable = HashMap<NodeId, Edge>;
