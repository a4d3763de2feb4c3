use std::collections::HashSet;
use std::sync::Arc;

use council_models::state::{AnalystKind, DecisionState, Researcher, RiskSpeaker};

use crate::error::AgentError;
use crate::graph::{Edge, EdgeTable, Next, NodeId};

/// Loop-termination policy for the decision graph.
///
/// Every routing function is pure: the same state always yields the same `Next`.
#[derive(Debug, Clone)]
pub struct ConditionalRouter {
    analysts: Vec<AnalystKind>,
    max_debate_rounds: u32,
    max_risk_rounds: u32,
    debate_turn_limit: u32,
    risk_turn_limit: u32,
}

impl ConditionalRouter {
    pub fn new(
        analysts: Vec<AnalystKind>,
        max_debate_rounds: u32,
        max_risk_rounds: u32,
    ) -> Result<Self, AgentError> {
        if analysts.is_empty() {
            return Err(AgentError::Config(
                "at least one analyst must be selected".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = analysts.iter().find(|k| !seen.insert(**k)) {
            return Err(AgentError::Config(format!("analyst {dup} selected twice")));
        }
        if max_debate_rounds == 0 || max_risk_rounds == 0 {
            return Err(AgentError::Config(
                "debate and risk round limits must be at least 1".to_string(),
            ));
        }
        // Two researchers per debate round, three debators per risk round.
        let debate_turn_limit = max_debate_rounds.checked_mul(2).ok_or_else(|| {
            AgentError::Config(format!("max_debate_rounds {max_debate_rounds} is too large"))
        })?;
        let risk_turn_limit = max_risk_rounds.checked_mul(3).ok_or_else(|| {
            AgentError::Config(format!("max_risk_rounds {max_risk_rounds} is too large"))
        })?;

        Ok(Self {
            analysts,
            max_debate_rounds,
            max_risk_rounds,
            debate_turn_limit,
            risk_turn_limit,
        })
    }

    pub fn analysts(&self) -> &[AnalystKind] {
        &self.analysts
    }

    pub fn max_debate_rounds(&self) -> u32 {
        self.max_debate_rounds
    }

    pub fn max_risk_rounds(&self) -> u32 {
        self.max_risk_rounds
    }

    pub fn entry(&self) -> NodeId {
        // Non-empty is checked in `new`.
        NodeId::Analyst(self.analysts[0])
    }

    /// Loop to the tool node while the analyst's latest message requests tools.
    pub fn after_analyst(&self, kind: AnalystKind, state: &DecisionState) -> Next {
        let wants_tools = state
            .messages
            .last()
            .is_some_and(|m| m.sender == NodeId::Analyst(kind).name() && m.requests_tools());
        if wants_tools {
            return Next::Node(NodeId::Tools(kind));
        }

        let position = self.analysts.iter().position(|k| *k == kind);
        match position.and_then(|i| self.analysts.get(i + 1)) {
            Some(next) => Next::Node(NodeId::Analyst(*next)),
            None => Next::Node(NodeId::BullResearcher),
        }
    }

    pub fn after_tools(&self, kind: AnalystKind) -> Next {
        Next::Node(NodeId::Analyst(kind))
    }

    pub fn after_researcher(&self, state: &DecisionState) -> Next {
        let debate = &state.investment_debate;
        if debate.count >= self.debate_turn_limit {
            return Next::Node(NodeId::ResearchManager);
        }
        match debate.latest_speaker {
            Some(Researcher::Bull) => Next::Node(NodeId::BearResearcher),
            Some(Researcher::Bear) | None => Next::Node(NodeId::BullResearcher),
        }
    }

    pub fn after_risk_debator(&self, state: &DecisionState) -> Next {
        let debate = &state.risk_debate;
        if debate.count >= self.risk_turn_limit {
            return Next::Node(NodeId::RiskJudge);
        }
        match debate.latest_speaker {
            Some(RiskSpeaker::Risky) => Next::Node(NodeId::SafeAnalyst),
            Some(RiskSpeaker::Safe) => Next::Node(NodeId::NeutralAnalyst),
            Some(RiskSpeaker::Neutral) | Some(RiskSpeaker::Judge) | None => {
                Next::Node(NodeId::RiskyAnalyst)
            }
        }
    }

    /// The full graph as data, with conditional edges bound to this router.
    pub fn edge_table(&self) -> EdgeTable {
        let router = Arc::new(self.clone());
        let mut edges = EdgeTable::new();

        for kind in self.analysts.iter().copied() {
            let r = Arc::clone(&router);
            edges.insert(
                NodeId::Analyst(kind),
                Edge::conditional(move |state| r.after_analyst(kind, state)),
            );
            edges.insert(NodeId::Tools(kind), Edge::Direct(self.after_tools(kind)));
        }

        for id in [NodeId::BullResearcher, NodeId::BearResearcher] {
            let r = Arc::clone(&router);
            edges.insert(id, Edge::conditional(move |state| r.after_researcher(state)));
        }
        edges.insert(
            NodeId::ResearchManager,
            Edge::Direct(Next::Node(NodeId::Trader)),
        );
        edges.insert(NodeId::Trader, Edge::Direct(Next::Node(NodeId::RiskyAnalyst)));

        for id in [
            NodeId::RiskyAnalyst,
            NodeId::SafeAnalyst,
            NodeId::NeutralAnalyst,
        ] {
            let r = Arc::clone(&router);
            edges.insert(
                id,
                Edge::conditional(move |state| r.after_risk_debator(state)),
            );
        }
        edges.insert(NodeId::RiskJudge, Edge::Direct(Next::End));

        edges
    }
}
