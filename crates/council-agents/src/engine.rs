use std::collections::HashMap;
use std::sync::Arc;

use council_models::run::ToolPolicy;
use council_models::state::DecisionState;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::graph::{Edge, EdgeTable, Next, NodeId};
use crate::nodes::Node;

/// Per-run context handed to every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeContext {
    pub policy: ToolPolicy,
}

impl NodeContext {
    pub fn new(policy: ToolPolicy) -> Self {
        Self { policy }
    }
}

/// Called after every merged step. Cannot influence routing.
pub trait StepObserver {
    fn on_step(&mut self, step: usize, node: NodeId, state: &DecisionState);
}

/// Records a snapshot of the state after each step.
#[derive(Debug, Default)]
pub struct RunTrace {
    pub steps: Vec<(usize, NodeId, DecisionState)>,
}

impl RunTrace {
    pub fn nodes(&self) -> Vec<NodeId> {
        self.steps.iter().map(|(_, node, _)| *node).collect()
    }

    pub fn count(&self, node: NodeId) -> usize {
        self.steps.iter().filter(|(_, n, _)| *n == node).count()
    }
}

impl StepObserver for RunTrace {
    fn on_step(&mut self, step: usize, node: NodeId, state: &DecisionState) {
        self.steps.push((step, node, state.clone()));
    }
}

pub(crate) struct NoopObserver;

impl StepObserver for NoopObserver {
    fn on_step(&mut self, _step: usize, _node: NodeId, _state: &DecisionState) {}
}

/// Terminal state plus the number of node invocations it took.
#[derive(Debug)]
pub struct Execution {
    pub state: DecisionState,
    pub steps: usize,
}

/// Drives a `DecisionState` through the node registry until `Next::End`.
pub struct GraphEngine {
    entry: NodeId,
    nodes: HashMap<NodeId, Arc<dyn Node>>,
    edges: EdgeTable,
    step_limit: usize,
}

impl GraphEngine {
    pub fn new(entry: NodeId, step_limit: usize) -> Result<Self, AgentError> {
        if step_limit == 0 {
            return Err(AgentError::Config("step limit must be at least 1".to_string()));
        }
        Ok(Self {
            entry,
            nodes: HashMap::new(),
            edges: EdgeTable::new(),
            step_limit,
        })
    }

    pub fn add_node(&mut self, node: Arc<dyn Node>) {
        self.nodes.insert(node.id(), node);
    }

    pub fn add_edge(&mut self, from: NodeId, edge: Edge) {
        self.edges.insert(from, edge);
    }

    pub fn with_edges(mut self, edges: EdgeTable) -> Self {
        self.edges.extend(edges);
        self
    }

    pub fn step_limit(&self) -> usize {
        self.step_limit
    }

    /// Check the entry node, every node's outgoing edge and every fixed edge target.
    ///
    /// Conditional targets can only be checked when they are routed to.
    pub fn validate(&self) -> Result<(), AgentError> {
        if !self.nodes.contains_key(&self.entry) {
            return Err(AgentError::Config(format!(
                "entry node {} is not registered",
                self.entry
            )));
        }
        for id in self.nodes.keys() {
            if !self.edges.contains_key(id) {
                return Err(AgentError::Config(format!("node {id} has no outgoing edge")));
            }
        }
        for (from, edge) in &self.edges {
            if let Edge::Direct(Next::Node(to)) = edge {
                if !self.nodes.contains_key(to) {
                    return Err(AgentError::Config(format!(
                        "edge {from} -> {to} targets an unregistered node"
                    )));
                }
            }
        }
        Ok(())
    }

    pub async fn execute(
        &self,
        state: DecisionState,
        ctx: NodeContext,
    ) -> Result<Execution, AgentError> {
        self.execute_observed(state, ctx, &mut NoopObserver).await
    }

    pub async fn execute_observed(
        &self,
        mut state: DecisionState,
        ctx: NodeContext,
        observer: &mut (dyn StepObserver + Send),
    ) -> Result<Execution, AgentError> {
        let mut current = self.entry;
        let mut steps = 0usize;

        info!(subject = %state.subject, entry = %current, "Graph execution started");

        loop {
            if steps >= self.step_limit {
                warn!(limit = self.step_limit, node = %current, "Step limit reached");
                return Err(AgentError::StepLimitExceeded {
                    limit: self.step_limit,
                });
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| AgentError::Config(format!("node {current} is not registered")))?;

            debug!(step = steps + 1, node = %current, "Invoking node");
            let patch = node
                .invoke(&state, &ctx)
                .await
                .map_err(|e| AgentError::NodeExecution {
                    node: current.name(),
                    source: Box::new(e),
                })?;
            steps += 1;
            state.apply(patch);
            observer.on_step(steps, current, &state);

            let edge = self
                .edges
                .get(&current)
                .ok_or_else(|| AgentError::Config(format!("node {current} has no outgoing edge")))?;
            match edge.resolve(&state) {
                Next::Node(next) => current = next,
                Next::End => break,
            }
        }

        info!(subject = %state.subject, steps, "Graph execution finished");
        Ok(Execution { state, steps })
    }
}
