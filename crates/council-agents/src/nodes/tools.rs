use std::sync::Arc;

use async_trait::async_trait;
use council_models::state::{AnalystKind, DecisionState, Message, StatePatch};
use tracing::warn;

use super::Node;
use crate::engine::NodeContext;
use crate::error::AgentError;
use crate::graph::NodeId;
use crate::toolkit::Toolkit;

/// Executes the calls in its analyst's latest tool request.
///
/// A failed call becomes an error result the analyst can read and react to.
pub struct ToolNode {
    kind: AnalystKind,
    toolkit: Arc<Toolkit>,
}

impl ToolNode {
    pub fn new(kind: AnalystKind, toolkit: Arc<Toolkit>) -> Self {
        Self { kind, toolkit }
    }
}

#[async_trait]
impl Node for ToolNode {
    fn id(&self) -> NodeId {
        NodeId::Tools(self.kind)
    }

    async fn invoke(
        &self,
        state: &DecisionState,
        ctx: &NodeContext,
    ) -> Result<StatePatch, AgentError> {
        let analyst = NodeId::Analyst(self.kind).name();
        let request = state
            .messages
            .iter()
            .rev()
            .find(|m| m.sender == analyst && m.requests_tools())
            .ok_or_else(|| AgentError::Tool(format!("{analyst} has no pending tool request")))?;

        let sender = self.id().name();
        let mut patch = StatePatch::default();
        for call in &request.tool_calls {
            let content = match self.toolkit.call(self.kind, ctx.policy, call).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(analyst = %self.kind, tool = %call.name, error = %e, "Returning tool error to analyst");
                    format!("Error: {e}")
                }
            };
            patch = patch.with_message(Message::tool_result(&sender, &call.id, content));
        }
        Ok(patch)
    }
}
