use std::sync::Arc;

use async_trait::async_trait;
use council_models::state::{AnalystKind, DecisionState, Message, StatePatch};
use tracing::{debug, info};

use super::Node;
use crate::engine::NodeContext;
use crate::error::AgentError;
use crate::graph::NodeId;
use crate::llm::{GenerationRequest, LanguageModel};
use crate::prompts::analyst_system_prompt;
use crate::toolkit::Toolkit;

/// Writes one of the four reports, calling data-fetch tools through its tool node first.
pub struct AnalystNode {
    kind: AnalystKind,
    model: Arc<dyn LanguageModel>,
    toolkit: Arc<Toolkit>,
}

impl AnalystNode {
    pub fn new(kind: AnalystKind, model: Arc<dyn LanguageModel>, toolkit: Arc<Toolkit>) -> Self {
        Self {
            kind,
            model,
            toolkit,
        }
    }

    /// This analyst's tool requests and their results so far.
    fn exchange(&self, state: &DecisionState) -> Vec<Message> {
        let own = [NodeId::Analyst(self.kind).name(), NodeId::Tools(self.kind).name()];
        state
            .messages
            .iter()
            .filter(|m| own.contains(&m.sender))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Node for AnalystNode {
    fn id(&self) -> NodeId {
        NodeId::Analyst(self.kind)
    }

    async fn invoke(
        &self,
        state: &DecisionState,
        ctx: &NodeContext,
    ) -> Result<StatePatch, AgentError> {
        let name = self.id().name();
        let request = GenerationRequest::new(&name, analyst_system_prompt(self.kind))
            .with_user(format!(
                "For your reference, the current date is {}. The company we want to look at is {}.",
                state.trade_date, state.subject
            ))
            .with_messages(self.exchange(state))
            .with_tools(self.toolkit.toolset(self.kind, ctx.policy));

        let generation = self.model.generate(&request).await?;

        if !generation.tool_calls.is_empty() {
            debug!(
                analyst = %self.kind,
                calls = generation.tool_calls.len(),
                "Analyst requested tools"
            );
            let message =
                Message::assistant(&name, generation.text).with_tool_calls(generation.tool_calls);
            return Ok(StatePatch::default().with_message(message));
        }

        let report = generation.into_text()?;
        info!(analyst = %self.kind, report_len = report.len(), "Report written");
        Ok(StatePatch::default()
            .with_report(self.kind, report.clone())
            .with_message(Message::assistant(name, report)))
    }
}
