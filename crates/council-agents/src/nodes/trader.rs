use std::sync::Arc;

use async_trait::async_trait;
use council_memory::SituationMemory;
use council_models::state::{DecisionState, Message, StatePatch};
use tracing::info;

use super::{past_lessons, reports_block, Node};
use crate::engine::NodeContext;
use crate::error::AgentError;
use crate::graph::NodeId;
use crate::llm::{GenerationRequest, LanguageModel};
use crate::prompts::trader_system_prompt;

/// Turns the investment plan into a concrete trading proposal.
pub struct TraderNode {
    model: Arc<dyn LanguageModel>,
    memory: Arc<SituationMemory>,
    n_matches: usize,
}

impl TraderNode {
    pub fn new(model: Arc<dyn LanguageModel>, memory: Arc<SituationMemory>, n_matches: usize) -> Self {
        Self {
            model,
            memory,
            n_matches,
        }
    }
}

#[async_trait]
impl Node for TraderNode {
    fn id(&self) -> NodeId {
        NodeId::Trader
    }

    async fn invoke(
        &self,
        state: &DecisionState,
        _ctx: &NodeContext,
    ) -> Result<StatePatch, AgentError> {
        let lessons = past_lessons(&self.memory, &state.situation(), self.n_matches)?;
        let prompt = format!(
            "Based on a comprehensive analysis by a team of analysts, here is an investment \
             plan tailored for {}. Use it as a foundation for your trading decision.\n\n\
             Proposed investment plan:\n{}\n\n{}\n\n\
             Reflections from similar situations and lessons learned:\n{}",
            state.subject,
            state.investment_plan,
            reports_block(state),
            lessons
        );

        let request = GenerationRequest::new("trader", trader_system_prompt()).with_user(prompt);
        let plan = self.model.generate(&request).await?.into_text()?;

        info!(subject = %state.subject, "Trader plan written");
        Ok(StatePatch {
            trader_plan: Some(plan.clone()),
            ..Default::default()
        }
        .with_message(Message::assistant("trader", plan)))
    }
}
