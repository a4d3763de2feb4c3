use std::sync::Arc;

use async_trait::async_trait;
use council_memory::SituationMemory;
use council_models::state::{DecisionState, Message, RiskSpeaker, StatePatch};
use tracing::info;

use super::{past_lessons, Node};
use crate::engine::NodeContext;
use crate::error::AgentError;
use crate::graph::NodeId;
use crate::llm::{GenerationRequest, LanguageModel};
use crate::prompts::{research_manager_system_prompt, risk_judge_system_prompt};

/// Resolves the bull/bear debate into an investment plan. Runs on the deep model.
pub struct ResearchManagerNode {
    model: Arc<dyn LanguageModel>,
    memory: Arc<SituationMemory>,
    n_matches: usize,
}

impl ResearchManagerNode {
    pub fn new(model: Arc<dyn LanguageModel>, memory: Arc<SituationMemory>, n_matches: usize) -> Self {
        Self {
            model,
            memory,
            n_matches,
        }
    }
}

#[async_trait]
impl Node for ResearchManagerNode {
    fn id(&self) -> NodeId {
        NodeId::ResearchManager
    }

    async fn invoke(
        &self,
        state: &DecisionState,
        _ctx: &NodeContext,
    ) -> Result<StatePatch, AgentError> {
        let debate = &state.investment_debate;
        let lessons = past_lessons(&self.memory, &state.situation(), self.n_matches)?;
        let prompt = format!(
            "Subject: {}\n\n\
             Your past reflections on mistakes:\n{}\n\n\
             Debate history:\n{}",
            state.subject, lessons, debate.history
        );

        let request =
            GenerationRequest::new(self.id().name(), research_manager_system_prompt()).with_user(prompt);
        let decision = self.model.generate(&request).await?.into_text()?;

        let mut resolved = debate.clone();
        resolved.judge_decision = decision.clone();
        resolved.current_response = decision.clone();

        info!(subject = %state.subject, rounds = debate.count, "Investment debate resolved");
        Ok(StatePatch {
            investment_debate: Some(resolved),
            investment_plan: Some(decision.clone()),
            ..Default::default()
        }
        .with_message(Message::assistant(self.id().name(), decision)))
    }
}

/// Resolves the risk debate and writes the run's final decision. Runs on the deep model.
pub struct RiskJudgeNode {
    model: Arc<dyn LanguageModel>,
    memory: Arc<SituationMemory>,
    n_matches: usize,
}

impl RiskJudgeNode {
    pub fn new(model: Arc<dyn LanguageModel>, memory: Arc<SituationMemory>, n_matches: usize) -> Self {
        Self {
            model,
            memory,
            n_matches,
        }
    }
}

#[async_trait]
impl Node for RiskJudgeNode {
    fn id(&self) -> NodeId {
        NodeId::RiskJudge
    }

    async fn invoke(
        &self,
        state: &DecisionState,
        _ctx: &NodeContext,
    ) -> Result<StatePatch, AgentError> {
        let debate = &state.risk_debate;
        let lessons = past_lessons(&self.memory, &state.situation(), self.n_matches)?;
        let prompt = format!(
            "Subject: {}\n\n\
             Trader's original plan:\n{}\n\n\
             Lessons from past mistakes:\n{}\n\n\
             Analysts debate history:\n{}",
            state.subject, state.trader_plan, lessons, debate.history
        );

        let request =
            GenerationRequest::new(self.id().name(), risk_judge_system_prompt()).with_user(prompt);
        let decision = self.model.generate(&request).await?.into_text()?;

        let mut resolved = debate.clone();
        resolved.judge_decision = decision.clone();
        resolved.latest_speaker = Some(RiskSpeaker::Judge);

        info!(subject = %state.subject, rounds = debate.count, "Risk debate resolved");
        Ok(StatePatch {
            risk_debate: Some(resolved),
            final_decision: Some(decision.clone()),
            ..Default::default()
        }
        .with_message(Message::assistant(self.id().name(), decision)))
    }
}
