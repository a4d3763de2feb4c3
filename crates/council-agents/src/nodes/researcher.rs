use std::sync::Arc;

use async_trait::async_trait;
use council_memory::SituationMemory;
use council_models::state::{DecisionState, Message, Researcher, StatePatch};
use tracing::info;

use super::{append_line, past_lessons, reports_block, Node};
use crate::engine::NodeContext;
use crate::error::AgentError;
use crate::graph::NodeId;
use crate::llm::{GenerationRequest, LanguageModel};
use crate::prompts::{bear_system_prompt, bull_system_prompt};

/// One side of the bull/bear investment debate.
pub struct ResearcherNode {
    side: Researcher,
    model: Arc<dyn LanguageModel>,
    memory: Arc<SituationMemory>,
    n_matches: usize,
}

impl ResearcherNode {
    pub fn new(
        side: Researcher,
        model: Arc<dyn LanguageModel>,
        memory: Arc<SituationMemory>,
        n_matches: usize,
    ) -> Self {
        Self {
            side,
            model,
            memory,
            n_matches,
        }
    }

    fn label(&self) -> &'static str {
        match self.side {
            Researcher::Bull => "Bull Analyst",
            Researcher::Bear => "Bear Analyst",
        }
    }
}

#[async_trait]
impl Node for ResearcherNode {
    fn id(&self) -> NodeId {
        match self.side {
            Researcher::Bull => NodeId::BullResearcher,
            Researcher::Bear => NodeId::BearResearcher,
        }
    }

    async fn invoke(
        &self,
        state: &DecisionState,
        _ctx: &NodeContext,
    ) -> Result<StatePatch, AgentError> {
        let debate = &state.investment_debate;
        let lessons = past_lessons(&self.memory, &state.situation(), self.n_matches)?;
        let system = match self.side {
            Researcher::Bull => bull_system_prompt(),
            Researcher::Bear => bear_system_prompt(),
        };

        let prompt = format!(
            "Subject: {}\n\n{}\n\n\
             Conversation history of the debate:\n{}\n\n\
             Last argument from the other side:\n{}\n\n\
             Reflections from similar situations and lessons learned:\n{}",
            state.subject,
            reports_block(state),
            debate.history,
            debate.current_response,
            lessons
        );
        let name = self.id().name();
        let request = GenerationRequest::new(&name, system).with_user(prompt);
        let text = self.model.generate(&request).await?.into_text()?;

        let argument = format!("{}: {}", self.label(), text);
        let mut next = debate.clone();
        next.history = append_line(&debate.history, &argument);
        match self.side {
            Researcher::Bull => next.bull_history = append_line(&debate.bull_history, &argument),
            Researcher::Bear => next.bear_history = append_line(&debate.bear_history, &argument),
        }
        next.current_response = argument.clone();
        next.latest_speaker = Some(self.side);
        next.count += 1;

        info!(node = %name, turn = next.count, "Debate turn");
        Ok(StatePatch {
            investment_debate: Some(next),
            ..Default::default()
        }
        .with_message(Message::assistant(name, argument)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedModel;
    use chrono::NaiveDate;
    use council_memory::HashingEmbedder;
    use council_models::memory_record::MemoryRole;
    use council_models::run::ToolPolicy;

    #[tokio::test]
    async fn turn_updates_histories_and_count() {
        let model = Arc::new(
            ScriptedModel::new()
                .reply("bull_researcher", "Data center demand keeps growing.")
                .reply("bear_researcher", "Valuation already prices that in."),
        );
        let embedder = Arc::new(HashingEmbedder::default());
        let bull = ResearcherNode::new(
            Researcher::Bull,
            model.clone(),
            Arc::new(SituationMemory::new(MemoryRole::BullResearcher, embedder.clone())),
            2,
        );
        let bear = ResearcherNode::new(
            Researcher::Bear,
            model.clone(),
            Arc::new(SituationMemory::new(MemoryRole::BearResearcher, embedder)),
            2,
        );
        let ctx = NodeContext::new(ToolPolicy::Online);
        let mut state = DecisionState::new("NVDA", NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());

        state.apply(bull.invoke(&state, &ctx).await.unwrap());
        state.apply(bear.invoke(&state, &ctx).await.unwrap());

        let debate = &state.investment_debate;
        assert_eq!(debate.count, 2);
        assert_eq!(debate.latest_speaker, Some(Researcher::Bear));
        assert_eq!(
            debate.history,
            "Bull Analyst: Data center demand keeps growing.\n\
             Bear Analyst: Valuation already prices that in."
        );
        assert_eq!(debate.bull_history, "Bull Analyst: Data center demand keeps growing.");
        assert_eq!(debate.current_response, "Bear Analyst: Valuation already prices that in.");

        // The bear saw the bull's argument and the empty-memory placeholder.
        let bear_prompt = &model.requests_for("bear_researcher")[0].messages[0].content;
        assert!(bear_prompt.contains("Bull Analyst: Data center demand keeps growing."));
        assert!(bear_prompt.contains("No past memories found."));
    }
}
