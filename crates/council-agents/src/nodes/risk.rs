use std::sync::Arc;

use async_trait::async_trait;
use council_models::state::{DecisionState, Message, RiskSpeaker, StatePatch};
use tracing::info;

use super::{append_line, reports_block, Node};
use crate::engine::NodeContext;
use crate::error::AgentError;
use crate::graph::NodeId;
use crate::llm::{GenerationRequest, LanguageModel};
use crate::prompts::{neutral_system_prompt, risky_system_prompt, safe_system_prompt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stance {
    Risky,
    Safe,
    Neutral,
}

/// One of the three risk debators arguing over the trader's plan.
pub struct RiskDebatorNode {
    stance: Stance,
    model: Arc<dyn LanguageModel>,
}

impl RiskDebatorNode {
    pub fn risky(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            stance: Stance::Risky,
            model,
        }
    }

    pub fn safe(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            stance: Stance::Safe,
            model,
        }
    }

    pub fn neutral(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            stance: Stance::Neutral,
            model,
        }
    }

    fn label(&self) -> &'static str {
        match self.stance {
            Stance::Risky => "Risky Analyst",
            Stance::Safe => "Safe Analyst",
            Stance::Neutral => "Neutral Analyst",
        }
    }
}

#[async_trait]
impl Node for RiskDebatorNode {
    fn id(&self) -> NodeId {
        match self.stance {
            Stance::Risky => NodeId::RiskyAnalyst,
            Stance::Safe => NodeId::SafeAnalyst,
            Stance::Neutral => NodeId::NeutralAnalyst,
        }
    }

    async fn invoke(
        &self,
        state: &DecisionState,
        _ctx: &NodeContext,
    ) -> Result<StatePatch, AgentError> {
        let debate = &state.risk_debate;
        let (system, others) = match self.stance {
            Stance::Risky => (
                risky_system_prompt(),
                [
                    ("safe", &debate.current_safe_response),
                    ("neutral", &debate.current_neutral_response),
                ],
            ),
            Stance::Safe => (
                safe_system_prompt(),
                [
                    ("risky", &debate.current_risky_response),
                    ("neutral", &debate.current_neutral_response),
                ],
            ),
            Stance::Neutral => (
                neutral_system_prompt(),
                [
                    ("risky", &debate.current_risky_response),
                    ("safe", &debate.current_safe_response),
                ],
            ),
        };
        let rebuttals = others
            .iter()
            .map(|(who, said)| format!("Last argument from the {who} analyst:\n{said}"))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "Trader's decision:\n{}\n\n{}\n\n\
             Conversation history:\n{}\n\n{}\n\n\
             If there are no responses from the other viewpoints yet, present your own \
             argument based on the data available.",
            state.trader_plan,
            reports_block(state),
            debate.history,
            rebuttals
        );

        let name = self.id().name();
        let request = GenerationRequest::new(&name, system).with_user(prompt);
        let text = self.model.generate(&request).await?.into_text()?;
        let argument = format!("{}: {}", self.label(), text);

        let mut next = debate.clone();
        next.history = append_line(&debate.history, &argument);
        match self.stance {
            Stance::Risky => {
                next.risky_history = append_line(&debate.risky_history, &argument);
                next.current_risky_response = argument.clone();
                next.latest_speaker = Some(RiskSpeaker::Risky);
            }
            Stance::Safe => {
                next.safe_history = append_line(&debate.safe_history, &argument);
                next.current_safe_response = argument.clone();
                next.latest_speaker = Some(RiskSpeaker::Safe);
            }
            Stance::Neutral => {
                next.neutral_history = append_line(&debate.neutral_history, &argument);
                next.current_neutral_response = argument.clone();
                next.latest_speaker = Some(RiskSpeaker::Neutral);
            }
        }
        next.count += 1;

        info!(node = %name, turn = next.count, "Risk debate turn");
        Ok(StatePatch {
            risk_debate: Some(next),
            ..Default::default()
        }
        .with_message(Message::assistant(name, argument)))
    }
}
