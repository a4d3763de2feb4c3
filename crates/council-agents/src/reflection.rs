use std::sync::Arc;

use council_memory::MemoryBank;
use council_models::memory_record::MemoryRole;
use council_models::state::DecisionState;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AgentError;
use crate::llm::{GenerationRequest, LanguageModel};
use crate::prompts::reflection_system_prompt;

/// Outcome of reflecting for one role.
#[derive(Debug, Clone, Serialize)]
pub struct RoleReflection {
    pub role: MemoryRole,
    /// Id of the stored record, or the failure message.
    pub outcome: Result<Uuid, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReflectionReport {
    pub entries: Vec<RoleReflection>,
}

impl ReflectionReport {
    pub fn stored(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RoleReflection> {
        self.entries.iter().filter(|e| e.outcome.is_err())
    }
}

/// Derives one lesson per role from a finished run and its realized outcome.
pub struct Reflector {
    model: Arc<dyn LanguageModel>,
}

impl Reflector {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// One record per successful role. A failing role never blocks the others.
    pub async fn reflect(
        &self,
        state: &DecisionState,
        outcome: Decimal,
        bank: &MemoryBank,
    ) -> ReflectionReport {
        let situation = state.situation();
        let mut report = ReflectionReport::default();

        for role in MemoryRole::ALL {
            let result = self.reflect_role(role, state, &situation, outcome, bank).await;
            match &result {
                Ok(id) => info!(role = %role, record = %id, "Lesson stored"),
                Err(e) => warn!(role = %role, error = %e, "Reflection failed"),
            }
            report.entries.push(RoleReflection {
                role,
                outcome: result.map_err(|e| e.to_string()),
            });
        }

        report
    }

    async fn reflect_role(
        &self,
        role: MemoryRole,
        state: &DecisionState,
        situation: &str,
        outcome: Decimal,
        bank: &MemoryBank,
    ) -> Result<Uuid, AgentError> {
        let component = match role {
            MemoryRole::BullResearcher => &state.investment_debate.bull_history,
            MemoryRole::BearResearcher => &state.investment_debate.bear_history,
            MemoryRole::Trader => &state.trader_plan,
            MemoryRole::InvestJudge => &state.investment_debate.judge_decision,
            MemoryRole::RiskJudge => &state.risk_debate.judge_decision,
        };

        let prompt = format!(
            "Realized outcome: {}\n\n\
             Decision under review:\n{}\n\n\
             Objective market reports for reference:\n{}",
            describe_outcome(outcome),
            component,
            situation
        );
        let request = GenerationRequest::new(format!("reflect_{role}"), reflection_system_prompt())
            .with_user(prompt);
        let lesson = self.model.generate(&request).await?.into_text()?;

        let record = bank.get(role).remember(situation, &lesson)?;
        Ok(record.id)
    }
}

fn describe_outcome(outcome: Decimal) -> String {
    let direction = if outcome > Decimal::ZERO {
        "gain"
    } else if outcome < Decimal::ZERO {
        "loss"
    } else {
        "flat"
    };
    format!("{direction} of {} (raw return {outcome})", outcome.abs())
}
