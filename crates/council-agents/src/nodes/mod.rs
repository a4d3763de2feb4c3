//! Agent nodes: one unit of work per graph step.
//!
//! A node reads the merged state, makes at most one generation request and returns a
//! `StatePatch`. It never writes to the state itself.

mod analyst;
mod manager;
mod researcher;
mod risk;
mod tools;
mod trader;

pub use analyst::AnalystNode;
pub use manager::{ResearchManagerNode, RiskJudgeNode};
pub use researcher::ResearcherNode;
pub use risk::RiskDebatorNode;
pub use tools::ToolNode;
pub use trader::TraderNode;

use async_trait::async_trait;
use council_memory::SituationMemory;
use council_models::state::{DecisionState, StatePatch};

use crate::engine::NodeContext;
use crate::error::AgentError;
use crate::graph::NodeId;

#[async_trait]
pub trait Node: Send + Sync {
    fn id(&self) -> NodeId;

    async fn invoke(
        &self,
        state: &DecisionState,
        ctx: &NodeContext,
    ) -> Result<StatePatch, AgentError>;
}

const NO_MEMORIES: &str = "No past memories found.";

/// Lessons from the `n` most similar past situations, one paragraph each.
pub(crate) fn past_lessons(
    memory: &SituationMemory,
    situation: &str,
    n: usize,
) -> Result<String, AgentError> {
    let recalled = memory.recall(situation, n)?;
    if recalled.is_empty() {
        return Ok(NO_MEMORIES.to_string());
    }
    Ok(recalled
        .iter()
        .map(|m| m.record.lesson.as_str())
        .collect::<Vec<_>>()
        .join("\n\n"))
}

pub(crate) fn reports_block(state: &DecisionState) -> String {
    format!(
        "Market research report: {}\n\n\
         Social media sentiment report: {}\n\n\
         Latest world affairs news: {}\n\n\
         Company fundamentals report: {}",
        state.market_report, state.sentiment_report, state.news_report, state.fundamentals_report
    )
}

/// Append one line to a transcript that may still be empty.
pub(crate) fn append_line(history: &str, line: &str) -> String {
    if history.is_empty() {
        line.to_string()
    } else {
        format!("{history}\n{line}")
    }
}
