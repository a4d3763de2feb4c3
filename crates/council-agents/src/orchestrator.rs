use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use council_memory::{MemoryBank, RunLog};
use council_models::config::CouncilConfig;
use council_models::memory_record::MemoryRole;
use council_models::run::{RunHandle, ToolPolicy};
use council_models::state::{DecisionState, Researcher};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{GraphEngine, NodeContext, NoopObserver, StepObserver};
use crate::error::AgentError;
use crate::llm::LanguageModel;
use crate::nodes::{
    AnalystNode, ResearchManagerNode, ResearcherNode, RiskDebatorNode, RiskJudgeNode, ToolNode,
    TraderNode,
};
use crate::reflection::{ReflectionReport, Reflector};
use crate::router::ConditionalRouter;
use crate::signal::SignalExtractor;
use crate::toolkit::Toolkit;

/// Wires the decision graph together and exposes `run` and `learn`.
///
/// Holds no per-run state: every run's result travels in the returned `RunHandle`.
pub struct Orchestrator {
    engine: GraphEngine,
    policy: ToolPolicy,
    memories: MemoryBank,
    reflector: Reflector,
    extractor: SignalExtractor,
    run_log: Option<RunLog>,
}

impl Orchestrator {
    /// Build and validate the graph. Judges get `deep`; every other node gets `quick`.
    pub fn new(
        config: &CouncilConfig,
        quick: Arc<dyn LanguageModel>,
        deep: Arc<dyn LanguageModel>,
        toolkit: Arc<Toolkit>,
        memories: MemoryBank,
        run_log: Option<RunLog>,
    ) -> Result<Self, AgentError> {
        let graph = &config.graph;
        let n = config.memory.n_matches;
        let router = ConditionalRouter::new(
            graph.analysts.clone(),
            graph.max_debate_rounds,
            graph.max_risk_rounds,
        )?;

        let mut engine =
            GraphEngine::new(router.entry(), graph.step_limit)?.with_edges(router.edge_table());

        for kind in router.analysts() {
            engine.add_node(Arc::new(AnalystNode::new(
                *kind,
                Arc::clone(&quick),
                Arc::clone(&toolkit),
            )));
            engine.add_node(Arc::new(ToolNode::new(*kind, Arc::clone(&toolkit))));
        }
        engine.add_node(Arc::new(ResearcherNode::new(
            Researcher::Bull,
            Arc::clone(&quick),
            Arc::clone(memories.get(MemoryRole::BullResearcher)),
            n,
        )));
        engine.add_node(Arc::new(ResearcherNode::new(
            Researcher::Bear,
            Arc::clone(&quick),
            Arc::clone(memories.get(MemoryRole::BearResearcher)),
            n,
        )));
        engine.add_node(Arc::new(ResearchManagerNode::new(
            Arc::clone(&deep),
            Arc::clone(memories.get(MemoryRole::InvestJudge)),
            n,
        )));
        engine.add_node(Arc::new(TraderNode::new(
            Arc::clone(&quick),
            Arc::clone(memories.get(MemoryRole::Trader)),
            n,
        )));
        engine.add_node(Arc::new(RiskDebatorNode::risky(Arc::clone(&quick))));
        engine.add_node(Arc::new(RiskDebatorNode::safe(Arc::clone(&quick))));
        engine.add_node(Arc::new(RiskDebatorNode::neutral(Arc::clone(&quick))));
        engine.add_node(Arc::new(RiskJudgeNode::new(
            Arc::clone(&deep),
            Arc::clone(memories.get(MemoryRole::RiskJudge)),
            n,
        )));
        engine.validate()?;

        info!(
            analysts = router.analysts().len(),
            debate_rounds = router.max_debate_rounds(),
            risk_rounds = router.max_risk_rounds(),
            step_limit = engine.step_limit(),
            "Decision graph ready"
        );

        Ok(Self {
            engine,
            policy: ToolPolicy::from_online_flag(config.tools.online),
            memories,
            reflector: Reflector::new(Arc::clone(&quick)),
            extractor: SignalExtractor::new(Some(quick)),
            run_log,
        })
    }

    pub fn memories(&self) -> &MemoryBank {
        &self.memories
    }

    pub fn run_log(&self) -> Option<&RunLog> {
        self.run_log.as_ref()
    }

    pub async fn run(&self, subject: &str, trade_date: NaiveDate) -> Result<RunHandle, AgentError> {
        self.run_with_policy(subject, trade_date, self.policy).await
    }

    pub async fn run_with_policy(
        &self,
        subject: &str,
        trade_date: NaiveDate,
        policy: ToolPolicy,
    ) -> Result<RunHandle, AgentError> {
        self.run_observed(subject, trade_date, policy, &mut NoopObserver)
            .await
    }

    /// Run the full graph, extract the signal and record the run.
    pub async fn run_observed(
        &self,
        subject: &str,
        trade_date: NaiveDate,
        policy: ToolPolicy,
        observer: &mut (dyn StepObserver + Send),
    ) -> Result<RunHandle, AgentError> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(AgentError::Config("subject must not be empty".to_string()));
        }

        let start = Instant::now();
        info!(subject = %subject, date = %trade_date, policy = ?policy, "Starting run");

        let execution = self
            .engine
            .execute_observed(
                DecisionState::new(subject, trade_date),
                NodeContext::new(policy),
                observer,
            )
            .await?;
        let signal = self.extractor.extract(&execution.state.final_decision).await;

        let handle = RunHandle {
            run_id: Uuid::new_v4(),
            subject: subject.to_string(),
            trade_date,
            state: execution.state,
            signal,
            tool_policy: policy,
            steps: execution.steps,
            elapsed_ms: start.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
        };

        if let Some(log) = &self.run_log {
            if let Err(e) = log.record(&handle) {
                warn!(run_id = %handle.run_id, error = %e, "Failed to record run");
            }
        }

        info!(
            subject = %subject,
            signal = %handle.signal,
            steps = handle.steps,
            elapsed_ms = handle.elapsed_ms,
            "Run complete"
        );
        Ok(handle)
    }

    /// Reflect on a finished run given its realized return.
    pub async fn learn(&self, handle: &RunHandle, outcome: Decimal) -> ReflectionReport {
        info!(run_id = %handle.run_id, subject = %handle.subject, outcome = %outcome, "Learning from outcome");
        self.reflector
            .reflect(&handle.state, outcome, &self.memories)
            .await
    }
}
