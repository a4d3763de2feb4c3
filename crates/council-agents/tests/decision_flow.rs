//! End-to-end runs of the decision graph against scripted models.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use council_agents::engine::RunTrace;
use council_agents::graph::NodeId;
use council_agents::test_support::{ScriptedModel, StaticTool};
use council_agents::{AgentError, Orchestrator, Toolkit};
use council_memory::{HashingEmbedder, MemoryBank, MemoryDb, RunLog};
use council_models::config::CouncilConfig;
use council_models::memory_record::MemoryRole;
use council_models::run::ToolPolicy;
use council_models::signal::Signal;
use council_models::state::{AnalystKind, MessageRole};
use rust_decimal_macros::dec;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
}

fn quick_model() -> ScriptedModel {
    ScriptedModel::new()
        .fallback("Balanced view with a slight upside bias.")
        .reply("market_analyst", "Price above the 50 SMA, MACD positive.")
        .reply("social_analyst", "Retail sentiment turned euphoric this week.")
        .reply("news_analyst", "New export limits announced on Tuesday.")
        .reply("fundamentals_analyst", "Gross margin at a record 78%.")
        .reply("trader", "Enter in thirds. FINAL TRANSACTION PROPOSAL: **BUY**")
}

fn deep_model() -> ScriptedModel {
    ScriptedModel::new()
        .reply("research_manager", "Side with the bull. Accumulate on dips.")
        .reply(
            "risk_judge",
            "Keep the position small. FINAL TRANSACTION PROPOSAL: **BUY**",
        )
}

fn config(m: u32, r: u32) -> CouncilConfig {
    let mut config = CouncilConfig::default();
    config.graph.max_debate_rounds = m;
    config.graph.max_risk_rounds = r;
    config
}

fn bank() -> MemoryBank {
    MemoryBank::in_memory(Arc::new(HashingEmbedder::default()))
}

fn empty_toolkit() -> Arc<Toolkit> {
    Arc::new(Toolkit::new(10, Duration::from_secs(60)))
}

fn orchestrator(
    config: &CouncilConfig,
    quick: Arc<ScriptedModel>,
    deep: Arc<ScriptedModel>,
) -> Orchestrator {
    Orchestrator::new(config, quick, deep, empty_toolkit(), bank(), None).unwrap()
}

#[tokio::test]
async fn single_round_run_reaches_a_decision() {
    let quick = Arc::new(quick_model());
    let deep = Arc::new(deep_model());
    let orchestrator = orchestrator(&config(1, 1), quick.clone(), deep.clone());

    let mut trace = RunTrace::default();
    let handle = orchestrator
        .run_observed("NVDA", date(), ToolPolicy::Online, &mut trace)
        .await
        .unwrap();

    // 4 analysts, 2 researchers, manager, trader, 3 debators, judge.
    assert_eq!(handle.steps, 12);
    assert_eq!(trace.count(NodeId::ResearchManager), 1);
    assert_eq!(trace.count(NodeId::Trader), 1);
    assert_eq!(trace.count(NodeId::RiskJudge), 1);
    assert_eq!(*trace.nodes().last().unwrap(), NodeId::RiskJudge);

    let state = &handle.state;
    assert_eq!(state.market_report, "Price above the 50 SMA, MACD positive.");
    assert_eq!(state.fundamentals_report, "Gross margin at a record 78%.");
    assert_eq!(state.investment_plan, "Side with the bull. Accumulate on dips.");
    assert_eq!(state.investment_debate.judge_decision, state.investment_plan);
    assert!(state.trader_plan.contains("FINAL TRANSACTION PROPOSAL"));
    assert_eq!(state.final_decision, state.risk_debate.judge_decision);
    assert_eq!(handle.signal, Signal::Buy);
    assert!(handle.signal.is_actionable());

    // Judges run on the deep model, everything else on the quick one.
    let deep_agents: Vec<String> = deep.requests().into_iter().map(|r| r.agent).collect();
    assert_eq!(deep_agents, vec!["research_manager", "risk_judge"]);
    assert_eq!(quick.calls_for("research_manager"), 0);
    assert_eq!(quick.calls_for("risk_judge"), 0);
}

#[tokio::test]
async fn debate_turns_follow_round_limits() {
    for m in 1..=3u32 {
        for r in 1..=3u32 {
            let orchestrator = orchestrator(
                &config(m, r),
                Arc::new(quick_model()),
                Arc::new(deep_model()),
            );
            let mut trace = RunTrace::default();
            let handle = orchestrator
                .run_observed("NVDA", date(), ToolPolicy::Online, &mut trace)
                .await
                .unwrap();

            let researcher_turns =
                trace.count(NodeId::BullResearcher) + trace.count(NodeId::BearResearcher);
            let risk_turns = trace.count(NodeId::RiskyAnalyst)
                + trace.count(NodeId::SafeAnalyst)
                + trace.count(NodeId::NeutralAnalyst);

            assert_eq!(researcher_turns, 2 * m as usize, "m={m} r={r}");
            assert_eq!(trace.count(NodeId::BullResearcher), m as usize);
            assert_eq!(risk_turns, 3 * r as usize, "m={m} r={r}");
            assert_eq!(trace.count(NodeId::ResearchManager), 1);
            assert_eq!(trace.count(NodeId::RiskJudge), 1);
            assert_eq!(handle.state.investment_debate.count, 2 * m);
            assert_eq!(handle.state.risk_debate.count, 3 * r);
        }
    }
}

#[tokio::test]
async fn analyst_tool_loop_respects_policy() {
    let live = Arc::new(StaticTool::new("live_quotes", "close=912.4"));
    let mut toolkit = Toolkit::new(10, Duration::from_secs(60));
    toolkit.register(AnalystKind::Market, ToolPolicy::Online, live.clone());
    let toolkit = Arc::new(toolkit);

    let quick = Arc::new(quick_model().with_tool_call("market_analyst", "live_quotes"));
    let orchestrator = Orchestrator::new(
        &config(1, 1),
        quick.clone(),
        Arc::new(deep_model()),
        toolkit,
        bank(),
        None,
    )
    .unwrap();

    let mut trace = RunTrace::default();
    let handle = orchestrator
        .run_observed("NVDA", date(), ToolPolicy::Online, &mut trace)
        .await
        .unwrap();

    assert_eq!(
        &trace.nodes()[..3],
        &[
            NodeId::Analyst(AnalystKind::Market),
            NodeId::Tools(AnalystKind::Market),
            NodeId::Analyst(AnalystKind::Market),
        ]
    );
    assert_eq!(live.call_count(), 1);
    assert_eq!(handle.steps, 14);
    assert_eq!(
        handle.state.market_report,
        "Price above the 50 SMA, MACD positive."
    );
    let result = handle
        .state
        .messages
        .iter()
        .find(|m| m.role == MessageRole::Tool)
        .unwrap();
    assert_eq!(result.content, "close=912.4");

    // The second market request carried the tool exchange back to the model.
    let market = quick.requests_for("market_analyst");
    assert_eq!(market.len(), 2);
    assert_eq!(market[1].messages.len(), 3);

    // Offline runs get the offline toolset, which is empty here.
    let mut trace = RunTrace::default();
    orchestrator
        .run_observed("NVDA", date(), ToolPolicy::Offline, &mut trace)
        .await
        .unwrap();
    assert_eq!(trace.count(NodeId::Tools(AnalystKind::Market)), 0);
    assert_eq!(live.call_count(), 1);
}

#[tokio::test]
async fn node_failure_aborts_the_run() {
    let quick = Arc::new(quick_model().fail("bear_researcher"));
    let orchestrator = orchestrator(&config(1, 1), quick.clone(), Arc::new(deep_model()));

    let err = orchestrator.run("NVDA", date()).await.unwrap_err();
    match err {
        AgentError::NodeExecution { node, .. } => assert_eq!(node, "bear_researcher"),
        other => panic!("expected NodeExecution, got {other}"),
    }
    assert_eq!(quick.calls_for("trader"), 0);
}

#[tokio::test]
async fn step_limit_stops_long_runs() {
    let mut config = config(3, 3);
    config.graph.step_limit = 10;
    let orchestrator = orchestrator(&config, Arc::new(quick_model()), Arc::new(deep_model()));

    let result = orchestrator.run("NVDA", date()).await;
    assert!(matches!(
        result,
        Err(AgentError::StepLimitExceeded { limit: 10 })
    ));
}

#[test]
fn invalid_graph_configuration_is_rejected() {
    let mut empty = config(1, 1);
    empty.graph.analysts.clear();
    let zero_rounds = config(0, 1);
    let mut zero_steps = config(1, 1);
    zero_steps.graph.step_limit = 0;

    for config in [empty, zero_rounds, zero_steps] {
        let result = Orchestrator::new(
            &config,
            Arc::new(quick_model()),
            Arc::new(deep_model()),
            empty_toolkit(),
            bank(),
            None,
        );
        assert!(matches!(result, Err(AgentError::Config(_))));
    }
}

#[tokio::test]
async fn selected_analysts_only() {
    let mut config = config(1, 1);
    config.graph.analysts = vec![AnalystKind::News, AnalystKind::Market];
    let quick = Arc::new(quick_model());
    let orchestrator = orchestrator(&config, quick.clone(), Arc::new(deep_model()));

    let mut trace = RunTrace::default();
    let handle = orchestrator
        .run_observed("NVDA", date(), ToolPolicy::Online, &mut trace)
        .await
        .unwrap();

    assert_eq!(trace.nodes()[0], NodeId::Analyst(AnalystKind::News));
    assert_eq!(trace.nodes()[1], NodeId::Analyst(AnalystKind::Market));
    assert_eq!(quick.calls_for("social_analyst"), 0);
    assert!(handle.state.sentiment_report.is_empty());
    assert_eq!(handle.steps, 10);
}

#[tokio::test]
async fn missing_marker_falls_back_to_model() {
    let quick = Arc::new(quick_model().reply("signal_extractor", "SELL"));
    let deep = Arc::new(
        ScriptedModel::new()
            .reply("research_manager", "Side with the bear.")
            .reply("risk_judge", "Exit the position before the print."),
    );
    let orchestrator = orchestrator(&config(1, 1), quick.clone(), deep);

    let handle = orchestrator.run("NVDA", date()).await.unwrap();
    assert_eq!(handle.signal, Signal::Sell);
    assert_eq!(quick.calls_for("signal_extractor"), 1);
}

#[tokio::test]
async fn learn_writes_one_lesson_per_role_and_tolerates_failures() {
    let quick = Arc::new(
        quick_model()
            .reply("reflect_trader", "Entering in thirds paid off.")
            .fail("reflect_invest_judge"),
    );
    let orchestrator = orchestrator(&config(1, 1), quick, Arc::new(deep_model()));

    let handle = orchestrator.run("NVDA", date()).await.unwrap();
    let report = orchestrator.learn(&handle, dec!(0.042)).await;

    assert_eq!(report.entries.len(), 5);
    assert_eq!(report.stored(), 4);
    let memories = orchestrator.memories();
    assert_eq!(memories.get(MemoryRole::InvestJudge).len(), 0);
    for role in [
        MemoryRole::BullResearcher,
        MemoryRole::BearResearcher,
        MemoryRole::Trader,
        MemoryRole::RiskJudge,
    ] {
        assert_eq!(memories.get(role).len(), 1, "{role}");
    }

    let recalled = memories
        .get(MemoryRole::Trader)
        .recall(&handle.state.situation(), 1)
        .unwrap();
    assert_eq!(recalled[0].record.lesson, "Entering in thirds paid off.");
}

#[tokio::test]
async fn lessons_reach_the_next_run() {
    let quick = Arc::new(quick_model().reply("reflect_trader", "Do not chase gaps."));
    let orchestrator = orchestrator(&config(1, 1), quick.clone(), Arc::new(deep_model()));

    let first = orchestrator.run("NVDA", date()).await.unwrap();
    orchestrator.learn(&first, dec!(-0.06)).await;

    let next_day = NaiveDate::from_ymd_opt(2024, 5, 13).unwrap();
    orchestrator.run("NVDA", next_day).await.unwrap();

    let trader = quick.requests_for("trader");
    assert_eq!(trader.len(), 2);
    assert!(trader[0].messages[0].content.contains("No past memories found."));
    assert!(trader[1].messages[0].content.contains("Do not chase gaps."));
}

#[tokio::test]
async fn runs_are_recorded_in_the_run_log() {
    let db = Arc::new(Mutex::new(MemoryDb::open_in_memory().unwrap()));
    let log = RunLog::new(db.clone());
    let memories = MemoryBank::open(Arc::new(HashingEmbedder::default()), db).unwrap();
    let orchestrator = Orchestrator::new(
        &config(1, 1),
        Arc::new(quick_model()),
        Arc::new(deep_model()),
        empty_toolkit(),
        memories,
        Some(log.clone()),
    )
    .unwrap();

    let handle = orchestrator.run("NVDA", date()).await.unwrap();
    let loaded = log.latest("NVDA", date()).unwrap();
    assert_eq!(loaded.run_id, handle.run_id);
    assert_eq!(loaded.signal, Signal::Buy);

    let report = orchestrator.learn(&loaded, dec!(0.01)).await;
    assert_eq!(report.stored(), 5);
}
