//! Integration tests that invoke the real Claude CLI.
//!
//! These tests are `#[ignore]` by default. They require the `claude` CLI on PATH with
//! valid credentials configured.
//!
//! Run explicitly with:
//! ```bash
//! cargo test -p council-agents --test cli_integration -- --ignored
//! ```

use std::time::Duration;

use council_agents::claude_cli::check_cli_available;
use council_agents::signal::SignalExtractor;
use council_agents::{ClaudeCliModel, GenerationRequest, LanguageModel, ToolSpec};
use council_models::signal::Signal;
use std::sync::Arc;

fn model() -> ClaudeCliModel {
    ClaudeCliModel::new("claude-3-5-haiku-latest".to_string(), Duration::from_secs(60))
}

#[tokio::test]
#[ignore]
async fn cli_is_available() {
    assert!(
        check_cli_available().await,
        "claude CLI not found on PATH"
    );
}

/// Offering a tool should produce a parseable tool-call envelope.
///
/// Catches changes in the CLI's output format that would otherwise only surface mid-run.
#[tokio::test]
#[ignore]
async fn tool_envelope_round_trips_through_cli() {
    if !check_cli_available().await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let request = GenerationRequest::new(
        "market_analyst",
        "You are a test agent. You must call the get_price_history tool before answering.",
    )
    .with_user("Analyze NVDA as of 2024-05-10.")
    .with_tools(vec![ToolSpec {
        name: "get_price_history".to_string(),
        description: "Daily OHLCV bars. Arguments: {\"symbol\": string}".to_string(),
    }]);

    let generation = model().generate(&request).await.expect("CLI invocation failed");
    assert_eq!(
        generation.tool_calls.len(),
        1,
        "Expected one tool call, got text: {}",
        generation.text
    );
    assert_eq!(generation.tool_calls[0].name, "get_price_history");
}

#[tokio::test]
#[ignore]
async fn fallback_extraction_via_cli() {
    if !check_cli_available().await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let extractor = SignalExtractor::new(Some(Arc::new(model())));
    let signal = extractor
        .extract("Given the collapse in guidance we should exit the entire position today.")
        .await;
    assert_eq!(signal, Signal::Sell);
}
