//! Test doubles for the language-model and data-fetch boundaries.
//!
//! `ScriptedModel` answers by requesting agent name, so a whole decision graph can run
//! without the `claude` CLI.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use council_models::state::{MessageRole, ToolCall};

use crate::error::AgentError;
use crate::llm::{Generation, GenerationRequest, LanguageModel};
use crate::toolkit::Tool;

/// A language model with canned replies keyed by `GenerationRequest::agent`.
#[derive(Default)]
pub struct ScriptedModel {
    replies: HashMap<String, String>,
    tool_requests: HashMap<String, String>,
    failing: HashSet<String>,
    fallback: Option<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, agent: &str, text: &str) -> Self {
        self.replies.insert(agent.to_string(), text.to_string());
        self
    }

    /// The agent requests `tool` once, on its first turn where tools are offered.
    pub fn with_tool_call(mut self, agent: &str, tool: &str) -> Self {
        self.tool_requests.insert(agent.to_string(), tool.to_string());
        self
    }

    pub fn fail(mut self, agent: &str) -> Self {
        self.failing.insert(agent.to_string());
        self
    }

    /// Reply for any agent without a scripted one.
    pub fn fallback(mut self, text: &str) -> Self {
        self.fallback = Some(text.to_string());
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn requests_for(&self, agent: &str) -> Vec<GenerationRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.agent == agent)
            .collect()
    }

    pub fn calls_for(&self, agent: &str) -> usize {
        self.requests_for(agent).len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, AgentError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }

        if self.failing.contains(&request.agent) {
            return Err(AgentError::Cli(format!("scripted failure for {}", request.agent)));
        }

        let has_results = request.messages.iter().any(|m| m.role == MessageRole::Tool);
        if let Some(tool) = self.tool_requests.get(&request.agent) {
            if !request.tools.is_empty() && !has_results {
                return Ok(Generation {
                    text: String::new(),
                    tool_calls: vec![ToolCall {
                        id: format!("call_{}", request.agent),
                        name: tool.clone(),
                        arguments: serde_json::json!({"symbol": "NVDA"}),
                    }],
                });
            }
        }

        self.replies
            .get(&request.agent)
            .or(self.fallback.as_ref())
            .map(|text| Generation::text(text.clone()))
            .ok_or_else(|| AgentError::Cli(format!("no scripted reply for {}", request.agent)))
    }
}

/// A data-fetch tool that always returns the same payload and counts its calls.
pub struct StaticTool {
    name: String,
    payload: String,
    calls: AtomicUsize,
}

impl StaticTool {
    pub fn new(name: &str, payload: &str) -> Self {
        Self {
            name: name.to_string(),
            payload: payload.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Static test payload"
    }

    async fn fetch(&self, _arguments: &serde_json::Value) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}
