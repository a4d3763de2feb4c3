use async_trait::async_trait;
use council_models::state::{Message, MessageRole, ToolCall};
use serde::Serialize;

use crate::claude_cli::{invoke_claude, ClaudeCliConfig};
use crate::error::AgentError;
use crate::parser::parse_generation;

/// A data-fetch tool as advertised to the model.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
}

/// One blocking call into the text-generation capability.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Name of the requesting node, for logs and test doubles.
    pub agent: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
}

impl GenerationRequest {
    pub fn new(agent: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            system: system.into(),
            messages: Vec::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user("user", content));
        self
    }

    pub fn with_messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// Model output: prose, tool requests, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// The text, or a parse error when the model produced nothing usable.
    pub fn into_text(self) -> Result<String, AgentError> {
        if self.text.trim().is_empty() {
            return Err(AgentError::Parse("model returned no text".to_string()));
        }
        Ok(self.text)
    }
}

/// The text-generation capability. Mockable for testing.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, AgentError>;
}

/// A language model backed by the `claude` CLI.
pub struct ClaudeCliModel {
    pub cli_config: ClaudeCliConfig,
}

impl ClaudeCliModel {
    pub fn new(model: String, timeout: std::time::Duration) -> Self {
        Self {
            cli_config: ClaudeCliConfig { model, timeout },
        }
    }
}

#[async_trait]
impl LanguageModel for ClaudeCliModel {
    fn name(&self) -> &str {
        &self.cli_config.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, AgentError> {
        let system = if request.tools.is_empty() {
            request.system.clone()
        } else {
            format!("{}\n\n{}", request.system, tool_protocol(&request.tools)?)
        };
        let transcript = render_transcript(&request.messages);

        let raw = invoke_claude(&system, &transcript, &self.cli_config).await?;
        Ok(parse_generation(&raw, !request.tools.is_empty()))
    }
}

pub(crate) fn tool_protocol(tools: &[ToolSpec]) -> Result<String, AgentError> {
    Ok(format!(
        "You have access to the following tools:\n{}\n\n\
         To call tools, reply with ONLY a JSON object of the form \
         {{\"tool_calls\": [{{\"name\": \"<tool>\", \"arguments\": {{...}}}}]}}. \
         Tool results will be sent back to you. When you have enough information, \
         reply with your final report as plain text instead.",
        serde_json::to_string_pretty(tools)?
    ))
}

pub(crate) fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| match m.role {
            MessageRole::System => format!("[system]\n{}", m.content),
            MessageRole::User => m.content.clone(),
            MessageRole::Assistant if m.requests_tools() => {
                let calls = m
                    .tool_calls
                    .iter()
                    .map(|c| format!("{}({})", c.name, c.arguments))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[you requested tools: {calls}]")
            }
            MessageRole::Assistant => format!("[you]\n{}", m.content),
            MessageRole::Tool => format!(
                "[tool result {}]\n{}",
                m.tool_call_id.as_deref().unwrap_or("?"),
                m.content
            ),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
