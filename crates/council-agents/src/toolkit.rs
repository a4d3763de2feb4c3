use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use council_models::config::{ToolCommandConfig, ToolsConfig};
use council_models::run::ToolPolicy;
use council_models::state::{AnalystKind, ToolCall};
use moka::future::Cache;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::llm::ToolSpec;

/// A data-fetch capability. The core only needs it to be callable by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    async fn fetch(&self, arguments: &serde_json::Value) -> Result<String, AgentError>;
}

/// A tool served by an external program. The call's JSON arguments are passed as the
/// last command-line argument and stdout is the result.
pub struct CommandTool {
    name: String,
    description: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandTool {
    pub fn from_config(config: &ToolCommandConfig, timeout: Duration) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            program: config.program.clone(),
            args: config.args.clone(),
            timeout,
        }
    }
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn fetch(&self, arguments: &serde_json::Value) -> Result<String, AgentError> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.program)
                .args(&self.args)
                .arg(arguments.to_string())
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| AgentError::Timeout(self.timeout.as_secs()))?
        .map_err(|e| AgentError::Tool(format!("{}: failed to spawn {}: {e}", self.name, self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::Tool(format!(
                "{} exited {}: {}",
                self.name, output.status, stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Registry of data-fetch tools, grouped per analyst and policy, with a TTL result cache.
pub struct Toolkit {
    tools: HashMap<String, Arc<dyn Tool>>,
    toolsets: HashMap<(AnalystKind, ToolPolicy), Vec<String>>,
    cache: Cache<String, String>,
}

impl Toolkit {
    pub fn new(cache_max_capacity: u64, cache_ttl: Duration) -> Self {
        Self {
            tools: HashMap::new(),
            toolsets: HashMap::new(),
            cache: Cache::builder()
                .max_capacity(cache_max_capacity)
                .time_to_live(cache_ttl)
                .build(),
        }
    }

    /// Register every configured command tool.
    pub fn from_config(config: &ToolsConfig) -> Self {
        let mut toolkit = Self::new(
            config.cache_max_capacity,
            Duration::from_secs(config.cache_ttl_seconds),
        );
        let timeout = Duration::from_secs(config.timeout_seconds);
        for command in &config.commands {
            toolkit.register(
                command.analyst,
                command.policy,
                Arc::new(CommandTool::from_config(command, timeout)),
            );
        }
        toolkit
    }

    /// Make `tool` available to `analyst` under `policy`.
    pub fn register(&mut self, analyst: AnalystKind, policy: ToolPolicy, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let set = self.toolsets.entry((analyst, policy)).or_default();
        if !set.contains(&name) {
            set.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Tools an analyst may call under the given policy, in registration order.
    pub fn toolset(&self, analyst: AnalystKind, policy: ToolPolicy) -> Vec<ToolSpec> {
        self.toolsets
            .get(&(analyst, policy))
            .into_iter()
            .flatten()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
            })
            .collect()
    }

    pub fn allows(&self, analyst: AnalystKind, policy: ToolPolicy, name: &str) -> bool {
        self.toolsets
            .get(&(analyst, policy))
            .is_some_and(|set| set.iter().any(|n| n == name))
    }

    /// Execute one call on behalf of `analyst`. Results are cached per name and arguments.
    pub async fn call(
        &self,
        analyst: AnalystKind,
        policy: ToolPolicy,
        call: &ToolCall,
    ) -> Result<String, AgentError> {
        if !self.allows(analyst, policy, &call.name) {
            return Err(AgentError::Tool(format!(
                "tool {} is not available to the {analyst} analyst",
                call.name
            )));
        }
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| AgentError::Tool(format!("unknown tool {}", call.name)))?;

        let key = format!("{}:{}", call.name, call.arguments);
        if let Some(hit) = self.cache.get(&key).await {
            debug!(tool = %call.name, "Tool cache hit");
            return Ok(hit);
        }

        let result = tool.fetch(&call.arguments).await.inspect_err(|e| {
            warn!(tool = %call.name, error = %e, "Tool call failed");
        })?;
        self.cache.insert(key, result.clone()).await;
        Ok(result)
    }
}
