use serde::{Deserialize, Serialize};

use crate::run::ToolPolicy;
use crate::state::AnalystKind;

/// Top-level configuration for Council.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CouncilConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Text-generation capability settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    /// Which generation backend to use: `claude-cli` or `openai`.
    pub provider: String,
    /// Model for the two judges.
    pub deep_model: String,
    /// Model for analysts, researchers, the trader, risk debators and reflection.
    pub quick_model: String,
    /// Per-invocation timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
    /// Base URL of an OpenAI-compatible API, e.g. a local Ollama server.
    /// Defaults to the public OpenAI endpoint. Unused by `claude-cli`.
    #[serde(default)]
    pub backend_url: Option<String>,
    /// Environment variable holding the API key for HTTP providers.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "claude-cli".to_string(),
            deep_model: "claude-sonnet-4-5-20250929".to_string(),
            quick_model: "claude-3-5-haiku-latest".to_string(),
            timeout_seconds: default_llm_timeout(),
            backend_url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

/// Shape and bounds of the decision graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphConfig {
    /// Analysts to run, in order.
    #[serde(default = "default_analysts")]
    pub analysts: Vec<AnalystKind>,
    /// Bull/bear rounds; each round is one turn per side.
    #[serde(default = "default_rounds")]
    pub max_debate_rounds: u32,
    /// Risky/safe/neutral rounds; each round is one turn per debator.
    #[serde(default = "default_rounds")]
    pub max_risk_rounds: u32,
    /// Ceiling on node invocations per run.
    #[serde(default = "default_step_limit")]
    pub step_limit: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            analysts: default_analysts(),
            max_debate_rounds: default_rounds(),
            max_risk_rounds: default_rounds(),
            step_limit: default_step_limit(),
        }
    }
}

/// How situations are turned into vectors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderKind {
    /// Deterministic feature hashing. No model weights, matches on shared words only.
    #[default]
    Hashing,
    /// Sentence embeddings from a local ONNX model.
    Fastembed,
}

/// Situation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    /// SQLite file holding memories and the run log. In-memory only when unset.
    #[serde(default)]
    pub sqlite_path: Option<String>,
    #[serde(default)]
    pub embedder: EmbedderKind,
    /// Vector width for the hashing embedder.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    /// Model name for the fastembed embedder.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Precedents recalled per memory-consulting node.
    #[serde(default = "default_n_matches")]
    pub n_matches: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            sqlite_path: None,
            embedder: EmbedderKind::default(),
            embedding_dimension: default_embedding_dimension(),
            embedding_model: default_embedding_model(),
            n_matches: default_n_matches(),
        }
    }
}

/// Data-fetch capability settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    /// Use live tools (`true`) or cached/historical ones (`false`).
    #[serde(default = "default_true")]
    pub online: bool,
    #[serde(default = "default_cache_capacity")]
    pub cache_max_capacity: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_tool_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub commands: Vec<ToolCommandConfig>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            online: true,
            cache_max_capacity: default_cache_capacity(),
            cache_ttl_seconds: default_cache_ttl(),
            timeout_seconds: default_tool_timeout(),
            commands: Vec::new(),
        }
    }
}

/// An external program registered as a named data-fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCommandConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Analyst allowed to call this tool.
    pub analyst: AnalystKind,
    /// Toolset the tool belongs to.
    pub policy: ToolPolicy,
    pub program: String,
    /// Fixed leading arguments. The call's JSON arguments are appended last.
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_llm_timeout() -> u64 {
    120
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_analysts() -> Vec<AnalystKind> {
    AnalystKind::ALL.to_vec()
}
fn default_rounds() -> u32 {
    1
}
fn default_step_limit() -> usize {
    100
}
fn default_embedding_dimension() -> usize {
    512
}
fn default_embedding_model() -> String {
    "bge-small-en-v1.5".to_string()
}
fn default_n_matches() -> usize {
    2
}
fn default_true() -> bool {
    true
}
fn default_cache_capacity() -> u64 {
    1_000
}
fn default_cache_ttl() -> u64 {
    3_600
}
fn default_tool_timeout() -> u64 {
    60
}
