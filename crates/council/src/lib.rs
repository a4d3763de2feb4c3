//! Council - multi-agent trade decision engine
//!
//! Analysts, a bull/bear debate, a trader and a risk debate collaborate on one
//! BUY/SELL/HOLD decision per subject and date, then learn from realized outcomes.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use council::models::config::CouncilConfig;
//! use council::agents::{Orchestrator, LanguageModel, Toolkit};
//! use council::memory::{MemoryBank, HashingEmbedder};
//! ```

pub use council_agents as agents;
pub use council_memory as memory;
pub use council_models as models;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use council_agents::{
    AgentError, ChatCompletionsModel, ClaudeCliModel, LanguageModel, Orchestrator, Toolkit,
};
use council_memory::{Embedder, HashingEmbedder, MemoryBank, MemoryDb, RunLog};
use council_models::config::{CouncilConfig, EmbedderKind, LlmConfig, MemoryConfig};
use tracing::{info, warn};

pub const CLAUDE_CLI_PROVIDER: &str = "claude-cli";
pub const OPENAI_PROVIDER: &str = "openai";

/// Load a TOML configuration file.
pub fn load_config(path: &str) -> Result<CouncilConfig, anyhow::Error> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {path}"))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse config: {path}"))
}

/// The quick and deep models for the configured provider.
pub fn build_models(
    llm: &LlmConfig,
) -> Result<(Arc<dyn LanguageModel>, Arc<dyn LanguageModel>), AgentError> {
    let timeout = Duration::from_secs(llm.timeout_seconds);
    match llm.provider.as_str() {
        CLAUDE_CLI_PROVIDER => {
            let quick: Arc<dyn LanguageModel> =
                Arc::new(ClaudeCliModel::new(llm.quick_model.clone(), timeout));
            let deep: Arc<dyn LanguageModel> =
                Arc::new(ClaudeCliModel::new(llm.deep_model.clone(), timeout));
            Ok((quick, deep))
        }
        OPENAI_PROVIDER => {
            let api_key = std::env::var(&llm.api_key_env).ok();
            if api_key.is_none() && llm.backend_url.is_none() {
                warn!(env = %llm.api_key_env, "No API key set for the public OpenAI endpoint");
            }
            let backend_url = llm.backend_url.as_deref();
            let quick = ChatCompletionsModel::new(
                llm.quick_model.clone(),
                backend_url,
                api_key.clone(),
                timeout,
            )?;
            let deep = ChatCompletionsModel::new(llm.deep_model.clone(), backend_url, api_key, timeout)?;
            info!(endpoint = %quick.endpoint(), "Using chat-completions backend");
            let quick: Arc<dyn LanguageModel> = Arc::new(quick);
            let deep: Arc<dyn LanguageModel> = Arc::new(deep);
            Ok((quick, deep))
        }
        other => Err(AgentError::Config(format!(
            "unknown llm provider {other:?}, expected {CLAUDE_CLI_PROVIDER:?} or {OPENAI_PROVIDER:?}"
        ))),
    }
}

/// The embedder selected by `memory.embedder`.
pub fn build_embedder(memory: &MemoryConfig) -> Result<Arc<dyn Embedder>, anyhow::Error> {
    match memory.embedder {
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(memory.embedding_dimension)?)),
        EmbedderKind::Fastembed => fastembed_embedder(&memory.embedding_model),
    }
}

#[cfg(feature = "fastembed")]
fn fastembed_embedder(model: &str) -> Result<Arc<dyn Embedder>, anyhow::Error> {
    let embedder = council_memory::FastEmbedder::new(model)
        .with_context(|| format!("Failed to load embedding model {model}"))?;
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "fastembed"))]
fn fastembed_embedder(_model: &str) -> Result<Arc<dyn Embedder>, anyhow::Error> {
    anyhow::bail!("memory.embedder = \"fastembed\" needs the `fastembed` feature")
}

/// Build an Orchestrator from configuration.
///
/// With `memory.sqlite_path` set, memories and the run log persist across processes.
pub fn build_orchestrator(config: &CouncilConfig) -> Result<Orchestrator, anyhow::Error> {
    let (quick, deep) = build_models(&config.llm)?;
    build_orchestrator_with_models(config, quick, deep)
}

/// Same as `build_orchestrator` with caller-supplied models.
pub fn build_orchestrator_with_models(
    config: &CouncilConfig,
    quick: Arc<dyn LanguageModel>,
    deep: Arc<dyn LanguageModel>,
) -> Result<Orchestrator, anyhow::Error> {
    let embedder = build_embedder(&config.memory)?;

    let (memories, run_log) = match &config.memory.sqlite_path {
        Some(path) => {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
            }
            let db = Arc::new(Mutex::new(
                MemoryDb::open(path).with_context(|| format!("Failed to open memory db: {path}"))?,
            ));
            let memories = MemoryBank::open(embedder, Arc::clone(&db))?;
            info!(path = %path, "Loaded persistent memories");
            (memories, Some(RunLog::new(db)))
        }
        None => (MemoryBank::in_memory(embedder), None),
    };

    let toolkit = Arc::new(Toolkit::from_config(&config.tools));
    let orchestrator = Orchestrator::new(config, quick, deep, toolkit, memories, run_log)?;
    Ok(orchestrator)
}
