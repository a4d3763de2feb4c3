use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Claude CLI error: {0}")]
    Cli(String),

    #[error("LLM HTTP error: {0}")]
    Http(String),

    #[error("Agent response parse error: {0}")]
    Parse(String),

    #[error("Agent timed out after {0} seconds")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Step limit of {limit} node invocations exceeded")]
    StepLimitExceeded { limit: usize },

    #[error("Node {node} failed: {source}")]
    NodeExecution {
        node: String,
        #[source]
        source: Box<AgentError>,
    },

    #[error("Memory error: {0}")]
    Memory(#[from] council_memory::MemoryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
