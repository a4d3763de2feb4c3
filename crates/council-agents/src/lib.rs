pub mod claude_cli;
pub mod engine;
pub mod error;
pub mod graph;
pub mod llm;
pub mod nodes;
pub mod openai;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod reflection;
pub mod router;
pub mod signal;
pub mod toolkit;

pub mod test_support;

pub use engine::{GraphEngine, NodeContext, RunTrace, StepObserver};
pub use error::AgentError;
pub use graph::{Edge, Next, NodeId};
pub use llm::{ClaudeCliModel, Generation, GenerationRequest, LanguageModel, ToolSpec};
pub use openai::ChatCompletionsModel;
pub use orchestrator::Orchestrator;
pub use reflection::{ReflectionReport, Reflector, RoleReflection};
pub use router::ConditionalRouter;
pub use signal::SignalExtractor;
pub use toolkit::{CommandTool, Tool, Toolkit};
