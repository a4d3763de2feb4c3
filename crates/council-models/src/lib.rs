pub mod config;
pub mod memory_record;
pub mod run;
pub mod signal;
pub mod state;

pub use config::{CouncilConfig, GraphConfig, LlmConfig, MemoryConfig, ToolCommandConfig, ToolsConfig};
pub use memory_record::{MemoryRecord, MemoryRole};
pub use run::{RunHandle, ToolPolicy};
pub use signal::Signal;
pub use state::{
    AnalystKind, DecisionState, InvestmentDebateState, Message, MessageRole, Researcher,
    RiskDebateState, RiskSpeaker, StatePatch, ToolCall,
};
