use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signal::Signal;
use crate::state::DecisionState;

/// Which toolset analysts may call. Resolved once when a run starts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolPolicy {
    /// Live data sources.
    #[default]
    Online,
    /// Cached or historical data, for backtests.
    Offline,
}

impl ToolPolicy {
    pub fn from_online_flag(online: bool) -> Self {
        if online {
            ToolPolicy::Online
        } else {
            ToolPolicy::Offline
        }
    }
}

/// The result of one decision run, and the context `learn` operates on.
///
/// Also the persisted audit record for the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunHandle {
    pub run_id: Uuid,
    pub subject: String,
    pub trade_date: NaiveDate,
    pub state: DecisionState,
    pub signal: Signal,
    pub tool_policy: ToolPolicy,
    /// Node invocations the engine made.
    pub steps: usize,
    pub elapsed_ms: u64,
    pub completed_at: DateTime<Utc>,
}
