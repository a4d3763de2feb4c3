use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The roles that learn from outcomes. Each owns an independent memory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemoryRole {
    BullResearcher,
    BearResearcher,
    Trader,
    InvestJudge,
    RiskJudge,
}

impl MemoryRole {
    pub const ALL: [MemoryRole; 5] = [
        MemoryRole::BullResearcher,
        MemoryRole::BearResearcher,
        MemoryRole::Trader,
        MemoryRole::InvestJudge,
        MemoryRole::RiskJudge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryRole::BullResearcher => "bull_researcher",
            MemoryRole::BearResearcher => "bear_researcher",
            MemoryRole::Trader => "trader",
            MemoryRole::InvestJudge => "invest_judge",
            MemoryRole::RiskJudge => "risk_judge",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

impl std::fmt::Display for MemoryRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A past situation and the lesson learned from its outcome. Never mutated after write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub role: MemoryRole,
    pub situation: String,
    pub lesson: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}
