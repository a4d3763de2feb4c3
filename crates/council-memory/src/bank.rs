use std::sync::{Arc, Mutex};

use council_models::memory_record::MemoryRole;

use crate::embedder::Embedder;
use crate::error::MemoryError;
use crate::situation::SituationMemory;
use crate::sqlite::MemoryDb;

/// One independent `SituationMemory` per learning role.
#[derive(Clone)]
pub struct MemoryBank {
    bull: Arc<SituationMemory>,
    bear: Arc<SituationMemory>,
    trader: Arc<SituationMemory>,
    invest_judge: Arc<SituationMemory>,
    risk_judge: Arc<SituationMemory>,
}

impl MemoryBank {
    /// Empty memories that live only as long as the process.
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Self {
        let make = |role| Arc::new(SituationMemory::new(role, embedder.clone()));
        Self {
            bull: make(MemoryRole::BullResearcher),
            bear: make(MemoryRole::BearResearcher),
            trader: make(MemoryRole::Trader),
            invest_judge: make(MemoryRole::InvestJudge),
            risk_judge: make(MemoryRole::RiskJudge),
        }
    }

    /// Memories persisted in `db`, preloaded with what earlier runs learned.
    pub fn open(embedder: Arc<dyn Embedder>, db: Arc<Mutex<MemoryDb>>) -> Result<Self, MemoryError> {
        let open = |role| -> Result<Arc<SituationMemory>, MemoryError> {
            Ok(Arc::new(SituationMemory::open(role, embedder.clone(), db.clone())?))
        };
        Ok(Self {
            bull: open(MemoryRole::BullResearcher)?,
            bear: open(MemoryRole::BearResearcher)?,
            trader: open(MemoryRole::Trader)?,
            invest_judge: open(MemoryRole::InvestJudge)?,
            risk_judge: open(MemoryRole::RiskJudge)?,
        })
    }

    pub fn get(&self, role: MemoryRole) -> &Arc<SituationMemory> {
        match role {
            MemoryRole::BullResearcher => &self.bull,
            MemoryRole::BearResearcher => &self.bear,
            MemoryRole::Trader => &self.trader,
            MemoryRole::InvestJudge => &self.invest_judge,
            MemoryRole::RiskJudge => &self.risk_judge,
        }
    }
}
