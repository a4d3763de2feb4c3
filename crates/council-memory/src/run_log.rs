use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use council_models::run::RunHandle;
use tracing::debug;

use crate::error::MemoryError;
use crate::sqlite::MemoryDb;

/// Audit log of completed runs, keyed by subject and trade date.
#[derive(Clone)]
pub struct RunLog {
    db: Arc<Mutex<MemoryDb>>,
}

impl RunLog {
    pub fn new(db: Arc<Mutex<MemoryDb>>) -> Self {
        Self { db }
    }

    pub fn record(&self, handle: &RunHandle) -> Result<(), MemoryError> {
        let db = self
            .db
            .lock()
            .map_err(|e| MemoryError::Unavailable(format!("SQLite mutex poisoned: {e}")))?;
        db.insert_run(handle)?;
        debug!(run_id = %handle.run_id, subject = %handle.subject, date = %handle.trade_date, "Recorded run");
        Ok(())
    }

    /// The latest run for `subject` on `trade_date`, or `RunNotFound`.
    pub fn latest(&self, subject: &str, trade_date: NaiveDate) -> Result<RunHandle, MemoryError> {
        let db = self
            .db
            .lock()
            .map_err(|e| MemoryError::Unavailable(format!("SQLite mutex poisoned: {e}")))?;
        db.latest_run(subject, trade_date)?
            .ok_or_else(|| MemoryError::RunNotFound {
                subject: subject.to_string(),
                trade_date,
            })
    }

    pub fn dates(&self, subject: &str) -> Result<Vec<NaiveDate>, MemoryError> {
        let db = self
            .db
            .lock()
            .map_err(|e| MemoryError::Unavailable(format!("SQLite mutex poisoned: {e}")))?;
        db.run_dates(subject)
    }
}
