use chrono::{DateTime, NaiveDate, Utc};
use council_models::memory_record::{MemoryRecord, MemoryRole};
use council_models::run::RunHandle;
use rusqlite::Connection;
use uuid::Uuid;

use crate::error::MemoryError;

/// Schema for persisted memories and the run log.
///
/// `seq` preserves insertion order, which recall uses to break similarity ties.
pub const SCHEMA_DDL: &str = "\
CREATE TABLE IF NOT EXISTS memory_records (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    id              TEXT NOT NULL UNIQUE,
    role            TEXT NOT NULL,
    situation       TEXT NOT NULL,
    lesson          TEXT NOT NULL,
    embedding_json  TEXT NOT NULL,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_memory_role ON memory_records(role);

CREATE TABLE IF NOT EXISTS run_log (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id       TEXT NOT NULL UNIQUE,
    subject      TEXT NOT NULL,
    trade_date   TEXT NOT NULL,
    signal       TEXT NOT NULL,
    handle_json  TEXT NOT NULL,
    recorded_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_run_subject_date ON run_log(subject, trade_date);
";

/// SQLite store behind situation memories and the run log.
///
/// Rows are only ever inserted; nothing here updates or deletes.
pub struct MemoryDb {
    conn: Connection,
}

impl MemoryDb {
    /// Open (or create) the database file and apply the schema. Enables WAL mode.
    pub fn open(path: &str) -> Result<Self, MemoryError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_DDL)?;
        Ok(Self { conn })
    }

    pub fn insert_record(&self, record: &MemoryRecord) -> Result<(), MemoryError> {
        let embedding_json = serde_json::to_string(&record.embedding)?;
        self.conn.execute(
            "INSERT INTO memory_records (id, role, situation, lesson, embedding_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                record.id.to_string(),
                record.role.as_str(),
                record.situation,
                record.lesson,
                embedding_json,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All records for a role, oldest first.
    pub fn load_records(&self, role: MemoryRole) -> Result<Vec<MemoryRecord>, MemoryError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, situation, lesson, embedding_json, created_at \
             FROM memory_records WHERE role = ?1 ORDER BY seq ASC",
        )?;

        let rows = stmt
            .query_map(rusqlite::params![role.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, situation, lesson, embedding_json, created_at)| {
                Ok(MemoryRecord {
                    id: parse_uuid(&id)?,
                    role,
                    situation,
                    lesson,
                    embedding: serde_json::from_str(&embedding_json)?,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    pub fn count_records(&self, role: MemoryRole) -> Result<usize, MemoryError> {
        let count: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM memory_records WHERE role = ?1",
            rusqlite::params![role.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn insert_run(&self, handle: &RunHandle) -> Result<(), MemoryError> {
        let handle_json = serde_json::to_string(handle)?;
        self.conn.execute(
            "INSERT INTO run_log (run_id, subject, trade_date, signal, handle_json, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                handle.run_id.to_string(),
                handle.subject,
                handle.trade_date.to_string(),
                handle.signal.as_str(),
                handle_json,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// The most recently recorded run for a subject and date.
    pub fn latest_run(
        &self,
        subject: &str,
        trade_date: NaiveDate,
    ) -> Result<Option<RunHandle>, MemoryError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT handle_json FROM run_log \
             WHERE subject = ?1 AND trade_date = ?2 ORDER BY seq DESC LIMIT 1",
        )?;

        let result = stmt.query_row(
            rusqlite::params![subject, trade_date.to_string()],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(MemoryError::Sqlite(e)),
        }
    }

    /// Recorded run dates for a subject, newest first.
    pub fn run_dates(&self, subject: &str) -> Result<Vec<NaiveDate>, MemoryError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT trade_date FROM run_log WHERE subject = ?1 ORDER BY trade_date DESC",
        )?;

        let dates = stmt
            .query_map(rusqlite::params![subject], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        dates
            .iter()
            .map(|d| {
                d.parse::<NaiveDate>()
                    .map_err(|e| MemoryError::Unavailable(format!("bad trade_date {d}: {e}")))
            })
            .collect()
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, MemoryError> {
    Uuid::parse_str(s).map_err(|e| MemoryError::Unavailable(format!("bad record id {s}: {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, MemoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| MemoryError::Unavailable(format!("bad timestamp {s}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_models::run::ToolPolicy;
    use council_models::signal::Signal;
    use council_models::state::DecisionState;

    fn make_record(role: MemoryRole, situation: &str) -> MemoryRecord {
        MemoryRecord {
            id: Uuid::new_v4(),
            role,
            situation: situation.to_string(),
            lesson: format!("lesson for {situation}"),
            embedding: vec![0.5, -0.25, 0.0],
            created_at: Utc::now(),
        }
    }

    fn make_handle(subject: &str, date: NaiveDate, signal: Signal) -> RunHandle {
        RunHandle {
            run_id: Uuid::new_v4(),
            subject: subject.to_string(),
            trade_date: date,
            state: DecisionState::new(subject, date),
            signal,
            tool_policy: ToolPolicy::Online,
            steps: 12,
            elapsed_ms: 10,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn records_load_in_insertion_order_per_role() {
        let db = MemoryDb::open_in_memory().unwrap();
        db.insert_record(&make_record(MemoryRole::Trader, "first")).unwrap();
        db.insert_record(&make_record(MemoryRole::BullResearcher, "other"))
            .unwrap();
        db.insert_record(&make_record(MemoryRole::Trader, "second")).unwrap();

        let trader = db.load_records(MemoryRole::Trader).unwrap();
        assert_eq!(trader.len(), 2);
        assert_eq!(trader[0].situation, "first");
        assert_eq!(trader[1].situation, "second");
        assert_eq!(trader[0].embedding, vec![0.5, -0.25, 0.0]);

        assert_eq!(db.count_records(MemoryRole::BullResearcher).unwrap(), 1);
        assert_eq!(db.count_records(MemoryRole::RiskJudge).unwrap(), 0);
    }

    #[test]
    fn duplicate_record_id_rejected() {
        let db = MemoryDb::open_in_memory().unwrap();
        let record = make_record(MemoryRole::Trader, "dup");
        db.insert_record(&record).unwrap();
        assert!(db.insert_record(&record).is_err());
    }

    #[test]
    fn latest_run_wins() {
        let db = MemoryDb::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        db.insert_run(&make_handle("NVDA", date, Signal::Hold)).unwrap();
        db.insert_run(&make_handle("NVDA", date, Signal::Buy)).unwrap();

        let latest = db.latest_run("NVDA", date).unwrap().unwrap();
        assert_eq!(latest.signal, Signal::Buy);
        assert!(db.latest_run("AAPL", date).unwrap().is_none());
    }

    #[test]
    fn run_dates_newest_first() {
        let db = MemoryDb::open_in_memory().unwrap();
        let d1 = NaiveDate::from_ymd_opt(2024, 5, 9).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        db.insert_run(&make_handle("NVDA", d1, Signal::Sell)).unwrap();
        db.insert_run(&make_handle("NVDA", d2, Signal::Buy)).unwrap();
        db.insert_run(&make_handle("NVDA", d2, Signal::Hold)).unwrap();

        assert_eq!(db.run_dates("NVDA").unwrap(), vec![d2, d1]);
    }

    #[test]
    fn file_backed_db_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("council.db");
        let path = path.to_str().unwrap();

        {
            let db = MemoryDb::open(path).unwrap();
            db.insert_record(&make_record(MemoryRole::RiskJudge, "persisted"))
                .unwrap();
        }

        let db = MemoryDb::open(path).unwrap();
        let records = db.load_records(MemoryRole::RiskJudge).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].situation, "persisted");
    }
}
