use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Memory not available: {0}")]
    Unavailable(String),

    #[error("No recorded run for {subject} on {trade_date}")]
    RunNotFound {
        subject: String,
        trade_date: NaiveDate,
    },
}
