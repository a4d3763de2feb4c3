pub mod bank;
pub mod embedder;
pub mod error;
pub mod run_log;
pub mod situation;
pub mod sqlite;

pub use bank::MemoryBank;
pub use embedder::{Embedder, HashingEmbedder};
#[cfg(feature = "fastembed")]
pub use embedder::FastEmbedder;
pub use error::MemoryError;
pub use run_log::RunLog;
pub use situation::{RecalledMemory, SituationMemory};
pub use sqlite::MemoryDb;
