//! Casefile Store — SQLite documents, job queue, spend ledger, and person
//! graph, plus the per-document artifact cache.

pub mod artifacts;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use artifacts::ArtifactStore;
pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, StoreStats};
pub use traits::*;
pub use types::*;
