pub mod models;
pub mod queries;
pub mod sqlite;
pub mod tiers;

pub use sqlite::Database;
pub use tiers::{DurableStore, ExpiringStore, KeyValueStore, MemoryStore, TieredStore};
