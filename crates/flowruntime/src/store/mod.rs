//! Run store implementations

mod memory;
mod sqlite;

pub use memory::InMemoryRunStore;
pub use sqlite::SqliteRunStore;
