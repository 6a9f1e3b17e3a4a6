//! Storage for API keys and daily usage
//!
//! Postgres backs production deployments; [`MemoryStore`] runs the same
//! contracts in process.

pub mod api_keys;
pub mod memory;
pub mod pool;
pub mod store;
pub mod usage;

pub use api_keys::PgKeyRepository;
pub use memory::MemoryStore;
pub use pool::{DbError, DbPool};
pub use store::{KeyRepository, StoreError, UsageLedger};
pub use usage::PgUsageLedger;
