//! Catalog store: transactional access to mirrors, peers, mappings,
//! checkpoints, and schema/FK/index tracking.
//!
//! This is the durable ground truth the replication engine falls back to
//! after a crash — everything here must be safe to read from a fresh
//! connection at any point in a mirror's lifecycle.

pub mod error;
pub mod pool;
pub mod schema;
pub mod store;

pub use error::{CatalogError, Result};
pub use pool::CatalogConfig;
pub use store::CatalogStore;
