use crate::error::Result;
use crate::pool::{CatalogConfig, CatalogPool};
use crate::schema;

pub mod batches;
pub mod deltas;
pub mod events;
pub mod foreign_keys;
pub mod indexes;
pub mod mappings;
pub mod mirrors;
pub mod peers;
pub mod sync_status;

/// Transactional access to every catalog entity, over a single catalog
/// database shared by all mirrors.
pub struct CatalogStore {
    pub(crate) pool: CatalogPool,
}

impl CatalogStore {
    pub async fn connect(config: CatalogConfig) -> Result<Self> {
        let pool = CatalogPool::connect(config).await?;
        schema::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }
}
