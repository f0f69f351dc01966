use super::CatalogStore;
use crate::error::{CatalogError, Result};
use model::cdc_batch::CDCBatch;
use model::core::identifiers::{BatchId, MirrorName};
use model::lsn::Lsn;

impl CatalogStore {
    /// Persists the batch row and advances the mirror's checkpoint in one
    /// transaction (spec §4.3 step 3 / P3): a crash before commit leaves no
    /// trace, a crash after commit is fully durable.
    pub async fn append_batch_and_checkpoint(&self, batch: &CDCBatch) -> Result<()> {
        let mut client = self.pool.client().await?;
        let tx = client.transaction().await?;

        tx.execute(
            "INSERT INTO bunny_cdc_batches \
                (mirror, batch_id, row_count, start_lsn, end_lsn, start_time, end_time) \
             VALUES ($1,$2,$3,$4,$5,$6,$7)",
            &[
                &batch.mirror.as_str(),
                &batch.batch_id.0,
                &(batch.row_count as i64),
                &(batch.start_lsn.as_u64() as i64),
                &(batch.end_lsn.as_u64() as i64),
                &batch.start_time,
                &batch.end_time,
            ],
        )
        .await?;

        let updated = tx
            .execute(
                "UPDATE bunny_mirrors SET last_sync_batch_id = $2, last_applied_lsn = $3, \
                    updated_at = now() WHERE name = $1",
                &[
                    &batch.mirror.as_str(),
                    &batch.batch_id.0,
                    &(batch.end_lsn.as_u64() as i64),
                ],
            )
            .await?;
        if updated == 0 {
            return Err(CatalogError::MirrorNotFound(batch.mirror.as_str().to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Read on CDC loop startup to know where to resume (spec §4.6 "Resume").
    pub async fn checkpoint(&self, mirror: &MirrorName) -> Result<(BatchId, Lsn)> {
        let mirror = self.get_mirror(mirror).await?;
        Ok((mirror.last_sync_batch_id, mirror.last_applied_lsn))
    }

    pub async fn max_batch_id(&self, mirror: &MirrorName) -> Result<BatchId> {
        let client = self.pool.client().await?;
        let row = client
            .query_opt(
                "SELECT max(batch_id) FROM bunny_cdc_batches WHERE mirror = $1",
                &[&mirror.as_str()],
            )
            .await?;
        Ok(row
            .and_then(|r| r.get::<_, Option<i64>>(0))
            .map(BatchId)
            .unwrap_or(BatchId::ZERO))
    }
}
