use super::CatalogStore;
use crate::error::{CatalogError, Result};
use chrono::{DateTime, Utc};
use model::core::identifiers::{BatchId, MirrorName, PeerName, PublicationName, SlotName};
use model::lsn::Lsn;
use model::mirror::{Mirror, MirrorStatus};
use tokio_postgres::Row;

fn status_to_text(status: MirrorStatus) -> &'static str {
    use MirrorStatus::*;
    match status {
        Created => "created",
        SettingUp => "setting_up",
        Snapshot => "snapshot",
        Running => "running",
        Paused => "paused",
        Resyncing => "resyncing",
        Failed => "failed",
        Terminating => "terminating",
        Terminated => "terminated",
    }
}

fn status_from_text(text: &str) -> Result<MirrorStatus> {
    use MirrorStatus::*;
    Ok(match text {
        "created" => Created,
        "setting_up" => SettingUp,
        "snapshot" => Snapshot,
        "running" => Running,
        "paused" => Paused,
        "resyncing" => Resyncing,
        "failed" => Failed,
        "terminating" => Terminating,
        "terminated" => Terminated,
        other => {
            return Err(CatalogError::InvalidRow {
                entity: "mirror.status",
                reason: format!("unrecognized status '{other}'"),
            });
        }
    })
}

fn row_to_mirror(row: &Row) -> Result<Mirror> {
    Ok(Mirror {
        name: MirrorName::new(row.get::<_, String>(0)),
        source_peer: PeerName::new(row.get::<_, String>(1)),
        destination_peer: PeerName::new(row.get::<_, String>(2)),
        status: status_from_text(row.get::<_, String>(3).as_str())?,
        slot_name: SlotName::new(row.get::<_, String>(4)),
        publication_name: PublicationName::new(row.get::<_, String>(5)),
        last_applied_lsn: Lsn::from_u64(row.get::<_, i64>(6) as u64),
        last_sync_batch_id: BatchId(row.get::<_, i64>(7)),
        last_error: row.get(8),
        error_count: row.get::<_, i32>(9) as u32,
        do_initial_snapshot: row.get(10),
        created_at: row.get(11),
        updated_at: row.get(12),
    })
}

const MIRROR_COLUMNS: &str = "name, source_peer, destination_peer, status, slot_name, \
    publication_name, last_applied_lsn, last_sync_batch_id, last_error, error_count, \
    do_initial_snapshot, created_at, updated_at";

impl CatalogStore {
    /// Creates the mirror row. Table-mapping and per-table status rows must
    /// be written by the caller in the same logical step, before the
    /// workflow starts (invariant: a TableSyncStatus row exists for every
    /// mapped table before any data is copied).
    pub async fn create_mirror(&self, mirror: &Mirror) -> Result<()> {
        let client = self.pool.client().await?;
        client
            .execute(
                &format!(
                    "INSERT INTO bunny_mirrors ({MIRROR_COLUMNS}) \
                     VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)"
                ),
                &[
                    &mirror.name.as_str(),
                    &mirror.source_peer.as_str(),
                    &mirror.destination_peer.as_str(),
                    &status_to_text(mirror.status),
                    &mirror.slot_name.as_str(),
                    &mirror.publication_name.as_str(),
                    &(mirror.last_applied_lsn.as_u64() as i64),
                    &mirror.last_sync_batch_id.0,
                    &mirror.last_error,
                    &(mirror.error_count as i32),
                    &mirror.do_initial_snapshot,
                    &mirror.created_at,
                    &mirror.updated_at,
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn get_mirror(&self, name: &MirrorName) -> Result<Mirror> {
        let client = self.pool.client().await?;
        let row = client
            .query_opt(
                &format!("SELECT {MIRROR_COLUMNS} FROM bunny_mirrors WHERE name = $1"),
                &[&name.as_str()],
            )
            .await?
            .ok_or_else(|| CatalogError::MirrorNotFound(name.as_str().to_string()))?;
        row_to_mirror(&row)
    }

    pub async fn list_mirrors(&self) -> Result<Vec<Mirror>> {
        let client = self.pool.client().await?;
        let rows = client
            .query(
                &format!("SELECT {MIRROR_COLUMNS} FROM bunny_mirrors ORDER BY name"),
                &[],
            )
            .await?;
        rows.iter().map(row_to_mirror).collect()
    }

    /// Persists a full mirror row (status, checkpoint, error state). Used on
    /// every workflow transition (spec §4.8: "workflow state is mirrored
    /// there on every transition").
    pub async fn put_mirror(&self, mirror: &Mirror) -> Result<()> {
        let client = self.pool.client().await?;
        let updated = client
            .execute(
                r#"UPDATE bunny_mirrors SET
                    status = $2, last_applied_lsn = $3, last_sync_batch_id = $4,
                    last_error = $5, error_count = $6, slot_name = $7,
                    publication_name = $8, updated_at = $9
                   WHERE name = $1"#,
                &[
                    &mirror.name.as_str(),
                    &status_to_text(mirror.status),
                    &(mirror.last_applied_lsn.as_u64() as i64),
                    &mirror.last_sync_batch_id.0,
                    &mirror.last_error,
                    &(mirror.error_count as i32),
                    &mirror.slot_name.as_str(),
                    &mirror.publication_name.as_str(),
                    &Utc::now(),
                ],
            )
            .await?;
        if updated == 0 {
            return Err(CatalogError::MirrorNotFound(mirror.name.as_str().to_string()));
        }
        Ok(())
    }

    /// Marks the mirror terminated; rows are retained for audit (spec §3.3).
    pub async fn mark_terminated(&self, name: &MirrorName, at: DateTime<Utc>) -> Result<()> {
        let client = self.pool.client().await?;
        client
            .execute(
                "UPDATE bunny_mirrors SET status = 'terminated', updated_at = $2 WHERE name = $1",
                &[&name.as_str(), &at],
            )
            .await?;
        Ok(())
    }

    pub async fn delete_mirror(&self, name: &MirrorName) -> Result<()> {
        let client = self.pool.client().await?;
        client
            .execute("DELETE FROM bunny_mirrors WHERE name = $1", &[&name.as_str()])
            .await?;
        Ok(())
    }
}
