use super::CatalogStore;
use crate::error::{CatalogError, Result};
use model::core::identifiers::MirrorName;
use model::table_sync_status::{TableStatus, TableSyncStatus};
use tokio_postgres::Row;

fn status_to_text(status: TableStatus) -> &'static str {
    match status {
        TableStatus::Pending => "pending",
        TableStatus::Syncing => "syncing",
        TableStatus::Synced => "synced",
        TableStatus::Resyncing => "resyncing",
        TableStatus::Error => "error",
    }
}

fn status_from_text(text: &str) -> Result<TableStatus> {
    Ok(match text {
        "pending" => TableStatus::Pending,
        "syncing" => TableStatus::Syncing,
        "synced" => TableStatus::Synced,
        "resyncing" => TableStatus::Resyncing,
        "error" => TableStatus::Error,
        other => {
            return Err(CatalogError::InvalidRow {
                entity: "table_sync_status.status",
                reason: format!("unrecognized status '{other}'"),
            });
        }
    })
}

fn row_to_status(row: &Row) -> Result<TableSyncStatus> {
    Ok(TableSyncStatus {
        mirror: MirrorName::new(row.get::<_, String>(0)),
        destination_table: row.get(1),
        status: status_from_text(row.get::<_, String>(2).as_str())?,
        rows_synced: row.get::<_, i64>(3) as u64,
        last_synced_at: row.get(4),
        last_resync_requested_at: row.get(5),
        last_error: row.get(6),
    })
}

const STATUS_COLUMNS: &str = "mirror, destination_table, status, rows_synced, \
    last_synced_at, last_resync_requested_at, last_error";

impl CatalogStore {
    /// Creates a pending status row. Must be called for every mapped table
    /// before any data is copied (spec §3.2 invariant).
    pub async fn create_table_sync_status(&self, status: &TableSyncStatus) -> Result<()> {
        let client = self.pool.client().await?;
        client
            .execute(
                &format!(
                    "INSERT INTO bunny_table_sync_status ({STATUS_COLUMNS}) \
                     VALUES ($1,$2,$3,$4,$5,$6,$7) \
                     ON CONFLICT (mirror, destination_table) DO NOTHING"
                ),
                &[
                    &status.mirror.as_str(),
                    &status.destination_table,
                    &status_to_text(status.status),
                    &(status.rows_synced as i64),
                    &status.last_synced_at,
                    &status.last_resync_requested_at,
                    &status.last_error,
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn upsert_table_sync_status(&self, status: &TableSyncStatus) -> Result<()> {
        let client = self.pool.client().await?;
        client
            .execute(
                &format!(
                    "INSERT INTO bunny_table_sync_status ({STATUS_COLUMNS}) \
                     VALUES ($1,$2,$3,$4,$5,$6,$7) \
                     ON CONFLICT (mirror, destination_table) DO UPDATE SET \
                        status = EXCLUDED.status, \
                        rows_synced = EXCLUDED.rows_synced, \
                        last_synced_at = EXCLUDED.last_synced_at, \
                        last_resync_requested_at = EXCLUDED.last_resync_requested_at, \
                        last_error = EXCLUDED.last_error"
                ),
                &[
                    &status.mirror.as_str(),
                    &status.destination_table,
                    &status_to_text(status.status),
                    &(status.rows_synced as i64),
                    &status.last_synced_at,
                    &status.last_resync_requested_at,
                    &status.last_error,
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn list_table_sync_status(&self, mirror: &MirrorName) -> Result<Vec<TableSyncStatus>> {
        let client = self.pool.client().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {STATUS_COLUMNS} FROM bunny_table_sync_status WHERE mirror = $1 \
                     ORDER BY destination_table"
                ),
                &[&mirror.as_str()],
            )
            .await?;
        rows.iter().map(row_to_status).collect()
    }
}
