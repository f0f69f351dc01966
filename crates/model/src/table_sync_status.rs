use crate::core::identifiers::MirrorName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    Pending,
    Syncing,
    Synced,
    Resyncing,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableSyncStatus {
    pub mirror: MirrorName,
    pub destination_table: String,
    pub status: TableStatus,
    pub rows_synced: u64,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_resync_requested_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl TableSyncStatus {
    pub fn pending(mirror: MirrorName, destination_table: String) -> Self {
        Self {
            mirror,
            destination_table,
            status: TableStatus::Pending,
            rows_synced: 0,
            last_synced_at: None,
            last_resync_requested_at: None,
            last_error: None,
        }
    }
}
