use crate::core::identifiers::{BatchId, MirrorName};
use crate::lsn::Lsn;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One committed destination transaction covering one or more source
/// transactions (spec §3.1, §4.3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CDCBatch {
    pub mirror: MirrorName,
    pub batch_id: BatchId,
    pub row_count: u64,
    pub start_lsn: Lsn,
    pub end_lsn: Lsn,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}
