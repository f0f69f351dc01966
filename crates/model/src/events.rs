use crate::core::identifiers::{BatchId, MirrorName};
use crate::lsn::Lsn;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator-visible event categories (spec §7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventCategory {
    Setup,
    Replication,
    Schema,
    Resync,
    Snapshot,
    UserAction,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperatorEvent {
    pub level: EventLevel,
    pub timestamp: DateTime<Utc>,
    pub category: EventCategory,
    pub message: String,
    pub mirror: MirrorName,
    pub batch_id: Option<BatchId>,
    pub lsn: Option<Lsn>,
}

impl OperatorEvent {
    pub fn new(
        level: EventLevel,
        category: EventCategory,
        mirror: MirrorName,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            category,
            message: message.into(),
            mirror,
            batch_id: None,
            lsn: None,
        }
    }

    pub fn with_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_lsn(mut self, lsn: Lsn) -> Self {
        self.lsn = Some(lsn);
        self
    }
}
