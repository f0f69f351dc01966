use crate::core::identifiers::MirrorName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaDeltaKind {
    AddColumn,
    DropColumn,
    AlterType,
    AddDefault,
    DropDefault,
    AddConstraint,
    DropConstraint,
}

impl SchemaDeltaKind {
    /// Additive, non-destructive deltas apply immediately; everything else
    /// requires operator acknowledgement (spec §4.4).
    pub fn is_safe(&self) -> bool {
        matches!(
            self,
            SchemaDeltaKind::AddColumn | SchemaDeltaKind::AddDefault
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaDelta {
    pub mirror: MirrorName,
    pub destination_table: String,
    pub kind: SchemaDeltaKind,
    pub payload: String,
    pub applied_at: Option<DateTime<Utc>>,
}
