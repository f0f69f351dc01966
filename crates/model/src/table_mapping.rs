use crate::core::identifiers::MirrorName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionKeyKind {
    Numeric,
    Timestamp,
}

impl PartitionKeyKind {
    /// Only numeric and timestamp keys can be split into ranges; anything
    /// else copies single-streamed.
    pub fn supports_split(&self) -> bool {
        true
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartitionKey {
    pub column: String,
    pub kind: PartitionKeyKind,
}

/// Maps one source table to one destination table within a mirror.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableMapping {
    pub mirror: MirrorName,
    pub source_schema: String,
    pub source_table: String,
    pub destination_schema: String,
    pub destination_table: String,
    pub partition_key: Option<PartitionKey>,
    pub excluded_columns: BTreeSet<String>,
}

impl TableMapping {
    pub fn source_qualified(&self) -> String {
        format!("{}.{}", self.source_schema, self.source_table)
    }

    pub fn destination_qualified(&self) -> String {
        format!("{}.{}", self.destination_schema, self.destination_table)
    }
}
