//! Initial bulk-copy of a mapped table from a consistent source snapshot.

use crate::error::{EngineError, Result};
use catalog::CatalogStore;
use chrono::Utc;
use connectors::postgres::PgConnector;
use model::core::identifiers::MirrorName;
use model::core::value::Value;
use model::table_mapping::{PartitionKey, PartitionKeyKind, TableMapping};
use model::table_sync_status::{TableStatus, TableSyncStatus};
use std::sync::Arc;

/// Copies one table under an exported snapshot, partition by partition.
/// `source` must already have adopted the snapshot via `SET TRANSACTION
/// SNAPSHOT` before this is constructed — the engine itself only issues
/// plain `SELECT`s.
pub struct SnapshotEngine {
    source: PgConnector,
    destination: PgConnector,
    catalog: Arc<CatalogStore>,
    parallelism: usize,
}

impl SnapshotEngine {
    pub fn new(source: PgConnector, destination: PgConnector, catalog: Arc<CatalogStore>, parallelism: usize) -> Self {
        Self { source, destination, catalog, parallelism: parallelism.max(1) }
    }

    /// Copies `mapping`'s source table into its destination table. Not
    /// resumable mid-partition: a crash truncates and restarts the whole
    /// table rather than trying to reconcile a partial copy.
    pub async fn copy_table(&self, mirror: &MirrorName, mapping: &TableMapping) -> Result<()> {
        let mut status = TableSyncStatus::pending(mirror.clone(), mapping.destination_table.clone());
        status.status = TableStatus::Syncing;
        self.catalog.upsert_table_sync_status(&status).await?;

        let result = self.copy_table_inner(mapping).await;

        match &result {
            Ok(rows_synced) => {
                status.status = TableStatus::Synced;
                status.rows_synced = *rows_synced;
                status.last_synced_at = Some(Utc::now());
                status.last_error = None;
            }
            Err(err) => {
                status.status = TableStatus::Error;
                status.last_error = Some(err.to_string());
            }
        }
        self.catalog.upsert_table_sync_status(&status).await?;
        result.map(|_| ())
    }

    async fn copy_table_inner(&self, mapping: &TableMapping) -> Result<u64> {
        self.destination
            .batch_exec(&format!(
                "TRUNCATE TABLE \"{}\".\"{}\"",
                mapping.destination_schema, mapping.destination_table
            ))
            .await?;

        let columns: Vec<_> = self
            .source
            .columns(&mapping.source_schema, &mapping.source_table)
            .await?
            .into_iter()
            .filter(|c| !mapping.excluded_columns.contains(&c.name))
            .collect();

        let ranges = match &mapping.partition_key {
            Some(key) if key.kind.supports_split() && self.parallelism > 1 => {
                self.compute_ranges(mapping, key).await?
            }
            _ => vec![(None, None)],
        };

        let mut total = 0u64;
        for (lo, hi) in ranges {
            let rows = self.fetch_partition(mapping, &columns, mapping.partition_key.as_ref(), lo, hi).await?;
            total += self
                .destination
                .copy_in(&mapping.destination_schema, &mapping.destination_table, &columns, &rows)
                .await?;
        }
        Ok(total)
    }

    async fn compute_ranges(
        &self,
        mapping: &TableMapping,
        key: &PartitionKey,
    ) -> Result<Vec<(Option<Value>, Option<Value>)>> {
        let bounds = self
            .source
            .query(
                &format!(
                    "SELECT MIN(\"{col}\") AS lo, MAX(\"{col}\") AS hi FROM \"{schema}\".\"{table}\"",
                    col = key.column,
                    schema = mapping.source_schema,
                    table = mapping.source_table
                ),
                vec![],
            )
            .await?;

        let Some(row) = bounds.into_iter().next() else {
            return Ok(vec![(None, None)]);
        };
        let (Some(lo), Some(hi)) = (row.get("lo").cloned(), row.get("hi").cloned()) else {
            return Ok(vec![(None, None)]);
        };

        Ok(split_range(&lo, &hi, key.kind, self.parallelism))
    }

    async fn fetch_partition(
        &self,
        mapping: &TableMapping,
        columns: &[connectors::postgres::ColumnInfo],
        partition_key: Option<&PartitionKey>,
        lo: Option<Value>,
        hi: Option<Value>,
    ) -> Result<Vec<connectors::postgres::row::Row>> {
        let column_list = columns.iter().map(|c| format!("\"{}\"", c.name)).collect::<Vec<_>>().join(", ");
        let mut sql = format!(
            "SELECT {column_list} FROM \"{}\".\"{}\"",
            mapping.source_schema, mapping.source_table
        );
        let mut params = Vec::new();

        if let (Some(key), Some(lo)) = (partition_key, &lo) {
            params.push(lo.clone());
            sql.push_str(&format!(" WHERE \"{}\" >= ${}", key.column, params.len()));
        }
        if let (Some(key), Some(hi)) = (partition_key, &hi) {
            params.push(hi.clone());
            let connector = if lo.is_some() { "AND" } else { "WHERE" };
            sql.push_str(&format!(" {connector} \"{}\" < ${}", key.column, params.len()));
        }

        self.source.query(&sql, params).await
    }
}

fn split_range(lo: &Value, hi: &Value, kind: PartitionKeyKind, parts: usize) -> Vec<(Option<Value>, Option<Value>)> {
    let (lo_i, hi_i) = match kind {
        PartitionKeyKind::Timestamp => (timestamp_millis(lo), timestamp_millis(hi)),
        PartitionKeyKind::Numeric => (lo.as_i64(), hi.as_i64()),
    };

    let (Some(lo_i), Some(hi_i)) = (lo_i, hi_i) else {
        return vec![(None, None)];
    };
    if hi_i <= lo_i || parts <= 1 {
        return vec![(None, None)];
    }

    let span = (hi_i - lo_i).max(1);
    let step = (span / parts as i64).max(1);
    let mut bounds = Vec::with_capacity(parts);
    let mut cursor = lo_i;

    for i in 0..parts {
        let next = if i + 1 == parts { None } else { Some(cursor + step) };
        bounds.push((from_i64(cursor, kind), next.and_then(|n| from_i64(n, kind))));
        match next {
            Some(n) => cursor = n,
            None => break,
        }
    }
    bounds
}

fn timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Timestamp(ts) => Some(ts.timestamp_millis()),
        Value::TimestampNaive(ts) => Some(ts.and_utc().timestamp_millis()),
        _ => None,
    }
}

fn from_i64(v: i64, kind: PartitionKeyKind) -> Option<Value> {
    match kind {
        PartitionKeyKind::Numeric => Some(Value::Int(v)),
        PartitionKeyKind::Timestamp => chrono::DateTime::<Utc>::from_timestamp_millis(v).map(Value::Timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_numeric_range_into_requested_parts() {
        let bounds = split_range(&Value::Int(0), &Value::Int(100), PartitionKeyKind::Numeric, 4);
        assert_eq!(bounds.len(), 4);
        assert_eq!(bounds[0].0, Some(Value::Int(0)));
        assert_eq!(bounds.last().unwrap().1, None);
    }

    #[test]
    fn falls_back_to_single_range_when_bounds_collapse() {
        let bounds = split_range(&Value::Int(5), &Value::Int(5), PartitionKeyKind::Numeric, 4);
        assert_eq!(bounds, vec![(None, None)]);
    }
}
