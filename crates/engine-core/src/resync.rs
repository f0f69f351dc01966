//! Zero-downtime table swap-resync: rebuilds one table from a fresh
//! snapshot while buffering concurrent CDC changes, then swaps it in under
//! one transaction (Prepare -> Copy -> Catch-up -> Swap -> Cleanup).

use crate::error::Result;
use crate::schema::SchemaPropagator;
use crate::sink::{PendingChange, SinkWriter};
use crate::snapshot::SnapshotEngine;
use catalog::CatalogStore;
use connectors::postgres::PgConnector;
use connectors::replication::client::SourceConnector;
use model::core::identifiers::MirrorName;
use model::lsn::Lsn;
use model::table_mapping::TableMapping;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

const SHADOW_SUFFIX: &str = "__bunny_shadow";
const OLD_SUFFIX: &str = "__bunny_old";

#[derive(Default)]
struct CoordinatorState {
    buffered: VecDeque<PendingChange>,
    /// Set once `swap` has committed the rename. A change that arrives after
    /// this point belongs to the table under its post-swap name already, so
    /// it must go to the live batch instead of a buffer nobody drains again.
    closed: bool,
}

/// Buffers row-level changes the CDC loop keeps decoding for a table while
/// its shadow copy is being built, so they can be replayed against the
/// shadow table instead of the live one. A table not currently under resync
/// has no coordinator registered for it, and the worker applies its changes
/// as normal.
#[derive(Default)]
pub struct ResyncCoordinator {
    state: Mutex<CoordinatorState>,
}

impl ResyncCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers `change` unless the coordinator has already been closed by a
    /// completed `swap`, in which case it's handed back so the caller can
    /// route it to the live batch instead.
    pub async fn buffer_or_reject(&self, change: PendingChange) -> Option<PendingChange> {
        let mut guard = self.state.lock().await;
        if guard.closed {
            return Some(change);
        }
        guard.buffered.push_back(change);
        None
    }

    /// Drains everything buffered so far, leaving the queue empty. Called
    /// repeatedly during catch-up until a pass drains nothing.
    async fn drain(&self) -> Vec<PendingChange> {
        let mut guard = self.state.lock().await;
        guard.buffered.drain(..).collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.buffered.is_empty()
    }
}

/// Drives one table through Prepare -> Copy -> Catch-up -> Swap -> Cleanup.
/// `coordinator` must already be registered with the mirror's CDC worker so
/// concurrent changes land in it instead of being applied to the live
/// destination table the moment `prepare` returns.
pub struct TableResync {
    mirror: MirrorName,
    source_control: SourceConnector,
    source: PgConnector,
    destination: PgConnector,
    catalog: Arc<CatalogStore>,
    mapping: TableMapping,
}

impl TableResync {
    pub fn new(
        mirror: MirrorName,
        source_control: SourceConnector,
        source: PgConnector,
        destination: PgConnector,
        catalog: Arc<CatalogStore>,
        mapping: TableMapping,
    ) -> Self {
        Self { mirror, source_control, source, destination, catalog, mapping }
    }

    fn shadow_table(&self) -> String {
        shadow_table_name(&self.mapping.destination_table)
    }

    fn old_table(&self) -> String {
        old_table_name(&self.mapping.destination_table)
    }

    /// Creates the shadow table and captures the marker LSN below which the
    /// upcoming snapshot copy is guaranteed consistent. From the moment this
    /// returns, the caller must route this table's decoded changes into
    /// `coordinator` rather than applying them live.
    pub async fn prepare(&self) -> Result<Lsn> {
        let schema = &self.mapping.destination_schema;
        let table = &self.mapping.destination_table;
        let shadow = self.shadow_table();

        self.destination
            .batch_exec(&format!(
                "DROP TABLE IF EXISTS \"{schema}\".\"{shadow}\"; \
                 CREATE TABLE \"{schema}\".\"{shadow}\" (LIKE \"{schema}\".\"{table}\" INCLUDING DEFAULTS)"
            ))
            .await?;

        let marker = self.source_control.current_wal_lsn().await?;
        info!(mirror = %self.mirror, table = %table, marker = %marker, "resync shadow table prepared");
        Ok(marker)
    }

    /// Bulk-copies the table under a freshly exported snapshot into the
    /// shadow table, reusing the same partitioned copy path as the initial
    /// snapshot.
    pub async fn copy(&self, parallelism: usize) -> Result<()> {
        self.source.begin_repeatable_read().await?;
        let shadow_mapping = TableMapping {
            mirror: self.mapping.mirror.clone(),
            source_schema: self.mapping.source_schema.clone(),
            source_table: self.mapping.source_table.clone(),
            destination_schema: self.mapping.destination_schema.clone(),
            destination_table: self.shadow_table(),
            partition_key: self.mapping.partition_key.clone(),
            excluded_columns: self.mapping.excluded_columns.clone(),
        };

        let engine =
            SnapshotEngine::new(self.source.clone(), self.destination.clone(), self.catalog.clone(), parallelism);
        let result = engine.copy_table(&self.mirror, &shadow_mapping).await;
        self.source.commit().await?;
        result
    }

    /// Drains `coordinator`'s buffer into the shadow table, repeating until
    /// a pass finds nothing new. Bounded by `max_passes` so a table under
    /// sustained heavy write load doesn't stall indefinitely — whatever is
    /// left after the limit gets one more drain inside `swap`'s lock.
    pub async fn catch_up(
        &self,
        coordinator: &ResyncCoordinator,
        sink: &SinkWriter,
        pk_columns: &impl Fn(&str, &str) -> Vec<String>,
        max_passes: usize,
    ) -> Result<()> {
        for _ in 0..max_passes {
            if coordinator.is_empty().await {
                return Ok(());
            }
            let changes = coordinator.drain().await;
            let retargeted = self.retarget(&changes);
            sink.apply_without_checkpoint(&retargeted, pk_columns).await?;
        }
        Ok(())
    }

    /// Final drain plus the atomic rename swap: rename the live table
    /// aside, rename the shadow table into its place, then replicate
    /// indexes and FKs against the new name.
    ///
    /// Holds `coordinator`'s lock from the final drain through the rename
    /// commit, only marking it closed once the rename is done. Any
    /// `push_change` racing this call blocks on the same lock rather than
    /// buffering into a coordinator nobody will drain again, and sees
    /// `closed` only after the new table name is already live, so it's safe
    /// to route straight to the batch instead.
    pub async fn swap(
        &self,
        coordinator: &ResyncCoordinator,
        sink: &SinkWriter,
        pk_columns: &impl Fn(&str, &str) -> Vec<String>,
        schema: &SchemaPropagator,
    ) -> Result<()> {
        let mut guard = coordinator.state.lock().await;
        let remaining: Vec<PendingChange> = guard.buffered.drain(..).collect();
        let retargeted = self.retarget(&remaining);
        sink.apply_without_checkpoint(&retargeted, pk_columns).await?;

        let schema_name = &self.mapping.destination_schema;
        let table = &self.mapping.destination_table;
        let shadow = self.shadow_table();
        let old = self.old_table();

        self.destination
            .batch_exec(&format!(
                "BEGIN; \
                 LOCK TABLE \"{schema_name}\".\"{table}\" IN ACCESS EXCLUSIVE MODE; \
                 ALTER TABLE \"{schema_name}\".\"{table}\" RENAME TO \"{old}\"; \
                 ALTER TABLE \"{schema_name}\".\"{shadow}\" RENAME TO \"{table}\"; \
                 COMMIT;"
            ))
            .await?;

        guard.closed = true;
        drop(guard);

        schema.replicate_indexes(&self.mirror, &self.mapping).await?;
        schema.recreate_foreign_keys(&self.mirror, &self.mapping).await?;

        info!(mirror = %self.mirror, table = %table, "resync swap committed");
        Ok(())
    }

    /// Drops the renamed-aside original once the swap has been observed
    /// stable. Run after `swap`, never inside the same transaction — a slow
    /// `DROP` shouldn't extend the exclusive lock window the rename needs.
    pub async fn cleanup(&self) -> Result<()> {
        let schema = &self.mapping.destination_schema;
        let old = self.old_table();
        self.destination.batch_exec(&format!("DROP TABLE IF EXISTS \"{schema}\".\"{old}\"")).await?;
        Ok(())
    }

    fn retarget(&self, changes: &[PendingChange]) -> Vec<PendingChange> {
        retarget_changes(&self.mapping, changes)
    }
}

fn shadow_table_name(destination_table: &str) -> String {
    format!("{destination_table}{SHADOW_SUFFIX}")
}

fn old_table_name(destination_table: &str) -> String {
    format!("{destination_table}{OLD_SUFFIX}")
}

/// Buffered changes carry the live destination table's name; point them at
/// the shadow table for as long as it hasn't been swapped in yet, and drop
/// anything belonging to a different table the coordinator was never meant
/// to receive.
fn retarget_changes(mapping: &TableMapping, changes: &[PendingChange]) -> Vec<PendingChange> {
    changes
        .iter()
        .filter(|c| {
            c.destination_schema == mapping.destination_schema && c.destination_table == mapping.destination_table
        })
        .map(|c| PendingChange {
            destination_schema: c.destination_schema.clone(),
            destination_table: shadow_table_name(&mapping.destination_table),
            kind: c.kind.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChangeKind;
    use connectors::replication::decoder::DecodedRow;
    use model::core::value::Value;

    fn mapping() -> TableMapping {
        TableMapping {
            mirror: MirrorName::new("m1"),
            source_schema: "public".into(),
            source_table: "orders".into(),
            destination_schema: "public".into(),
            destination_table: "orders".into(),
            partition_key: None,
            excluded_columns: Default::default(),
        }
    }

    fn upsert(id: i64) -> PendingChange {
        let mut row = DecodedRow::new();
        row.insert("id".to_string(), Value::Int(id));
        PendingChange {
            destination_schema: "public".into(),
            destination_table: "orders".into(),
            kind: ChangeKind::Upsert(row),
        }
    }

    #[tokio::test]
    async fn coordinator_buffers_in_fifo_order() {
        let coordinator = ResyncCoordinator::new();
        for i in 0..3 {
            assert!(coordinator.buffer_or_reject(upsert(i)).await.is_none());
        }
        assert!(!coordinator.is_empty().await);
        let drained = coordinator.drain().await;
        assert_eq!(drained.len(), 3);
        assert!(coordinator.is_empty().await);
    }

    #[tokio::test]
    async fn coordinator_rejects_once_closed() {
        let coordinator = ResyncCoordinator::new();
        assert!(coordinator.buffer_or_reject(upsert(1)).await.is_none());
        {
            let mut guard = coordinator.state.lock().await;
            guard.buffered.clear();
            guard.closed = true;
        }
        let rejected = coordinator.buffer_or_reject(upsert(2)).await;
        assert!(matches!(rejected, Some(c) if matches!(c.kind, ChangeKind::Upsert(_))));
        assert!(coordinator.is_empty().await);
    }

    #[test]
    fn retarget_points_matching_changes_at_the_shadow_table_and_drops_others() {
        let m = mapping();
        let changes = vec![
            upsert(1),
            PendingChange {
                destination_schema: "public".into(),
                destination_table: "other".into(),
                kind: ChangeKind::Upsert(DecodedRow::new()),
            },
        ];
        let retargeted = retarget_changes(&m, &changes);
        assert_eq!(retargeted.len(), 1);
        assert_eq!(retargeted[0].destination_table, "orders__bunny_shadow");
    }
}
