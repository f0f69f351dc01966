//! The per-mirror CDC loop: reads decoded row events off the replication
//! stream, assembles batches, flushes them to the sink writer, and answers
//! signals between batches.

use crate::mirror::signal::{MirrorMsg, MirrorRunState};
use catalog::CatalogStore;
use chrono::{DateTime, Utc};
use connectors::postgres::PgConnector;
use connectors::replication::client::{ActiveStream, SourceConnector, StreamItem};
use connectors::replication::decoder::ChangeEvent;
use engine_core::error::{EngineError, ErrorKind, Result};
use engine_core::resync::{ResyncCoordinator, TableResync};
use engine_core::schema::SchemaPropagator;
use engine_core::sink::{ChangeKind, PendingChange, SinkWriter};
use engine_core::snapshot::SnapshotEngine;
use model::cdc_batch::CDCBatch;
use model::core::identifiers::{BatchId, MirrorName};
use model::lsn::Lsn;
use model::mirror::Mirror;
use model::table_mapping::TableMapping;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Spec §6's "Defaults for new mirrors" (`BATCH_SIZE`, `IDLE_TIMEOUT_SECONDS`,
/// `SNAPSHOT_PARALLELISM`), read once at startup by `control_plane::Config`
/// and threaded down into whichever mirror actually needs them — the worker
/// never reads the environment directly.
#[derive(Clone, Copy, Debug)]
pub struct MirrorTuning {
    pub batch_size: u64,
    pub idle_timeout_seconds: u64,
    pub snapshot_parallelism: usize,
}

impl Default for MirrorTuning {
    fn default() -> Self {
        Self { batch_size: 1000, idle_timeout_seconds: 60, snapshot_parallelism: 4 }
    }
}

impl MirrorTuning {
    fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

/// How a worker's `run` ended, distinguishing an ordinary shutdown from a
/// full resync the supervisor must immediately re-drive with a fresh
/// worker rather than treat as a terminal or transient failure.
#[derive(Debug)]
pub enum WorkerOutcome {
    Stopped,
    ResyncRequested,
}

struct BatchState {
    changes: Vec<PendingChange>,
    row_count: u64,
    start_lsn: Lsn,
    end_lsn: Lsn,
    start_time: DateTime<Utc>,
    seen_commit: bool,
}

impl BatchState {
    fn new(at: Lsn) -> Self {
        Self {
            changes: Vec::new(),
            row_count: 0,
            start_lsn: at,
            end_lsn: at,
            start_time: Utc::now(),
            seen_commit: false,
        }
    }

    fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn ready_to_flush(&self, batch_size: u64) -> bool {
        self.row_count >= batch_size && self.seen_commit
    }
}

/// Builds a fresh `CdcWorker` from connection strings rather than live
/// connections, so the supervisor can reconnect on every restart without
/// holding a non-reconnectable worker across the attempt. A worker is
/// single-use: once its `run` returns, its connections are gone.
pub struct WorkerFactory {
    mirror: MirrorName,
    catalog: Arc<CatalogStore>,
    source_conninfo: String,
    destination_conninfo: String,
    tuning: MirrorTuning,
}

impl WorkerFactory {
    pub fn new(
        mirror: MirrorName,
        catalog: Arc<CatalogStore>,
        source_conninfo: String,
        destination_conninfo: String,
        tuning: MirrorTuning,
    ) -> Self {
        Self { mirror, catalog, source_conninfo, destination_conninfo, tuning }
    }

    /// Opens fresh connections to both peers and reloads the mirror's
    /// table mappings from the catalog, so a mapping added via `SyncSchema`
    /// between restarts takes effect without redeploying anything.
    pub async fn build(&self) -> Result<CdcWorker> {
        let source = SourceConnector::connect(&self.source_conninfo).await?;
        let destination = PgConnector::connect(&self.destination_conninfo).await?;
        let schema_source = PgConnector::connect(&self.source_conninfo).await?;

        let mappings = self.catalog.list_table_mappings(&self.mirror).await?;
        let mut pk_columns = HashMap::new();
        for mapping in &mappings {
            let pks = destination
                .primary_key_columns(&mapping.destination_schema, &mapping.destination_table)
                .await?;
            pk_columns.insert((mapping.destination_schema.clone(), mapping.destination_table.clone()), pks);
        }

        let sink = SinkWriter::new(destination.clone(), self.catalog.clone());
        let schema = SchemaPropagator::new(schema_source, destination, self.catalog.clone());

        Ok(CdcWorker::new(
            self.mirror.clone(),
            self.catalog.clone(),
            source,
            sink,
            schema,
            mappings,
            pk_columns,
            self.source_conninfo.clone(),
            self.destination_conninfo.clone(),
            self.tuning,
        ))
    }
}

/// Runs one mirror's CDC loop end to end. Owns the live replication stream,
/// the sink writer and the schema propagator for the mirror's destination.
pub struct CdcWorker {
    mirror: MirrorName,
    catalog: Arc<CatalogStore>,
    source: SourceConnector,
    sink: SinkWriter,
    schema: SchemaPropagator,
    mappings: HashMap<(String, String), TableMapping>,
    pk_columns: HashMap<(String, String), Vec<String>>,
    source_conninfo: String,
    destination_conninfo: String,
    tuning: MirrorTuning,
    /// Tables currently mid swap-resync, keyed by destination `(schema,
    /// table)`. While a table has an entry here, the loop buffers its
    /// decoded changes into the coordinator instead of the live batch so
    /// the background resync task can replay them against the shadow table.
    resyncing: Arc<RwLock<HashMap<(String, String), Arc<ResyncCoordinator>>>>,
}

impl CdcWorker {
    pub fn new(
        mirror: MirrorName,
        catalog: Arc<CatalogStore>,
        source: SourceConnector,
        sink: SinkWriter,
        schema: SchemaPropagator,
        mappings: Vec<TableMapping>,
        pk_columns: HashMap<(String, String), Vec<String>>,
        source_conninfo: String,
        destination_conninfo: String,
        tuning: MirrorTuning,
    ) -> Self {
        let mappings = mappings
            .into_iter()
            .map(|m| ((m.source_schema.clone(), m.source_table.clone()), m))
            .collect();
        Self {
            mirror,
            catalog,
            source,
            sink,
            schema,
            mappings,
            pk_columns,
            source_conninfo,
            destination_conninfo,
            tuning,
            resyncing: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Runs until `Terminate` is received or the mailbox is dropped.
    /// Resumes from the mirror's last checkpoint, replaying nothing the
    /// catalog has already acknowledged.
    pub async fn run(mut self, mut mailbox: mpsc::Receiver<MirrorMsg>) -> Result<WorkerOutcome> {
        let mirror_row = self.catalog.get_mirror(&self.mirror).await?;
        let (last_batch_id, last_applied_lsn) = self.catalog.checkpoint(&self.mirror).await?;
        let mut next_batch_id = last_batch_id.next();
        let start_lsn = Lsn::from_u64(last_applied_lsn.as_u64() + 1);

        let mut stream = self
            .source
            .start_stream(mirror_row.slot_name.as_str(), start_lsn, mirror_row.publication_name.as_str())
            .await?;

        // Covers every path that lands here with a stale non-Running catalog
        // status: a post-resync rebuild (Resyncing), a retry after a
        // transient failure (Failed), or a RetryNow-driven restart. A no-op
        // if the row is already Running.
        self.set_status(model::mirror::MirrorStatus::Running).await?;

        let mut batch = BatchState::new(last_applied_lsn);
        let mut last_event_at = Instant::now();
        let mut paused = false;

        loop {
            if paused {
                match mailbox.recv().await {
                    Some(MirrorMsg::Resume) => {
                        self.set_status(model::mirror::MirrorStatus::Running).await?;
                        paused = false;
                        continue;
                    }
                    Some(MirrorMsg::Terminate) => {
                        self.teardown(&mirror_row).await?;
                        return Ok(WorkerOutcome::Stopped);
                    }
                    Some(MirrorMsg::Status(reply)) => {
                        let _ = reply.send(MirrorRunState::Paused);
                        continue;
                    }
                    Some(_) | None => continue,
                }
            }

            tokio::select! {
                biased;

                msg = mailbox.recv() => {
                    match msg {
                        Some(MirrorMsg::Pause) => {
                            self.flush(&mut batch, &mut next_batch_id, &mut stream).await?;
                            self.set_status(model::mirror::MirrorStatus::Paused).await?;
                            paused = true;
                        }
                        Some(MirrorMsg::Terminate) => {
                            self.flush(&mut batch, &mut next_batch_id, &mut stream).await?;
                            self.teardown(&mirror_row).await?;
                            return Ok(WorkerOutcome::Stopped);
                        }
                        Some(MirrorMsg::SyncSchema) => {
                            self.flush(&mut batch, &mut next_batch_id, &mut stream).await?;
                            for mapping in self.mappings.values() {
                                self.schema.sync_table(&self.mirror, mapping).await?;
                            }
                        }
                        Some(MirrorMsg::ResyncTable(table)) => {
                            self.flush(&mut batch, &mut next_batch_id, &mut stream).await?;
                            self.start_table_resync(table).await;
                        }
                        Some(MirrorMsg::Resync) => {
                            self.flush(&mut batch, &mut next_batch_id, &mut stream).await?;
                            self.set_status(model::mirror::MirrorStatus::Resyncing).await?;
                            self.teardown(&mirror_row).await?;
                            self.full_resync().await?;
                            return Ok(WorkerOutcome::ResyncRequested);
                        }
                        Some(MirrorMsg::RetryNow) => {}
                        Some(MirrorMsg::Status(reply)) => {
                            let _ = reply.send(MirrorRunState::Running);
                        }
                        None => {
                            self.flush(&mut batch, &mut next_batch_id, &mut stream).await?;
                            return Ok(WorkerOutcome::Stopped);
                        }
                    }
                }

                item = stream.next() => {
                    match item? {
                        None => {
                            return Err(EngineError::new(ErrorKind::TransientIo, "replication stream closed"));
                        }
                        Some(StreamItem::KeepAlive { server_lsn, reply_requested }) => {
                            if reply_requested {
                                let ack = if batch.end_lsn.as_u64() > server_lsn.as_u64() { batch.end_lsn } else { server_lsn };
                                stream.acknowledge(ack, false).await?;
                            }
                        }
                        Some(StreamItem::Change(event)) => {
                            last_event_at = Instant::now();
                            self.apply_event(event, &mut batch).await?;
                            if batch.ready_to_flush(self.tuning.batch_size) {
                                self.flush(&mut batch, &mut next_batch_id, &mut stream).await?;
                            }
                        }
                    }
                }

                // Forces a periodic wakeup so a non-empty batch that never
                // reaches the configured batch size still flushes after
                // idle_timeout_seconds of silence.
                _ = tokio::time::sleep(self.tuning.idle_timeout().saturating_sub(last_event_at.elapsed())), if !batch.is_empty() => {
                    if last_event_at.elapsed() >= self.tuning.idle_timeout() {
                        self.flush(&mut batch, &mut next_batch_id, &mut stream).await?;
                    }
                }
            }
        }
    }

    async fn apply_event(&self, event: ChangeEvent, batch: &mut BatchState) -> Result<()> {
        match event {
            ChangeEvent::Begin { .. } | ChangeEvent::Relation { .. } => Ok(()),
            ChangeEvent::Commit { end_lsn, .. } => {
                batch.end_lsn = end_lsn;
                batch.seen_commit = true;
                Ok(())
            }
            ChangeEvent::Insert { schema, table, new, .. } => {
                self.push_change(schema, table, ChangeKind::Upsert(new), batch).await
            }
            ChangeEvent::Update { schema, table, new, .. } => {
                self.push_change(schema, table, ChangeKind::Upsert(new), batch).await
            }
            ChangeEvent::Delete { schema, table, old, .. } => {
                self.push_change(schema, table, ChangeKind::Delete(old), batch).await
            }
            ChangeEvent::Truncate { tables } => {
                for (schema, table) in tables {
                    if let Some(mapping) = self.mappings.get(&(schema, table)) {
                        let key = (mapping.destination_schema.clone(), mapping.destination_table.clone());
                        if self.resyncing.read().await.contains_key(&key) {
                            warn!(mirror = %self.mirror, table = %key.1,
                                "source truncate arrived mid-resync; the shadow copy will pick it up on the next snapshot pass");
                            continue;
                        }
                        self.sink.truncate_table(&mapping.destination_schema, &mapping.destination_table).await?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Translates one source-side row event to its destination table and
    /// either appends it to the in-flight batch, or, if the destination
    /// table is mid swap-resync, hands it to that table's coordinator so it
    /// gets replayed against the shadow table instead. A coordinator that
    /// has already been closed by a completed swap hands the change back
    /// rather than swallowing it — by the time that happens the rename has
    /// committed, so the change is appended to the batch under the same
    /// destination name the coordinator would have retargeted it to.
    async fn push_change(
        &self,
        schema: String,
        table: String,
        kind: ChangeKind,
        batch: &mut BatchState,
    ) -> Result<()> {
        let Some(mapping) = self.mappings.get(&(schema, table)) else {
            return Ok(());
        };
        let change = PendingChange {
            destination_schema: mapping.destination_schema.clone(),
            destination_table: mapping.destination_table.clone(),
            kind,
        };
        let key = (mapping.destination_schema.clone(), mapping.destination_table.clone());
        let coordinator = self.resyncing.read().await.get(&key).cloned();
        let rejected = match coordinator {
            Some(coordinator) => coordinator.buffer_or_reject(change).await,
            None => Some(change),
        };
        if let Some(change) = rejected {
            batch.changes.push(change);
            batch.row_count += 1;
        }
        Ok(())
    }

    /// Spawns the swap-resync driver for one table as a background task so
    /// it runs alongside, not instead of, the live CDC loop. Failures are
    /// logged and leave the mirror running — a table resync failing is not
    /// fatal to the mirror the way a replication-stream failure is.
    async fn start_table_resync(&self, table: String) {
        let Some(mapping) = self.mappings.values().find(|m| m.destination_table == table).cloned() else {
            warn!(mirror = %self.mirror, table = %table, "resync requested for a table with no mapping");
            return;
        };
        let key = (mapping.destination_schema.clone(), mapping.destination_table.clone());

        {
            let mut guard = self.resyncing.write().await;
            if guard.contains_key(&key) {
                warn!(mirror = %self.mirror, table = %table, "resync already in progress for this table");
                return;
            }
            guard.insert(key.clone(), Arc::new(ResyncCoordinator::new()));
        }

        let mirror = self.mirror.clone();
        let catalog = self.catalog.clone();
        let source_conninfo = self.source_conninfo.clone();
        let destination_conninfo = self.destination_conninfo.clone();
        let pk_columns = self.pk_columns.clone();
        let resyncing = self.resyncing.clone();
        let snapshot_parallelism = self.tuning.snapshot_parallelism;

        tokio::spawn(async move {
            let events_catalog = catalog.clone();
            let outcome = run_table_resync(
                mirror.clone(),
                catalog,
                source_conninfo,
                destination_conninfo,
                mapping,
                pk_columns,
                resyncing.clone(),
                key.clone(),
                snapshot_parallelism,
            )
            .await;
            resyncing.write().await.remove(&key);
            match &outcome {
                Ok(()) => {
                    info!(mirror = %mirror, table = %key.1, "table resync completed");
                    let _ = events_catalog
                        .record_event(&model::events::OperatorEvent::new(
                            model::events::EventLevel::Info,
                            model::events::EventCategory::Resync,
                            mirror.clone(),
                            format!("table {} swap-resync completed", key.1),
                        ))
                        .await;
                }
                Err(err) => {
                    error!(mirror = %mirror, table = %key.1, error = %err, "table resync failed");
                    let _ = events_catalog
                        .record_event(&model::events::OperatorEvent::new(
                            model::events::EventLevel::Error,
                            model::events::EventCategory::Resync,
                            mirror.clone(),
                            format!("table {} swap-resync failed: {err}", key.1),
                        ))
                        .await;
                }
            }
        });
    }

    async fn flush(
        &self,
        batch: &mut BatchState,
        next_batch_id: &mut BatchId,
        stream: &mut ActiveStream,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let batch_id = *next_batch_id;
        let cdc_batch = CDCBatch {
            mirror: self.mirror.clone(),
            batch_id,
            row_count: batch.row_count,
            start_lsn: batch.start_lsn,
            end_lsn: batch.end_lsn,
            start_time: batch.start_time,
            end_time: Utc::now(),
        };

        let pk_columns = &self.pk_columns;
        self.sink
            .apply_batch(
                &batch.changes,
                |schema, table| {
                    pk_columns.get(&(schema.to_string(), table.to_string())).cloned().unwrap_or_default()
                },
                cdc_batch,
            )
            .await?;

        stream.acknowledge(batch.end_lsn, false).await?;
        *next_batch_id = batch_id.next();

        let end_lsn = batch.end_lsn;
        *batch = BatchState::new(end_lsn);
        Ok(())
    }

    /// Persists a lifecycle transition to the catalog so status queries
    /// (which read the catalog row directly, not the in-process mailbox)
    /// observe it. Silently skips if the current row doesn't allow the
    /// transition, since a stale in-memory `paused` flag racing a
    /// concurrent `Terminate` shouldn't wedge the worker on an error here.
    async fn set_status(&self, next: model::mirror::MirrorStatus) -> Result<()> {
        let mut row = self.catalog.get_mirror(&self.mirror).await?;
        if row.status.can_transition_to(next) {
            row.status = next;
            row.updated_at = Utc::now();
            self.catalog.put_mirror(&row).await?;
            let category = match next {
                model::mirror::MirrorStatus::Resyncing => model::events::EventCategory::Resync,
                _ => model::events::EventCategory::UserAction,
            };
            let _ = self
                .catalog
                .record_event(&model::events::OperatorEvent::new(
                    model::events::EventLevel::Info,
                    category,
                    self.mirror.clone(),
                    format!("mirror transitioned to {next}"),
                ))
                .await;
        }
        Ok(())
    }

    async fn teardown(&self, mirror_row: &Mirror) -> Result<()> {
        self.source.drop_slot(mirror_row.slot_name.as_str()).await?;
        self.source.drop_publication(mirror_row.publication_name.as_str()).await?;
        let _ = self
            .catalog
            .record_event(&model::events::OperatorEvent::new(
                model::events::EventLevel::Info,
                model::events::EventCategory::Setup,
                self.mirror.clone(),
                "replication slot and publication dropped",
            ))
            .await;
        info!(mirror = %self.mirror, "mirror slot and publication dropped");
        Ok(())
    }

    /// Re-copies every mapped table from a fresh snapshot, called after
    /// `teardown` has already dropped the slot and publication. The caller
    /// re-establishes both (and starts streaming again from the new
    /// consistent point) by rebuilding a worker through `WorkerFactory`.
    async fn full_resync(&self) -> Result<()> {
        let source = PgConnector::connect(&self.source_conninfo).await?;
        let destination = PgConnector::connect(&self.destination_conninfo).await?;
        let schema_source = PgConnector::connect(&self.source_conninfo).await?;

        source.begin_repeatable_read().await?;
        let snapshot = SnapshotEngine::new(
            source.clone(),
            destination.clone(),
            self.catalog.clone(),
            self.tuning.snapshot_parallelism,
        );
        let schema = SchemaPropagator::new(schema_source, destination, self.catalog.clone());

        for mapping in self.mappings.values() {
            schema.drop_foreign_keys(&self.mirror, mapping).await?;
            snapshot.copy_table(&self.mirror, mapping).await?;
            schema.replicate_indexes(&self.mirror, mapping).await?;
            schema.recreate_foreign_keys(&self.mirror, mapping).await?;
        }
        source.commit().await?;
        info!(mirror = %self.mirror, "full mirror resync copied every mapped table from a fresh snapshot");
        Ok(())
    }
}

/// Runs one table's Prepare/Copy/Catch-up/Swap/Cleanup sequence on
/// dedicated connections, independent of the mirror's live replication
/// connections so it can run concurrently with the CDC loop.
async fn run_table_resync(
    mirror: MirrorName,
    catalog: Arc<CatalogStore>,
    source_conninfo: String,
    destination_conninfo: String,
    mapping: TableMapping,
    pk_columns: HashMap<(String, String), Vec<String>>,
    resyncing: Arc<RwLock<HashMap<(String, String), Arc<ResyncCoordinator>>>>,
    key: (String, String),
    snapshot_parallelism: usize,
) -> Result<()> {
    let coordinator = resyncing
        .read()
        .await
        .get(&key)
        .cloned()
        .ok_or_else(|| EngineError::invariant("resync coordinator vanished before the driver could start"))?;

    let source_control = SourceConnector::connect(&source_conninfo).await?;
    let source = PgConnector::connect(&source_conninfo).await?;
    let destination = PgConnector::connect(&destination_conninfo).await?;
    let schema_source = PgConnector::connect(&source_conninfo).await?;

    let sink = SinkWriter::new(destination.clone(), catalog.clone());
    let schema = SchemaPropagator::new(schema_source, destination.clone(), catalog.clone());
    let driver = TableResync::new(mirror, source_control, source, destination, catalog, mapping);

    let pk_lookup =
        move |s: &str, t: &str| pk_columns.get(&(s.to_string(), t.to_string())).cloned().unwrap_or_default();

    driver.prepare().await?;
    driver.copy(snapshot_parallelism).await?;
    driver.catch_up(&coordinator, &sink, &pk_lookup, 10).await?;
    driver.swap(&coordinator, &sink, &pk_lookup, &schema).await?;
    driver.cleanup().await?;
    Ok(())
}
