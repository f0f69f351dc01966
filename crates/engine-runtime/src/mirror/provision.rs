//! Drives a brand-new mirror through `Created` -> `SettingUp` -> `Snapshot`
//! -> `Running`: stands up the publication and slot, then (if requested)
//! runs every mapped table's initial snapshot under the slot's exported
//! transaction before the CDC worker ever starts streaming.
//!
//! Distinct from [`crate::mirror::worker::CdcWorker::full_resync`], which
//! re-drives an already-running mirror's tables from a fresh snapshot —
//! this module exists to stand a slot up for the first time.

use catalog::CatalogStore;
use chrono::Utc;
use connectors::postgres::PgConnector;
use connectors::replication::client::SourceConnector;
use engine_core::error::Result;
use engine_core::schema::SchemaPropagator;
use engine_core::snapshot::SnapshotEngine;
use model::core::identifiers::MirrorName;
use model::events::{EventCategory, OperatorEvent};
use model::mirror::{Mirror, MirrorStatus};
use model::table_mapping::TableMapping;
use model::table_sync_status::{TableStatus, TableSyncStatus};
use std::sync::Arc;
use tracing::info;

use crate::mirror::worker::MirrorTuning;

/// Runs to completion before the caller spawns the mirror's
/// [`crate::mirror::MirrorSupervisor`] — the worker's `run` loop assumes the
/// slot and publication it's handed already exist.
pub async fn provision_mirror(
    catalog: Arc<CatalogStore>,
    mirror: Mirror,
    mappings: Vec<TableMapping>,
    source_conninfo: String,
    destination_conninfo: String,
    tuning: MirrorTuning,
) -> Result<()> {
    transition(&catalog, &mirror.name, MirrorStatus::SettingUp).await?;
    let _ = catalog
        .record_event(&OperatorEvent::new(
            model::events::EventLevel::Info,
            EventCategory::Setup,
            mirror.name.clone(),
            "provisioning publication and replication slot",
        ))
        .await;

    let source_control = SourceConnector::connect(&source_conninfo).await?;
    let tables: Vec<(String, String)> = mappings
        .iter()
        .map(|m| (m.source_schema.clone(), m.source_table.clone()))
        .collect();
    source_control.ensure_publication(mirror.publication_name.as_str(), &tables).await?;
    let slot = source_control.ensure_slot(mirror.slot_name.as_str()).await?;

    if mirror.do_initial_snapshot {
        transition(&catalog, &mirror.name, MirrorStatus::Snapshot).await?;
        let _ = catalog
            .record_event(&OperatorEvent::new(
                model::events::EventLevel::Info,
                EventCategory::Snapshot,
                mirror.name.clone(),
                format!("copying {} mapped table(s) from the exported snapshot", mappings.len()),
            ))
            .await;

        let source = PgConnector::connect(&source_conninfo).await?;
        let destination = PgConnector::connect(&destination_conninfo).await?;
        let schema_source = PgConnector::connect(&source_conninfo).await?;

        source.begin_repeatable_read().await?;
        if let Some(snapshot_id) = &slot.export_snapshot_id {
            source.adopt_snapshot(snapshot_id).await?;
        }

        let snapshot =
            SnapshotEngine::new(source.clone(), destination.clone(), catalog.clone(), tuning.snapshot_parallelism);
        let schema = SchemaPropagator::new(schema_source, destination, catalog.clone());

        for mapping in &mappings {
            let outcome = provision_table(&mirror.name, mapping, &snapshot, &schema).await;
            let mut status = TableSyncStatus::pending(mirror.name.clone(), mapping.destination_table.clone());
            match outcome {
                Ok(()) => {
                    status.status = TableStatus::Synced;
                    status.last_synced_at = Some(Utc::now());
                }
                Err(err) => {
                    status.status = TableStatus::Error;
                    status.last_error = Some(err.to_string());
                }
            }
            catalog.upsert_table_sync_status(&status).await?;
        }
        source.commit().await?;
    }

    let mut row = catalog.get_mirror(&mirror.name).await?;
    row.status = MirrorStatus::Running;
    row.last_applied_lsn = slot.consistent_point;
    row.updated_at = Utc::now();
    catalog.put_mirror(&row).await?;
    let _ = catalog
        .record_event(&OperatorEvent::new(
            model::events::EventLevel::Info,
            EventCategory::Setup,
            mirror.name.clone(),
            "mirror provisioned and streaming",
        ))
        .await;
    info!(mirror = %mirror.name, tables = mappings.len(), "mirror provisioned and ready to stream");
    Ok(())
}

async fn provision_table(
    mirror: &MirrorName,
    mapping: &TableMapping,
    snapshot: &SnapshotEngine,
    schema: &SchemaPropagator,
) -> Result<()> {
    schema.sync_table(mirror, mapping).await?;
    schema.drop_foreign_keys(mirror, mapping).await?;
    snapshot.copy_table(mirror, mapping).await?;
    schema.replicate_indexes(mirror, mapping).await?;
    schema.recreate_foreign_keys(mirror, mapping).await?;
    Ok(())
}

async fn transition(catalog: &CatalogStore, name: &MirrorName, status: MirrorStatus) -> Result<()> {
    let mut row = catalog.get_mirror(name).await?;
    if row.status.can_transition_to(status) {
        row.status = status;
        row.updated_at = Utc::now();
        catalog.put_mirror(&row).await?;
    }
    Ok(())
}
