//! `/v1/mirrors/*` (spec §6, §4.8). Create validates peers and mappings and
//! provisions the mirror synchronously before returning; every other route
//! resolves the mirror's `MirrorHandle` from the registry and delivers a
//! signal, or reads straight from the catalog for status queries.

use crate::error::ApiResult;
use crate::state::AppState;
use crate::validation::validate_mirror_creation;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use engine_runtime::mirror::{provision_mirror, MirrorSupervisor, MirrorTuning, WorkerFactory};
use model::core::identifiers::{MirrorName, PeerName};
use model::mirror::{Mirror, MirrorStatus};
use model::schema_delta::SchemaDelta;
use model::table_mapping::{PartitionKey, TableMapping};
use model::table_sync_status::TableSyncStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

const MAILBOX_CAPACITY: usize = 16;

#[derive(Deserialize)]
pub struct TableMappingRequest {
    pub source_schema: String,
    pub source_table: String,
    #[serde(default)]
    pub destination_schema: Option<String>,
    #[serde(default)]
    pub destination_table: Option<String>,
    #[serde(default)]
    pub partition_key: Option<PartitionKey>,
    #[serde(default)]
    pub excluded_columns: BTreeSet<String>,
}

#[derive(Deserialize)]
pub struct CreateMirrorRequest {
    pub name: String,
    pub source_peer: String,
    pub destination_peer: String,
    #[serde(default = "default_true")]
    pub do_initial_snapshot: bool,
    pub table_mappings: Vec<TableMappingRequest>,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
pub struct CreateMirrorResponse {
    pub name: String,
    pub status: String,
}

pub async fn create_mirror(
    State(state): State<AppState>,
    Json(body): Json<CreateMirrorRequest>,
) -> ApiResult<(StatusCode, Json<CreateMirrorResponse>)> {
    let mirror_name = MirrorName::new(body.name.clone());
    let source_peer = state.catalog.get_peer(&PeerName::new(body.source_peer)).await?;
    let destination_peer = state.catalog.get_peer(&PeerName::new(body.destination_peer)).await?;

    let mappings: Vec<TableMapping> = body
        .table_mappings
        .into_iter()
        .map(|m| TableMapping {
            mirror: mirror_name.clone(),
            destination_schema: m.destination_schema.unwrap_or_else(|| m.source_schema.clone()),
            destination_table: m.destination_table.unwrap_or_else(|| m.source_table.clone()),
            source_schema: m.source_schema,
            source_table: m.source_table,
            partition_key: m.partition_key,
            excluded_columns: m.excluded_columns,
        })
        .collect();

    validate_mirror_creation(&source_peer, &destination_peer, &mappings).await?;

    let now = Utc::now();
    let mirror = Mirror {
        name: mirror_name.clone(),
        source_peer: source_peer.name.clone(),
        destination_peer: destination_peer.name.clone(),
        status: MirrorStatus::Created,
        slot_name: Mirror::slot_name_for(&mirror_name),
        publication_name: Mirror::publication_name_for(&mirror_name),
        last_applied_lsn: model::lsn::Lsn::ZERO,
        last_sync_batch_id: model::core::identifiers::BatchId::ZERO,
        last_error: None,
        error_count: 0,
        do_initial_snapshot: body.do_initial_snapshot,
        created_at: now,
        updated_at: now,
    };
    state.catalog.create_mirror(&mirror).await?;
    for mapping in &mappings {
        state.catalog.put_table_mapping(mapping).await?;
        state
            .catalog
            .create_table_sync_status(&TableSyncStatus::pending(mirror_name.clone(), mapping.destination_table.clone()))
            .await?;
    }

    let source_conninfo = source_peer.connection_url();
    let destination_conninfo = destination_peer.connection_url();
    let tuning = MirrorTuning {
        batch_size: state.config.batch_size,
        idle_timeout_seconds: state.config.idle_timeout_seconds,
        snapshot_parallelism: state.config.snapshot_parallelism,
    };

    provision_mirror(
        state.catalog.clone(),
        mirror.clone(),
        mappings,
        source_conninfo.clone(),
        destination_conninfo.clone(),
        tuning,
    )
    .await?;

    spawn_worker(&state, mirror_name.clone(), source_conninfo, destination_conninfo, tuning).await;

    info!(mirror = %mirror_name, "mirror created and streaming");
    Ok((
        StatusCode::CREATED,
        Json(CreateMirrorResponse { name: mirror_name.to_string(), status: "running".to_string() }),
    ))
}

async fn spawn_worker(
    state: &AppState,
    mirror: MirrorName,
    source_conninfo: String,
    destination_conninfo: String,
    tuning: MirrorTuning,
) {
    let factory =
        WorkerFactory::new(mirror.clone(), state.catalog.clone(), source_conninfo, destination_conninfo, tuning);
    let (supervisor, handle) = MirrorSupervisor::spawn(mirror.clone(), state.catalog.clone(), MAILBOX_CAPACITY, factory);
    state.registry.insert(mirror, handle, supervisor).await;
}

#[derive(Serialize)]
pub struct TableStatusResponse {
    pub destination_table: String,
    pub status: String,
    pub rows_synced: u64,
    pub last_error: Option<String>,
}

#[derive(Serialize)]
pub struct MirrorStatusResponse {
    pub name: String,
    pub status: String,
    pub slot_name: String,
    pub publication_name: String,
    pub last_applied_lsn: String,
    pub last_sync_batch_id: i64,
    pub error: Option<String>,
    pub tables: Vec<TableStatusResponse>,
}

fn status_text(status: MirrorStatus) -> &'static str {
    use MirrorStatus::*;
    match status {
        Created => "created",
        SettingUp => "setting_up",
        Snapshot => "snapshot",
        Running => "running",
        Paused => "paused",
        Resyncing => "resyncing",
        Failed => "failed",
        Terminating => "terminating",
        Terminated => "terminated",
    }
}

fn table_status_text(status: model::table_sync_status::TableStatus) -> &'static str {
    use model::table_sync_status::TableStatus::*;
    match status {
        Pending => "pending",
        Syncing => "syncing",
        Synced => "synced",
        Resyncing => "resyncing",
        Error => "error",
    }
}

pub async fn get_mirror(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<MirrorStatusResponse>> {
    let mirror_name = MirrorName::new(name);
    let mirror = state.catalog.get_mirror(&mirror_name).await?;
    let tables = state
        .catalog
        .list_table_sync_status(&mirror_name)
        .await?
        .into_iter()
        .map(|t| TableStatusResponse {
            destination_table: t.destination_table,
            status: table_status_text(t.status).to_string(),
            rows_synced: t.rows_synced,
            last_error: t.last_error,
        })
        .collect();

    Ok(Json(MirrorStatusResponse {
        name: mirror.name.to_string(),
        status: status_text(mirror.status).to_string(),
        slot_name: mirror.slot_name.to_string(),
        publication_name: mirror.publication_name.to_string(),
        last_applied_lsn: mirror.last_applied_lsn.to_string(),
        last_sync_batch_id: mirror.last_sync_batch_id.0,
        error: mirror.last_error,
        tables,
    }))
}

pub async fn pause_mirror(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    let handle = state.registry.get(&MirrorName::new(name)).await?;
    handle.pause().await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn resume_mirror(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    let handle = state.registry.get(&MirrorName::new(name)).await?;
    handle.resume().await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn retry_mirror(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    let handle = state.registry.get(&MirrorName::new(name)).await?;
    handle.retry_now().await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn sync_schema(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    let handle = state.registry.get(&MirrorName::new(name)).await?;
    handle.sync_schema().await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn resync_mirror(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    let handle = state.registry.get(&MirrorName::new(name)).await?;
    handle.resync().await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn resync_table(
    State(state): State<AppState>,
    Path((name, table)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let handle = state.registry.get(&MirrorName::new(name)).await?;
    handle.resync_table(table).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn delete_mirror(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    let mirror_name = MirrorName::new(name);
    if let Ok(handle) = state.registry.get(&mirror_name).await {
        let _ = handle.terminate().await;
    }
    state.registry.remove(&mirror_name).await;
    state.catalog.delete_mirror(&mirror_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct SchemaDeltaResponse {
    pub destination_table: String,
    pub kind: String,
    pub payload: String,
}

fn delta_kind_text(kind: model::schema_delta::SchemaDeltaKind) -> &'static str {
    use model::schema_delta::SchemaDeltaKind::*;
    match kind {
        AddColumn => "add_column",
        DropColumn => "drop_column",
        AlterType => "alter_type",
        AddDefault => "add_default",
        DropDefault => "drop_default",
        AddConstraint => "add_constraint",
        DropConstraint => "drop_constraint",
    }
}

pub async fn schema_diff(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<SchemaDeltaResponse>>> {
    let deltas: Vec<SchemaDelta> = state.catalog.list_pending_schema_deltas(&MirrorName::new(name)).await?;
    Ok(Json(
        deltas
            .into_iter()
            .map(|d| SchemaDeltaResponse {
                destination_table: d.destination_table,
                kind: delta_kind_text(d.kind).to_string(),
                payload: d.payload,
            })
            .collect(),
    ))
}

