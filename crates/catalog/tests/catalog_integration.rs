//! Exercises `CatalogStore` against a real PostgreSQL instance (spec §11.2):
//! peer/mirror/mapping/sync-status CRUD round-trips through the actual
//! `bunny_*` schema `schema::ensure_schema` creates on connect.

mod common;

use catalog::CatalogError;
use chrono::Utc;
use common::TestCatalog;
use model::core::identifiers::{BatchId, MirrorName, PeerName};
use model::lsn::Lsn;
use model::mirror::{Mirror, MirrorStatus};
use model::peer::{Peer, SslMode};
use model::table_mapping::TableMapping;
use model::table_sync_status::{TableStatus, TableSyncStatus};
use std::collections::BTreeSet;

fn sample_peer(name: &str) -> Peer {
    Peer {
        name: PeerName::new(name),
        host: "source.internal".to_string(),
        port: 5432,
        user: "replicator".to_string(),
        password: "hunter2".to_string(),
        database: "app".to_string(),
        ssl_mode: SslMode::Prefer,
    }
}

fn sample_mirror(name: &MirrorName, source: &PeerName, destination: &PeerName) -> Mirror {
    let now = Utc::now();
    Mirror {
        name: name.clone(),
        source_peer: source.clone(),
        destination_peer: destination.clone(),
        status: MirrorStatus::Created,
        slot_name: Mirror::slot_name_for(name),
        publication_name: Mirror::publication_name_for(name),
        last_applied_lsn: Lsn::ZERO,
        last_sync_batch_id: BatchId::ZERO,
        last_error: None,
        error_count: 0,
        do_initial_snapshot: true,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn peer_round_trip() {
    let catalog = TestCatalog::new().await;
    let peer = sample_peer("orders-source");

    catalog.store.put_peer(&peer).await.unwrap();
    let fetched = catalog.store.get_peer(&peer.name).await.unwrap();
    assert_eq!(fetched.host, peer.host);
    assert_eq!(fetched.ssl_mode, SslMode::Prefer);

    let peers = catalog.store.list_peers().await.unwrap();
    assert_eq!(peers.len(), 1);

    catalog.store.delete_peer(&peer.name).await.unwrap();
    let err = catalog.store.get_peer(&peer.name).await.unwrap_err();
    assert!(matches!(err, CatalogError::PeerNotFound(_)));
}

#[tokio::test]
async fn mirror_lifecycle_round_trip() {
    let catalog = TestCatalog::new().await;
    let source = sample_peer("source");
    let destination = sample_peer("destination");
    catalog.store.put_peer(&source).await.unwrap();
    catalog.store.put_peer(&destination).await.unwrap();

    let name = MirrorName::new("orders-mirror");
    let mirror = sample_mirror(&name, &source.name, &destination.name);
    catalog.store.create_mirror(&mirror).await.unwrap();

    let mapping = TableMapping {
        mirror: name.clone(),
        source_schema: "public".to_string(),
        source_table: "orders".to_string(),
        destination_schema: "public".to_string(),
        destination_table: "orders".to_string(),
        partition_key: None,
        excluded_columns: BTreeSet::new(),
    };
    catalog.store.put_table_mapping(&mapping).await.unwrap();
    let mappings = catalog.store.list_table_mappings(&name).await.unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].destination_table, "orders");

    let mut status = TableSyncStatus::pending(name.clone(), "orders".to_string());
    catalog.store.create_table_sync_status(&status).await.unwrap();
    status.status = TableStatus::Synced;
    status.rows_synced = 42;
    catalog.store.upsert_table_sync_status(&status).await.unwrap();

    let statuses = catalog.store.list_table_sync_status(&name).await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].status, TableStatus::Synced);
    assert_eq!(statuses[0].rows_synced, 42);

    let mut row = catalog.store.get_mirror(&name).await.unwrap();
    assert_eq!(row.status, MirrorStatus::Created);
    row.status = MirrorStatus::SettingUp;
    catalog.store.put_mirror(&row).await.unwrap();

    let refetched = catalog.store.get_mirror(&name).await.unwrap();
    assert_eq!(refetched.status, MirrorStatus::SettingUp);

    catalog.store.delete_mirror(&name).await.unwrap();
    let err = catalog.store.get_mirror(&name).await.unwrap_err();
    assert!(matches!(err, CatalogError::MirrorNotFound(_)));
}
