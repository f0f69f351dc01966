//! HTTP control plane (spec §4.8, §6): peer and mirror CRUD, mirror
//! lifecycle signals, and status/schema-diff reads. A thin layer over
//! `catalog` (durable state) and `engine-runtime` (the live per-mirror
//! workers) — this crate owns no replication logic of its own.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod validation;

use crate::auth::SharedSecretVerifier;
use crate::config::Config;
use crate::state::{AppState, MirrorRegistry};
use catalog::CatalogStore;
use std::sync::Arc;
use tracing::info;

/// Connects to the catalog database. Split out from [`serve`] so the
/// binary can map a connection failure to exit code 2 (spec §6) instead of
/// the generic "runtime unreachable" code 3.
pub async fn connect_catalog(config: &Config) -> catalog::Result<CatalogStore> {
    CatalogStore::connect(config.catalog.clone()).await
}

/// Builds an `AppState` with an empty mirror registry and serves the `/v1`
/// route table until the process is killed.
///
/// Mirrors already `Running` or `Paused` in the catalog are not
/// automatically re-attached on startup — the teacher's CLI has no
/// equivalent "resume everything" step either, and silently respawning a
/// worker for every catalog row would race a deliberate `Terminate` that
/// happened while the process was down. An operator-facing "reattach"
/// endpoint is the natural place for that and is not part of this route
/// table yet.
pub async fn serve(config: Config, catalog: CatalogStore) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let verifier: Arc<dyn auth::TokenVerifier> = Arc::new(SharedSecretVerifier::new(config.jwt_secret.clone()));
    let bind_addr = config.http_bind_addr;

    let state = AppState {
        catalog: Arc::new(catalog),
        registry: MirrorRegistry::new(),
        config: Arc::new(config),
        verifier,
    };

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "control plane listening");
    axum::serve(listener, routes::router(state)).await?;
    Ok(())
}
