pub mod mirrors;
pub mod peers;

use crate::auth::require_bearer_token;
use crate::state::AppState;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

/// Builds the versioned `/v1` route table (spec §6). Every route sits
/// behind `require_bearer_token`; health checks, if ever added, would live
/// outside this router.
pub fn router(state: AppState) -> Router {
    let verifier = state.verifier.clone();

    Router::new()
        .route("/v1/peers", post(peers::create_peer))
        .route("/v1/peers/:name/tables", get(peers::list_peer_tables))
        .route("/v1/peers/:name/test", post(peers::test_peer_connection))
        .route("/v1/mirrors", post(mirrors::create_mirror))
        .route("/v1/mirrors/:name", get(mirrors::get_mirror).delete(mirrors::delete_mirror))
        .route("/v1/mirrors/:name/pause", post(mirrors::pause_mirror))
        .route("/v1/mirrors/:name/resume", post(mirrors::resume_mirror))
        .route("/v1/mirrors/:name/resync", post(mirrors::resync_mirror))
        .route("/v1/mirrors/:name/resync/:table", post(mirrors::resync_table))
        .route("/v1/mirrors/:name/retry", post(mirrors::retry_mirror))
        .route("/v1/mirrors/:name/sync-schema", post(mirrors::sync_schema))
        .route("/v1/mirrors/:name/schema-diff", get(mirrors::schema_diff))
        .layer(middleware::from_fn_with_state(verifier, require_bearer_token))
        .with_state(state)
}
