//! `/v1/peers/*` (spec §6).

use crate::error::ApiResult;
use crate::state::AppState;
use crate::validation::test_peer;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use connectors::postgres::PgConnector;
use model::core::identifiers::PeerName;
use model::peer::{Peer, SslMode};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct CreatePeerRequest {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub ssl_mode: SslMode,
}

#[derive(Serialize)]
pub struct CreatePeerResponse {
    pub id: String,
}

pub async fn create_peer(
    State(state): State<AppState>,
    Json(body): Json<CreatePeerRequest>,
) -> ApiResult<(StatusCode, Json<CreatePeerResponse>)> {
    let peer = Peer {
        name: PeerName::new(body.name.clone()),
        host: body.host,
        port: body.port,
        user: body.user,
        password: body.password,
        database: body.database,
        ssl_mode: body.ssl_mode,
    };
    state.catalog.put_peer(&peer).await?;
    Ok((StatusCode::CREATED, Json(CreatePeerResponse { id: body.name })))
}

#[derive(Serialize)]
pub struct TableEntry {
    pub schema: String,
    pub table: String,
}

pub async fn list_peer_tables(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<TableEntry>>> {
    let peer = state.catalog.get_peer(&PeerName::new(name)).await?;
    let conn = PgConnector::connect(&peer.connection_url()).await?;
    let tables = conn
        .list_tables()
        .await?
        .into_iter()
        .map(|(schema, table)| TableEntry { schema, table })
        .collect();
    Ok(Json(tables))
}

pub async fn test_peer_connection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<crate::validation::PeerTestResult>> {
    let peer = state.catalog.get_peer(&PeerName::new(name)).await?;
    Ok(Json(test_peer(&peer).await))
}
