//! Peer and mapping validation ahead of mirror creation (spec §4.8):
//! "Create validates peers (dial + `SHOW server_version_num`), validates
//! mappings (both sides reachable, source has REPLICATION privilege,
//! `wal_level=logical`)".

use crate::error::{ApiError, ApiResult};
use connectors::postgres::PgConnector;
use model::peer::Peer;
use model::table_mapping::TableMapping;
use serde::Serialize;

/// Minimum PostgreSQL version the logical-replication protocol this crate
/// speaks (pgoutput over `CopyBoth`) requires.
const MIN_SERVER_VERSION_NUM: i32 = 100000;

#[derive(Serialize)]
pub struct PeerTestResult {
    pub success: bool,
    pub version: Option<i32>,
    pub error: Option<String>,
}

/// Dials the peer and probes its version (the `/v1/peers/:name/test`
/// endpoint). Connection failures are reported in the body rather than as
/// an HTTP error, matching the spec's `{success:false, error}` shape.
pub async fn test_peer(peer: &Peer) -> PeerTestResult {
    match PgConnector::connect(&peer.connection_url()).await {
        Ok(conn) => match conn.server_version_num().await {
            Ok(version) => PeerTestResult { success: true, version: Some(version), error: None },
            Err(err) => PeerTestResult { success: false, version: None, error: Some(err.to_string()) },
        },
        Err(err) => PeerTestResult { success: false, version: None, error: Some(err.to_string()) },
    }
}

/// Full pre-create validation: both peers dial and meet the minimum
/// version, the source additionally has `wal_level=logical` and the
/// `REPLICATION` attribute, and every mapping names a reachable source
/// table.
pub async fn validate_mirror_creation(
    source: &Peer,
    destination: &Peer,
    mappings: &[TableMapping],
) -> ApiResult<()> {
    if mappings.is_empty() {
        return Err(ApiError::Validation("a mirror needs at least one table mapping".into()));
    }

    let source_conn = PgConnector::connect(&source.connection_url())
        .await
        .map_err(|err| ApiError::Validation(format!("cannot reach source peer '{}': {err}", source.name)))?;
    validate_minimum_version(&source_conn, &source.name.to_string()).await?;

    let wal_level = source_conn
        .wal_level()
        .await
        .map_err(|err| ApiError::Validation(format!("source peer '{}': {err}", source.name)))?;
    if wal_level != "logical" {
        return Err(ApiError::Validation(format!(
            "source peer '{}' has wal_level='{wal_level}', logical replication requires 'logical'",
            source.name
        )));
    }

    let has_replication = source_conn
        .has_replication_privilege()
        .await
        .map_err(|err| ApiError::Validation(format!("source peer '{}': {err}", source.name)))?;
    if !has_replication {
        return Err(ApiError::Validation(format!(
            "user '{}' on source peer '{}' lacks the REPLICATION attribute",
            source.user, source.name
        )));
    }

    for mapping in mappings {
        if !source_conn.table_exists(&mapping.source_schema, &mapping.source_table).await? {
            return Err(ApiError::Validation(format!(
                "source table '{}' does not exist",
                mapping.source_qualified()
            )));
        }
    }

    let destination_conn = PgConnector::connect(&destination.connection_url()).await.map_err(|err| {
        ApiError::Validation(format!("cannot reach destination peer '{}': {err}", destination.name))
    })?;
    validate_minimum_version(&destination_conn, &destination.name.to_string()).await?;

    Ok(())
}

async fn validate_minimum_version(conn: &PgConnector, peer_name: &str) -> ApiResult<()> {
    let version = conn
        .server_version_num()
        .await
        .map_err(|err| ApiError::Validation(format!("peer '{peer_name}': {err}")))?;
    if version < MIN_SERVER_VERSION_NUM {
        return Err(ApiError::Validation(format!(
            "peer '{peer_name}' runs server_version_num={version}, logical replication requires >= {MIN_SERVER_VERSION_NUM}"
        )));
    }
    Ok(())
}
