use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Subcommand)]
pub enum Commands {
    /// Peer (PostgreSQL endpoint) management.
    Peer {
        #[command(subcommand)]
        command: PeerCommand,
    },
    /// Mirror (replication pipeline) management.
    Mirror {
        #[command(subcommand)]
        command: MirrorCommand,
    },
    /// Runs the control plane in this process (spec §4.8, §6).
    Serve,
}

#[derive(Subcommand)]
pub enum PeerCommand {
    /// Registers a PostgreSQL endpoint as a peer.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = 5432)]
        port: u16,
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        database: String,
        /// disable, prefer, or require
        #[arg(long, default_value = "prefer")]
        ssl_mode: String,
    },
    /// Dials a peer and reports its server version.
    Test {
        #[arg(long)]
        name: String,
    },
    /// Lists the schemas and tables visible on a peer.
    Tables {
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand)]
pub enum MirrorCommand {
    /// Creates and starts a mirror.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        source_peer: String,
        #[arg(long)]
        destination_peer: String,
        /// `schema.table` or `source_schema.source_table=dest_schema.dest_table`,
        /// may be repeated.
        #[arg(long = "mapping", required = true)]
        mappings: Vec<String>,
        #[arg(long)]
        no_initial_snapshot: bool,
    },
    /// Prints a mirror's status, slot/publication, LSN and per-table state.
    Get(NameArg),
    /// Pauses CDC replay.
    Pause(NameArg),
    /// Resumes CDC replay.
    Resume(NameArg),
    /// Drops the slot/publication and re-snapshots every mapped table.
    Resync(NameArg),
    /// Zero-downtime swap-resync of a single table.
    ResyncTable {
        #[arg(long)]
        name: String,
        #[arg(long)]
        table: String,
    },
    /// Clears a worker's backoff and retries immediately.
    Retry(NameArg),
    /// Applies pending schema/index/foreign-key drift.
    SyncSchema(NameArg),
    /// Lists pending schema deltas without applying them.
    SchemaDiff(NameArg),
    /// Terminates the mirror and drops its catalog row.
    Delete(NameArg),
}

#[derive(Args)]
pub struct NameArg {
    #[arg(long)]
    pub name: String,
}

#[derive(Serialize)]
pub struct CreatePeerRequest {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
}

#[derive(Deserialize)]
pub struct CreatePeerResponse {
    pub id: String,
}

#[derive(Deserialize)]
pub struct TableEntry {
    pub schema: String,
    pub table: String,
}

#[derive(Deserialize)]
pub struct PeerTestResult {
    pub success: bool,
    pub version: Option<i32>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateMirrorResponse {
    pub name: String,
    pub status: String,
}

#[derive(Deserialize)]
pub struct TableStatusResponse {
    pub destination_table: String,
    pub status: String,
    pub rows_synced: u64,
    pub last_error: Option<String>,
}

#[derive(Deserialize)]
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

#[derive(Deserialize)]
pub struct SchemaDeltaResponse {
    pub destination_table: String,
    pub kind: String,
    pub payload: String,
}

#[derive(Serialize)]
pub struct TableMappingRequest {
    pub source_schema: String,
    pub source_table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_table: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub excluded_columns: BTreeSet<String>,
}

#[derive(Serialize)]
pub struct CreateMirrorRequest {
    pub name: String,
    pub source_peer: String,
    pub destination_peer: String,
    pub do_initial_snapshot: bool,
    pub table_mappings: Vec<TableMappingRequest>,
}

/// Parses a `--mapping` value of the form `schema.table` or
/// `source_schema.source_table=dest_schema.dest_table`.
pub fn parse_mapping(raw: &str) -> Result<TableMappingRequest, String> {
    let (source, dest) = match raw.split_once('=') {
        Some((s, d)) => (s, Some(d)),
        None => (raw, None),
    };
    let (source_schema, source_table) = split_qualified(source, "--mapping")?;
    let (destination_schema, destination_table) = match dest {
        Some(d) => {
            let (s, t) = split_qualified(d, "--mapping")?;
            (Some(s), Some(t))
        }
        None => (None, None),
    };
    Ok(TableMappingRequest {
        source_schema,
        source_table,
        destination_schema,
        destination_table,
        excluded_columns: BTreeSet::new(),
    })
}

fn split_qualified(raw: &str, flag: &'static str) -> Result<(String, String), String> {
    raw.split_once('.')
        .map(|(schema, table)| (schema.to_string(), table.to_string()))
        .ok_or_else(|| format!("{flag}: expected `schema.table`, got `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_on_both_sides() {
        let mapping = parse_mapping("public.users").unwrap();
        assert_eq!(mapping.source_schema, "public");
        assert_eq!(mapping.source_table, "users");
        assert!(mapping.destination_schema.is_none());
        assert!(mapping.destination_table.is_none());
    }

    #[test]
    fn renamed_destination() {
        let mapping = parse_mapping("public.users=archive.users_v2").unwrap();
        assert_eq!(mapping.source_schema, "public");
        assert_eq!(mapping.source_table, "users");
        assert_eq!(mapping.destination_schema.as_deref(), Some("archive"));
        assert_eq!(mapping.destination_table.as_deref(), Some("users_v2"));
    }

    #[test]
    fn rejects_unqualified_table_name() {
        assert!(parse_mapping("users").is_err());
        assert!(parse_mapping("public.users=users_v2").is_err());
    }
}
