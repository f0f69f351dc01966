//! Postgres wire-protocol plumbing shared by the source connector, sink
//! writer, snapshot engine and schema propagator.

pub mod coercion;
pub mod connection;
pub mod encoder;
pub mod introspect;
pub mod params;
pub mod row;

use crate::error::Result;
use futures_util::{SinkExt, pin_mut};
use model::core::{data_type::DataType, value::Value};
use params::PgParamStore;
use row::Row;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::Client;

pub use introspect::{ColumnInfo, ForeignKeyInfo, IndexInfo};

/// A thin, connection-owning wrapper used by every module that talks to a
/// Postgres endpoint. Serializes access the same way the catalog pool does:
/// bulk COPY and transactional apply both need `&mut Client`.
#[derive(Clone)]
pub struct PgConnector {
    client: Arc<Mutex<Client>>,
}

impl PgConnector {
    pub async fn connect(conninfo: &str) -> Result<Self> {
        let client = connection::connect(conninfo).await?;
        Ok(Self::from_client(client))
    }

    /// Wraps an already-established connection (the decoder's lazy
    /// type-OID lookups reuse the replication client's sibling control
    /// connection rather than opening a third socket).
    pub fn from_client(client: Client) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
        }
    }

    pub async fn exec(&self, sql: &str, params: Vec<Value>) -> Result<u64> {
        let client = self.client.lock().await;
        let bindings = PgParamStore::from_values(params);
        Ok(client.execute(sql, &bindings.as_refs()).await?)
    }

    pub async fn batch_exec(&self, sql: &str) -> Result<()> {
        let client = self.client.lock().await;
        client.batch_execute(sql).await?;
        Ok(())
    }

    pub async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        let client = self.client.lock().await;
        let bindings = PgParamStore::from_values(params);
        let rows = client.query(sql, &bindings.as_refs()).await?;
        Ok(rows.iter().map(Row::from_pg_row).collect())
    }

    /// Runs `statements` in order inside one transaction, committing only if
    /// every statement succeeds. Used by the sink writer to apply a CDC
    /// batch's deletes and upserts atomically.
    pub async fn apply_in_transaction(&self, statements: &[(String, Vec<Value>)]) -> Result<()> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await?;
        for (sql, params) in statements {
            let bindings = PgParamStore::from_values(params.clone());
            tx.execute(sql.as_str(), &bindings.as_refs()).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Opens a `REPEATABLE READ, READ ONLY` transaction on this connection
    /// and leaves it open until [`PgConnector::commit`] is called. Used by
    /// the snapshot engine and table resync to adopt a source-exported
    /// snapshot for the lifetime of a bulk copy.
    pub async fn begin_repeatable_read(&self) -> Result<()> {
        self.batch_exec("BEGIN ISOLATION LEVEL REPEATABLE READ, READ ONLY").await
    }

    /// Freezes this connection's view at the exported snapshot, so every
    /// subsequent `query`/`copy_in` call sees exactly the rows visible at
    /// the slot's consistent point.
    pub async fn adopt_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.batch_exec(&format!("SET TRANSACTION SNAPSHOT '{snapshot_id}'")).await
    }

    pub async fn commit(&self) -> Result<()> {
        self.batch_exec("COMMIT").await
    }

    pub async fn table_exists(&self, schema: &str, table: &str) -> Result<bool> {
        introspect::table_exists(&self.client, schema, table).await
    }

    pub async fn columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        introspect::columns(&self.client, schema, table).await
    }

    pub async fn foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        introspect::foreign_keys(&self.client, schema, table).await
    }

    pub async fn indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexInfo>> {
        introspect::indexes(&self.client, schema, table).await
    }

    pub async fn primary_key_columns(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        introspect::primary_key_columns(&self.client, schema, table).await
    }

    pub async fn list_tables(&self) -> Result<Vec<(String, String)>> {
        introspect::list_tables(&self.client).await
    }

    pub async fn server_version_num(&self) -> Result<i32> {
        introspect::server_version_num(&self.client).await
    }

    pub async fn wal_level(&self) -> Result<String> {
        introspect::wal_level(&self.client).await
    }

    pub async fn has_replication_privilege(&self) -> Result<bool> {
        introspect::has_replication_privilege(&self.client).await
    }

    /// Bulk-loads `rows` into `schema.table` via `COPY ... FROM STDIN WITH
    /// (FORMAT csv)` inside a fresh transaction that commits once the
    /// stream closes.
    pub async fn copy_in(
        &self,
        schema: &str,
        table: &str,
        columns: &[ColumnInfo],
        rows: &[Row],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut client = self.client.lock().await;
        let tx = client.transaction().await?;

        let column_list = columns
            .iter()
            .map(|c| format!("\"{}\"", c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!(
            "COPY \"{schema}\".\"{table}\" ({column_list}) FROM STDIN WITH (FORMAT csv)"
        );

        let encoder = encoder::PgCopyValueEncoder::new();
        let sink = tx.copy_in(&statement).await?;
        pin_mut!(sink);

        let mut count = 0u64;
        for row in rows {
            let mut line = String::new();
            for (i, col) in columns.iter().enumerate() {
                if i > 0 {
                    line.push(',');
                }
                let prepared = coercion::prepare_value(col, row.get(&col.name));
                line.push_str(&encoder.encode_optional(prepared.as_ref()));
            }
            line.push('\n');
            sink.as_mut().send(bytes::Bytes::from(line)).await?;
            count += 1;
        }

        sink.as_mut().close().await?;
        tx.commit().await?;
        Ok(count)
    }
}

/// Quotes `schema.table`, matching the dialect's own identifier quoting so
/// SQL built by hand here stays consistent with planner-rendered statements.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub(crate) fn parse_column_type(name: &str) -> DataType {
    DataType::from_postgres_type(name).unwrap_or_else(|_| DataType::Custom(name.to_string()))
}
