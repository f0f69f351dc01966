use crate::error::Result;
use crate::postgres::parse_column_type;
use model::core::data_type::DataType;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::Client;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ForeignKeyInfo {
    pub constraint_name: String,
    pub target_table: String,
    pub definition: String,
    pub on_delete: String,
    pub on_update: String,
}

#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub index_name: String,
    pub method: String,
    pub is_unique: bool,
    pub is_primary: bool,
    pub definition: String,
}

pub async fn table_exists(client: &Arc<Mutex<Client>>, schema: &str, table: &str) -> Result<bool> {
    let client = client.lock().await;
    let row = client
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                WHERE table_schema = $1 AND table_name = $2)",
            &[&schema, &table],
        )
        .await?;
    Ok(row.get(0))
}

pub async fn columns(client: &Arc<Mutex<Client>>, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
    let client = client.lock().await;
    let rows = client
        .query(
            "SELECT column_name, data_type, is_nullable, character_maximum_length \
                FROM information_schema.columns \
                WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
            &[&schema, &table],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let type_name: String = row.get(1);
            let nullable: String = row.get(2);
            ColumnInfo {
                name: row.get(0),
                data_type: parse_column_type(&type_name),
                nullable: nullable == "YES",
                max_length: row
                    .get::<_, Option<i32>>(3)
                    .map(|v| v.max(0) as usize),
            }
        })
        .collect())
}

pub async fn foreign_keys(
    client: &Arc<Mutex<Client>>,
    schema: &str,
    table: &str,
) -> Result<Vec<ForeignKeyInfo>> {
    let client = client.lock().await;
    let rows = client
        .query(
            "SELECT con.conname, \
                    confrel.relname AS target_table, \
                    pg_get_constraintdef(con.oid) AS definition, \
                    CASE con.confdeltype \
                        WHEN 'a' THEN 'NO ACTION' WHEN 'r' THEN 'RESTRICT' \
                        WHEN 'c' THEN 'CASCADE' WHEN 'n' THEN 'SET NULL' \
                        WHEN 'd' THEN 'SET DEFAULT' ELSE 'NO ACTION' END, \
                    CASE con.confupdtype \
                        WHEN 'a' THEN 'NO ACTION' WHEN 'r' THEN 'RESTRICT' \
                        WHEN 'c' THEN 'CASCADE' WHEN 'n' THEN 'SET NULL' \
                        WHEN 'd' THEN 'SET DEFAULT' ELSE 'NO ACTION' END \
             FROM pg_constraint con \
             JOIN pg_class rel ON rel.oid = con.conrelid \
             JOIN pg_namespace nsp ON nsp.oid = rel.relnamespace \
             JOIN pg_class confrel ON confrel.oid = con.confrelid \
             WHERE con.contype = 'f' AND nsp.nspname = $1 AND rel.relname = $2",
            &[&schema, &table],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| ForeignKeyInfo {
            constraint_name: row.get(0),
            target_table: row.get(1),
            definition: row.get(2),
            on_delete: row.get(3),
            on_update: row.get(4),
        })
        .collect())
}

/// Ordered primary-key column names, needed by the sink writer to build
/// `ON CONFLICT` targets.
pub async fn primary_key_columns(client: &Arc<Mutex<Client>>, schema: &str, table: &str) -> Result<Vec<String>> {
    let client = client.lock().await;
    let rows = client
        .query(
            "SELECT a.attname \
             FROM pg_index i \
             JOIN pg_class t ON t.oid = i.indrelid \
             JOIN pg_namespace nsp ON nsp.oid = t.relnamespace \
             JOIN unnest(i.indkey) WITH ORDINALITY AS k(attnum, ord) ON true \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum \
             WHERE i.indisprimary AND nsp.nspname = $1 AND t.relname = $2 \
             ORDER BY k.ord",
            &[&schema, &table],
        )
        .await?;
    Ok(rows.iter().map(|row| row.get(0)).collect())
}

pub async fn indexes(client: &Arc<Mutex<Client>>, schema: &str, table: &str) -> Result<Vec<IndexInfo>> {
    let client = client.lock().await;
    let rows = client
        .query(
            "SELECT ix.relname AS index_name, am.amname AS method, \
                    i.indisunique, i.indisprimary, pg_get_indexdef(i.indexrelid) \
             FROM pg_index i \
             JOIN pg_class ix ON ix.oid = i.indexrelid \
             JOIN pg_class t ON t.oid = i.indrelid \
             JOIN pg_am am ON am.oid = ix.relam \
             JOIN pg_namespace nsp ON nsp.oid = t.relnamespace \
             WHERE nsp.nspname = $1 AND t.relname = $2",
            &[&schema, &table],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| IndexInfo {
            index_name: row.get(0),
            method: row.get(1),
            is_unique: row.get(2),
            is_primary: row.get(3),
            definition: row.get(4),
        })
        .collect())
}

/// Every user table on the peer, grouped by schema — backs
/// `GET /v1/peers/:name/tables` (spec §6).
pub async fn list_tables(client: &Arc<Mutex<Client>>) -> Result<Vec<(String, String)>> {
    let client = client.lock().await;
    let rows = client
        .query(
            "SELECT table_schema, table_name FROM information_schema.tables \
             WHERE table_type = 'BASE TABLE' \
               AND table_schema NOT IN ('pg_catalog', 'information_schema') \
             ORDER BY table_schema, table_name",
            &[],
        )
        .await?;
    Ok(rows.iter().map(|row| (row.get(0), row.get(1))).collect())
}

/// `SHOW server_version_num` as an integer, used by peer creation (spec
/// §4.8) to probe that a dialed connection is actually a usable Postgres.
pub async fn server_version_num(client: &Arc<Mutex<Client>>) -> Result<i32> {
    let client = client.lock().await;
    let row = client.query_one("SHOW server_version_num", &[]).await?;
    let text: String = row.get(0);
    Ok(text.parse().unwrap_or(0))
}

pub async fn wal_level(client: &Arc<Mutex<Client>>) -> Result<String> {
    let client = client.lock().await;
    let row = client.query_one("SHOW wal_level", &[]).await?;
    Ok(row.get(0))
}

/// Whether the connected role carries the `REPLICATION` attribute, required
/// on the source peer (spec §6).
pub async fn has_replication_privilege(client: &Arc<Mutex<Client>>) -> Result<bool> {
    let client = client.lock().await;
    let row = client
        .query_one(
            "SELECT rolreplication OR rolsuper FROM pg_roles WHERE rolname = current_user",
            &[],
        )
        .await?;
    Ok(row.get(0))
}
