use super::CatalogStore;
use crate::error::{CatalogError, Result};
use model::core::identifiers::MirrorName;
use model::table_mapping::{PartitionKey, PartitionKeyKind, TableMapping};
use std::collections::BTreeSet;
use tokio_postgres::Row;

fn partition_kind_to_text(kind: PartitionKeyKind) -> &'static str {
    match kind {
        PartitionKeyKind::Numeric => "numeric",
        PartitionKeyKind::Timestamp => "timestamp",
    }
}

fn partition_kind_from_text(text: &str) -> Result<PartitionKeyKind> {
    match text {
        "numeric" => Ok(PartitionKeyKind::Numeric),
        "timestamp" => Ok(PartitionKeyKind::Timestamp),
        other => Err(CatalogError::InvalidRow {
            entity: "table_mapping.partition_kind",
            reason: format!("unrecognized partition kind '{other}'"),
        }),
    }
}

fn row_to_mapping(row: &Row) -> Result<TableMapping> {
    let partition_column: Option<String> = row.get(5);
    let partition_kind: Option<String> = row.get(6);
    let partition_key = match (partition_column, partition_kind) {
        (Some(column), Some(kind)) => Some(PartitionKey {
            column,
            kind: partition_kind_from_text(&kind)?,
        }),
        _ => None,
    };

    Ok(TableMapping {
        mirror: MirrorName::new(row.get::<_, String>(0)),
        source_schema: row.get(1),
        source_table: row.get(2),
        destination_schema: row.get(3),
        destination_table: row.get(4),
        partition_key,
        excluded_columns: row
            .get::<_, Vec<String>>(7)
            .into_iter()
            .collect::<BTreeSet<_>>(),
    })
}

const MAPPING_COLUMNS: &str = "mirror, source_schema, source_table, destination_schema, \
    destination_table, partition_column, partition_kind, excluded_columns";

impl CatalogStore {
    pub async fn put_table_mapping(&self, mapping: &TableMapping) -> Result<()> {
        let client = self.pool.client().await?;
        let (partition_column, partition_kind) = match &mapping.partition_key {
            Some(key) => (
                Some(key.column.clone()),
                Some(partition_kind_to_text(key.kind).to_string()),
            ),
            None => (None, None),
        };
        let excluded: Vec<String> = mapping.excluded_columns.iter().cloned().collect();

        client
            .execute(
                &format!(
                    "INSERT INTO bunny_table_mappings ({MAPPING_COLUMNS}) \
                     VALUES ($1,$2,$3,$4,$5,$6,$7,$8) \
                     ON CONFLICT (mirror, source_schema, source_table) DO UPDATE SET \
                        destination_schema = EXCLUDED.destination_schema, \
                        destination_table = EXCLUDED.destination_table, \
                        partition_column = EXCLUDED.partition_column, \
                        partition_kind = EXCLUDED.partition_kind, \
                        excluded_columns = EXCLUDED.excluded_columns"
                ),
                &[
                    &mapping.mirror.as_str(),
                    &mapping.source_schema,
                    &mapping.source_table,
                    &mapping.destination_schema,
                    &mapping.destination_table,
                    &partition_column,
                    &partition_kind,
                    &excluded,
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn list_table_mappings(&self, mirror: &MirrorName) -> Result<Vec<TableMapping>> {
        let client = self.pool.client().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {MAPPING_COLUMNS} FROM bunny_table_mappings WHERE mirror = $1 \
                     ORDER BY source_schema, source_table"
                ),
                &[&mirror.as_str()],
            )
            .await?;
        rows.iter().map(row_to_mapping).collect()
    }
}
